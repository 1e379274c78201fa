//! Canonical counterparties, one row per (user, display name).
//!
//! Invariant: `alias_id` is never null. A merchant is born with a singleton
//! alias and keeps pointing at exactly one alias for its whole life.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Merchant exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merchant {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub alias_id: Uuid,
    pub category_id: Option<Uuid>,
    pub income_category_id: Option<Uuid>,
    pub expense_category_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "merchants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub alias_id: Uuid,
    pub category_id: Option<Uuid>,
    pub income_category_id: Option<Uuid>,
    pub expense_category_id: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::merchant_aliases::Entity",
        from = "Column::AliasId",
        to = "super::merchant_aliases::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Alias,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::merchant_aliases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alias.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Merchant {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            alias_id: model.alias_id,
            category_id: model.category_id,
            income_category_id: model.income_category_id,
            expense_category_id: model.expense_category_id,
        }
    }
}
