//! Merchant alias groups.
//!
//! An alias groups the merchants a user considers one real-world spender
//! ("Uber" grouping "Uber *Trip" and "Uber *Eats"). Its optional category
//! override beats every other category source during resolution.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Alias group exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerchantAlias {
    pub id: Uuid,
    pub user_id: String,
    pub pattern: String,
    pub category_id: Option<Uuid>,
    pub is_investment: bool,
    pub ignored: bool,
    pub update_past_transactions: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "merchant_aliases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub pattern: String,
    pub category_id: Option<Uuid>,
    pub is_investment: bool,
    pub ignored: bool,
    pub update_past_transactions: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(has_many = "super::merchants::Entity")]
    Merchants,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::merchants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchants.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for MerchantAlias {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            pattern: model.pattern,
            category_id: model.category_id,
            is_investment: model.is_investment,
            ignored: model.ignored,
            update_past_transactions: model.update_past_transactions,
        }
    }
}
