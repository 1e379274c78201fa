//! Bank registry, shared across users.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Bank entry exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bank {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub connector_id: Option<i64>,
    pub logo_url: Option<String>,
    pub color_hex: Option<String>,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "banks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub connector_id: Option<i64>,
    pub logo_url: Option<String>,
    pub color_hex: Option<String>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Bank {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            connector_id: model.connector_id,
            logo_url: model.logo_url,
            color_hex: model.color_hex,
            is_active: model.is_active,
        }
    }
}
