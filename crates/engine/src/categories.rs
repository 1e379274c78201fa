//! Global category taxonomy (tree).
//!
//! Categories are shared by all users; per-user presentation overrides live
//! in [`user_category_settings`](super::user_category_settings).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// Whether a category applies to incomes, expenses, or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
    #[default]
    Neutral,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Neutral => "neutral",
        }
    }
}

impl TryFrom<&str> for CategoryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "neutral" => Ok(Self::Neutral),
            other => Err(EngineError::InvalidId(format!(
                "invalid category kind: {other}"
            ))),
        }
    }
}

/// Category exposed to clients.
///
/// When returned from user-scoped listings, `color_hex`, `alias_label`,
/// `is_investment` and `ignored` already reflect the user's overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color_hex: String,
    pub alias_label: Option<String>,
    pub parent_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub kind: CategoryKind,
    pub is_investment: bool,
    pub ignored: bool,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color_hex: String,
    pub parent_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub kind: String,
    pub is_investment: bool,
    pub ignored: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Parent,
    #[sea_orm(has_many = "super::user_category_settings::Entity")]
    Settings,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::user_category_settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            color_hex: model.color_hex,
            alias_label: None,
            parent_id: model.parent_id,
            external_id: model.external_id,
            kind: CategoryKind::try_from(model.kind.as_str())?,
            is_investment: model.is_investment,
            ignored: model.ignored,
        })
    }
}
