//! Transaction records.
//!
//! The canonical encoding is a `kind` tag plus a positive minor-unit amount;
//! signed amounts exist only at import/sync boundaries and are adapted via
//! [`TransactionKind::from_signed`].

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    /// Splits a signed minor-unit amount into the canonical encoding.
    ///
    /// Negative amounts are expenses; the returned amount is the absolute
    /// value. Zero is rejected upstream, before this adapter runs.
    #[must_use]
    pub fn from_signed(amount_minor: i64) -> (TransactionKind, i64) {
        if amount_minor < 0 {
            (Self::Expense, amount_minor.saturating_abs())
        } else {
            (Self::Income, amount_minor)
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidId(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// How the money moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    CreditCard,
    DebitCard,
    BankTransfer,
    Cash,
    Boleto,
    BillPayment,
    InvestmentRedemption,
    #[default]
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pix => "pix",
            Self::CreditCard => "credit_card",
            Self::DebitCard => "debit_card",
            Self::BankTransfer => "bank_transfer",
            Self::Cash => "cash",
            Self::Boleto => "boleto",
            Self::BillPayment => "bill_payment",
            Self::InvestmentRedemption => "investment_redemption",
            Self::Other => "other",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pix" => Ok(Self::Pix),
            "credit_card" => Ok(Self::CreditCard),
            "debit_card" => Ok(Self::DebitCard),
            "bank_transfer" => Ok(Self::BankTransfer),
            "cash" => Ok(Self::Cash),
            "boleto" => Ok(Self::Boleto),
            "bill_payment" => Ok(Self::BillPayment),
            "investment_redemption" => Ok(Self::InvestmentRedemption),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidId(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub merchant_id: Option<Uuid>,
    pub bank_id: Option<Uuid>,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub kind: TransactionKind,
    pub method: PaymentMethod,
    pub category_id: Uuid,
    pub external_id: Option<String>,
}

impl Transaction {
    /// Builds a transaction with a fresh id, validating the amount.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        date: NaiveDate,
        title: String,
        amount_minor: i64,
        kind: TransactionKind,
        method: PaymentMethod,
        category_id: Uuid,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            merchant_id: None,
            bank_id: None,
            date,
            title,
            description: None,
            amount_minor,
            kind,
            method,
            category_id,
            external_id: None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub merchant_id: Option<Uuid>,
    pub bank_id: Option<Uuid>,
    pub date: Date,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub kind: String,
    pub method: String,
    pub category_id: Uuid,
    pub external_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::merchants::Entity",
        from = "Column::MerchantId",
        to = "super::merchants::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Merchant,
    #[sea_orm(
        belongs_to = "super::banks::Entity",
        from = "Column::BankId",
        to = "super::banks::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Bank,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::merchants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Merchant.def()
    }
}

impl Related<super::banks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bank.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.clone()),
            user_id: ActiveValue::Set(tx.user_id.clone()),
            merchant_id: ActiveValue::Set(tx.merchant_id),
            bank_id: ActiveValue::Set(tx.bank_id),
            date: ActiveValue::Set(tx.date),
            title: ActiveValue::Set(tx.title.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            method: ActiveValue::Set(tx.method.as_str().to_string()),
            category_id: ActiveValue::Set(tx.category_id),
            external_id: ActiveValue::Set(tx.external_id.clone()),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            merchant_id: model.merchant_id,
            bank_id: model.bank_id,
            date: model.date,
            title: model.title,
            description: model.description,
            amount_minor: model.amount_minor,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            method: PaymentMethod::try_from(model.method.as_str())?,
            category_id: model.category_id,
            external_id: model.external_id,
        })
    }
}
