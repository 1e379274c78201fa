use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

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

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Income,
    Expense,
    #[default]
    Neutral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    BankStatement,
    CreditCardInvoice,
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
        pub color_hex: Option<String>,
        pub parent_id: Option<Uuid>,
        pub kind: Option<CategoryKind>,
        pub is_investment: Option<bool>,
        pub ignored: Option<bool>,
    }

    /// Partial update; absent fields keep their current value.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub name: Option<String>,
        pub color_hex: Option<String>,
        pub parent_id: Option<Uuid>,
        pub kind: Option<CategoryKind>,
        pub is_investment: Option<bool>,
        pub ignored: Option<bool>,
    }

    /// Per-user overrides; an override equal to the global value is dropped.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CategorySettingUpdate {
        pub color_hex: Option<String>,
        pub alias_label: Option<String>,
        pub is_investment: Option<bool>,
        pub ignored: Option<bool>,
    }

    /// Category with the requesting user's overrides already applied.
    #[derive(Debug, Serialize, Deserialize)]
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

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<Category>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DescendantsResponse {
        pub ids: Vec<Uuid>,
    }
}

pub mod bank {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Bank {
        pub id: Uuid,
        pub name: String,
        pub slug: String,
        pub connector_id: Option<i64>,
        pub logo_url: Option<String>,
        pub color_hex: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BanksResponse {
        pub banks: Vec<Bank>,
    }
}

pub mod merchant {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Merchant {
        pub id: Uuid,
        pub name: String,
        pub alias_id: Uuid,
        /// Sign-agnostic fallback category.
        pub category_id: Option<Uuid>,
        pub income_category_id: Option<Uuid>,
        pub expense_category_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MerchantNew {
        pub name: String,
        pub category_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MerchantSearch {
        pub query: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct MerchantUpdate {
        pub name: Option<String>,
        pub category_id: Option<Uuid>,
        pub income_category_id: Option<Uuid>,
        pub expense_category_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MerchantsResponse {
        pub merchants: Vec<Merchant>,
    }
}

pub mod alias {
    use super::*;

    /// `General` hides both investment and ignored groups.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum AliasScope {
        #[default]
        General,
        Investment,
        Ignored,
        All,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AliasNew {
        pub pattern: String,
        pub merchant_ids: Vec<Uuid>,
        pub category_id: Option<Uuid>,
        pub is_investment: Option<bool>,
        pub ignored: Option<bool>,
        pub update_past_transactions: Option<bool>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AliasUpdate {
        pub pattern: Option<String>,
        pub category_id: Option<Uuid>,
        pub is_investment: Option<bool>,
        pub ignored: Option<bool>,
        pub update_past_transactions: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Alias {
        pub id: Uuid,
        pub pattern: String,
        pub category_id: Option<Uuid>,
        pub is_investment: bool,
        pub ignored: bool,
        pub update_past_transactions: bool,
    }

    /// An alias row together with the merchants grouped under it.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AliasGroup {
        pub alias: Alias,
        pub merchants: Vec<merchant::Merchant>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AliasSearch {
        pub query: Option<String>,
        pub scope: Option<AliasScope>,
        pub page: Option<u64>,
        pub per_page: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MerchantRef {
        pub merchant_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AliasesResponse {
        pub aliases: Vec<AliasGroup>,
        pub total: u64,
        pub page: u64,
        pub per_page: u64,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub date: NaiveDate,
        pub title: String,
        pub description: Option<String>,
        /// Positive amount in minor units; `kind` carries the direction.
        pub amount_minor: i64,
        pub kind: TransactionKind,
        pub method: Option<PaymentMethod>,
        /// Explicit category; resolved from the merchant when absent.
        pub category_id: Option<Uuid>,
        pub bank_id: Option<Uuid>,
        pub external_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Transaction {
        pub id: String,
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

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        pub date: Option<NaiveDate>,
        pub title: Option<String>,
        pub description: Option<String>,
        pub amount_minor: Option<i64>,
        pub kind: Option<TransactionKind>,
        pub method: Option<PaymentMethod>,
        pub category_id: Option<Uuid>,
        pub merchant_id: Option<Uuid>,
        pub bank_id: Option<Uuid>,
    }

    /// Listing filters; category filters match the whole subtree.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        pub query: Option<String>,
        pub kind: Option<TransactionKind>,
        pub method: Option<PaymentMethod>,
        pub category_id: Option<Uuid>,
        pub bank_id: Option<Uuid>,
        pub merchant_id: Option<Uuid>,
        pub alias_ids: Option<Vec<Uuid>>,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub min_amount_minor: Option<i64>,
        pub max_amount_minor: Option<i64>,
        pub page: Option<u64>,
        pub per_page: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionsResponse {
        pub transactions: Vec<Transaction>,
        pub total: u64,
        pub page: u64,
        pub per_page: u64,
    }
}

pub mod import {
    use super::*;

    /// Statement preview request; `csv` holds the raw file contents.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportPreview {
        pub source: String,
        pub kind: ImportKind,
        pub csv: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PreviewRecord {
        pub id: String,
        pub external_id: Option<String>,
        pub date: NaiveDate,
        pub title: String,
        /// Signed amount in minor units.
        pub amount_minor: i64,
        pub kind: TransactionKind,
        pub method: Option<PaymentMethod>,
        pub category: Option<category::Category>,
        pub bank_id: Uuid,
        pub has_merchant: bool,
        pub already_exists: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PreviewResponse {
        pub records: Vec<PreviewRecord>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportCommit {
        pub kind: Option<ImportKind>,
        pub transactions: Vec<ImportRow>,
    }

    /// One confirmed row to persist; `amount_minor` is signed.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportRow {
        pub id: Option<String>,
        pub external_id: Option<String>,
        pub date: NaiveDate,
        pub title: String,
        pub description: Option<String>,
        pub amount_minor: i64,
        pub method: Option<PaymentMethod>,
        pub category_id: Option<Uuid>,
        pub bank_id: Option<Uuid>,
        pub has_merchant: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CommitResponse {
        pub transactions: Vec<transaction::Transaction>,
        pub skipped_ids: Vec<String>,
    }
}
