//! Aggregator synchronization.
//!
//! Pulls the movements of every account of a connected aggregator item and
//! lands them as transactions, one database transaction per account. Titles
//! arrive as raw bank descriptors and are cleaned before matching; rows are
//! deduplicated by the aggregator's own transaction id. Sync never overwrites
//! merchant memory: the aggregator's taxonomy only fills the gaps the user
//! has not categorized yet.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde::Deserialize;

use crate::{
    EngineError, PaymentMethod, ResultEngine, Transaction, TransactionKind, categories,
    merchant_aliases, merchants, transactions,
};

use super::{Engine, banks::require_bank, is_unique_violation, with_tx};

/// Slug of the category unmapped aggregator movements fall back to.
const FALLBACK_CATEGORY_SLUG: &str = "others";

/// Read access to an open-finance aggregator.
///
/// Implementations decide transport and authentication; the engine only pulls.
pub trait AggregatorClient {
    /// Lists the accounts of a connected item.
    fn accounts(
        &self,
        item_id: &str,
    ) -> impl Future<Output = ResultEngine<Vec<AggregatorAccount>>> + Send;

    /// Lists the transactions of one account, optionally from a date onwards.
    fn transactions(
        &self,
        account_id: &str,
        from: Option<NaiveDate>,
    ) -> impl Future<Output = ResultEngine<Vec<AggregatorTransaction>>> + Send;
}

/// One account of a connected aggregator item.
#[derive(Clone, Debug, Deserialize)]
pub struct AggregatorAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// One movement as the aggregator reports it, reduced to the fields the sync
/// uses. `amount` is in major units and signed the way the bank signs it.
#[derive(Clone, Debug, Deserialize)]
pub struct AggregatorTransaction {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub date: NaiveDate,
    /// Counterparty business name; preferred over `description` when present.
    #[serde(default, alias = "businessName")]
    pub business_name: Option<String>,
    /// "CREDIT" or "DEBIT"; decides the transaction kind when present.
    #[serde(default, alias = "type")]
    pub direction: Option<String>,
    /// Raw operation descriptor, e.g. "PIX" or "BOLETO".
    #[serde(default, alias = "operationType")]
    pub operation_type: Option<String>,
    /// The aggregator's category id for the movement.
    #[serde(default, alias = "categoryId")]
    pub category_external_id: Option<String>,
    /// Whether the movement came from a credit card.
    #[serde(default)]
    pub is_credit_card: bool,
}

impl AggregatorTransaction {
    fn clean_title(&self) -> String {
        let raw = self
            .business_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.description);
        clean_statement_title(raw)
    }
}

/// What one sync run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
}

impl Engine {
    /// Syncs every account of an aggregator item into the user's
    /// transactions.
    ///
    /// Titles are cleaned of aggregator noise, then matched to an alias group
    /// by exact pattern, to a merchant by exact name, or a merchant is created
    /// with the aggregator category mapped through its external id (falling
    /// back to the "others" category). Rows whose aggregator id is already
    /// stored get their title and merchant link corrected instead of being
    /// inserted twice. Each account lands in its own database transaction, so
    /// a failing account does not roll back the ones already synced.
    pub async fn sync_account_transactions<C>(
        &self,
        user_id: &str,
        client: &C,
        item_id: &str,
        bank_id: Option<Uuid>,
        from: Option<NaiveDate>,
    ) -> ResultEngine<SyncOutcome>
    where
        C: AggregatorClient + Sync,
    {
        let accounts = client.accounts(item_id).await?;
        let mut outcome = SyncOutcome::default();
        for account in accounts {
            let rows = client.transactions(&account.id, from).await?;
            tracing::info!(
                account = %account.name,
                fetched = rows.len(),
                "syncing aggregator account"
            );
            outcome.fetched += rows.len() as u64;
            if rows.is_empty() {
                continue;
            }
            let landed = self.land_account_rows(user_id, bank_id, rows).await?;
            outcome.created += landed.created;
            outcome.updated += landed.updated;
        }
        Ok(outcome)
    }

    async fn land_account_rows(
        &self,
        user_id: &str,
        bank_id: Option<Uuid>,
        fetched: Vec<AggregatorTransaction>,
    ) -> ResultEngine<SyncOutcome> {
        with_tx!(self, |db_tx| {
            if let Some(bank_id) = bank_id {
                require_bank(&db_tx, bank_id).await?;
            }

            let all_categories = categories::Entity::find()
                .order_by_asc(categories::Column::Name)
                .all(&db_tx)
                .await?;
            let fallback_category = all_categories
                .iter()
                .find(|category| category.slug == FALLBACK_CATEGORY_SLUG)
                .or_else(|| all_categories.first())
                .map(|category| category.id)
                .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
            let categories_by_external: HashMap<String, Uuid> = all_categories
                .iter()
                .filter_map(|category| {
                    category
                        .external_id
                        .clone()
                        .map(|external| (external, category.id))
                })
                .collect();

            let external_ids: Vec<String> = fetched.iter().map(|row| row.id.clone()).collect();
            let existing_by_external: HashMap<String, transactions::Model> =
                transactions::Entity::find()
                    .filter(transactions::Column::UserId.eq(user_id))
                    .filter(transactions::Column::ExternalId.is_in(external_ids))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .filter_map(|model| {
                        model.external_id.clone().map(|external| (external, model))
                    })
                    .collect();

            let titles: Vec<String> = fetched
                .iter()
                .map(AggregatorTransaction::clean_title)
                .filter(|title| !title.is_empty())
                .collect();
            let aliases_by_pattern: HashMap<String, merchant_aliases::Model> =
                merchant_aliases::Entity::find()
                    .filter(merchant_aliases::Column::UserId.eq(user_id))
                    .filter(merchant_aliases::Column::Pattern.is_in(titles.clone()))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|alias| (alias.pattern.clone(), alias))
                    .collect();
            let alias_ids: Vec<Uuid> = aliases_by_pattern.values().map(|alias| alias.id).collect();
            let mut members_by_alias: HashMap<Uuid, merchants::Model> = HashMap::new();
            if !alias_ids.is_empty() {
                let members = merchants::Entity::find()
                    .filter(merchants::Column::UserId.eq(user_id))
                    .filter(merchants::Column::AliasId.is_in(alias_ids))
                    .order_by_asc(merchants::Column::Name)
                    .all(&db_tx)
                    .await?;
                for member in members {
                    members_by_alias.entry(member.alias_id).or_insert(member);
                }
            }
            let mut merchants_by_name: HashMap<String, merchants::Model> =
                merchants::Entity::find()
                    .filter(merchants::Column::UserId.eq(user_id))
                    .filter(merchants::Column::Name.is_in(titles))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|model| (model.name.clone(), model))
                    .collect();

            let mut outcome = SyncOutcome::default();
            let mut seen_external: HashSet<String> = HashSet::new();
            for row in &fetched {
                if !seen_external.insert(row.id.clone()) {
                    continue;
                }
                let title = row.clean_title();
                if title.is_empty() {
                    tracing::warn!(external_id = %row.id, "skipping movement with an empty descriptor");
                    continue;
                }
                let amount_minor = to_cents(row.amount);
                if amount_minor == 0 {
                    continue;
                }
                let (signed_kind, magnitude) = TransactionKind::from_signed(amount_minor);
                let kind = infer_kind(row, signed_kind);
                let method = infer_method(row);
                let mapped_category = row
                    .category_external_id
                    .as_deref()
                    .and_then(|external| categories_by_external.get(external).copied())
                    .unwrap_or(fallback_category);

                let mut alias_override: Option<Uuid> = None;
                let merchant: merchants::Model = if let Some((alias, member)) =
                    aliases_by_pattern.get(&title).and_then(|alias| {
                        members_by_alias.get(&alias.id).map(|member| (alias, member))
                    }) {
                    alias_override = alias.category_id;
                    member.clone()
                } else if let Some(model) = merchants_by_name.get(&title) {
                    model.clone()
                } else {
                    let model = self
                        .resolve_or_create_merchant_tx(&db_tx, user_id, &title, Some(mapped_category))
                        .await?;
                    merchants_by_name.insert(title.clone(), model.clone());
                    model
                };

                if let Some(existing) = existing_by_external.get(&row.id) {
                    let retitle = existing.title != merchant.name;
                    let relink = existing.merchant_id != Some(merchant.id);
                    if retitle || relink {
                        let mut active = transactions::ActiveModel {
                            id: ActiveValue::Set(existing.id.clone()),
                            ..Default::default()
                        };
                        if retitle {
                            active.title = ActiveValue::Set(merchant.name.clone());
                        }
                        if relink {
                            active.merchant_id = ActiveValue::Set(Some(merchant.id));
                        }
                        active.update(&db_tx).await?;
                        outcome.updated += 1;
                    }
                    continue;
                }

                let memory = match kind {
                    TransactionKind::Income => merchant.income_category_id,
                    TransactionKind::Expense => merchant.expense_category_id,
                }
                .or(merchant.category_id);
                let category_id = alias_override.or(memory).unwrap_or(mapped_category);

                let raw_description = row.description.trim();
                let mut transaction = Transaction::new(
                    user_id.to_string(),
                    row.date,
                    merchant.name.clone(),
                    magnitude,
                    kind,
                    method,
                    category_id,
                )?;
                transaction.merchant_id = Some(merchant.id);
                transaction.bank_id = bank_id;
                transaction.description = (!raw_description.is_empty()
                    && raw_description != merchant.name)
                    .then(|| raw_description.to_string());
                transaction.external_id = Some(row.id.clone());

                let nested = db_tx.begin().await?;
                match transactions::ActiveModel::from(&transaction)
                    .insert(&nested)
                    .await
                {
                    Ok(_) => {
                        nested.commit().await?;
                        outcome.created += 1;
                    }
                    Err(err) if is_unique_violation(&err) => {
                        nested.rollback().await?;
                        tracing::warn!(external_id = %row.id, "movement raced an existing row, skipped");
                    }
                    Err(err) => return Err(EngineError::Database(err)),
                }
            }
            Ok(outcome)
        })
    }
}

/// Last non-empty pipe-separated segment of a raw descriptor, with a trailing
/// installment marker ("3/12", "Parcela 3/12") removed.
pub(crate) fn clean_statement_title(raw: &str) -> String {
    let base = raw
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .next_back()
        .unwrap_or("");
    strip_installment_suffix(base)
}

fn strip_installment_suffix(value: &str) -> String {
    let mut words: Vec<&str> = value.split_whitespace().collect();
    let is_installment = words.last().is_some_and(|last| {
        last.split_once('/').is_some_and(|(numerator, denominator)| {
            !numerator.is_empty()
                && !denominator.is_empty()
                && numerator.bytes().all(|byte| byte.is_ascii_digit())
                && denominator.bytes().all(|byte| byte.is_ascii_digit())
        })
    });
    if is_installment {
        words.pop();
        while words
            .last()
            .is_some_and(|word| word.eq_ignore_ascii_case("parcela") || *word == "-")
        {
            words.pop();
        }
    }
    words.join(" ")
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn infer_kind(row: &AggregatorTransaction, from_sign: TransactionKind) -> TransactionKind {
    match row.direction.as_deref() {
        Some(direction) if direction.eq_ignore_ascii_case("credit") => TransactionKind::Income,
        Some(direction) if direction.eq_ignore_ascii_case("debit") => TransactionKind::Expense,
        _ => from_sign,
    }
}

fn infer_method(row: &AggregatorTransaction) -> PaymentMethod {
    if row.is_credit_card {
        return PaymentMethod::CreditCard;
    }
    let operation = row
        .operation_type
        .as_deref()
        .unwrap_or_default()
        .to_uppercase();
    if operation.contains("PIX") {
        PaymentMethod::Pix
    } else if operation.contains("BOLETO") {
        PaymentMethod::Boleto
    } else if operation.contains("TRANSFER") {
        PaymentMethod::BankTransfer
    } else if operation.contains("DEBIT") {
        PaymentMethod::DebitCard
    } else {
        PaymentMethod::Other
    }
}
