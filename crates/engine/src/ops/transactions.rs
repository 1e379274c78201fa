//! Transaction CRUD and filtered listing.

use chrono::NaiveDate;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};

use crate::{
    EngineError, PaymentMethod, ResultEngine, Transaction, TransactionKind, merchants,
    transactions,
};

use super::{
    Engine, banks::require_bank, categories::require_category, is_unique_violation,
    merchants::require_merchant, normalize_optional_text, normalize_required_name,
    resolution::check_kind_compatibility, with_tx,
};

/// Input for [`Engine::create_transaction`].
///
/// `amount_minor` is the positive magnitude; the sign lives in `kind`.
#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub kind: TransactionKind,
    pub method: PaymentMethod,
    pub category_id: Option<Uuid>,
    pub bank_id: Option<Uuid>,
    pub external_id: Option<String>,
}

impl NewTransaction {
    pub fn new(
        date: NaiveDate,
        title: impl Into<String>,
        amount_minor: i64,
        kind: TransactionKind,
    ) -> Self {
        Self {
            date,
            title: title.into(),
            description: None,
            amount_minor,
            kind,
            method: PaymentMethod::default(),
            category_id: None,
            bank_id: None,
            external_id: None,
        }
    }
}

/// Field updates for a transaction; `None` leaves the field untouched.
///
/// A new category is kind-checked but never learned onto the merchant; lasting
/// corrections go through the merchant or alias APIs.
#[derive(Clone, Debug, Default)]
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

/// Filters for listing transactions.
///
/// All filters are ANDed. `from` and `to` are inclusive dates, `category_id`
/// matches the category's whole subtree, and `alias_ids` match through the
/// member merchants.
#[derive(Clone, Debug, Default)]
pub struct TransactionQuery {
    pub query: Option<String>,
    pub kind: Option<TransactionKind>,
    pub method: Option<PaymentMethod>,
    pub category_id: Option<Uuid>,
    pub bank_id: Option<Uuid>,
    pub merchant_id: Option<Uuid>,
    pub alias_ids: Vec<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub min_amount_minor: Option<i64>,
    pub max_amount_minor: Option<i64>,
    pub page: u64,
    pub per_page: u64,
}

/// One page of transactions plus the total row count for the filters.
#[derive(Clone, Debug)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl Engine {
    /// Creates a transaction, linking a merchant by exact title and resolving
    /// its category.
    ///
    /// A `category_id` in the input acts as the explicit hint of the
    /// categorization pipeline, so the merchant learns it for later
    /// transactions.
    pub async fn create_transaction(
        &self,
        user_id: &str,
        new_transaction: NewTransaction,
    ) -> ResultEngine<Transaction> {
        let title = normalize_required_name(&new_transaction.title, "transaction")?;
        let description = normalize_optional_text(new_transaction.description.as_deref());
        let external_id = normalize_optional_text(new_transaction.external_id.as_deref());
        with_tx!(self, |db_tx| {
            if let Some(bank_id) = new_transaction.bank_id {
                require_bank(&db_tx, bank_id).await?;
            }
            let merchant = self
                .resolve_or_create_merchant_tx(&db_tx, user_id, &title, new_transaction.category_id)
                .await?;
            let resolved = self
                .resolve_for_merchant(
                    &db_tx,
                    &merchant,
                    new_transaction.kind,
                    new_transaction.category_id,
                )
                .await?;
            let mut transaction = Transaction::new(
                user_id.to_string(),
                new_transaction.date,
                title.clone(),
                new_transaction.amount_minor,
                new_transaction.kind,
                new_transaction.method,
                resolved.category_id,
            )?;
            transaction.merchant_id = Some(merchant.id);
            transaction.bank_id = new_transaction.bank_id;
            transaction.description = description;
            transaction.external_id = external_id;
            transactions::ActiveModel::from(&transaction)
                .insert(&db_tx)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        EngineError::CreationConflict(title.clone())
                    } else {
                        EngineError::Database(err)
                    }
                })?;
            Ok(transaction)
        })
    }

    /// Returns one transaction.
    pub async fn transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let model = require_transaction(&db_tx, user_id, transaction_id).await?;
            Transaction::try_from(model)
        })
    }

    /// Updates a transaction. Fields left `None` keep their value.
    ///
    /// Changing the kind or the category re-checks kind compatibility against
    /// the effective category.
    pub async fn update_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let current = require_transaction(&db_tx, user_id, transaction_id).await?;
            let kind = match update.kind {
                Some(kind) => kind,
                None => TransactionKind::try_from(current.kind.as_str())?,
            };
            let kind_changed = kind.as_str() != current.kind;
            let category_changed = update
                .category_id
                .is_some_and(|category_id| category_id != current.category_id);

            let mut active: transactions::ActiveModel = current.clone().into();
            let mut dirty = false;
            if let Some(date) = update.date {
                if date != current.date {
                    active.date = ActiveValue::Set(date);
                    dirty = true;
                }
            }
            if let Some(title) = update.title.as_deref() {
                let title = normalize_required_name(title, "transaction")?;
                if title != current.title {
                    active.title = ActiveValue::Set(title);
                    dirty = true;
                }
            }
            if let Some(description) = update.description.as_deref() {
                let description = normalize_optional_text(Some(description));
                if description != current.description {
                    active.description = ActiveValue::Set(description);
                    dirty = true;
                }
            }
            if let Some(amount_minor) = update.amount_minor {
                if amount_minor <= 0 {
                    return Err(EngineError::InvalidAmount(
                        "amount_minor must be > 0".to_string(),
                    ));
                }
                if amount_minor != current.amount_minor {
                    active.amount_minor = ActiveValue::Set(amount_minor);
                    dirty = true;
                }
            }
            if let Some(method) = update.method {
                if method.as_str() != current.method {
                    active.method = ActiveValue::Set(method.as_str().to_string());
                    dirty = true;
                }
            }
            if let Some(merchant_id) = update.merchant_id {
                if Some(merchant_id) != current.merchant_id {
                    require_merchant(&db_tx, user_id, merchant_id).await?;
                    active.merchant_id = ActiveValue::Set(Some(merchant_id));
                    dirty = true;
                }
            }
            if let Some(bank_id) = update.bank_id {
                if Some(bank_id) != current.bank_id {
                    require_bank(&db_tx, bank_id).await?;
                    active.bank_id = ActiveValue::Set(Some(bank_id));
                    dirty = true;
                }
            }
            if kind_changed {
                active.kind = ActiveValue::Set(kind.as_str().to_string());
                dirty = true;
            }
            if kind_changed || category_changed {
                let category_id = update.category_id.unwrap_or(current.category_id);
                let category = require_category(&db_tx, category_id).await?;
                check_kind_compatibility(self.policy, kind, &category)?;
                if category_changed {
                    active.category_id = ActiveValue::Set(category_id);
                    dirty = true;
                }
            }

            let model = if dirty {
                active.update(&db_tx).await?
            } else {
                current
            };
            Transaction::try_from(model)
        })
    }

    /// Deletes a transaction.
    pub async fn delete_transaction(
        &self,
        user_id: &str,
        transaction_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = require_transaction(&db_tx, user_id, transaction_id).await?;
            model.delete(&db_tx).await?;
            Ok(())
        })
    }

    /// Lists transactions newest first, filtered and paginated.
    pub async fn transactions(
        &self,
        user_id: &str,
        query: TransactionQuery,
    ) -> ResultEngine<TransactionPage> {
        let page = query.page.max(1);
        let per_page = query.per_page.max(1);
        let category_ids = match query.category_id {
            Some(category_id) => Some(self.descendant_ids(category_id).await?),
            None => None,
        };
        with_tx!(self, |db_tx| {
            let mut select =
                transactions::Entity::find().filter(transactions::Column::UserId.eq(user_id));
            if let Some(text) = normalize_optional_text(query.query.as_deref()) {
                select = select.filter(transactions::Column::Title.contains(&text));
            }
            if let Some(kind) = query.kind {
                select = select.filter(transactions::Column::Kind.eq(kind.as_str()));
            }
            if let Some(method) = query.method {
                select = select.filter(transactions::Column::Method.eq(method.as_str()));
            }
            if let Some(category_ids) = &category_ids {
                select = select
                    .filter(transactions::Column::CategoryId.is_in(category_ids.iter().copied()));
            }
            if let Some(bank_id) = query.bank_id {
                select = select.filter(transactions::Column::BankId.eq(bank_id));
            }
            if let Some(merchant_id) = query.merchant_id {
                select = select.filter(transactions::Column::MerchantId.eq(merchant_id));
            }
            if !query.alias_ids.is_empty() {
                let member_ids: Vec<Uuid> = merchants::Entity::find()
                    .select_only()
                    .column(merchants::Column::Id)
                    .filter(merchants::Column::UserId.eq(user_id))
                    .filter(merchants::Column::AliasId.is_in(query.alias_ids.iter().copied()))
                    .into_tuple()
                    .all(&db_tx)
                    .await?;
                select = select.filter(transactions::Column::MerchantId.is_in(member_ids));
            }
            if let Some(from) = query.from {
                select = select.filter(transactions::Column::Date.gte(from));
            }
            if let Some(to) = query.to {
                select = select.filter(transactions::Column::Date.lte(to));
            }
            if let Some(min_amount_minor) = query.min_amount_minor {
                select = select.filter(transactions::Column::AmountMinor.gte(min_amount_minor));
            }
            if let Some(max_amount_minor) = query.max_amount_minor {
                select = select.filter(transactions::Column::AmountMinor.lte(max_amount_minor));
            }
            let paginator = select
                .order_by_desc(transactions::Column::Date)
                .order_by_desc(transactions::Column::Id)
                .paginate(&db_tx, per_page);
            let total = paginator.num_items().await?;
            let models = paginator.fetch_page(page - 1).await?;
            let items = models
                .into_iter()
                .map(Transaction::try_from)
                .collect::<ResultEngine<Vec<Transaction>>>()?;
            Ok(TransactionPage {
                items,
                total,
                page,
                per_page,
            })
        })
    }
}

pub(super) async fn require_transaction(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    transaction_id: &str,
) -> ResultEngine<transactions::Model> {
    transactions::Entity::find_by_id(transaction_id)
        .filter(transactions::Column::UserId.eq(user_id))
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("transaction".to_string()))
}
