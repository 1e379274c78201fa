use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{EngineError, Merchant, ResultEngine, merchant_aliases, merchants};

use super::{
    Engine, categories::require_category, is_unique_violation, normalize_required_name, with_tx,
};

/// Field updates for a merchant; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct MerchantUpdate {
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub income_category_id: Option<Uuid>,
    pub expense_category_id: Option<Uuid>,
}

impl Engine {
    /// Finds the merchant for `(user, title)`, creating it together with a
    /// singleton alias when it does not exist yet.
    pub async fn resolve_or_create_merchant(
        &self,
        user_id: &str,
        title: &str,
    ) -> ResultEngine<Merchant> {
        let title = normalize_required_name(title, "merchant")?;
        with_tx!(self, |db_tx| {
            let model = self
                .resolve_or_create_merchant_tx(&db_tx, user_id, &title, None)
                .await?;
            Ok(Merchant::from(model))
        })
    }

    /// Transaction-scoped merchant resolution.
    ///
    /// A concurrent insert of the same title loses on the unique constraint;
    /// the insert runs in a nested transaction so the loser can recover by
    /// re-reading the winner's row without poisoning the outer transaction.
    pub(super) async fn resolve_or_create_merchant_tx(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
        title: &str,
        initial_category: Option<Uuid>,
    ) -> ResultEngine<merchants::Model> {
        if let Some(model) = find_by_name(db_tx, user_id, title).await? {
            return Ok(model);
        }

        match insert_merchant_with_alias(db_tx, user_id, title, initial_category, None).await {
            Ok(model) => Ok(model),
            Err(EngineError::Database(db_err)) if is_unique_violation(&db_err) => {
                tracing::warn!(title, "merchant insert raced, retrying as lookup");
                let existing = find_by_name(db_tx, user_id, title).await?;
                existing.ok_or(EngineError::Database(db_err))
            }
            Err(err) => Err(err),
        }
    }

    /// Creates a merchant explicitly.
    ///
    /// Reuses an existing alias whose pattern equals the merchant name; a
    /// freshly created alias inherits `category_id` as its override.
    pub async fn create_merchant(
        &self,
        user_id: &str,
        name: &str,
        category_id: Option<Uuid>,
    ) -> ResultEngine<Merchant> {
        let name = normalize_required_name(name, "merchant")?;
        with_tx!(self, |db_tx| {
            if let Some(category_id) = category_id {
                require_category(&db_tx, category_id).await?;
            }
            if find_by_name(&db_tx, user_id, &name).await?.is_some() {
                return Err(EngineError::CreationConflict(name));
            }
            let model =
                match insert_merchant_with_alias(&db_tx, user_id, &name, category_id, category_id)
                    .await
                {
                    Err(EngineError::Database(db_err)) if is_unique_violation(&db_err) => {
                        Err(EngineError::CreationConflict(name.clone()))
                    }
                    other => other,
                }?;
            Ok(Merchant::from(model))
        })
    }

    pub async fn merchant(&self, user_id: &str, merchant_id: Uuid) -> ResultEngine<Merchant> {
        with_tx!(self, |db_tx| {
            let model = require_merchant(&db_tx, user_id, merchant_id).await?;
            Ok(Merchant::from(model))
        })
    }

    pub async fn merchants(&self, user_id: &str) -> ResultEngine<Vec<Merchant>> {
        with_tx!(self, |db_tx| {
            let models = merchants::Entity::find()
                .filter(merchants::Column::UserId.eq(user_id))
                .order_by_asc(merchants::Column::Name)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Merchant::from).collect())
        })
    }

    /// Case-insensitive substring search over merchant names, ordered by name.
    pub async fn search_merchants(
        &self,
        user_id: &str,
        query: &str,
        limit: u64,
    ) -> ResultEngine<Vec<Merchant>> {
        with_tx!(self, |db_tx| {
            let models = merchants::Entity::find()
                .filter(merchants::Column::UserId.eq(user_id))
                .filter(merchants::Column::Name.contains(query))
                .order_by_asc(merchants::Column::Name)
                .limit(limit)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Merchant::from).collect())
        })
    }

    pub async fn update_merchant(
        &self,
        user_id: &str,
        merchant_id: Uuid,
        update: MerchantUpdate,
    ) -> ResultEngine<Merchant> {
        with_tx!(self, |db_tx| {
            let current = require_merchant(&db_tx, user_id, merchant_id).await?;

            let mut active = merchants::ActiveModel {
                id: ActiveValue::Set(merchant_id),
                ..Default::default()
            };
            let mut dirty = false;
            if let Some(name) = &update.name {
                active.name = ActiveValue::Set(normalize_required_name(name, "merchant")?);
                dirty = true;
            }
            if let Some(category_id) = update.category_id {
                require_category(&db_tx, category_id).await?;
                active.category_id = ActiveValue::Set(Some(category_id));
                dirty = true;
            }
            if let Some(income_category_id) = update.income_category_id {
                require_category(&db_tx, income_category_id).await?;
                active.income_category_id = ActiveValue::Set(Some(income_category_id));
                dirty = true;
            }
            if let Some(expense_category_id) = update.expense_category_id {
                require_category(&db_tx, expense_category_id).await?;
                active.expense_category_id = ActiveValue::Set(Some(expense_category_id));
                dirty = true;
            }
            if !dirty {
                return Ok(Merchant::from(current));
            }

            let model = match active.update(&db_tx).await {
                Err(db_err) if is_unique_violation(&db_err) => {
                    let name = update.name.clone().unwrap_or_default();
                    return Err(EngineError::CreationConflict(name));
                }
                other => other,
            }?;
            Ok(Merchant::from(model))
        })
    }

    /// Deletes a merchant; its transactions keep their category but lose the
    /// merchant pointer, and an alias left without members is removed.
    pub async fn delete_merchant(&self, user_id: &str, merchant_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = require_merchant(&db_tx, user_id, merchant_id).await?;
            model.delete(&db_tx).await?;
            self.cleanup_empty_aliases_tx(&db_tx, user_id).await?;
            Ok(())
        })
    }
}

async fn find_by_name(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    name: &str,
) -> ResultEngine<Option<merchants::Model>> {
    let model = merchants::Entity::find()
        .filter(merchants::Column::UserId.eq(user_id))
        .filter(merchants::Column::Name.eq(name))
        .one(db_tx)
        .await?;
    Ok(model)
}

pub(super) async fn require_merchant(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    merchant_id: Uuid,
) -> ResultEngine<merchants::Model> {
    merchants::Entity::find_by_id(merchant_id)
        .filter(merchants::Column::UserId.eq(user_id))
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("merchant".to_string()))
}

/// Inserts alias + merchant inside a nested transaction.
///
/// An alias whose pattern already equals the merchant name is reused instead
/// of inserted, so orphaned singleton aliases from earlier group edits do not
/// block merchant creation.
async fn insert_merchant_with_alias(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    name: &str,
    merchant_category: Option<Uuid>,
    alias_category: Option<Uuid>,
) -> ResultEngine<merchants::Model> {
    let nested = db_tx.begin().await?;

    let alias_id = match merchant_aliases::Entity::find()
        .filter(merchant_aliases::Column::UserId.eq(user_id))
        .filter(merchant_aliases::Column::Pattern.eq(name))
        .one(&nested)
        .await?
    {
        Some(alias) => alias.id,
        None => {
            let alias = merchant_aliases::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id.to_string()),
                pattern: ActiveValue::Set(name.to_string()),
                category_id: ActiveValue::Set(alias_category),
                is_investment: ActiveValue::Set(false),
                ignored: ActiveValue::Set(false),
                update_past_transactions: ActiveValue::Set(true),
            };
            alias.insert(&nested).await?.id
        }
    };

    let merchant = merchants::ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4()),
        user_id: ActiveValue::Set(user_id.to_string()),
        name: ActiveValue::Set(name.to_string()),
        alias_id: ActiveValue::Set(alias_id),
        category_id: ActiveValue::Set(merchant_category),
        income_category_id: ActiveValue::Set(None),
        expense_category_id: ActiveValue::Set(None),
    };
    let model = merchant.insert(&nested).await?;

    nested.commit().await?;
    Ok(model)
}
