//! Category resolution.
//!
//! Precedence, highest first: alias override, explicit hint, merchant memory.
//! An explicit hint is learned back onto the merchant; which slot it lands in
//! depends on the policy's `sign_learning` switch.

use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    CategorizationPolicy, CategoryKind, EngineError, MismatchAction, ResultEngine, TransactionKind,
    categories, merchant_aliases, merchants, transactions,
};

use super::{Engine, merchants::require_merchant, with_tx};

/// Which merchant field a learned category is written to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LearnSlot {
    Legacy,
    Income,
    Expense,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ResolvedCategory {
    pub category_id: Uuid,
    pub learn: Option<LearnSlot>,
}

/// Applies the precedence rules without touching the database.
///
/// `learn` is set only when an explicit hint won and differs from what the
/// target slot already remembers; the alias override never learns.
pub(super) fn choose_category(
    policy: CategorizationPolicy,
    kind: TransactionKind,
    explicit: Option<Uuid>,
    alias_override: Option<Uuid>,
    merchant: &merchants::Model,
) -> ResultEngine<ResolvedCategory> {
    if let Some(category_id) = alias_override {
        return Ok(ResolvedCategory {
            category_id,
            learn: None,
        });
    }

    if let Some(category_id) = explicit {
        let slot = if policy.sign_learning {
            match kind {
                TransactionKind::Income => LearnSlot::Income,
                TransactionKind::Expense => LearnSlot::Expense,
            }
        } else {
            LearnSlot::Legacy
        };
        let current = match slot {
            LearnSlot::Income => merchant.income_category_id,
            LearnSlot::Expense => merchant.expense_category_id,
            LearnSlot::Legacy => merchant.category_id,
        };
        let learn = (current != Some(category_id)).then_some(slot);
        return Ok(ResolvedCategory { category_id, learn });
    }

    let remembered = match kind {
        TransactionKind::Income => merchant.income_category_id,
        TransactionKind::Expense => merchant.expense_category_id,
    }
    .or(merchant.category_id);

    match remembered {
        Some(category_id) => Ok(ResolvedCategory {
            category_id,
            learn: None,
        }),
        None => Err(EngineError::CategoryUndetermined(merchant.name.clone())),
    }
}

/// Rejects or warns when a category reserved for one kind is used on the
/// other. Neutral categories always pass.
pub(super) fn check_kind_compatibility(
    policy: CategorizationPolicy,
    kind: TransactionKind,
    category: &categories::Model,
) -> ResultEngine<()> {
    let category_kind = CategoryKind::try_from(category.kind.as_str())?;
    let conflict = matches!(
        (kind, category_kind),
        (TransactionKind::Expense, CategoryKind::Income)
            | (TransactionKind::Income, CategoryKind::Expense)
    );
    if !conflict {
        return Ok(());
    }
    match policy.mismatch {
        MismatchAction::Reject => Err(EngineError::CategoryTypeMismatch(format!(
            "category \"{}\" is {} but the transaction is {}",
            category.name,
            category_kind.as_str(),
            kind.as_str()
        ))),
        MismatchAction::Warn => {
            tracing::warn!(
                category = %category.name,
                transaction_kind = kind.as_str(),
                "category kind does not match the transaction kind"
            );
            Ok(())
        }
    }
}

impl Engine {
    /// Resolves the category for a transaction, applying the merchant's alias
    /// override first. Fetches the alias, so only for the slow ingestion path
    /// and one-off creation.
    pub(super) async fn resolve_for_merchant(
        &self,
        db_tx: &DatabaseTransaction,
        merchant: &merchants::Model,
        kind: TransactionKind,
        explicit: Option<Uuid>,
    ) -> ResultEngine<ResolvedCategory> {
        let alias_override = merchant_aliases::Entity::find_by_id(merchant.alias_id)
            .one(db_tx)
            .await?
            .and_then(|alias| alias.category_id);
        self.resolve_inner(db_tx, merchant, kind, explicit, alias_override)
            .await
    }

    /// Resolves from hint and merchant memory only, skipping the alias
    /// lookup. Used by the fast ingestion path for pre-loaded merchants.
    pub(super) async fn resolve_from_memory(
        &self,
        db_tx: &DatabaseTransaction,
        merchant: &merchants::Model,
        kind: TransactionKind,
        explicit: Option<Uuid>,
    ) -> ResultEngine<ResolvedCategory> {
        self.resolve_inner(db_tx, merchant, kind, explicit, None).await
    }

    async fn resolve_inner(
        &self,
        db_tx: &DatabaseTransaction,
        merchant: &merchants::Model,
        kind: TransactionKind,
        explicit: Option<Uuid>,
        alias_override: Option<Uuid>,
    ) -> ResultEngine<ResolvedCategory> {
        let resolved = choose_category(self.policy, kind, explicit, alias_override, merchant)?;

        let category = categories::Entity::find_by_id(resolved.category_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
        check_kind_compatibility(self.policy, kind, &category)?;

        if let Some(slot) = resolved.learn {
            let mut active = merchants::ActiveModel {
                id: ActiveValue::Set(merchant.id),
                ..Default::default()
            };
            match slot {
                LearnSlot::Legacy => active.category_id = ActiveValue::Set(Some(resolved.category_id)),
                LearnSlot::Income => {
                    active.income_category_id = ActiveValue::Set(Some(resolved.category_id));
                }
                LearnSlot::Expense => {
                    active.expense_category_id = ActiveValue::Set(Some(resolved.category_id));
                }
            }
            active.update(db_tx).await?;
        }

        Ok(resolved)
    }

    /// Resolves the effective category for a merchant and transaction kind,
    /// learning an explicit hint onto the merchant.
    pub async fn resolve_category(
        &self,
        user_id: &str,
        merchant_id: Uuid,
        kind: TransactionKind,
        explicit_category: Option<Uuid>,
    ) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let merchant = require_merchant(&db_tx, user_id, merchant_id).await?;
            let resolved = self
                .resolve_for_merchant(&db_tx, &merchant, kind, explicit_category)
                .await?;
            Ok(resolved.category_id)
        })
    }
}

/// Rewrites the category of every transaction belonging to the given
/// merchants in one statement.
pub(super) async fn propagate_category_to_transactions(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    merchant_ids: &[Uuid],
    category_id: Uuid,
) -> ResultEngine<u64> {
    if merchant_ids.is_empty() {
        return Ok(0);
    }
    let result = transactions::Entity::update_many()
        .col_expr(transactions::Column::CategoryId, Expr::value(category_id))
        .filter(transactions::Column::UserId.eq(user_id))
        .filter(transactions::Column::MerchantId.is_in(merchant_ids.to_vec()))
        .exec(db_tx)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant(
        category_id: Option<Uuid>,
        income: Option<Uuid>,
        expense: Option<Uuid>,
    ) -> merchants::Model {
        merchants::Model {
            id: Uuid::new_v4(),
            user_id: "alice".to_string(),
            name: "Padaria da Ana".to_string(),
            alias_id: Uuid::new_v4(),
            category_id,
            income_category_id: income,
            expense_category_id: expense,
        }
    }

    #[test]
    fn alias_override_beats_everything() {
        let alias_category = Uuid::new_v4();
        let hint = Uuid::new_v4();
        let memory = Uuid::new_v4();
        let merchant = merchant(Some(memory), Some(memory), Some(memory));

        let resolved = choose_category(
            CategorizationPolicy::default(),
            TransactionKind::Expense,
            Some(hint),
            Some(alias_category),
            &merchant,
        )
        .unwrap();

        assert_eq!(resolved.category_id, alias_category);
        assert_eq!(resolved.learn, None);
    }

    #[test]
    fn explicit_hint_learns_into_sign_slot() {
        let hint = Uuid::new_v4();
        let merchant = merchant(None, None, None);

        let resolved = choose_category(
            CategorizationPolicy::default(),
            TransactionKind::Expense,
            Some(hint),
            None,
            &merchant,
        )
        .unwrap();

        assert_eq!(resolved.category_id, hint);
        assert_eq!(resolved.learn, Some(LearnSlot::Expense));
    }

    #[test]
    fn explicit_hint_learns_legacy_slot_when_sign_learning_is_off() {
        let hint = Uuid::new_v4();
        let merchant = merchant(None, None, None);
        let policy = CategorizationPolicy {
            sign_learning: false,
            ..CategorizationPolicy::default()
        };

        let resolved =
            choose_category(policy, TransactionKind::Income, Some(hint), None, &merchant).unwrap();

        assert_eq!(resolved.learn, Some(LearnSlot::Legacy));
    }

    #[test]
    fn hint_matching_current_slot_does_not_relearn() {
        let hint = Uuid::new_v4();
        let merchant = merchant(None, Some(hint), None);

        let resolved = choose_category(
            CategorizationPolicy::default(),
            TransactionKind::Income,
            Some(hint),
            None,
            &merchant,
        )
        .unwrap();

        assert_eq!(resolved.learn, None);
    }

    #[test]
    fn memory_prefers_sign_slot_then_legacy() {
        let legacy = Uuid::new_v4();
        let income = Uuid::new_v4();
        let expense = Uuid::new_v4();
        let full = merchant(Some(legacy), Some(income), Some(expense));

        let policy = CategorizationPolicy::default();
        let expense_pick =
            choose_category(policy, TransactionKind::Expense, None, None, &full).unwrap();
        let income_pick =
            choose_category(policy, TransactionKind::Income, None, None, &full).unwrap();

        assert_eq!(expense_pick.category_id, expense);
        assert_eq!(income_pick.category_id, income);

        let legacy_only = merchant(Some(legacy), None, None);
        let fallback =
            choose_category(policy, TransactionKind::Expense, None, None, &legacy_only).unwrap();
        assert_eq!(fallback.category_id, legacy);
    }

    #[test]
    fn nothing_resolves_to_undetermined() {
        let merchant = merchant(None, None, None);
        let got = choose_category(
            CategorizationPolicy::default(),
            TransactionKind::Expense,
            None,
            None,
            &merchant,
        );
        assert!(matches!(got, Err(EngineError::CategoryUndetermined(_))));
    }

    #[test]
    fn kind_guard_rejects_only_under_reject_policy() {
        let category = categories::Model {
            id: Uuid::new_v4(),
            name: "Salário".to_string(),
            slug: "salario".to_string(),
            color_hex: "#33FF57".to_string(),
            parent_id: None,
            external_id: None,
            kind: "income".to_string(),
            is_investment: false,
            ignored: false,
        };

        let reject = CategorizationPolicy {
            mismatch: MismatchAction::Reject,
            ..CategorizationPolicy::default()
        };
        let got = check_kind_compatibility(reject, TransactionKind::Expense, &category);
        assert!(matches!(got, Err(EngineError::CategoryTypeMismatch(_))));

        let warn = CategorizationPolicy::default();
        assert!(check_kind_compatibility(warn, TransactionKind::Expense, &category).is_ok());
        assert!(check_kind_compatibility(reject, TransactionKind::Income, &category).is_ok());
    }
}
