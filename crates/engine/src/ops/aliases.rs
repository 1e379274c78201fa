use std::collections::HashMap;

use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{EngineError, Merchant, MerchantAlias, ResultEngine, merchant_aliases, merchants};

use super::{
    Engine, categories::require_category, is_unique_violation, merchants::require_merchant,
    normalize_required_name, resolution::propagate_category_to_transactions, with_tx,
};

/// Which slice of a user's alias groups to return.
///
/// `General` hides both investment and ignored groups; a group that is both
/// investment and ignored only surfaces under `Ignored`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AliasScope {
    #[default]
    General,
    Investment,
    Ignored,
    All,
}

impl AliasScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Investment => "investment",
            Self::Ignored => "ignored",
            Self::All => "all",
        }
    }
}

impl TryFrom<&str> for AliasScope {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "general" => Ok(Self::General),
            "investment" => Ok(Self::Investment),
            "ignored" => Ok(Self::Ignored),
            "all" => Ok(Self::All),
            other => Err(EngineError::InvalidId(format!(
                "invalid alias scope: {other}"
            ))),
        }
    }
}

/// Input for [`Engine::create_alias_group`].
#[derive(Clone, Debug)]
pub struct NewAliasGroup {
    pub pattern: String,
    pub merchant_ids: Vec<Uuid>,
    pub category_id: Option<Uuid>,
    pub is_investment: bool,
    pub ignored: bool,
    pub update_past_transactions: bool,
}

impl NewAliasGroup {
    pub fn new(pattern: impl Into<String>, merchant_ids: Vec<Uuid>) -> Self {
        Self {
            pattern: pattern.into(),
            merchant_ids,
            category_id: None,
            is_investment: false,
            ignored: false,
            update_past_transactions: true,
        }
    }
}

/// Field updates for an alias group; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct AliasUpdate {
    pub pattern: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_investment: Option<bool>,
    pub ignored: Option<bool>,
    pub update_past_transactions: Option<bool>,
}

/// An alias group together with its member merchants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasGroup {
    pub alias: MerchantAlias,
    pub merchants: Vec<Merchant>,
}

/// One page of alias groups, `page` is 1-based.
#[derive(Clone, Debug)]
pub struct AliasPage {
    pub items: Vec<AliasGroup>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl Engine {
    /// Creates an alias group and reassigns the given merchants into it.
    ///
    /// Merchant ids not owned by the user are silently skipped. Groups left
    /// empty by the reassignment are deleted before returning.
    pub async fn create_alias_group(
        &self,
        user_id: &str,
        group: NewAliasGroup,
    ) -> ResultEngine<AliasGroup> {
        let pattern = normalize_required_name(&group.pattern, "alias")?;
        with_tx!(self, |db_tx| {
            if let Some(category_id) = group.category_id {
                require_category(&db_tx, category_id).await?;
            }
            let alias = merchant_aliases::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id.to_string()),
                pattern: ActiveValue::Set(pattern.clone()),
                category_id: ActiveValue::Set(group.category_id),
                is_investment: ActiveValue::Set(group.is_investment),
                ignored: ActiveValue::Set(group.ignored),
                update_past_transactions: ActiveValue::Set(group.update_past_transactions),
            };
            let alias = match alias.insert(&db_tx).await {
                Err(db_err) if is_unique_violation(&db_err) => {
                    return Err(EngineError::CreationConflict(pattern));
                }
                other => other,
            }?;

            if !group.merchant_ids.is_empty() {
                merchants::Entity::update_many()
                    .col_expr(merchants::Column::AliasId, Expr::value(alias.id))
                    .filter(merchants::Column::UserId.eq(user_id))
                    .filter(merchants::Column::Id.is_in(group.merchant_ids.clone()))
                    .exec(&db_tx)
                    .await?;
            }

            if let Some(category_id) = group.category_id
                && group.update_past_transactions
            {
                let member_ids = member_ids(&db_tx, alias.id).await?;
                propagate_category_to_transactions(&db_tx, user_id, &member_ids, category_id)
                    .await?;
            }

            self.cleanup_empty_aliases_tx(&db_tx, user_id).await?;
            load_group(&db_tx, alias).await
        })
    }

    /// Moves a merchant into an existing alias group.
    pub async fn append_merchant_to_alias(
        &self,
        user_id: &str,
        alias_id: Uuid,
        merchant_id: Uuid,
    ) -> ResultEngine<AliasGroup> {
        with_tx!(self, |db_tx| {
            let alias = require_alias(&db_tx, user_id, alias_id).await?;
            let merchant = require_merchant(&db_tx, user_id, merchant_id).await?;

            let mut active: merchants::ActiveModel = merchant.into();
            active.alias_id = ActiveValue::Set(alias_id);
            active.update(&db_tx).await?;

            self.cleanup_empty_aliases_tx(&db_tx, user_id).await?;
            load_group(&db_tx, alias).await
        })
    }

    /// Takes a merchant out of its alias group.
    ///
    /// The merchant is moved onto a singleton alias named after it (reusing
    /// one if the pattern already exists), and the source group is deleted if
    /// the removal emptied it. Returns the merchant's new group.
    pub async fn remove_merchant_from_alias(
        &self,
        user_id: &str,
        alias_id: Uuid,
        merchant_id: Uuid,
    ) -> ResultEngine<AliasGroup> {
        with_tx!(self, |db_tx| {
            require_alias(&db_tx, user_id, alias_id).await?;
            let merchant = require_merchant(&db_tx, user_id, merchant_id).await?;
            if merchant.alias_id != alias_id {
                return Err(EngineError::MerchantNotInAlias(
                    merchant_id.to_string(),
                    alias_id.to_string(),
                ));
            }

            let existing = merchant_aliases::Entity::find()
                .filter(merchant_aliases::Column::UserId.eq(user_id))
                .filter(merchant_aliases::Column::Pattern.eq(merchant.name.clone()))
                .filter(merchant_aliases::Column::Id.ne(alias_id))
                .one(&db_tx)
                .await?;
            let target = match existing {
                Some(alias) => alias,
                None => {
                    let alias = merchant_aliases::ActiveModel {
                        id: ActiveValue::Set(Uuid::new_v4()),
                        user_id: ActiveValue::Set(user_id.to_string()),
                        pattern: ActiveValue::Set(merchant.name.clone()),
                        category_id: ActiveValue::Set(None),
                        is_investment: ActiveValue::Set(false),
                        ignored: ActiveValue::Set(false),
                        update_past_transactions: ActiveValue::Set(true),
                    };
                    alias.insert(&db_tx).await?
                }
            };

            let mut active: merchants::ActiveModel = merchant.into();
            active.alias_id = ActiveValue::Set(target.id);
            active.update(&db_tx).await?;

            self.cleanup_empty_aliases_tx(&db_tx, user_id).await?;
            load_group(&db_tx, target).await
        })
    }

    /// Applies field updates to an alias group.
    ///
    /// Setting the category override writes it through to the member
    /// merchants, and also onto their past transactions when the group's
    /// `update_past_transactions` flag ends up true.
    pub async fn update_alias(
        &self,
        user_id: &str,
        alias_id: Uuid,
        update: AliasUpdate,
    ) -> ResultEngine<AliasGroup> {
        with_tx!(self, |db_tx| {
            let alias = require_alias(&db_tx, user_id, alias_id).await?;
            let propagate = update
                .update_past_transactions
                .unwrap_or(alias.update_past_transactions);

            let mut active: merchant_aliases::ActiveModel = alias.clone().into();
            let mut dirty = false;
            if let Some(pattern) = &update.pattern {
                let pattern = normalize_required_name(pattern, "alias")?;
                if pattern != alias.pattern {
                    let taken = merchant_aliases::Entity::find()
                        .filter(merchant_aliases::Column::UserId.eq(user_id))
                        .filter(merchant_aliases::Column::Pattern.eq(pattern.clone()))
                        .one(&db_tx)
                        .await?
                        .is_some();
                    if taken {
                        return Err(EngineError::CreationConflict(pattern));
                    }
                    active.pattern = ActiveValue::Set(pattern);
                    dirty = true;
                }
            }
            if let Some(is_investment) = update.is_investment {
                active.is_investment = ActiveValue::Set(is_investment);
                dirty = true;
            }
            if let Some(ignored) = update.ignored {
                active.ignored = ActiveValue::Set(ignored);
                dirty = true;
            }
            if let Some(flag) = update.update_past_transactions {
                active.update_past_transactions = ActiveValue::Set(flag);
                dirty = true;
            }
            if let Some(category_id) = update.category_id {
                require_category(&db_tx, category_id).await?;
                active.category_id = ActiveValue::Set(Some(category_id));
                dirty = true;
            }
            let alias = if dirty {
                active.update(&db_tx).await?
            } else {
                alias
            };

            if let Some(category_id) = update.category_id {
                merchants::Entity::update_many()
                    .col_expr(merchants::Column::CategoryId, Expr::value(Some(category_id)))
                    .filter(merchants::Column::AliasId.eq(alias_id))
                    .filter(merchants::Column::UserId.eq(user_id))
                    .exec(&db_tx)
                    .await?;

                if propagate {
                    let member_ids = member_ids(&db_tx, alias_id).await?;
                    propagate_category_to_transactions(&db_tx, user_id, &member_ids, category_id)
                        .await?;
                }
            }

            load_group(&db_tx, alias).await
        })
    }

    pub async fn alias(&self, user_id: &str, alias_id: Uuid) -> ResultEngine<AliasGroup> {
        with_tx!(self, |db_tx| {
            let alias = require_alias(&db_tx, user_id, alias_id).await?;
            load_group(&db_tx, alias).await
        })
    }

    /// Pattern search over a user's alias groups, ordered by pattern.
    ///
    /// `query = None` lists everything in scope.
    pub async fn search_aliases(
        &self,
        user_id: &str,
        query: Option<&str>,
        scope: AliasScope,
        page: u64,
        per_page: u64,
    ) -> ResultEngine<AliasPage> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        with_tx!(self, |db_tx| {
            let mut select = merchant_aliases::Entity::find()
                .filter(merchant_aliases::Column::UserId.eq(user_id));
            if let Some(query) = query {
                select = select.filter(merchant_aliases::Column::Pattern.contains(query));
            }
            select = match scope {
                AliasScope::General => select
                    .filter(merchant_aliases::Column::IsInvestment.eq(false))
                    .filter(merchant_aliases::Column::Ignored.eq(false)),
                AliasScope::Investment => select
                    .filter(merchant_aliases::Column::IsInvestment.eq(true))
                    .filter(merchant_aliases::Column::Ignored.eq(false)),
                AliasScope::Ignored => {
                    select.filter(merchant_aliases::Column::Ignored.eq(true))
                }
                AliasScope::All => select,
            };

            let paginator = select
                .order_by_asc(merchant_aliases::Column::Pattern)
                .paginate(&db_tx, per_page);
            let total = paginator.num_items().await?;
            let aliases = paginator.fetch_page(page - 1).await?;
            let items = load_groups(&db_tx, aliases).await?;

            Ok(AliasPage {
                items,
                total,
                page,
                per_page,
            })
        })
    }

    /// Deletes the user's alias groups that no merchant points at anymore.
    pub(super) async fn cleanup_empty_aliases_tx(
        &self,
        db_tx: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<u64> {
        let empty: Vec<Uuid> = merchant_aliases::Entity::find()
            .select_only()
            .column(merchant_aliases::Column::Id)
            .left_join(merchants::Entity)
            .filter(merchant_aliases::Column::UserId.eq(user_id))
            .filter(merchants::Column::Id.is_null())
            .into_tuple()
            .all(db_tx)
            .await?;

        if empty.is_empty() {
            return Ok(0);
        }
        let result = merchant_aliases::Entity::delete_many()
            .filter(merchant_aliases::Column::Id.is_in(empty))
            .exec(db_tx)
            .await?;
        Ok(result.rows_affected)
    }
}

pub(super) async fn require_alias(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    alias_id: Uuid,
) -> ResultEngine<merchant_aliases::Model> {
    merchant_aliases::Entity::find_by_id(alias_id)
        .filter(merchant_aliases::Column::UserId.eq(user_id))
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("alias".to_string()))
}

async fn member_ids(db_tx: &DatabaseTransaction, alias_id: Uuid) -> ResultEngine<Vec<Uuid>> {
    let ids: Vec<Uuid> = merchants::Entity::find()
        .select_only()
        .column(merchants::Column::Id)
        .filter(merchants::Column::AliasId.eq(alias_id))
        .into_tuple()
        .all(db_tx)
        .await?;
    Ok(ids)
}

async fn load_group(
    db_tx: &DatabaseTransaction,
    alias: merchant_aliases::Model,
) -> ResultEngine<AliasGroup> {
    let mut groups = load_groups(db_tx, vec![alias]).await?;
    groups
        .pop()
        .ok_or_else(|| EngineError::NotFound("alias".to_string()))
}

async fn load_groups(
    db_tx: &DatabaseTransaction,
    aliases: Vec<merchant_aliases::Model>,
) -> ResultEngine<Vec<AliasGroup>> {
    let ids: Vec<Uuid> = aliases.iter().map(|alias| alias.id).collect();
    let members = merchants::Entity::find()
        .filter(merchants::Column::AliasId.is_in(ids))
        .all(db_tx)
        .await?;

    let mut by_alias: HashMap<Uuid, Vec<Merchant>> = HashMap::new();
    for member in members {
        by_alias
            .entry(member.alias_id)
            .or_default()
            .push(Merchant::from(member));
    }

    Ok(aliases
        .into_iter()
        .map(|alias| {
            let merchants = by_alias.remove(&alias.id).unwrap_or_default();
            AliasGroup {
                alias: MerchantAlias::from(alias),
                merchants,
            }
        })
        .collect())
}
