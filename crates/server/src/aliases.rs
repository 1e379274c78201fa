//! Alias group API endpoints

use api_types::alias::{
    Alias, AliasGroup, AliasNew, AliasScope as ApiAliasScope, AliasSearch, AliasUpdate,
    AliasesResponse, MerchantRef,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{ServerError, merchants::map_merchant, server::ServerState, user};

const DEFAULT_PER_PAGE: u64 = 50;

fn unmap_scope(scope: ApiAliasScope) -> engine::AliasScope {
    match scope {
        ApiAliasScope::General => engine::AliasScope::General,
        ApiAliasScope::Investment => engine::AliasScope::Investment,
        ApiAliasScope::Ignored => engine::AliasScope::Ignored,
        ApiAliasScope::All => engine::AliasScope::All,
    }
}

fn map_group(group: engine::AliasGroup) -> AliasGroup {
    AliasGroup {
        alias: Alias {
            id: group.alias.id,
            pattern: group.alias.pattern,
            category_id: group.alias.category_id,
            is_investment: group.alias.is_investment,
            ignored: group.alias.ignored,
            update_past_transactions: group.alias.update_past_transactions,
        },
        merchants: group.merchants.into_iter().map(map_merchant).collect(),
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AliasNew>,
) -> Result<Json<AliasGroup>, ServerError> {
    let mut group = engine::NewAliasGroup::new(payload.pattern, payload.merchant_ids);
    group.category_id = payload.category_id;
    group.is_investment = payload.is_investment.unwrap_or(false);
    group.ignored = payload.ignored.unwrap_or(false);
    group.update_past_transactions = payload.update_past_transactions.unwrap_or(true);

    let created = state.engine.create_alias_group(&user.username, group).await?;

    Ok(Json(map_group(created)))
}

/// Paginated alias listing filtered by pattern substring and scope.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<AliasSearch>,
) -> Result<Json<AliasesResponse>, ServerError> {
    let scope = unmap_scope(payload.scope.unwrap_or_default());
    let page = payload.page.unwrap_or(1);
    let per_page = payload.per_page.unwrap_or(DEFAULT_PER_PAGE);

    let result = state
        .engine
        .search_aliases(&user.username, payload.query.as_deref(), scope, page, per_page)
        .await?;

    Ok(Json(AliasesResponse {
        aliases: result.items.into_iter().map(map_group).collect(),
        total: result.total,
        page: result.page,
        per_page: result.per_page,
    }))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AliasGroup>, ServerError> {
    let group = state.engine.alias(&user.username, id).await?;

    Ok(Json(map_group(group)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AliasUpdate>,
) -> Result<Json<AliasGroup>, ServerError> {
    let update = engine::AliasUpdate {
        pattern: payload.pattern,
        category_id: payload.category_id,
        is_investment: payload.is_investment,
        ignored: payload.ignored,
        update_past_transactions: payload.update_past_transactions,
    };
    let group = state.engine.update_alias(&user.username, id, update).await?;

    Ok(Json(map_group(group)))
}

pub async fn append_merchant(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MerchantRef>,
) -> Result<Json<AliasGroup>, ServerError> {
    let group = state
        .engine
        .append_merchant_to_alias(&user.username, id, payload.merchant_id)
        .await?;

    Ok(Json(map_group(group)))
}

/// Detaches a merchant; responds with the merchant's new singleton group.
pub async fn remove_merchant(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((id, merchant_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AliasGroup>, ServerError> {
    let group = state
        .engine
        .remove_merchant_from_alias(&user.username, id, merchant_id)
        .await?;

    Ok(Json(map_group(group)))
}
