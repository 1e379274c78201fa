//! Merchant API endpoints

use api_types::merchant::{
    Merchant, MerchantNew, MerchantSearch, MerchantUpdate, MerchantsResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

const SEARCH_LIMIT: u64 = 12;

pub(crate) fn map_merchant(merchant: engine::Merchant) -> Merchant {
    Merchant {
        id: merchant.id,
        name: merchant.name,
        alias_id: merchant.alias_id,
        category_id: merchant.category_id,
        income_category_id: merchant.income_category_id,
        expense_category_id: merchant.expense_category_id,
    }
}

pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<MerchantsResponse>, ServerError> {
    let merchants = state.engine.merchants(&user.username).await?;

    Ok(Json(MerchantsResponse {
        merchants: merchants.into_iter().map(map_merchant).collect(),
    }))
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<MerchantNew>,
) -> Result<Json<Merchant>, ServerError> {
    let merchant = state
        .engine
        .create_merchant(&user.username, &payload.name, payload.category_id)
        .await?;

    Ok(Json(map_merchant(merchant)))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Merchant>, ServerError> {
    let merchant = state.engine.merchant(&user.username, id).await?;

    Ok(Json(map_merchant(merchant)))
}

pub async fn search(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<MerchantSearch>,
) -> Result<Json<MerchantsResponse>, ServerError> {
    let merchants = state
        .engine
        .search_merchants(&user.username, &payload.query, SEARCH_LIMIT)
        .await?;

    Ok(Json(MerchantsResponse {
        merchants: merchants.into_iter().map(map_merchant).collect(),
    }))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MerchantUpdate>,
) -> Result<Json<Merchant>, ServerError> {
    let update = engine::MerchantUpdate {
        name: payload.name,
        category_id: payload.category_id,
        income_category_id: payload.income_category_id,
        expense_category_id: payload.expense_category_id,
    };
    let merchant = state
        .engine
        .update_merchant(&user.username, id, update)
        .await?;

    Ok(Json(map_merchant(merchant)))
}

pub async fn remove(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_merchant(&user.username, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
