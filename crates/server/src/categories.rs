//! Category API endpoints

use api_types::CategoryKind as ApiCategoryKind;
use api_types::category::{
    CategoriesResponse, Category, CategoryNew, CategorySettingUpdate, CategoryUpdate,
    DescendantsResponse,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState, user};

fn map_kind(kind: engine::CategoryKind) -> ApiCategoryKind {
    match kind {
        engine::CategoryKind::Income => ApiCategoryKind::Income,
        engine::CategoryKind::Expense => ApiCategoryKind::Expense,
        engine::CategoryKind::Neutral => ApiCategoryKind::Neutral,
    }
}

fn unmap_kind(kind: ApiCategoryKind) -> engine::CategoryKind {
    match kind {
        ApiCategoryKind::Income => engine::CategoryKind::Income,
        ApiCategoryKind::Expense => engine::CategoryKind::Expense,
        ApiCategoryKind::Neutral => engine::CategoryKind::Neutral,
    }
}

pub(crate) fn map_category(category: engine::Category) -> Category {
    Category {
        id: category.id,
        name: category.name,
        slug: category.slug,
        color_hex: category.color_hex,
        alias_label: category.alias_label,
        parent_id: category.parent_id,
        external_id: category.external_id,
        kind: map_kind(category.kind),
        is_investment: category.is_investment,
        ignored: category.ignored,
    }
}

/// Lists every category with the caller's overrides applied.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<CategoriesResponse>, ServerError> {
    let categories = state.engine.categories(&user.username).await?;

    Ok(Json(CategoriesResponse {
        categories: categories.into_iter().map(map_category).collect(),
    }))
}

pub async fn create(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<CategoryNew>,
) -> Result<Json<Category>, ServerError> {
    let mut new_category = engine::NewCategory::new(payload.name);
    new_category.color_hex = payload.color_hex;
    new_category.parent_id = payload.parent_id;
    if let Some(kind) = payload.kind {
        new_category.kind = unmap_kind(kind);
    }
    new_category.is_investment = payload.is_investment.unwrap_or(false);
    new_category.ignored = payload.ignored.unwrap_or(false);

    let category = state.engine.create_category(new_category).await?;

    Ok(Json(map_category(category)))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ServerError> {
    let category = state.engine.category(&user.username, id).await?;

    Ok(Json(map_category(category)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdate>,
) -> Result<Json<Category>, ServerError> {
    let update = engine::CategoryUpdate {
        name: payload.name,
        color_hex: payload.color_hex,
        parent_id: payload.parent_id,
        kind: payload.kind.map(unmap_kind),
        is_investment: payload.is_investment,
        ignored: payload.ignored,
    };
    let category = state
        .engine
        .update_category(&user.username, id, update)
        .await?;

    Ok(Json(map_category(category)))
}

pub async fn remove(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_category(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn descendants(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DescendantsResponse>, ServerError> {
    let ids = state.engine.descendant_ids(id).await?;

    Ok(Json(DescendantsResponse { ids }))
}

pub async fn update_settings(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategorySettingUpdate>,
) -> Result<Json<Category>, ServerError> {
    let update = engine::CategorySettingUpdate {
        color_hex: payload.color_hex,
        alias_label: payload.alias_label,
        is_investment: payload.is_investment,
        ignored: payload.ignored,
    };
    let category = state
        .engine
        .update_category_settings(&user.username, id, update)
        .await?;

    Ok(Json(map_category(category)))
}
