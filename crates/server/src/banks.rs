//! Bank API endpoints

use api_types::bank::{Bank, BanksResponse};
use axum::{Extension, Json, extract::State};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn map_bank(bank: engine::Bank) -> Bank {
    Bank {
        id: bank.id,
        name: bank.name,
        slug: bank.slug,
        connector_id: bank.connector_id,
        logo_url: bank.logo_url,
        color_hex: bank.color_hex,
    }
}

/// Lists the active banks.
pub async fn list(
    _: Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<BanksResponse>, ServerError> {
    let banks = state.engine.banks().await?;

    Ok(Json(BanksResponse {
        banks: banks.into_iter().map(map_bank).collect(),
    }))
}
