use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod aliases;
mod banks;
mod categories;
mod import;
mod merchants;
mod server;
mod transactions;
mod user;

pub mod types {
    pub mod category {
        pub use api_types::category::{
            CategoriesResponse, Category, CategoryNew, CategorySettingUpdate, CategoryUpdate,
            DescendantsResponse,
        };
    }

    pub mod bank {
        pub use api_types::bank::{Bank, BanksResponse};
    }

    pub mod merchant {
        pub use api_types::merchant::{Merchant, MerchantSearch, MerchantUpdate, MerchantsResponse};
    }

    pub mod alias {
        pub use api_types::alias::{
            Alias, AliasGroup, AliasNew, AliasScope, AliasSearch, AliasUpdate, AliasesResponse,
            MerchantRef,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            Transaction, TransactionList, TransactionNew, TransactionUpdate, TransactionsResponse,
        };
    }

    pub mod import {
        pub use api_types::import::{
            CommitResponse, ImportCommit, ImportPreview, ImportRow, PreviewRecord, PreviewResponse,
        };
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

//TODO: Find a better solution
#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::CreationConflict(_) | EngineError::CategoryInUse(_) => StatusCode::CONFLICT,
        EngineError::MerchantNotInAlias(_, _) | EngineError::UnsupportedBank(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Aggregator(_) => StatusCode::BAD_GATEWAY,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::CategoryUndetermined(_)
        | EngineError::CategoryTypeMismatch(_)
        | EngineError::MalformedStatement(_)
        | EngineError::InvalidAmount(_)
        | EngineError::InvalidId(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::CreationConflict("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn category_in_use_maps_to_409() {
        let res = ServerError::from(EngineError::CategoryInUse("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::InvalidAmount("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn undetermined_category_maps_to_422() {
        let res =
            ServerError::from(EngineError::CategoryUndetermined("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn merchant_not_in_alias_maps_to_400() {
        let res = ServerError::from(EngineError::MerchantNotInAlias(
            "m".to_string(),
            "a".to_string(),
        ))
        .into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
