//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`NotFound`] thrown when a record does not exist.
//! - [`CreationConflict`] thrown when a unique value is already taken.
//! - [`CategoryUndetermined`] thrown when no category source resolves.
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`CreationConflict`]: EngineError::CreationConflict
//!  [`CategoryUndetermined`]: EngineError::CategoryUndetermined
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    CreationConflict(String),
    #[error("no category for \"{0}\": pass one or configure the merchant")]
    CategoryUndetermined(String),
    #[error("category kind mismatch: {0}")]
    CategoryTypeMismatch(String),
    #[error("merchant \"{0}\" does not belong to alias \"{1}\"")]
    MerchantNotInAlias(String, String),
    #[error("category \"{0}\" is still referenced by transactions")]
    CategoryInUse(String),
    #[error("unsupported bank: \"{0}\"")]
    UnsupportedBank(String),
    #[error("malformed statement: {0}")]
    MalformedStatement(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("aggregator error: {0}")]
    Aggregator(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::CreationConflict(a), Self::CreationConflict(b)) => a == b,
            (Self::CategoryUndetermined(a), Self::CategoryUndetermined(b)) => a == b,
            (Self::CategoryTypeMismatch(a), Self::CategoryTypeMismatch(b)) => a == b,
            (Self::MerchantNotInAlias(a, b), Self::MerchantNotInAlias(c, d)) => a == c && b == d,
            (Self::CategoryInUse(a), Self::CategoryInUse(b)) => a == b,
            (Self::UnsupportedBank(a), Self::UnsupportedBank(b)) => a == b,
            (Self::MalformedStatement(a), Self::MalformedStatement(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Aggregator(a), Self::Aggregator(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
