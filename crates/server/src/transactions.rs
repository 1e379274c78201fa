//! Transaction API endpoints

use api_types::transaction::{
    Transaction, TransactionList, TransactionNew, TransactionUpdate, TransactionsResponse,
};
use api_types::{PaymentMethod as ApiMethod, TransactionKind as ApiKind};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn map_kind(kind: engine::TransactionKind) -> ApiKind {
    match kind {
        engine::TransactionKind::Income => ApiKind::Income,
        engine::TransactionKind::Expense => ApiKind::Expense,
    }
}

fn unmap_kind(kind: ApiKind) -> engine::TransactionKind {
    match kind {
        ApiKind::Income => engine::TransactionKind::Income,
        ApiKind::Expense => engine::TransactionKind::Expense,
    }
}

pub(crate) fn map_method(method: engine::PaymentMethod) -> ApiMethod {
    match method {
        engine::PaymentMethod::Pix => ApiMethod::Pix,
        engine::PaymentMethod::CreditCard => ApiMethod::CreditCard,
        engine::PaymentMethod::DebitCard => ApiMethod::DebitCard,
        engine::PaymentMethod::BankTransfer => ApiMethod::BankTransfer,
        engine::PaymentMethod::Cash => ApiMethod::Cash,
        engine::PaymentMethod::Boleto => ApiMethod::Boleto,
        engine::PaymentMethod::BillPayment => ApiMethod::BillPayment,
        engine::PaymentMethod::InvestmentRedemption => ApiMethod::InvestmentRedemption,
        engine::PaymentMethod::Other => ApiMethod::Other,
    }
}

pub(crate) fn unmap_method(method: ApiMethod) -> engine::PaymentMethod {
    match method {
        ApiMethod::Pix => engine::PaymentMethod::Pix,
        ApiMethod::CreditCard => engine::PaymentMethod::CreditCard,
        ApiMethod::DebitCard => engine::PaymentMethod::DebitCard,
        ApiMethod::BankTransfer => engine::PaymentMethod::BankTransfer,
        ApiMethod::Cash => engine::PaymentMethod::Cash,
        ApiMethod::Boleto => engine::PaymentMethod::Boleto,
        ApiMethod::BillPayment => engine::PaymentMethod::BillPayment,
        ApiMethod::InvestmentRedemption => engine::PaymentMethod::InvestmentRedemption,
        ApiMethod::Other => engine::PaymentMethod::Other,
    }
}

pub(crate) fn map_transaction(transaction: engine::Transaction) -> Transaction {
    Transaction {
        id: transaction.id,
        merchant_id: transaction.merchant_id,
        bank_id: transaction.bank_id,
        date: transaction.date,
        title: transaction.title,
        description: transaction.description,
        amount_minor: transaction.amount_minor,
        kind: map_kind(transaction.kind),
        method: map_method(transaction.method),
        category_id: transaction.category_id,
        external_id: transaction.external_id,
    }
}

pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<Json<Transaction>, ServerError> {
    let mut new_transaction = engine::NewTransaction::new(
        payload.date,
        payload.title,
        payload.amount_minor,
        unmap_kind(payload.kind),
    );
    new_transaction.description = payload.description;
    new_transaction.method = payload.method.map(unmap_method).unwrap_or_default();
    new_transaction.category_id = payload.category_id;
    new_transaction.bank_id = payload.bank_id;
    new_transaction.external_id = payload.external_id;

    let transaction = state
        .engine
        .create_transaction(&user.username, new_transaction)
        .await?;

    Ok(Json(map_transaction(transaction)))
}

pub async fn get(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ServerError> {
    let transaction = state.engine.transaction(&user.username, &id).await?;

    Ok(Json(map_transaction(transaction)))
}

pub async fn update(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<TransactionUpdate>,
) -> Result<Json<Transaction>, ServerError> {
    let update = engine::TransactionUpdate {
        date: payload.date,
        title: payload.title,
        description: payload.description,
        amount_minor: payload.amount_minor,
        kind: payload.kind.map(unmap_kind),
        method: payload.method.map(unmap_method),
        category_id: payload.category_id,
        merchant_id: payload.merchant_id,
        bank_id: payload.bank_id,
    };
    let transaction = state
        .engine
        .update_transaction(&user.username, &id, update)
        .await?;

    Ok(Json(map_transaction(transaction)))
}

pub async fn remove(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_transaction(&user.username, &id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Filtered, paginated listing, newest first.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionList>,
) -> Result<Json<TransactionsResponse>, ServerError> {
    let query = engine::TransactionQuery {
        query: payload.query,
        kind: payload.kind.map(unmap_kind),
        method: payload.method.map(unmap_method),
        category_id: payload.category_id,
        bank_id: payload.bank_id,
        merchant_id: payload.merchant_id,
        alias_ids: payload.alias_ids.unwrap_or_default(),
        from: payload.from,
        to: payload.to,
        min_amount_minor: payload.min_amount_minor,
        max_amount_minor: payload.max_amount_minor,
        page: payload.page.unwrap_or(1),
        per_page: payload.per_page.unwrap_or(50),
    };
    let result = state.engine.transactions(&user.username, query).await?;

    Ok(Json(TransactionsResponse {
        transactions: result.items.into_iter().map(map_transaction).collect(),
        total: result.total,
        page: result.page,
        per_page: result.per_page,
    }))
}
