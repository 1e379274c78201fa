//! Statement import API endpoints

use api_types::ImportKind as ApiImportKind;
use api_types::import::{
    CommitResponse, ImportCommit, ImportPreview, ImportRow, PreviewRecord, PreviewResponse,
};
use axum::{Extension, Json, extract::State};

use crate::{
    ServerError,
    categories::map_category,
    server::ServerState,
    transactions::{map_kind, map_method, map_transaction, unmap_method},
    user,
};

fn unmap_import_kind(kind: ApiImportKind) -> engine::ImportKind {
    match kind {
        ApiImportKind::BankStatement => engine::ImportKind::BankStatement,
        ApiImportKind::CreditCardInvoice => engine::ImportKind::CreditCardInvoice,
    }
}

fn map_record(record: engine::PreviewRecord) -> PreviewRecord {
    PreviewRecord {
        id: record.id,
        external_id: record.external_id,
        date: record.date,
        title: record.title,
        amount_minor: record.amount_minor,
        kind: map_kind(record.kind),
        method: record.method.map(map_method),
        category: record.category.map(map_category),
        bank_id: record.bank_id,
        has_merchant: record.has_merchant,
        already_exists: record.already_exists,
    }
}

fn unmap_row(row: ImportRow) -> engine::IncomingTransaction {
    let mut incoming = engine::IncomingTransaction::new(row.date, row.title, row.amount_minor);
    incoming.id = row.id;
    incoming.external_id = row.external_id;
    incoming.description = row.description;
    incoming.method = row.method.map(unmap_method);
    incoming.category_id = row.category_id;
    incoming.bank_id = row.bank_id;
    incoming.has_merchant = row.has_merchant.unwrap_or(true);
    incoming
}

/// Parses a raw statement and returns the enriched, deduplicated rows.
pub async fn preview(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ImportPreview>,
) -> Result<Json<PreviewResponse>, ServerError> {
    let rows = engine::parse_statement_csv(payload.csv.as_bytes())?;
    let records = state
        .engine
        .preview_import(
            &user.username,
            &payload.source,
            rows,
            unmap_import_kind(payload.kind),
        )
        .await?;

    Ok(Json(PreviewResponse {
        records: records.into_iter().map(map_record).collect(),
    }))
}

/// Persists the confirmed rows from a preview.
pub async fn commit(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<ImportCommit>,
) -> Result<Json<CommitResponse>, ServerError> {
    let rows = payload.transactions.into_iter().map(unmap_row).collect();
    let outcome = state
        .engine
        .bulk_ingest(&user.username, rows, payload.kind.map(unmap_import_kind))
        .await?;

    Ok(Json(CommitResponse {
        transactions: outcome.created.into_iter().map(map_transaction).collect(),
        skipped_ids: outcome.skipped_ids,
    }))
}
