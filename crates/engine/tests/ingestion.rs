use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    CategoryKind, ConnectorEntry, Engine, EngineError, ImportKind, IncomingTransaction,
    NewCategory, NewTransaction, PaymentMethod, StatementRow, TransactionKind, TransactionQuery,
    parse_statement_csv,
};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, password) VALUES (?, ?)",
        vec!["alice".into(), "password".into()],
    ))
    .await
    .unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

async fn seed_category(engine: &Engine, name: &str, kind: CategoryKind) -> engine::Category {
    let mut new_category = NewCategory::new(name);
    new_category.kind = kind;
    engine.create_category(new_category).await.unwrap()
}

async fn seed_bank(engine: &Engine, name: &str, connector_id: i64) -> engine::Bank {
    let entry = ConnectorEntry {
        connector_id,
        name: name.to_string(),
        logo_url: None,
        primary_color: None,
    };
    engine.sync_banks(&[entry]).await.unwrap();
    engine
        .banks()
        .await
        .unwrap()
        .into_iter()
        .find(|bank| bank.name == name)
        .unwrap()
}

#[tokio::test]
async fn preview_links_merchants_and_flags_existing_rows() {
    let (engine, _db) = engine_with_db().await;
    let bank = seed_bank(&engine, "Nubank", 212).await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    // A merchant the user already categorized by hand.
    let mut known = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    known.category_id = Some(groceries.id);
    engine.create_transaction("alice", known).await.unwrap();

    // A row that is already stored for this bank and month.
    let mut stored = NewTransaction::new(
        date(2026, 3, 9),
        "Posto Shell",
        20_000,
        TransactionKind::Expense,
    );
    stored.category_id = Some(groceries.id);
    stored.bank_id = Some(bank.id);
    stored.external_id = Some("stmt-77".to_string());
    engine.create_transaction("alice", stored).await.unwrap();

    let csv = "\
Data,Valor,Identificador,Descrição
09/03/2026,-45.90,stmt-88,Padaria Estrela
09/03/2026,-200.00,stmt-77,Posto Shell
10/03/2026,-80.00,stmt-99,Loja Nova
";
    let rows = parse_statement_csv(csv.as_bytes()).unwrap();
    assert_eq!(rows.len(), 3);

    let records = engine
        .preview_import("alice", "nubank-2026-03.csv", rows, ImportKind::BankStatement)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|record| record.bank_id == bank.id));

    // Rows still needing a category are surfaced first.
    assert_eq!(records[0].title, "Loja Nova");
    assert!(!records[0].has_merchant);
    assert!(records[0].category.is_none());
    assert!(!records[0].already_exists);

    let padaria = records
        .iter()
        .find(|record| record.title == "Padaria Estrela")
        .unwrap();
    assert!(padaria.has_merchant);
    assert_eq!(
        padaria.category.as_ref().map(|category| category.id),
        Some(groceries.id)
    );
    assert!(!padaria.already_exists);
    assert_eq!(padaria.amount_minor, -4590);
    assert_eq!(padaria.kind, TransactionKind::Expense);
    assert_eq!(padaria.external_id.as_deref(), Some("stmt-88"));
    assert_eq!(padaria.method, None);

    let shell = records
        .iter()
        .find(|record| record.title == "Posto Shell")
        .unwrap();
    assert!(shell.already_exists);
}

#[tokio::test]
async fn confirmed_previews_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    seed_bank(&engine, "Nubank", 212).await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut known = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    known.category_id = Some(groceries.id);
    engine.create_transaction("alice", known).await.unwrap();

    let statement = vec![StatementRow {
        external_id: Some("stmt-1".to_string()),
        date: date(2026, 3, 9),
        title: "Padaria Estrela".to_string(),
        amount_minor: -4590,
    }];
    let records = engine
        .preview_import("alice", "Nubank", statement, ImportKind::BankStatement)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);

    let rows: Vec<IncomingTransaction> = records
        .iter()
        .cloned()
        .map(IncomingTransaction::from)
        .collect();

    let first = engine
        .bulk_ingest("alice", rows.clone(), Some(ImportKind::BankStatement))
        .await
        .unwrap();
    assert_eq!(first.created.len(), 1);
    assert!(first.skipped_ids.is_empty());
    assert_eq!(first.created[0].id, records[0].id);

    // Confirming the same preview again inserts nothing new.
    let second = engine
        .bulk_ingest("alice", rows, Some(ImportKind::BankStatement))
        .await
        .unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.skipped_ids, vec![records[0].id.clone()]);
}

#[tokio::test]
async fn one_bad_row_aborts_the_whole_batch() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut good = IncomingTransaction::new(date(2026, 3, 9), "Padaria Estrela", -4590);
    good.category_id = Some(groceries.id);
    let bad = IncomingTransaction::new(date(2026, 3, 9), "Loja Nova", -8000);

    let err = engine
        .bulk_ingest("alice", vec![good, bad], None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::CategoryUndetermined("Loja Nova".to_string())
    );

    // The good row rolled back with the batch.
    let page = engine
        .transactions(
            "alice",
            TransactionQuery {
                page: 1,
                per_page: 50,
                ..TransactionQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn zero_amounts_are_rejected_in_batches_and_dropped_in_previews() {
    let (engine, _db) = engine_with_db().await;
    seed_bank(&engine, "Nubank", 212).await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut zero = IncomingTransaction::new(date(2026, 3, 9), "Estorno", 0);
    zero.category_id = Some(groceries.id);
    let err = engine.bulk_ingest("alice", vec![zero], None).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("\"Estorno\" has a zero amount".to_string())
    );

    let statement = vec![
        StatementRow {
            external_id: None,
            date: date(2026, 3, 9),
            title: "Estorno".to_string(),
            amount_minor: 0,
        },
        StatementRow {
            external_id: None,
            date: date(2026, 3, 9),
            title: "Padaria Estrela".to_string(),
            amount_minor: -4590,
        },
    ];
    let records = engine
        .preview_import("alice", "Nubank", statement, ImportKind::BankStatement)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Padaria Estrela");
}

#[tokio::test]
async fn invoice_imports_use_signature_dedup_and_credit_card_method() {
    let (engine, _db) = engine_with_db().await;
    let bank = seed_bank(&engine, "Nubank", 212).await;
    let books = seed_category(&engine, "Books", CategoryKind::Expense).await;

    let mut row = IncomingTransaction::new(date(2026, 3, 9), "Livraria Azul", -3990);
    row.category_id = Some(books.id);
    row.bank_id = Some(bank.id);
    let outcome = engine
        .bulk_ingest("alice", vec![row], Some(ImportKind::CreditCardInvoice))
        .await
        .unwrap();
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].method, PaymentMethod::CreditCard);

    // Invoice lines carry no stable ids; the (date, amount, title) signature
    // is what marks the row as already imported.
    let statement = vec![StatementRow {
        external_id: None,
        date: date(2026, 3, 9),
        title: "Livraria Azul".to_string(),
        amount_minor: -3990,
    }];
    let records = engine
        .preview_import(
            "alice",
            "nubank-fatura.csv",
            statement,
            ImportKind::CreditCardInvoice,
        )
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].already_exists);
    assert_eq!(records[0].method, Some(PaymentMethod::CreditCard));
}

#[tokio::test]
async fn statement_csv_requires_the_standard_columns() {
    let err = parse_statement_csv("date,amount\n2026-03-09,-12.30\n".as_bytes()).unwrap_err();
    assert_eq!(
        err,
        EngineError::MalformedStatement("missing title column".to_string())
    );

    let rows =
        parse_statement_csv("Date,Description,Amount\n2026-03-09,Coffee Shop,-12.30\n".as_bytes())
            .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Coffee Shop");
    assert_eq!(rows[0].amount_minor, -1230);
    assert_eq!(rows[0].date, date(2026, 3, 9));
    assert_eq!(rows[0].external_id, None);
}

#[tokio::test]
async fn statements_from_unknown_banks_are_refused() {
    let (engine, _db) = engine_with_db().await;
    seed_bank(&engine, "Nubank", 212).await;

    let statement = vec![StatementRow {
        external_id: None,
        date: date(2026, 3, 9),
        title: "Padaria Estrela".to_string(),
        amount_minor: -4590,
    }];
    let err = engine
        .preview_import(
            "alice",
            "banco-misterio.csv",
            statement,
            ImportKind::BankStatement,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::UnsupportedBank("banco-misterio.csv".to_string())
    );
}

#[tokio::test]
async fn deactivated_banks_still_resolve_for_imports() {
    let (engine, db) = engine_with_db().await;
    let bank = seed_bank(&engine, "Banco Velho", 99).await;
    assert_eq!(bank.slug, "banco-velho");

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE banks SET is_active = ? WHERE slug = ?",
        vec![false.into(), "banco-velho".into()],
    ))
    .await
    .unwrap();

    // Gone from the picker, still matched for statement imports.
    assert!(engine.banks().await.unwrap().is_empty());
    let resolved = engine
        .resolve_import_bank("banco-velho-2026.csv")
        .await
        .unwrap();
    assert_eq!(resolved.id, bank.id);
}

#[tokio::test]
async fn batches_validate_their_bank_ids() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut row = IncomingTransaction::new(date(2026, 3, 9), "Padaria Estrela", -4590);
    row.category_id = Some(groceries.id);
    row.bank_id = Some(Uuid::new_v4());

    let err = engine.bulk_ingest("alice", vec![row], None).await.unwrap_err();
    assert_eq!(err, EngineError::NotFound("bank".to_string()));
}
