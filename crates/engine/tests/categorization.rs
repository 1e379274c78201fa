use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{
    AliasScope, AliasUpdate, CategorizationPolicy, CategoryKind, CategorySettingUpdate,
    CategoryUpdate, Engine, EngineError, MismatchAction, NewCategory, NewTransaction,
    TransactionKind, TransactionQuery, TransactionUpdate,
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

async fn engine_with_file_db() -> (Engine, DatabaseConnection, String, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("engine_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
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

    (engine, db, url, path)
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

async fn seed_category(engine: &Engine, name: &str, kind: CategoryKind) -> engine::Category {
    let mut new_category = NewCategory::new(name);
    new_category.kind = kind;
    engine.create_category(new_category).await.unwrap()
}

#[tokio::test]
async fn explicit_category_is_learned_for_later_transactions() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut first = NewTransaction::new(
        date(2026, 3, 9),
        "Padaria Estrela",
        4590,
        TransactionKind::Expense,
    );
    first.category_id = Some(groceries.id);
    let first = engine.create_transaction("alice", first).await.unwrap();
    assert_eq!(first.category_id, groceries.id);

    // No hint this time; the merchant remembers.
    let second = NewTransaction::new(
        date(2026, 3, 16),
        "Padaria Estrela",
        1200,
        TransactionKind::Expense,
    );
    let second = engine.create_transaction("alice", second).await.unwrap();
    assert_eq!(second.category_id, groceries.id);

    let merchants = engine.merchants("alice").await.unwrap();
    assert_eq!(merchants.len(), 1);
    assert_eq!(merchants[0].expense_category_id, Some(groceries.id));
    assert_eq!(first.merchant_id, Some(merchants[0].id));
}

#[tokio::test]
async fn unknown_merchant_without_hint_is_undetermined() {
    let (engine, _db) = engine_with_db().await;
    seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let attempt = NewTransaction::new(
        date(2026, 3, 9),
        "Loja Nova",
        1000,
        TransactionKind::Expense,
    );
    let err = engine.create_transaction("alice", attempt).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::CategoryUndetermined("Loja Nova".to_string())
    );

    // The failed creation leaves no merchant behind.
    assert!(engine.merchants("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn merchants_and_categories_resolve_without_a_transaction() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let merchant = engine
        .resolve_or_create_merchant("alice", "Mercado Livre")
        .await
        .unwrap();
    let again = engine
        .resolve_or_create_merchant("alice", "Mercado Livre")
        .await
        .unwrap();
    assert_eq!(again.id, merchant.id);

    let group = engine.alias("alice", merchant.alias_id).await.unwrap();
    assert_eq!(group.alias.pattern, "Mercado Livre");

    // An explicit pick is learned into the kind slot.
    let resolved = engine
        .resolve_category(
            "alice",
            merchant.id,
            TransactionKind::Expense,
            Some(groceries.id),
        )
        .await
        .unwrap();
    assert_eq!(resolved, groceries.id);

    let remembered = engine
        .resolve_category("alice", merchant.id, TransactionKind::Expense, None)
        .await
        .unwrap();
    assert_eq!(remembered, groceries.id);

    // Income has no memory yet.
    let err = engine
        .resolve_category("alice", merchant.id, TransactionKind::Income, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::CategoryUndetermined("Mercado Livre".to_string())
    );
}

#[tokio::test]
async fn alias_override_beats_merchant_memory() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;
    let restaurants = seed_category(&engine, "Restaurants", CategoryKind::Expense).await;

    let mut seed = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    seed.category_id = Some(groceries.id);
    let seeded = engine.create_transaction("alice", seed).await.unwrap();

    let merchant = engine.merchants("alice").await.unwrap().remove(0);
    engine
        .update_alias(
            "alice",
            merchant.alias_id,
            AliasUpdate {
                category_id: Some(restaurants.id),
                update_past_transactions: Some(false),
                ..AliasUpdate::default()
            },
        )
        .await
        .unwrap();

    let next = NewTransaction::new(
        date(2026, 3, 2),
        "Padaria Estrela",
        700,
        TransactionKind::Expense,
    );
    let next = engine.create_transaction("alice", next).await.unwrap();
    assert_eq!(next.category_id, restaurants.id);

    // Past rows were left alone because propagation was switched off.
    let kept = engine.transaction("alice", &seeded.id).await.unwrap();
    assert_eq!(kept.category_id, groceries.id);
}

#[tokio::test]
async fn correcting_one_transaction_does_not_teach_the_merchant() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;
    let restaurants = seed_category(&engine, "Restaurants", CategoryKind::Expense).await;

    let mut seed = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    seed.category_id = Some(groceries.id);
    let created = engine.create_transaction("alice", seed).await.unwrap();

    let updated = engine
        .update_transaction(
            "alice",
            &created.id,
            TransactionUpdate {
                category_id: Some(restaurants.id),
                ..TransactionUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.category_id, restaurants.id);

    let merchant = engine.merchants("alice").await.unwrap().remove(0);
    assert_eq!(merchant.expense_category_id, Some(groceries.id));

    let next = NewTransaction::new(
        date(2026, 3, 2),
        "Padaria Estrela",
        700,
        TransactionKind::Expense,
    );
    let next = engine.create_transaction("alice", next).await.unwrap();
    assert_eq!(next.category_id, groceries.id);
}

#[tokio::test]
async fn reject_policy_blocks_kind_mismatches() {
    let (engine, db) = engine_with_db().await;
    let reject_engine = Engine::builder()
        .database(db.clone())
        .policy(CategorizationPolicy {
            mismatch: MismatchAction::Reject,
            ..CategorizationPolicy::default()
        })
        .build()
        .await
        .unwrap();

    let salary = seed_category(&engine, "Salary", CategoryKind::Income).await;

    let mut attempt = NewTransaction::new(
        date(2026, 3, 5),
        "Mercado Azul",
        2000,
        TransactionKind::Expense,
    );
    attempt.category_id = Some(salary.id);
    let err = reject_engine
        .create_transaction("alice", attempt)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CategoryTypeMismatch(_)));

    // The default policy only warns.
    let mut retry = NewTransaction::new(
        date(2026, 3, 5),
        "Mercado Azul",
        2000,
        TransactionKind::Expense,
    );
    retry.category_id = Some(salary.id);
    assert!(engine.create_transaction("alice", retry).await.is_ok());
}

#[tokio::test]
async fn changing_kind_rechecks_the_category() {
    let (engine, db) = engine_with_db().await;
    let reject_engine = Engine::builder()
        .database(db.clone())
        .policy(CategorizationPolicy {
            mismatch: MismatchAction::Reject,
            ..CategorizationPolicy::default()
        })
        .build()
        .await
        .unwrap();

    let salary = seed_category(&engine, "Salary", CategoryKind::Income).await;
    let mut seed = NewTransaction::new(
        date(2026, 3, 1),
        "ACME Ltda",
        500_000,
        TransactionKind::Income,
    );
    seed.category_id = Some(salary.id);
    let created = reject_engine.create_transaction("alice", seed).await.unwrap();

    let err = reject_engine
        .update_transaction(
            "alice",
            &created.id,
            TransactionUpdate {
                kind: Some(TransactionKind::Expense),
                ..TransactionUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CategoryTypeMismatch(_)));
}

#[tokio::test]
async fn update_transaction_can_move_it_to_another_merchant() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut first = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    first.category_id = Some(groceries.id);
    let first = engine.create_transaction("alice", first).await.unwrap();

    let mut second = NewTransaction::new(
        date(2026, 3, 2),
        "Mercado Azul",
        900,
        TransactionKind::Expense,
    );
    second.category_id = Some(groceries.id);
    engine.create_transaction("alice", second).await.unwrap();

    let merchants = engine.merchants("alice").await.unwrap();
    let mercado = merchants
        .iter()
        .find(|merchant| merchant.name == "Mercado Azul")
        .unwrap();

    let moved = engine
        .update_transaction(
            "alice",
            &first.id,
            TransactionUpdate {
                merchant_id: Some(mercado.id),
                ..TransactionUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.merchant_id, Some(mercado.id));

    let err = engine
        .update_transaction(
            "alice",
            &first.id,
            TransactionUpdate {
                merchant_id: Some(Uuid::new_v4()),
                ..TransactionUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("merchant".to_string()));
}

#[tokio::test]
async fn listing_filters_by_category_subtree() {
    let (engine, _db) = engine_with_db().await;
    let food = seed_category(&engine, "Food", CategoryKind::Expense).await;
    let mut child = NewCategory::new("Groceries");
    child.kind = CategoryKind::Expense;
    child.parent_id = Some(food.id);
    let groceries = engine.create_category(child).await.unwrap();
    let transport = seed_category(&engine, "Transport", CategoryKind::Expense).await;

    for (title, category_id, day) in [
        ("Padaria Estrela", groceries.id, 1),
        ("Restaurante Bom", food.id, 2),
        ("99 Taxi", transport.id, 3),
    ] {
        let mut tx = NewTransaction::new(date(2026, 4, day), title, 1000, TransactionKind::Expense);
        tx.category_id = Some(category_id);
        engine.create_transaction("alice", tx).await.unwrap();
    }

    let page = engine
        .transactions(
            "alice",
            TransactionQuery {
                category_id: Some(food.id),
                page: 1,
                per_page: 50,
                ..TransactionQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    // Newest first.
    assert_eq!(page.items[0].title, "Restaurante Bom");

    let page = engine
        .transactions(
            "alice",
            TransactionQuery {
                query: Some("padaria".to_string()),
                page: 1,
                per_page: 50,
                ..TransactionQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    let page = engine
        .transactions(
            "alice",
            TransactionQuery {
                from: Some(date(2026, 4, 2)),
                to: Some(date(2026, 4, 3)),
                page: 1,
                per_page: 50,
                ..TransactionQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);

    let page = engine
        .transactions(
            "alice",
            TransactionQuery {
                page: 1,
                per_page: 2,
                ..TransactionQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn categories_referenced_by_transactions_cannot_be_deleted() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut tx = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    tx.category_id = Some(groceries.id);
    let created = engine.create_transaction("alice", tx).await.unwrap();

    let err = engine.delete_category(groceries.id).await.unwrap_err();
    assert_eq!(err, EngineError::CategoryInUse("Groceries".to_string()));

    engine.delete_transaction("alice", &created.id).await.unwrap();
    engine.delete_category(groceries.id).await.unwrap();
}

#[tokio::test]
async fn deleting_a_merchant_keeps_its_transactions() {
    let (engine, _db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut tx = NewTransaction::new(
        date(2026, 3, 1),
        "Padaria Estrela",
        500,
        TransactionKind::Expense,
    );
    tx.category_id = Some(groceries.id);
    let created = engine.create_transaction("alice", tx).await.unwrap();

    let merchant = engine.merchants("alice").await.unwrap().remove(0);
    engine.delete_merchant("alice", merchant.id).await.unwrap();

    let survivor = engine.transaction("alice", &created.id).await.unwrap();
    assert_eq!(survivor.merchant_id, None);
    assert_eq!(survivor.category_id, groceries.id);

    // The singleton alias went with it.
    let page = engine
        .search_aliases("alice", None, AliasScope::All, 1, 50)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn category_settings_overlay_one_user_only() {
    let (engine, db) = engine_with_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let update = CategorySettingUpdate {
        color_hex: Some("#123456".to_string()),
        alias_label: Some("Mercado".to_string()),
        ignored: Some(true),
        ..CategorySettingUpdate::default()
    };
    let seen = engine
        .update_category_settings("alice", groceries.id, update)
        .await
        .unwrap();
    assert_eq!(seen.color_hex, "#123456");
    assert_eq!(seen.alias_label.as_deref(), Some("Mercado"));
    assert!(seen.ignored);

    // Another user still sees the global row.
    let other = engine.category("bob", groceries.id).await.unwrap();
    assert_eq!(other.color_hex, groceries.color_hex);
    assert_eq!(other.alias_label, None);
    assert!(!other.ignored);

    // Writing the global values back clears the stored override row.
    let reset = CategorySettingUpdate {
        color_hex: Some(groceries.color_hex.clone()),
        alias_label: Some(String::new()),
        ignored: Some(false),
        ..CategorySettingUpdate::default()
    };
    engine
        .update_category_settings("alice", groceries.id, reset)
        .await
        .unwrap();

    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM user_category_settings".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let count: i64 = row.try_get("", "n").unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn descendant_ids_follow_category_moves() {
    let (engine, _db) = engine_with_db().await;
    let food = seed_category(&engine, "Food", CategoryKind::Expense).await;
    let mut new_groceries = NewCategory::new("Groceries");
    new_groceries.kind = CategoryKind::Expense;
    new_groceries.parent_id = Some(food.id);
    let groceries = engine.create_category(new_groceries).await.unwrap();
    let mut new_bakery = NewCategory::new("Bakery");
    new_bakery.kind = CategoryKind::Expense;
    new_bakery.parent_id = Some(groceries.id);
    let bakery = engine.create_category(new_bakery).await.unwrap();

    let ids = engine.descendant_ids(food.id).await.unwrap();
    assert_eq!(ids.len(), 3);

    // A category cannot be reparented under its own subtree.
    let err = engine
        .update_category(
            "alice",
            food.id,
            CategoryUpdate {
                parent_id: Some(bakery.id),
                ..CategoryUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidId(_)));

    // Moving the leaf out shrinks the subtree, cache included.
    let other = seed_category(&engine, "Other", CategoryKind::Neutral).await;
    engine
        .update_category(
            "alice",
            bakery.id,
            CategoryUpdate {
                parent_id: Some(other.id),
                ..CategoryUpdate::default()
            },
        )
        .await
        .unwrap();
    let ids = engine.descendant_ids(food.id).await.unwrap();
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn category_slugs_must_be_unique() {
    let (engine, _db) = engine_with_db().await;
    seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let err = engine
        .create_category(NewCategory::new("GROCERIES"))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::CreationConflict("GROCERIES".to_string()));
}

#[tokio::test]
async fn restart_engine_reads_same_state() {
    let (engine, db, url, path) = engine_with_file_db().await;
    let groceries = seed_category(&engine, "Groceries", CategoryKind::Expense).await;

    let mut tx = NewTransaction::new(
        date(2026, 3, 9),
        "Padaria Estrela",
        4590,
        TransactionKind::Expense,
    );
    tx.category_id = Some(groceries.id);
    engine.create_transaction("alice", tx).await.unwrap();

    drop(engine);
    drop(db);

    let db2 = Database::connect(&url).await.unwrap();
    let engine2 = Engine::builder().database(db2.clone()).build().await.unwrap();

    // Merchant memory survives the restart.
    let next = NewTransaction::new(
        date(2026, 3, 10),
        "Padaria Estrela",
        700,
        TransactionKind::Expense,
    );
    let next = engine2.create_transaction("alice", next).await.unwrap();
    assert_eq!(next.category_id, groceries.id);

    let page = engine2
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
    assert_eq!(page.total, 2);

    drop(db2);
    let _ = std::fs::remove_file(path);
}
