use std::collections::HashMap;
use std::{error::Error, io::Write};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{CategoryKind, Engine, EngineError};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait, Set};

mod users {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub username: String,
        pub password: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

mod payload {
    //! On-disk shape of a replayed aggregator payload: the item's accounts,
    //! each carrying its raw movements.

    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize)]
    pub struct Payload {
        pub accounts: Vec<Account>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Account {
        #[serde(flatten)]
        pub account: engine::AggregatorAccount,
        #[serde(default)]
        pub transactions: Vec<Movement>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Movement {
        #[serde(flatten)]
        pub transaction: engine::AggregatorTransaction,
        #[serde(default, rename = "creditCardMetadata")]
        pub credit_card_metadata: Option<Value>,
    }
}

// (name, kind, is_investment, ignored); "Others" is the sync fallback.
const DEFAULT_TAXONOMY: &[(&str, CategoryKind, bool, bool)] = &[
    ("Salary", CategoryKind::Income, false, false),
    ("Housing", CategoryKind::Expense, false, false),
    ("Groceries", CategoryKind::Expense, false, false),
    ("Restaurants", CategoryKind::Expense, false, false),
    ("Transport", CategoryKind::Expense, false, false),
    ("Health", CategoryKind::Expense, false, false),
    ("Education", CategoryKind::Expense, false, false),
    ("Entertainment", CategoryKind::Expense, false, false),
    ("Shopping", CategoryKind::Expense, false, false),
    ("Travel", CategoryKind::Expense, false, false),
    ("Utilities", CategoryKind::Expense, false, false),
    ("Investments", CategoryKind::Neutral, true, false),
    ("Transfers", CategoryKind::Neutral, false, true),
    ("Others", CategoryKind::Neutral, false, false),
];

#[derive(Parser, Debug)]
#[command(name = "centavo_admin")]
#[command(about = "Admin utilities for Centavo (bootstrap users, seed categories, run syncs)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./centavo.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Category(Category),
    Bank(Bank),
    Sync(SyncOps),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct Category {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// Creates the default taxonomy, skipping categories that already exist.
    Seed,
    /// Upserts the aggregator taxonomy from a JSON file of
    /// `{external_id, name, parent_external_id?}` entries.
    Sync(FileArgs),
}

#[derive(Args, Debug)]
struct Bank {
    #[command(subcommand)]
    command: BankCommand,
}

#[derive(Subcommand, Debug)]
enum BankCommand {
    /// Upserts the bank registry from a JSON file of
    /// `{connector_id, name, logo_url?, primary_color?}` entries.
    Sync(FileArgs),
}

#[derive(Args, Debug)]
struct SyncOps {
    #[command(subcommand)]
    command: SyncCommand,
}

#[derive(Subcommand, Debug)]
enum SyncCommand {
    /// Replays an aggregator payload file through the transaction sync.
    Run(SyncRunArgs),
}

#[derive(Args, Debug)]
struct FileArgs {
    /// JSON payload file.
    #[arg(long)]
    file: std::path::PathBuf,
}

#[derive(Args, Debug)]
struct SyncRunArgs {
    #[arg(long)]
    username: String,
    /// Aggregator item id the payload belongs to.
    #[arg(long)]
    item: String,
    /// JSON payload file with the item's accounts and movements.
    #[arg(long)]
    file: std::path::PathBuf,
    /// Bank to tag the landed transactions with (slug or name).
    #[arg(long)]
    bank: Option<String>,
    /// Only land movements from this date onwards (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
}

/// Aggregator client backed by a payload file instead of a live connection.
struct FileClient {
    accounts: Vec<engine::AggregatorAccount>,
    movements: HashMap<String, Vec<engine::AggregatorTransaction>>,
}

impl FileClient {
    fn from_payload(payload: payload::Payload) -> Self {
        let mut accounts = Vec::new();
        let mut movements = HashMap::new();
        for entry in payload.accounts {
            let rows: Vec<_> = entry
                .transactions
                .into_iter()
                .map(|movement| {
                    let mut row = movement.transaction;
                    row.is_credit_card =
                        row.is_credit_card || movement.credit_card_metadata.is_some();
                    row
                })
                .collect();
            movements.insert(entry.account.id.clone(), rows);
            accounts.push(entry.account);
        }
        Self { accounts, movements }
    }
}

impl engine::AggregatorClient for FileClient {
    async fn accounts(
        &self,
        _item_id: &str,
    ) -> Result<Vec<engine::AggregatorAccount>, EngineError> {
        Ok(self.accounts.clone())
    }

    async fn transactions(
        &self,
        account_id: &str,
        from: Option<NaiveDate>,
    ) -> Result<Vec<engine::AggregatorTransaction>, EngineError> {
        let rows = self.movements.get(account_id).cloned().unwrap_or_default();
        Ok(match from {
            Some(from) => rows.into_iter().filter(|row| row.date >= from).collect(),
            None => rows,
        })
    }
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, Box<dyn Error + Send + Sync>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let password = prompt_password_twice()?;

            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password: Set(password),
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {}", args.username);
        }
        Command::Category(Category { command }) => {
            let engine = Engine::builder().database(db.clone()).build().await?;
            match command {
                CategoryCommand::Seed => {
                    for (name, kind, is_investment, ignored) in DEFAULT_TAXONOMY {
                        let mut new_category = engine::NewCategory::new(*name);
                        new_category.kind = *kind;
                        new_category.is_investment = *is_investment;
                        new_category.ignored = *ignored;
                        match engine.create_category(new_category).await {
                            Ok(category) => {
                                println!("created category: {} ({})", category.name, category.slug);
                            }
                            Err(EngineError::CreationConflict(_)) => {
                                println!("category exists: {name}");
                            }
                            Err(err) => return Err(err.into()),
                        }
                    }
                }
                CategoryCommand::Sync(args) => {
                    let entries: Vec<engine::TaxonomyEntry> = read_json(&args.file)?;
                    let counts = engine.sync_categories(&entries).await?;
                    println!(
                        "categories synced: {} created, {} updated",
                        counts.created, counts.updated
                    );
                }
            }
        }
        Command::Bank(Bank {
            command: BankCommand::Sync(args),
        }) => {
            let entries: Vec<engine::ConnectorEntry> = read_json(&args.file)?;
            let engine = Engine::builder().database(db.clone()).build().await?;
            let counts = engine.sync_banks(&entries).await?;
            println!(
                "banks synced: {} created, {} updated",
                counts.created, counts.updated
            );
        }
        Command::Sync(SyncOps {
            command: SyncCommand::Run(args),
        }) => {
            if users::Entity::find_by_id(args.username.clone())
                .one(&db)
                .await?
                .is_none()
            {
                eprintln!("user not found: {}", args.username);
                std::process::exit(1);
            }

            let engine = Engine::builder().database(db.clone()).build().await?;
            let bank_id = match args.bank.as_deref() {
                Some(source) => Some(engine.resolve_import_bank(source).await?.id),
                None => None,
            };

            let client = FileClient::from_payload(read_json(&args.file)?);
            let outcome = engine
                .sync_account_transactions(&args.username, &client, &args.item, bank_id, args.from)
                .await?;
            println!(
                "sync done: fetched {}, created {}, updated {}",
                outcome.fetched, outcome.created, outcome.updated
            );
        }
    }

    Ok(())
}
