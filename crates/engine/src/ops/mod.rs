use std::time::Duration;

use sea_orm::{DatabaseConnection, DbErr, SqlErr};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{CategorizationPolicy, EngineError, ResultEngine, TtlCache};

mod aliases;
mod banks;
mod categories;
mod ingest;
mod merchants;
mod resolution;
mod sync;
mod transactions;

pub use aliases::{AliasGroup, AliasPage, AliasScope, AliasUpdate, NewAliasGroup};
pub use banks::ConnectorEntry;
pub use categories::{CategorySettingUpdate, CategoryUpdate, NewCategory, SyncCounts, TaxonomyEntry};
pub use ingest::{
    BulkOutcome, ImportKind, IncomingTransaction, PreviewRecord, StatementRow, parse_statement_csv,
};
pub use merchants::MerchantUpdate;
pub use sync::{AggregatorAccount, AggregatorClient, AggregatorTransaction, SyncOutcome};
pub use transactions::{NewTransaction, TransactionPage, TransactionQuery, TransactionUpdate};

const DESCENDANTS_CACHE_CAPACITY: usize = 1000;
const DESCENDANTS_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    policy: CategorizationPolicy,
    descendants: TtlCache<Uuid, Vec<Uuid>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidId(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Lowercased, accent-stripped, hyphen-separated form of a display name.
///
/// Periods vanish ("S.A." becomes "sa") so that bank names slugify the same
/// way regardless of punctuation in the source data.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for ch in value.nfkd() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || matches!(ch, '-' | '_' | '/') {
            pending_hyphen = true;
        }
    }
    slug
}

/// First free variant of `base` given the slugs already `taken`, counting
/// "base-2", "base-3" and so on.
fn dedupe_slug(base: String, taken: &std::collections::HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{base}-{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    policy: CategorizationPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Override the default categorization policy.
    pub fn policy(mut self, policy: CategorizationPolicy) -> EngineBuilder {
        self.policy = policy;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            policy: self.policy,
            descendants: TtlCache::new(DESCENDANTS_CACHE_CAPACITY, DESCENDANTS_CACHE_TTL),
        })
    }
}
