pub use banks::Bank;
pub use cache::TtlCache;
pub use categories::{Category, CategoryKind};
pub use error::EngineError;
pub use merchant_aliases::MerchantAlias;
pub use merchants::Merchant;
pub use money::MoneyCents;
pub use ops::{
    AggregatorAccount, AggregatorClient, AggregatorTransaction, AliasGroup, AliasPage, AliasScope,
    AliasUpdate, BulkOutcome, CategorySettingUpdate, CategoryUpdate, ConnectorEntry, Engine,
    EngineBuilder, ImportKind, IncomingTransaction, MerchantUpdate, NewAliasGroup, NewCategory,
    NewTransaction, PreviewRecord, StatementRow, SyncCounts, SyncOutcome, TaxonomyEntry,
    TransactionPage, TransactionQuery, TransactionUpdate, parse_statement_csv,
};
pub use policy::{CategorizationPolicy, MismatchAction};
pub use transactions::{PaymentMethod, Transaction, TransactionKind};

mod banks;
mod cache;
mod categories;
mod error;
mod merchant_aliases;
mod merchants;
mod money;
mod ops;
mod policy;
mod transactions;
mod user_category_settings;

type ResultEngine<T> = Result<T, EngineError>;
