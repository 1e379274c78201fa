//! Statement ingestion: CSV parsing, import preview and bulk insert.
//!
//! An import runs in two steps. `preview_import` reads a parsed statement
//! against the current state without writing anything; the confirmed rows
//! then go through `bulk_ingest`, which links merchants, resolves categories
//! and inserts everything in one database transaction.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use chrono::NaiveDate;
use uuid::Uuid;

use sea_orm::{DbErr, QueryFilter, TransactionTrait, prelude::*, sea_query::OnConflict};

use crate::{
    Category, EngineError, MoneyCents, PaymentMethod, ResultEngine, Transaction, TransactionKind,
    categories, merchants, transactions, user_category_settings,
};

use super::{
    Engine, banks::require_bank, categories::apply_user_overrides, normalize_optional_text,
    normalize_required_name,
    resolution::{LearnSlot, ResolvedCategory, choose_category},
    with_tx,
};

/// What kind of file an import came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportKind {
    BankStatement,
    CreditCardInvoice,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BankStatement => "bank_statement",
            Self::CreditCardInvoice => "credit_card_invoice",
        }
    }
}

impl TryFrom<&str> for ImportKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "bank_statement" => Ok(Self::BankStatement),
            "credit_card_invoice" => Ok(Self::CreditCardInvoice),
            other => Err(EngineError::InvalidId(format!(
                "invalid import kind: {other}"
            ))),
        }
    }
}

/// One row of an ingestion batch.
///
/// `amount_minor` is signed; the sign decides the transaction kind. A
/// populated `id` pins the transaction id, which is how confirmed previews
/// stay idempotent.
#[derive(Clone, Debug)]
pub struct IncomingTransaction {
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub method: Option<PaymentMethod>,
    pub category_id: Option<Uuid>,
    pub bank_id: Option<Uuid>,
    pub has_merchant: bool,
}

impl IncomingTransaction {
    pub fn new(date: NaiveDate, title: impl Into<String>, amount_minor: i64) -> Self {
        Self {
            id: None,
            external_id: None,
            date,
            title: title.into(),
            description: None,
            amount_minor,
            method: None,
            category_id: None,
            bank_id: None,
            has_merchant: true,
        }
    }
}

/// What a bulk ingest ended up writing.
#[derive(Clone, Debug, Default)]
pub struct BulkOutcome {
    pub created: Vec<Transaction>,
    pub skipped_ids: Vec<String>,
}

/// One parsed line of a statement or invoice file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatementRow {
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub title: String,
    pub amount_minor: i64,
}

/// One row of an import preview.
#[derive(Clone, Debug)]
pub struct PreviewRecord {
    pub id: String,
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub title: String,
    pub amount_minor: i64,
    pub kind: TransactionKind,
    pub method: Option<PaymentMethod>,
    pub category: Option<Category>,
    pub bank_id: Uuid,
    pub has_merchant: bool,
    pub already_exists: bool,
}

impl From<PreviewRecord> for IncomingTransaction {
    fn from(record: PreviewRecord) -> Self {
        Self {
            id: Some(record.id),
            external_id: record.external_id,
            date: record.date,
            title: record.title,
            description: None,
            amount_minor: record.amount_minor,
            method: record.method,
            category_id: record.category.as_ref().map(|category| category.id),
            bank_id: Some(record.bank_id),
            has_merchant: record.has_merchant,
        }
    }
}

impl Engine {
    /// Inserts a batch of transactions in one database transaction.
    ///
    /// Rows flagged `has_merchant` whose title matches a pre-loaded merchant
    /// take the fast path and resolve from hint or merchant memory alone; the
    /// rest run the full resolution, creating merchants as needed. A row that
    /// fails resolution aborts the whole batch.
    ///
    /// The insert ignores id conflicts, so a confirmed preview can be retried
    /// after a partial import; skipped ids are reported back.
    pub async fn bulk_ingest(
        &self,
        user_id: &str,
        rows: Vec<IncomingTransaction>,
        import_kind: Option<ImportKind>,
    ) -> ResultEngine<BulkOutcome> {
        if rows.is_empty() {
            return Ok(BulkOutcome::default());
        }
        with_tx!(self, |db_tx| {
            let bank_ids: HashSet<Uuid> = rows.iter().filter_map(|row| row.bank_id).collect();
            for bank_id in &bank_ids {
                require_bank(&db_tx, *bank_id).await?;
            }

            let titles: Vec<String> = rows
                .iter()
                .filter(|row| row.has_merchant)
                .map(|row| row.title.trim().to_string())
                .collect();
            let mut known_merchants: HashMap<String, merchants::Model> = if titles.is_empty() {
                HashMap::new()
            } else {
                merchants::Entity::find()
                    .filter(merchants::Column::UserId.eq(user_id))
                    .filter(merchants::Column::Name.is_in(titles))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|model| (model.name.clone(), model))
                    .collect()
            };

            let mut pending: Vec<transactions::ActiveModel> = Vec::with_capacity(rows.len());
            let mut requested_ids: Vec<String> = Vec::with_capacity(rows.len());
            for row in rows {
                let title = normalize_required_name(&row.title, "transaction")?;
                if row.amount_minor == 0 {
                    return Err(EngineError::InvalidAmount(format!(
                        "\"{title}\" has a zero amount"
                    )));
                }
                let (kind, magnitude) = TransactionKind::from_signed(row.amount_minor);
                let method = match import_kind {
                    Some(ImportKind::CreditCardInvoice) => PaymentMethod::CreditCard,
                    _ => row.method.unwrap_or_default(),
                };

                let cached = row
                    .has_merchant
                    .then(|| known_merchants.get(&title).cloned())
                    .flatten();
                let (mut merchant, resolved) = match cached {
                    Some(model) => {
                        let resolved = self
                            .resolve_from_memory(&db_tx, &model, kind, row.category_id)
                            .await?;
                        (model, resolved)
                    }
                    None => {
                        let model = self
                            .resolve_or_create_merchant_tx(&db_tx, user_id, &title, row.category_id)
                            .await?;
                        let resolved = self
                            .resolve_for_merchant(&db_tx, &model, kind, row.category_id)
                            .await?;
                        (model, resolved)
                    }
                };
                absorb_learning(&mut merchant, &resolved);
                let merchant_id = merchant.id;
                known_merchants.insert(title.clone(), merchant);

                let mut transaction = Transaction::new(
                    user_id.to_string(),
                    row.date,
                    title,
                    magnitude,
                    kind,
                    method,
                    resolved.category_id,
                )?;
                if let Some(id) = normalize_optional_text(row.id.as_deref()) {
                    transaction.id = id;
                }
                transaction.merchant_id = Some(merchant_id);
                transaction.bank_id = row.bank_id;
                transaction.description = normalize_optional_text(row.description.as_deref());
                transaction.external_id = normalize_optional_text(row.external_id.as_deref());
                requested_ids.push(transaction.id.clone());
                pending.push(transactions::ActiveModel::from(&transaction));
            }

            let on_conflict = OnConflict::column(transactions::Column::Id)
                .do_nothing()
                .to_owned();
            let inserted = match transactions::Entity::insert_many(pending)
                .on_conflict(on_conflict)
                .exec_with_returning_many(&db_tx)
                .await
            {
                Ok(models) => models,
                Err(DbErr::RecordNotInserted) => Vec::new(),
                Err(err) => return Err(EngineError::Database(err)),
            };
            let inserted_ids: HashSet<&str> =
                inserted.iter().map(|model| model.id.as_str()).collect();
            let skipped_ids: Vec<String> = requested_ids
                .iter()
                .filter(|id| !inserted_ids.contains(id.as_str()))
                .cloned()
                .collect();
            if !skipped_ids.is_empty() {
                tracing::warn!(
                    skipped = skipped_ids.len(),
                    "batch rows already present were skipped"
                );
            }
            let created = inserted
                .into_iter()
                .map(Transaction::try_from)
                .collect::<ResultEngine<Vec<Transaction>>>()?;
            Ok(BulkOutcome {
                created,
                skipped_ids,
            })
        })
    }

    /// Builds an import preview without writing anything.
    ///
    /// Resolves the bank from `source`, flags rows already present, links
    /// merchants by exact title and shows the category each row would get
    /// from merchant memory. Rows still lacking a category sort first so they
    /// get reviewed before confirming.
    ///
    /// Statements are deduplicated by the content-derived row id and by the
    /// bank's own row identifier; invoices, which carry no identifier, by the
    /// `(date, amount, title)` signature.
    pub async fn preview_import(
        &self,
        user_id: &str,
        source: &str,
        rows: Vec<StatementRow>,
        import_kind: ImportKind,
    ) -> ResultEngine<Vec<PreviewRecord>> {
        let bank = self.resolve_import_bank(source).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut min_date = rows[0].date;
        let mut max_date = rows[0].date;
        for row in &rows {
            min_date = min_date.min(row.date);
            max_date = max_date.max(row.date);
        }
        with_tx!(self, |db_tx| {
            let existing = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id))
                .filter(transactions::Column::BankId.eq(bank.id))
                .filter(transactions::Column::Date.gte(min_date))
                .filter(transactions::Column::Date.lte(max_date))
                .all(&db_tx)
                .await?;
            let mut seen_ids: HashSet<String> =
                existing.iter().map(|model| model.id.clone()).collect();
            let mut seen_external: HashSet<String> = existing
                .iter()
                .filter_map(|model| model.external_id.clone())
                .collect();
            let mut seen_signatures: HashSet<(NaiveDate, i64, String)> = existing
                .iter()
                .map(|model| {
                    let signed = match TransactionKind::try_from(model.kind.as_str()) {
                        Ok(TransactionKind::Expense) => -model.amount_minor,
                        _ => model.amount_minor,
                    };
                    (model.date, signed, model.title.clone())
                })
                .collect();

            let titles: Vec<String> = rows.iter().map(|row| row.title.trim().to_string()).collect();
            let merchants_by_name: HashMap<String, merchants::Model> = merchants::Entity::find()
                .filter(merchants::Column::UserId.eq(user_id))
                .filter(merchants::Column::Name.is_in(titles))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect();

            let mut category_ids: HashSet<Uuid> = HashSet::new();
            for model in merchants_by_name.values() {
                category_ids.extend(model.category_id);
                category_ids.extend(model.income_category_id);
                category_ids.extend(model.expense_category_id);
            }
            let categories_by_id: HashMap<Uuid, Category> = if category_ids.is_empty() {
                HashMap::new()
            } else {
                let settings: HashMap<Uuid, user_category_settings::Model> =
                    user_category_settings::Entity::find()
                        .filter(user_category_settings::Column::UserId.eq(user_id))
                        .filter(
                            user_category_settings::Column::CategoryId
                                .is_in(category_ids.iter().copied()),
                        )
                        .all(&db_tx)
                        .await?
                        .into_iter()
                        .map(|setting| (setting.category_id, setting))
                        .collect();
                categories::Entity::find()
                    .filter(categories::Column::Id.is_in(category_ids.iter().copied()))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|model| {
                        let setting = settings.get(&model.id);
                        apply_user_overrides(model, setting)
                            .map(|category| (category.id, category))
                    })
                    .collect::<ResultEngine<HashMap<Uuid, Category>>>()?
            };

            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                let title = row.title.trim().to_string();
                if title.is_empty() || row.amount_minor == 0 {
                    continue;
                }
                let (kind, _) = TransactionKind::from_signed(row.amount_minor);
                let external_id = normalize_optional_text(row.external_id.as_deref());
                let id = deterministic_row_id(
                    user_id,
                    bank.id,
                    import_kind,
                    row.date,
                    row.amount_minor,
                    &title,
                    external_id.as_deref(),
                );
                let merchant = merchants_by_name.get(&title);
                let category = merchant.and_then(|model| {
                    choose_category(self.policy, kind, None, None, model)
                        .ok()
                        .and_then(|resolved| categories_by_id.get(&resolved.category_id).cloned())
                });
                let already_exists = match import_kind {
                    ImportKind::BankStatement => {
                        seen_ids.contains(&id)
                            || external_id
                                .as_ref()
                                .is_some_and(|external| seen_external.contains(external))
                    }
                    ImportKind::CreditCardInvoice => {
                        seen_signatures.contains(&(row.date, row.amount_minor, title.clone()))
                    }
                };
                seen_ids.insert(id.clone());
                if let Some(external) = &external_id {
                    seen_external.insert(external.clone());
                }
                seen_signatures.insert((row.date, row.amount_minor, title.clone()));

                records.push(PreviewRecord {
                    id,
                    external_id,
                    date: row.date,
                    title,
                    amount_minor: row.amount_minor,
                    kind,
                    method: match import_kind {
                        ImportKind::CreditCardInvoice => Some(PaymentMethod::CreditCard),
                        ImportKind::BankStatement => None,
                    },
                    category,
                    bank_id: bank.id,
                    has_merchant: merchant.is_some(),
                    already_exists,
                });
            }
            records.sort_by_key(|record| record.category.is_some());
            Ok(records)
        })
    }
}

fn absorb_learning(model: &mut merchants::Model, resolved: &ResolvedCategory) {
    match resolved.learn {
        Some(LearnSlot::Legacy) => model.category_id = Some(resolved.category_id),
        Some(LearnSlot::Income) => model.income_category_id = Some(resolved.category_id),
        Some(LearnSlot::Expense) => model.expense_category_id = Some(resolved.category_id),
        None => {}
    }
}

/// Stable id for an imported row, derived from its content, so re-imports of
/// the same statement line always map to the same transaction id.
fn deterministic_row_id(
    user_id: &str,
    bank_id: Uuid,
    import_kind: ImportKind,
    date: NaiveDate,
    amount_minor: i64,
    title: &str,
    external_id: Option<&str>,
) -> String {
    let seed = format!(
        "{user_id}|{bank_id}|{}|{date}|{amount_minor}|{title}|{}",
        import_kind.as_str(),
        external_id.unwrap_or_default(),
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

/// Parses a statement CSV.
///
/// Header names are matched case-insensitively against the usual english and
/// portuguese spellings: `date`/`data`, `title`/`descrição`, `amount`/`valor`
/// and an optional `id`/`identificador` column. Dates accept ISO and
/// `DD/MM/YYYY`; amounts accept both decimal conventions and an optional
/// currency prefix. Lines with an empty title are dropped.
pub fn parse_statement_csv<R: Read>(reader: R) -> ResultEngine<Vec<StatementRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|err| EngineError::MalformedStatement(err.to_string()))?
        .clone();
    let find_column = |names: &[&str]| {
        headers.iter().position(|header| {
            let header = header.trim().to_lowercase();
            names.iter().any(|name| header == *name)
        })
    };
    let date_column = find_column(&["date", "data"])
        .ok_or_else(|| EngineError::MalformedStatement("missing date column".to_string()))?;
    let title_column = find_column(&["title", "descricao", "descrição", "description"])
        .ok_or_else(|| EngineError::MalformedStatement("missing title column".to_string()))?;
    let amount_column = find_column(&["amount", "valor"])
        .ok_or_else(|| EngineError::MalformedStatement("missing amount column".to_string()))?;
    let external_column = find_column(&["identifier", "identificador", "id", "external_id"]);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|err| EngineError::MalformedStatement(format!("row {}: {err}", index + 1)))?;
        let field = |column: usize| record.get(column).unwrap_or("").trim();
        let title = field(title_column);
        if title.is_empty() {
            continue;
        }
        let date = parse_row_date(field(date_column))
            .map_err(|err| EngineError::MalformedStatement(format!("row {}: {err}", index + 1)))?;
        let amount_minor = parse_amount_minor(field(amount_column))
            .map_err(|err| EngineError::MalformedStatement(format!("row {}: {err}", index + 1)))?;
        let external_id = external_column.and_then(|column| {
            let value = field(column);
            (!value.is_empty()).then(|| value.to_string())
        });
        rows.push(StatementRow {
            external_id,
            date,
            title: title.to_string(),
            amount_minor,
        });
    }
    Ok(rows)
}

fn parse_row_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .map_err(|_| format!("unparseable date \"{raw}\""))
}

/// Money in cents from a decimal string, accepting "1234.56", "1.234,56" and
/// an optional "R$" prefix.
///
/// Strips currency noise and thousands separators, then parses the remaining
/// decimal through [`MoneyCents`].
fn parse_amount_minor(raw: &str) -> Result<i64, String> {
    let cleaned = raw.trim().replace("R$", "").replace(' ', "");
    if cleaned.is_empty() {
        return Err("empty amount".to_string());
    }
    let normalized = match cleaned.rfind(',') {
        Some(comma) => {
            if cleaned.rfind('.').is_none_or(|dot| comma > dot) {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        None => cleaned,
    };
    normalized
        .parse::<MoneyCents>()
        .map(MoneyCents::cents)
        .map_err(|_| format!("unparseable amount \"{raw}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_both_decimal_conventions() {
        assert_eq!(parse_amount_minor("1234.56"), Ok(123_456));
        assert_eq!(parse_amount_minor("1.234,56"), Ok(123_456));
        assert_eq!(parse_amount_minor("-55.00"), Ok(-5500));
        assert_eq!(parse_amount_minor("R$ 10,50"), Ok(1050));
        assert_eq!(parse_amount_minor("7"), Ok(700));
        assert_eq!(parse_amount_minor("0.5"), Ok(50));
        assert!(parse_amount_minor("abc").is_err());
        assert!(parse_amount_minor("1.2345").is_err());
    }

    #[test]
    fn dates_accept_iso_and_brazilian_order() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_row_date("2024-03-09"), Ok(expected));
        assert_eq!(parse_row_date("09/03/2024"), Ok(expected));
        assert!(parse_row_date("03-09-2024").is_err());
    }

    #[test]
    fn statement_csv_maps_portuguese_headers() {
        let data = "\
Data,Valor,Identificador,Descrição
09/03/2024,-45.90,abc-123,Padaria Estrela
10/03/2024,1200.00,def-456,Salário ACME
,,
";
        let rows = parse_statement_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Padaria Estrela");
        assert_eq!(rows[0].amount_minor, -4590);
        assert_eq!(rows[0].external_id.as_deref(), Some("abc-123"));
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn malformed_rows_report_their_position() {
        let data = "date,title,amount\n2024-01-01,Ok,10.00\nnot-a-date,Bad,5.00\n";
        let err = parse_statement_csv(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn row_ids_are_stable_and_content_sensitive() {
        let bank_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let id = deterministic_row_id(
            "ada",
            bank_id,
            ImportKind::BankStatement,
            date,
            -4590,
            "Padaria Estrela",
            Some("abc-123"),
        );
        let same = deterministic_row_id(
            "ada",
            bank_id,
            ImportKind::BankStatement,
            date,
            -4590,
            "Padaria Estrela",
            Some("abc-123"),
        );
        let other = deterministic_row_id(
            "ada",
            bank_id,
            ImportKind::BankStatement,
            date,
            -4591,
            "Padaria Estrela",
            Some("abc-123"),
        );
        assert_eq!(id, same);
        assert_ne!(id, other);
    }
}
