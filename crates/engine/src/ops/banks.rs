//! Bank registry operations.

use std::collections::HashSet;

use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde::Deserialize;

use crate::{Bank, EngineError, ResultEngine, banks};

use super::{Engine, SyncCounts, dedupe_slug, normalize_optional_text, slugify, with_tx};

/// One institution row from the aggregator's connector list.
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectorEntry {
    pub connector_id: i64,
    pub name: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
}

impl Engine {
    /// Lists the active banks ordered by name.
    pub async fn banks(&self) -> ResultEngine<Vec<Bank>> {
        with_tx!(self, |db_tx| {
            let models = banks::Entity::find()
                .filter(banks::Column::IsActive.eq(true))
                .order_by_asc(banks::Column::Name)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(Bank::from).collect())
        })
    }

    /// Resolves the bank a statement belongs to from a free-form source name.
    ///
    /// The source is slugified and matched against bank slugs, exactly first
    /// and by containment second, so "Nubank" and "nubank-2024.csv" land on
    /// the same row. Deactivated banks still resolve; old statements stay
    /// importable.
    pub async fn resolve_import_bank(&self, source: &str) -> ResultEngine<Bank> {
        let needle = slugify(source);
        if needle.is_empty() {
            return Err(EngineError::UnsupportedBank(source.to_string()));
        }
        with_tx!(self, |db_tx| {
            let models = banks::Entity::find()
                .order_by_asc(banks::Column::Name)
                .all(&db_tx)
                .await?;
            let matched = models
                .iter()
                .find(|bank| bank.slug == needle)
                .or_else(|| {
                    models
                        .iter()
                        .find(|bank| needle.contains(&bank.slug) || bank.slug.contains(&needle))
                });
            match matched {
                Some(model) => Ok(Bank::from(model.clone())),
                None => Err(EngineError::UnsupportedBank(source.to_string())),
            }
        })
    }

    /// Mirrors the aggregator's institution list into the bank registry.
    ///
    /// Existing rows are matched by connector id, then by exact name, then by
    /// case-insensitive name. Matched rows get the connector id backfilled and
    /// the presentation fields refreshed; everything synced ends up active.
    pub async fn sync_banks(&self, entries: &[ConnectorEntry]) -> ResultEngine<SyncCounts> {
        with_tx!(self, |db_tx| {
            let mut models = banks::Entity::find().all(&db_tx).await?;
            let mut slugs: HashSet<String> =
                models.iter().map(|bank| bank.slug.clone()).collect();
            let mut counts = SyncCounts::default();
            for entry in entries {
                let Some(name) = normalize_optional_text(Some(entry.name.as_str())) else {
                    continue;
                };
                let logo_url = normalize_optional_text(entry.logo_url.as_deref());
                let color_hex = normalize_optional_text(entry.primary_color.as_deref());
                let position = models
                    .iter()
                    .position(|bank| bank.connector_id == Some(entry.connector_id))
                    .or_else(|| models.iter().position(|bank| bank.name == name))
                    .or_else(|| {
                        models
                            .iter()
                            .position(|bank| bank.name.eq_ignore_ascii_case(&name))
                    });
                match position {
                    Some(position) => {
                        let current = models[position].clone();
                        let unchanged = current.connector_id == Some(entry.connector_id)
                            && current.name == name
                            && current.logo_url == logo_url
                            && current.color_hex == color_hex
                            && current.is_active;
                        if unchanged {
                            continue;
                        }
                        let mut active: banks::ActiveModel = current.into();
                        active.connector_id = ActiveValue::Set(Some(entry.connector_id));
                        active.name = ActiveValue::Set(name);
                        active.logo_url = ActiveValue::Set(logo_url);
                        active.color_hex = ActiveValue::Set(color_hex);
                        active.is_active = ActiveValue::Set(true);
                        models[position] = active.update(&db_tx).await?;
                        counts.updated += 1;
                    }
                    None => {
                        let mut slug = slugify(&name);
                        if slug.is_empty() {
                            slug = format!("bank-{}", entry.connector_id);
                        }
                        let slug = dedupe_slug(slug, &slugs);
                        slugs.insert(slug.clone());
                        let inserted = banks::ActiveModel {
                            id: ActiveValue::Set(Uuid::new_v4()),
                            name: ActiveValue::Set(name),
                            slug: ActiveValue::Set(slug),
                            connector_id: ActiveValue::Set(Some(entry.connector_id)),
                            logo_url: ActiveValue::Set(logo_url),
                            color_hex: ActiveValue::Set(color_hex),
                            is_active: ActiveValue::Set(true),
                        }
                        .insert(&db_tx)
                        .await?;
                        models.push(inserted);
                        counts.created += 1;
                    }
                }
            }
            Ok(counts)
        })
    }
}

pub(super) async fn require_bank(
    db_tx: &DatabaseTransaction,
    bank_id: Uuid,
) -> ResultEngine<banks::Model> {
    banks::Entity::find_by_id(bank_id)
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("bank".to_string()))
}
