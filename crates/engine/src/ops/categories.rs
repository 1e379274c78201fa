//! Category tree operations.
//!
//! Categories are global rows shared by every user; what varies per user is
//! stored in `user_category_settings` and overlaid on read. The tree shape
//! (`parent_id` links) feeds the descendant lookups used by transaction
//! filters, so every mutation here clears the descendants cache.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};
use serde::Deserialize;

use crate::{
    Category, CategoryKind, EngineError, ResultEngine, categories, transactions,
    user_category_settings,
};

use super::{
    Engine, dedupe_slug, is_unique_violation, normalize_optional_text, normalize_required_name,
    slugify, with_tx,
};

/// Colors handed out to categories created without one.
const DEFAULT_COLORS: [&str; 10] = [
    "#FF5733", "#33FF57", "#3357FF", "#FF33F1", "#33FFF1", "#F1FF33", "#FF8C33", "#8C33FF",
    "#33FF8C", "#FF3333",
];

/// Input for [`Engine::create_category`].
#[derive(Clone, Debug)]
pub struct NewCategory {
    pub name: String,
    pub color_hex: Option<String>,
    pub parent_id: Option<Uuid>,
    pub kind: CategoryKind,
    pub is_investment: bool,
    pub ignored: bool,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_hex: None,
            parent_id: None,
            kind: CategoryKind::default(),
            is_investment: false,
            ignored: false,
        }
    }
}

/// Field updates for a category; `None` leaves the field untouched.
#[derive(Clone, Debug, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color_hex: Option<String>,
    pub parent_id: Option<Uuid>,
    pub kind: Option<CategoryKind>,
    pub is_investment: Option<bool>,
    pub ignored: Option<bool>,
}

/// Per-user overrides for one category; `None` leaves the override untouched.
///
/// A value equal to the global one clears the override instead of storing a
/// copy, and an empty `alias_label` clears the label.
#[derive(Clone, Debug, Default)]
pub struct CategorySettingUpdate {
    pub color_hex: Option<String>,
    pub alias_label: Option<String>,
    pub is_investment: Option<bool>,
    pub ignored: Option<bool>,
}

/// One node of the aggregator's category taxonomy.
#[derive(Clone, Debug, Deserialize)]
pub struct TaxonomyEntry {
    pub external_id: String,
    pub name: String,
    #[serde(default)]
    pub parent_external_id: Option<String>,
}

/// How many rows a taxonomy sync created and updated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub created: u64,
    pub updated: u64,
}

impl Engine {
    /// Creates a category.
    ///
    /// The slug is derived from the name and must be unique; when no color is
    /// given one is picked from the default palette.
    pub async fn create_category(&self, new_category: NewCategory) -> ResultEngine<Category> {
        let name = normalize_required_name(&new_category.name, "category")?;
        let slug = slugify(&name);
        if slug.is_empty() {
            return Err(EngineError::InvalidId(
                "category name needs at least one letter or digit".to_string(),
            ));
        }
        let color_hex = normalize_optional_text(new_category.color_hex.as_deref())
            .unwrap_or_else(|| palette_color(&slug).to_string());
        let category = with_tx!(self, |db_tx| {
            if let Some(parent_id) = new_category.parent_id {
                require_category(&db_tx, parent_id).await?;
            }
            let inserted = categories::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                name: ActiveValue::Set(name.clone()),
                slug: ActiveValue::Set(slug),
                color_hex: ActiveValue::Set(color_hex),
                parent_id: ActiveValue::Set(new_category.parent_id),
                external_id: ActiveValue::Set(None),
                kind: ActiveValue::Set(new_category.kind.as_str().to_string()),
                is_investment: ActiveValue::Set(new_category.is_investment),
                ignored: ActiveValue::Set(new_category.ignored),
            }
            .insert(&db_tx)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    EngineError::CreationConflict(name.clone())
                } else {
                    EngineError::Database(err)
                }
            })?;
            Category::try_from(inserted)
        })?;
        self.descendants.clear();
        Ok(category)
    }

    /// Returns one category with the user's overrides applied.
    pub async fn category(&self, user_id: &str, category_id: Uuid) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let model = require_category(&db_tx, category_id).await?;
            let setting = find_setting(&db_tx, user_id, category_id).await?;
            apply_user_overrides(model, setting.as_ref())
        })
    }

    /// Lists every category ordered by name, with the user's overrides
    /// applied.
    pub async fn categories(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let models = categories::Entity::find()
                .order_by_asc(categories::Column::Name)
                .all(&db_tx)
                .await?;
            let settings: HashMap<Uuid, user_category_settings::Model> =
                user_category_settings::Entity::find()
                    .filter(user_category_settings::Column::UserId.eq(user_id))
                    .all(&db_tx)
                    .await?
                    .into_iter()
                    .map(|setting| (setting.category_id, setting))
                    .collect();
            models
                .into_iter()
                .map(|model| {
                    let setting = settings.get(&model.id);
                    apply_user_overrides(model, setting)
                })
                .collect()
        })
    }

    /// Ids of a category's subtree, the category itself included.
    ///
    /// Results are cached for a while; category mutations clear the cache.
    pub async fn descendant_ids(&self, category_id: Uuid) -> ResultEngine<Vec<Uuid>> {
        if let Some(ids) = self.descendants.get(&category_id) {
            return Ok(ids);
        }
        let ids = with_tx!(self, |db_tx| {
            let pairs: Vec<(Uuid, Option<Uuid>)> = categories::Entity::find()
                .select_only()
                .column(categories::Column::Id)
                .column(categories::Column::ParentId)
                .into_tuple()
                .all(&db_tx)
                .await?;
            if !pairs.iter().any(|(id, _)| *id == category_id) {
                return Err(EngineError::NotFound("category".to_string()));
            }
            Ok(collect_subtree(category_id, &pairs))
        })?;
        self.descendants.insert(category_id, ids.clone());
        Ok(ids)
    }

    /// Updates a category. Fields left `None` keep their value; the slug
    /// never changes after creation.
    pub async fn update_category(
        &self,
        user_id: &str,
        category_id: Uuid,
        update: CategoryUpdate,
    ) -> ResultEngine<Category> {
        let category = with_tx!(self, |db_tx| {
            let current = require_category(&db_tx, category_id).await?;
            let mut active: categories::ActiveModel = current.clone().into();
            let mut dirty = false;
            if let Some(name) = update.name.as_deref() {
                let name = normalize_required_name(name, "category")?;
                if name != current.name {
                    active.name = ActiveValue::Set(name);
                    dirty = true;
                }
            }
            if let Some(color_hex) = normalize_optional_text(update.color_hex.as_deref()) {
                if color_hex != current.color_hex {
                    active.color_hex = ActiveValue::Set(color_hex);
                    dirty = true;
                }
            }
            if let Some(parent_id) = update.parent_id {
                if Some(parent_id) != current.parent_id {
                    require_category(&db_tx, parent_id).await?;
                    let pairs: Vec<(Uuid, Option<Uuid>)> = categories::Entity::find()
                        .select_only()
                        .column(categories::Column::Id)
                        .column(categories::Column::ParentId)
                        .into_tuple()
                        .all(&db_tx)
                        .await?;
                    if collect_subtree(category_id, &pairs).contains(&parent_id) {
                        return Err(EngineError::InvalidId(
                            "a category cannot be moved under its own subtree".to_string(),
                        ));
                    }
                    active.parent_id = ActiveValue::Set(Some(parent_id));
                    dirty = true;
                }
            }
            if let Some(kind) = update.kind {
                if kind.as_str() != current.kind {
                    active.kind = ActiveValue::Set(kind.as_str().to_string());
                    dirty = true;
                }
            }
            if let Some(is_investment) = update.is_investment {
                if is_investment != current.is_investment {
                    active.is_investment = ActiveValue::Set(is_investment);
                    dirty = true;
                }
            }
            if let Some(ignored) = update.ignored {
                if ignored != current.ignored {
                    active.ignored = ActiveValue::Set(ignored);
                    dirty = true;
                }
            }
            let model = if dirty {
                active.update(&db_tx).await?
            } else {
                current
            };
            let setting = find_setting(&db_tx, user_id, category_id).await?;
            apply_user_overrides(model, setting.as_ref())
        })?;
        self.descendants.clear();
        Ok(category)
    }

    /// Deletes a category.
    ///
    /// Transactions keep their category forever, so a category still
    /// referenced by any transaction cannot be removed. Merchant and alias
    /// references are detached by the schema.
    pub async fn delete_category(&self, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let category = require_category(&db_tx, category_id).await?;
            let referencing = transactions::Entity::find()
                .filter(transactions::Column::CategoryId.eq(category_id))
                .count(&db_tx)
                .await?;
            if referencing > 0 {
                return Err(EngineError::CategoryInUse(category.name));
            }
            category.delete(&db_tx).await?;
            Ok(())
        })?;
        self.descendants.clear();
        Ok(())
    }

    /// Stores per-user presentation overrides for a category.
    ///
    /// Overrides equal to the global values are dropped, and a row left with
    /// no overrides is deleted outright.
    pub async fn update_category_settings(
        &self,
        user_id: &str,
        category_id: Uuid,
        update: CategorySettingUpdate,
    ) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let global = require_category(&db_tx, category_id).await?;
            let current = find_setting(&db_tx, user_id, category_id).await?;

            let mut color_hex = current
                .as_ref()
                .and_then(|setting| setting.color_hex.clone());
            let mut alias_label = current
                .as_ref()
                .and_then(|setting| setting.alias_label.clone());
            let mut is_investment = current.as_ref().and_then(|setting| setting.is_investment);
            let mut ignored = current.as_ref().and_then(|setting| setting.ignored);

            if let Some(value) = update.color_hex.as_deref() {
                color_hex =
                    normalize_optional_text(Some(value)).filter(|value| *value != global.color_hex);
            }
            if let Some(value) = update.alias_label.as_deref() {
                alias_label = normalize_optional_text(Some(value));
            }
            if let Some(value) = update.is_investment {
                is_investment = (value != global.is_investment).then_some(value);
            }
            if let Some(value) = update.ignored {
                ignored = (value != global.ignored).then_some(value);
            }

            let has_overrides = color_hex.is_some()
                || alias_label.is_some()
                || is_investment.is_some()
                || ignored.is_some();
            match (current, has_overrides) {
                (Some(existing), false) => {
                    existing.delete(&db_tx).await?;
                }
                (Some(existing), true) => {
                    let mut active: user_category_settings::ActiveModel = existing.into();
                    active.color_hex = ActiveValue::Set(color_hex.clone());
                    active.alias_label = ActiveValue::Set(alias_label.clone());
                    active.is_investment = ActiveValue::Set(is_investment);
                    active.ignored = ActiveValue::Set(ignored);
                    active.update(&db_tx).await?;
                }
                (None, true) => {
                    user_category_settings::ActiveModel {
                        user_id: ActiveValue::Set(user_id.to_string()),
                        category_id: ActiveValue::Set(category_id),
                        color_hex: ActiveValue::Set(color_hex.clone()),
                        alias_label: ActiveValue::Set(alias_label.clone()),
                        is_investment: ActiveValue::Set(is_investment),
                        ignored: ActiveValue::Set(ignored),
                    }
                    .insert(&db_tx)
                    .await?;
                }
                (None, false) => {}
            }

            let merged = user_category_settings::Model {
                user_id: user_id.to_string(),
                category_id,
                color_hex,
                alias_label,
                is_investment,
                ignored,
            };
            apply_user_overrides(global, Some(&merged))
        })
    }

    /// Mirrors the aggregator taxonomy into the category table.
    ///
    /// Two passes so a parent may appear after its children in the payload:
    /// rows first, parent links second. Entries missing an id or a name are
    /// skipped, and a parent id that matches nothing leaves the child as is.
    pub async fn sync_categories(&self, entries: &[TaxonomyEntry]) -> ResultEngine<SyncCounts> {
        let counts = with_tx!(self, |db_tx| {
            let mut models: HashMap<Uuid, categories::Model> = HashMap::new();
            let mut by_external: HashMap<String, Uuid> = HashMap::new();
            let mut slugs: HashSet<String> = HashSet::new();
            for model in categories::Entity::find().all(&db_tx).await? {
                if let Some(external_id) = &model.external_id {
                    by_external.insert(external_id.clone(), model.id);
                }
                slugs.insert(model.slug.clone());
                models.insert(model.id, model);
            }

            let mut created_ids: HashSet<Uuid> = HashSet::new();
            let mut updated_ids: HashSet<Uuid> = HashSet::new();

            for entry in entries {
                let Some(external_id) = normalize_optional_text(Some(entry.external_id.as_str()))
                else {
                    continue;
                };
                let Some(name) = normalize_optional_text(Some(entry.name.as_str())) else {
                    continue;
                };
                if let Some(id) = by_external.get(&external_id).copied() {
                    if models.get(&id).is_some_and(|model| model.name != name) {
                        categories::ActiveModel {
                            id: ActiveValue::Set(id),
                            name: ActiveValue::Set(name.clone()),
                            ..Default::default()
                        }
                        .update(&db_tx)
                        .await?;
                        if let Some(model) = models.get_mut(&id) {
                            model.name = name;
                        }
                        updated_ids.insert(id);
                    }
                } else {
                    let mut slug = slugify(&name);
                    if slug.is_empty() {
                        slug = "category".to_string();
                    }
                    let slug = dedupe_slug(slug, &slugs);
                    slugs.insert(slug.clone());
                    let inserted = categories::ActiveModel {
                        id: ActiveValue::Set(Uuid::new_v4()),
                        name: ActiveValue::Set(name),
                        slug: ActiveValue::Set(slug.clone()),
                        color_hex: ActiveValue::Set(palette_color(&slug).to_string()),
                        parent_id: ActiveValue::Set(None),
                        external_id: ActiveValue::Set(Some(external_id.clone())),
                        kind: ActiveValue::Set(CategoryKind::default().as_str().to_string()),
                        is_investment: ActiveValue::Set(false),
                        ignored: ActiveValue::Set(false),
                    }
                    .insert(&db_tx)
                    .await?;
                    by_external.insert(external_id, inserted.id);
                    created_ids.insert(inserted.id);
                    models.insert(inserted.id, inserted);
                }
            }

            for entry in entries {
                let Some(external_id) = normalize_optional_text(Some(entry.external_id.as_str()))
                else {
                    continue;
                };
                let Some(child_id) = by_external.get(&external_id).copied() else {
                    continue;
                };
                let desired = match normalize_optional_text(entry.parent_external_id.as_deref()) {
                    Some(parent_external) => match by_external.get(&parent_external).copied() {
                        Some(parent_id) => Some(parent_id),
                        None => continue,
                    },
                    None => None,
                };
                if desired == Some(child_id) {
                    continue;
                }
                let current = models.get(&child_id).and_then(|model| model.parent_id);
                if desired != current {
                    categories::ActiveModel {
                        id: ActiveValue::Set(child_id),
                        parent_id: ActiveValue::Set(desired),
                        ..Default::default()
                    }
                    .update(&db_tx)
                    .await?;
                    if let Some(model) = models.get_mut(&child_id) {
                        model.parent_id = desired;
                    }
                    if !created_ids.contains(&child_id) {
                        updated_ids.insert(child_id);
                    }
                }
            }

            Ok(SyncCounts {
                created: created_ids.len() as u64,
                updated: updated_ids.len() as u64,
            })
        })?;
        self.descendants.clear();
        Ok(counts)
    }
}

pub(super) async fn require_category(
    db_tx: &DatabaseTransaction,
    category_id: Uuid,
) -> ResultEngine<categories::Model> {
    categories::Entity::find_by_id(category_id)
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound("category".to_string()))
}

async fn find_setting(
    db_tx: &DatabaseTransaction,
    user_id: &str,
    category_id: Uuid,
) -> ResultEngine<Option<user_category_settings::Model>> {
    Ok(
        user_category_settings::Entity::find_by_id((user_id.to_string(), category_id))
            .one(db_tx)
            .await?,
    )
}

pub(super) fn apply_user_overrides(
    model: categories::Model,
    setting: Option<&user_category_settings::Model>,
) -> ResultEngine<Category> {
    let mut category = Category::try_from(model)?;
    if let Some(setting) = setting {
        if let Some(color_hex) = &setting.color_hex {
            category.color_hex = color_hex.clone();
        }
        category.alias_label = setting.alias_label.clone();
        if let Some(is_investment) = setting.is_investment {
            category.is_investment = is_investment;
        }
        if let Some(ignored) = setting.ignored {
            category.ignored = ignored;
        }
    }
    Ok(category)
}

fn palette_color(slug: &str) -> &'static str {
    let folded = slug
        .bytes()
        .fold(0usize, |acc, byte| acc.wrapping_add(usize::from(byte)));
    DEFAULT_COLORS[folded % DEFAULT_COLORS.len()]
}

/// Breadth-first walk over `(id, parent_id)` pairs starting at `root`.
/// The visited set keeps a corrupted tree from looping the walk.
fn collect_subtree(root: Uuid, pairs: &[(Uuid, Option<Uuid>)]) -> Vec<Uuid> {
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (id, parent_id) in pairs {
        if let Some(parent_id) = parent_id {
            children.entry(*parent_id).or_default().push(*id);
        }
    }
    let mut collected = vec![root];
    let mut seen: HashSet<Uuid> = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        for child in children.get(&current).into_iter().flatten() {
            if seen.insert(*child) {
                collected.push(*child);
                queue.push_back(*child);
            }
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_color_is_deterministic_and_in_palette() {
        assert_eq!(palette_color("mercado"), palette_color("mercado"));
        assert!(DEFAULT_COLORS.contains(&palette_color("transporte")));
    }

    #[test]
    fn collect_subtree_walks_nested_children_only() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let other = Uuid::new_v4();
        let pairs = vec![
            (root, None),
            (child, Some(root)),
            (grandchild, Some(child)),
            (other, None),
        ];
        let ids = collect_subtree(root, &pairs);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&root) && ids.contains(&child) && ids.contains(&grandchild));
        assert!(!ids.contains(&other));
    }

    #[test]
    fn collect_subtree_survives_a_parent_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pairs = vec![(a, Some(b)), (b, Some(a))];
        let ids = collect_subtree(a, &pairs);
        assert_eq!(ids.len(), 2);
    }
}
