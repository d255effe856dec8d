// Price resolution passes over a document's work items.
//
// A pass never holds the document map's write lock across an await.
// Targets are captured under the lock, catalog and assistant calls run
// with the lock released, and results are applied under a second lock.
// Loading flags on the session cover the whole window in between and
// are cleared on every completion path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::warn;
use uuid::Uuid;

use anggar_common::document::DocumentError;
use anggar_common::types::{Component, PriceSource, WorkCatalogEntry};

use crate::ai::BreakdownGenerator;
use crate::catalog::WorkCatalogStore;
use crate::session::OpenDocument;
use crate::store::meta_db::MetaDb;

/// How a pass fills in unit prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStrategy {
    /// Work catalog prices only, all-or-nothing over the scope.
    Database,
    /// Breakdown math, generating missing breakdowns per item.
    Ahs,
    /// Catalog price first, the item's own breakdown as fallback.
    Combined,
}

/// Outcome of a bulk pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PricingReport {
    pub resolved: Vec<Uuid>,
    pub unresolved: Vec<UnresolvedItem>,
    /// Items whose breakdown was filled in by the assistant this pass.
    pub generated: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedItem {
    pub id: Uuid,
    pub description: String,
}

/// Outcome of resolving one item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SingleResolution {
    Applied { unit_price: f64, source: PriceSource },
    Unresolved { description: String },
    /// Generated components awaiting user review; nothing was written.
    NeedsReview { components: Vec<Component> },
}

struct Target {
    id: Uuid,
    description: String,
    own_breakdown_empty: bool,
}

/// Runs pricing passes against open documents.
#[derive(Clone)]
pub struct PriceResolver {
    docs: Arc<RwLock<HashMap<Uuid, OpenDocument>>>,
    db: Arc<Mutex<MetaDb>>,
    generator: Arc<dyn BreakdownGenerator>,
}

impl PriceResolver {
    pub fn new(
        docs: Arc<RwLock<HashMap<Uuid, OpenDocument>>>,
        db: Arc<Mutex<MetaDb>>,
        generator: Arc<dyn BreakdownGenerator>,
    ) -> Self {
        Self { docs, db, generator }
    }

    /// Resolve prices for the given items, or every work item when
    /// `item_ids` is `None`.
    pub async fn resolve(
        &self,
        doc_id: Uuid,
        item_ids: Option<Vec<Uuid>>,
        strategy: PriceStrategy,
    ) -> Result<PricingReport> {
        let bulk = item_ids.is_none();
        let targets = self.begin(doc_id, item_ids).await?;
        let ids: Vec<Uuid> = targets.iter().map(|target| target.id).collect();
        let result = self.run(doc_id, targets, strategy, bulk).await;
        self.finish(doc_id, &ids).await;
        result
    }

    /// Resolve one item. Unlike the bulk pass, a generated breakdown is
    /// returned for review instead of being written to the item, and
    /// generator failures surface to the caller.
    pub async fn resolve_single(
        &self,
        doc_id: Uuid,
        item_id: Uuid,
        strategy: PriceStrategy,
    ) -> Result<SingleResolution> {
        let targets = self.begin(doc_id, Some(vec![item_id])).await?;
        let Some(target) = targets.into_iter().next() else {
            bail!("item {item_id} is not a priceable row of this document");
        };
        let result = self.run_single(doc_id, target, strategy).await;
        self.finish(doc_id, &[item_id]).await;
        result
    }

    /// Capture targets and raise their loading flags, all under one
    /// write lock.
    async fn begin(&self, doc_id: Uuid, item_ids: Option<Vec<Uuid>>) -> Result<Vec<Target>> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            open.document.ensure_unlocked().context("cannot resolve prices")?;
            let targets: Vec<Target> = open
                .document
                .items
                .iter()
                .filter(|item| item.is_work_item() && !item.deleted)
                .filter(|item| match &item_ids {
                    Some(ids) => ids.contains(&item.id),
                    None => true,
                })
                .map(|item| Target {
                    id: item.id,
                    description: item.description.clone(),
                    own_breakdown_empty: item.breakdown.is_empty(),
                })
                .collect();
            open.session.begin_pricing(targets.iter().map(|target| target.id));
            Ok(targets)
        })
        .await
    }

    async fn run(
        &self,
        doc_id: Uuid,
        targets: Vec<Target>,
        strategy: PriceStrategy,
        bulk: bool,
    ) -> Result<PricingReport> {
        let hits = self.catalog_hits(&targets)?;
        // Automatic generation only runs for whole-document passes;
        // targeted passes report missing breakdowns instead.
        let generated = if strategy == PriceStrategy::Ahs && bulk {
            self.generate_missing(&targets, &hits).await
        } else {
            HashMap::new()
        };
        self.apply(doc_id, targets, strategy, hits, generated).await
    }

    fn catalog_hits(
        &self,
        targets: &[Target],
    ) -> Result<HashMap<Uuid, WorkCatalogEntry>> {
        let db = self.db.lock().map_err(|_| anyhow!("meta db lock poisoned"))?;
        let conn = db.connection();
        let mut hits = HashMap::new();
        for target in targets {
            if let Some(entry) = WorkCatalogStore::find_by_name(conn, &target.description)? {
                hits.insert(target.id, entry);
            }
        }
        Ok(hits)
    }

    /// Generate breakdowns for targets that have none, in parallel.
    /// Individual failures downgrade that item to unresolved.
    async fn generate_missing(
        &self,
        targets: &[Target],
        hits: &HashMap<Uuid, WorkCatalogEntry>,
    ) -> HashMap<Uuid, Vec<Component>> {
        let mut join_set = JoinSet::new();
        for target in targets {
            let catalog_has_breakdown = hits
                .get(&target.id)
                .is_some_and(|entry| !entry.default_breakdown.is_empty());
            if catalog_has_breakdown || !target.own_breakdown_empty {
                continue;
            }
            let generator = Arc::clone(&self.generator);
            let id = target.id;
            let description = target.description.clone();
            join_set
                .spawn(async move { (id, generator.generate_breakdown(&description).await) });
        }

        let mut generated = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, Ok(components))) => {
                    // An empty answer means the assistant could not
                    // estimate this work; leave the item unresolved.
                    if !components.is_empty() {
                        generated.insert(id, components);
                    }
                }
                Ok((id, Err(error))) => {
                    warn!(item_id = %id, %error, "breakdown generation failed");
                }
                Err(error) => {
                    warn!(%error, "breakdown generation task failed to join");
                }
            }
        }
        generated
    }

    async fn apply(
        &self,
        doc_id: Uuid,
        targets: Vec<Target>,
        strategy: PriceStrategy,
        hits: HashMap<Uuid, WorkCatalogEntry>,
        generated: HashMap<Uuid, Vec<Component>>,
    ) -> Result<PricingReport> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            open.document.ensure_unlocked().context("cannot apply resolved prices")?;

            let mut report = PricingReport::default();

            if strategy == PriceStrategy::Database {
                let missing: Vec<UnresolvedItem> = targets
                    .iter()
                    .filter(|target| !hits.contains_key(&target.id))
                    .map(|target| UnresolvedItem {
                        id: target.id,
                        description: target.description.clone(),
                    })
                    .collect();
                if !missing.is_empty() {
                    report.unresolved = missing;
                    return Ok(report);
                }
            }

            let mut touched = false;
            for target in &targets {
                let Some(item) =
                    open.document.items.iter_mut().find(|item| item.id == target.id)
                else {
                    report.unresolved.push(UnresolvedItem {
                        id: target.id,
                        description: target.description.clone(),
                    });
                    continue;
                };

                match strategy {
                    PriceStrategy::Database => {
                        if let Some(entry) = hits.get(&target.id) {
                            item.unit_price = entry.default_price;
                            item.price_source = Some(PriceSource::Database);
                            report.resolved.push(target.id);
                            touched = true;
                        }
                    }
                    PriceStrategy::Ahs => {
                        if let Some(entry) = hits.get(&target.id) {
                            if !entry.default_breakdown.is_empty() {
                                item.breakdown = entry.default_breakdown.clone();
                            }
                        }
                        if item.breakdown.is_empty() {
                            if let Some(components) = generated.get(&target.id) {
                                item.breakdown = components.clone();
                                report.generated.push(target.id);
                            }
                        }
                        if item.breakdown.is_empty() {
                            report.unresolved.push(UnresolvedItem {
                                id: target.id,
                                description: target.description.clone(),
                            });
                            continue;
                        }
                        let base: f64 = item.breakdown.iter().map(Component::amount).sum();
                        item.unit_price = base * item.surcharges.multiplier();
                        item.price_source = Some(PriceSource::Ahs);
                        report.resolved.push(target.id);
                        touched = true;
                    }
                    PriceStrategy::Combined => {
                        if let Some(entry) = hits.get(&target.id) {
                            item.unit_price = entry.default_price;
                            item.price_source = Some(PriceSource::Database);
                            report.resolved.push(target.id);
                            touched = true;
                        } else if !item.breakdown.is_empty() {
                            let base: f64 =
                                item.breakdown.iter().map(Component::amount).sum();
                            item.unit_price = base * item.surcharges.multiplier();
                            item.price_source = Some(PriceSource::Combined);
                            report.resolved.push(target.id);
                            touched = true;
                        } else {
                            report.unresolved.push(UnresolvedItem {
                                id: target.id,
                                description: target.description.clone(),
                            });
                        }
                    }
                }
            }

            if touched {
                open.session.mark_dirty();
            }
            Ok(report)
        })
        .await
    }

    async fn run_single(
        &self,
        doc_id: Uuid,
        target: Target,
        strategy: PriceStrategy,
    ) -> Result<SingleResolution> {
        let hit = {
            let db = self.db.lock().map_err(|_| anyhow!("meta db lock poisoned"))?;
            WorkCatalogStore::find_by_name(db.connection(), &target.description)?
        };

        match strategy {
            PriceStrategy::Database => match hit {
                Some(entry) => {
                    let unit_price = self
                        .apply_direct(doc_id, target.id, entry.default_price, PriceSource::Database)
                        .await?;
                    Ok(SingleResolution::Applied { unit_price, source: PriceSource::Database })
                }
                None => Ok(SingleResolution::Unresolved { description: target.description }),
            },
            PriceStrategy::Combined => {
                if let Some(entry) = hit {
                    let unit_price = self
                        .apply_direct(doc_id, target.id, entry.default_price, PriceSource::Database)
                        .await?;
                    return Ok(SingleResolution::Applied {
                        unit_price,
                        source: PriceSource::Database,
                    });
                }
                match self
                    .apply_breakdown_price(doc_id, target.id, None, PriceSource::Combined)
                    .await?
                {
                    Some(unit_price) => Ok(SingleResolution::Applied {
                        unit_price,
                        source: PriceSource::Combined,
                    }),
                    None => Ok(SingleResolution::Unresolved { description: target.description }),
                }
            }
            PriceStrategy::Ahs => {
                let catalog_breakdown = hit
                    .filter(|entry| !entry.default_breakdown.is_empty())
                    .map(|entry| entry.default_breakdown);
                if catalog_breakdown.is_some() || !target.own_breakdown_empty {
                    return match self
                        .apply_breakdown_price(
                            doc_id,
                            target.id,
                            catalog_breakdown,
                            PriceSource::Ahs,
                        )
                        .await?
                    {
                        Some(unit_price) => {
                            Ok(SingleResolution::Applied { unit_price, source: PriceSource::Ahs })
                        }
                        None => {
                            Ok(SingleResolution::Unresolved { description: target.description })
                        }
                    };
                }

                let components = self
                    .generator
                    .generate_breakdown(&target.description)
                    .await
                    .context("failed to generate a breakdown")?;
                if components.is_empty() {
                    return Ok(SingleResolution::Unresolved { description: target.description });
                }
                Ok(SingleResolution::NeedsReview { components })
            }
        }
    }

    async fn apply_direct(
        &self,
        doc_id: Uuid,
        item_id: Uuid,
        price: f64,
        source: PriceSource,
    ) -> Result<f64> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            open.document.ensure_unlocked().context("cannot apply resolved prices")?;
            let item = open
                .document
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or_else(|| anyhow!("item {item_id} disappeared mid-resolution"))?;
            item.unit_price = price;
            item.price_source = Some(source);
            open.session.mark_dirty();
            Ok(price)
        })
        .await
    }

    /// Price from a breakdown. `replacement` overwrites the item's own
    /// breakdown first; returns `None` when no breakdown is available.
    async fn apply_breakdown_price(
        &self,
        doc_id: Uuid,
        item_id: Uuid,
        replacement: Option<Vec<Component>>,
        source: PriceSource,
    ) -> Result<Option<f64>> {
        self.with_open_doc(doc_id, |open| {
            if open.session.viewing_revision().is_some() {
                return Err(DocumentError::ViewingRevision.into());
            }
            open.document.ensure_unlocked().context("cannot apply resolved prices")?;
            let item = open
                .document
                .items
                .iter_mut()
                .find(|item| item.id == item_id)
                .ok_or_else(|| anyhow!("item {item_id} disappeared mid-resolution"))?;
            if let Some(breakdown) = replacement {
                item.breakdown = breakdown;
            }
            if item.breakdown.is_empty() {
                return Ok(None);
            }
            let base: f64 = item.breakdown.iter().map(Component::amount).sum();
            item.unit_price = base * item.surcharges.multiplier();
            item.price_source = Some(source);
            open.session.mark_dirty();
            Ok(Some(item.unit_price))
        })
        .await
    }

    /// Drop the loading flags, whatever happened in between.
    async fn finish(&self, doc_id: Uuid, ids: &[Uuid]) {
        let mut docs = self.docs.write().await;
        if let Some(open) = docs.get_mut(&doc_id) {
            open.session.finish_pricing(ids.iter().copied());
        }
    }

    async fn with_open_doc<T>(
        &self,
        doc_id: Uuid,
        f: impl FnOnce(&mut OpenDocument) -> Result<T>,
    ) -> Result<T> {
        let mut docs = self.docs.write().await;
        let open = docs
            .get_mut(&doc_id)
            .ok_or_else(|| anyhow!("document {doc_id} is not open"))?;
        f(open)
    }
}
