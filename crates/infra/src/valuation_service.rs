//! Valuation of products against the live backend.
//!
//! Fetches locations, product snapshots and movements through the ports,
//! then hands everything to the pure [`ValuationEngine`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stockval_core::{InconsistencyWarning, ProductId, ValuationError, ValuationResult};
use stockval_inventory::{
    ClassifiedMovement, ClassifierConfig, Cutoff, MovementClassifier, ProductSnapshot, ReportRow, Valuation,
    ValuationEngine, ValuationStep,
};

use crate::ports::{Backend, MovementFilter, MovementSource};

/// Build a classifier over the backend's current locations.
pub(crate) async fn load_classifier<S>(source: &S, config: &ClassifierConfig) -> ValuationResult<MovementClassifier>
where
    S: MovementSource + ?Sized,
{
    let locations = source.fetch_locations().await?;
    debug!(count = locations.len(), "locations loaded");
    Ok(MovementClassifier::new(config.clone(), locations))
}

/// Every done movement of `product_id`, classified.
pub(crate) async fn load_history<S>(
    source: &S,
    classifier: &MovementClassifier,
    product_id: ProductId,
) -> ValuationResult<Vec<ClassifiedMovement>>
where
    S: MovementSource + ?Sized,
{
    let movements = source.fetch_movements(&MovementFilter::done_for(product_id)).await?;
    Ok(classifier.classify_all(movements))
}

/// Valuation of one product with its kardex lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductValuation {
    pub snapshot: ProductSnapshot,
    pub cutoff: Cutoff,
    pub valuation: Valuation,
    pub timeline: Vec<ValuationStep>,
    pub warnings: Vec<InconsistencyWarning>,
}

impl ProductValuation {
    pub fn report_rows(&self) -> Vec<ReportRow> {
        self.timeline
            .iter()
            .map(|step| ReportRow::from_step(step, Some(&self.snapshot)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchValuation {
    pub products: Vec<ProductValuation>,
    /// Requested ids the backend does not know.
    pub missing: Vec<ProductId>,
}

impl BatchValuation {
    pub fn report_rows(&self) -> Vec<ReportRow> {
        self.products.iter().flat_map(ProductValuation::report_rows).collect()
    }
}

pub struct ValuationService<B> {
    backend: B,
    classifier_config: ClassifierConfig,
    engine: ValuationEngine,
}

impl<B> ValuationService<B>
where
    B: Backend,
{
    pub fn new(backend: B, classifier_config: ClassifierConfig) -> Self {
        Self {
            backend,
            classifier_config,
            engine: ValuationEngine::new(),
        }
    }

    fn value_with(
        &self,
        snapshot: ProductSnapshot,
        history: &[ClassifiedMovement],
        cutoff: Cutoff,
    ) -> ProductValuation {
        let valuation = self.engine.value_or_estimate(&snapshot, history, cutoff);
        let timeline = self.engine.timeline(snapshot.product_id, history, cutoff);

        let warnings = valuation
            .computed()
            .map(|state| state.inconsistencies())
            .unwrap_or_default();
        for w in &warnings {
            warn!(product_id = %w.product_id(), warning = %w, "valuation inconsistency");
        }
        if valuation.is_estimate() {
            debug!(product_id = %snapshot.product_id, "no movement history, using backend estimate");
        }

        ProductValuation {
            snapshot,
            cutoff,
            valuation,
            timeline,
            warnings,
        }
    }

    pub async fn value_product(&self, product_id: ProductId, cutoff: Cutoff) -> ValuationResult<ProductValuation> {
        let snapshot = self
            .backend
            .fetch_products(&[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ValuationError::not_found("product", product_id))?;

        let classifier = load_classifier(&self.backend, &self.classifier_config).await?;
        let history = load_history(&self.backend, &classifier, product_id).await?;
        Ok(self.value_with(snapshot, &history, cutoff))
    }

    /// Value several products with one location and one product fetch.
    pub async fn value_products(&self, ids: &[ProductId], cutoff: Cutoff) -> ValuationResult<BatchValuation> {
        let snapshots = self.backend.fetch_products(ids).await?;
        let classifier = load_classifier(&self.backend, &self.classifier_config).await?;

        let mut batch = BatchValuation::default();
        for &id in ids {
            let Some(snapshot) = snapshots.iter().find(|s| s.product_id == id) else {
                warn!(product_id = %id, "product not found on backend");
                batch.missing.push(id);
                continue;
            };
            let history = load_history(&self.backend, &classifier, id).await?;
            batch.products.push(self.value_with(snapshot.clone(), &history, cutoff));
        }
        Ok(batch)
    }
}
