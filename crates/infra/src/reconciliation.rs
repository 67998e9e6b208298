//! Reported-vs-computed reconciliation against the backend.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use stockval_core::{InconsistencyWarning, LocationId, MovementId, ProductId, ValuationError, ValuationResult};
use stockval_inventory::{
    AdjustmentMove, ClassifierConfig, Discrepancy, DiscrepancyKind, LocationRoleKind, MovementClassifier,
    ValuationEngine, proposed_adjustments,
};

use crate::ports::{Backend, NewMovement};
use crate::valuation_service::{load_classifier, load_history};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub discrepancies: Vec<Discrepancy>,
    pub warnings: Vec<InconsistencyWarning>,
    pub missing_products: Vec<ProductId>,
}

impl ReconciliationReport {
    pub fn adjustments(&self) -> Vec<AdjustmentMove> {
        proposed_adjustments(&self.discrepancies)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFailure {
    pub product_id: ProductId,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchApplyReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub errors: Vec<AdjustmentFailure>,
    pub created: Vec<MovementId>,
}

pub struct DiscrepancyAnalyzer<B> {
    backend: B,
    classifier_config: ClassifierConfig,
    /// Counterpart location of adjustments; the first inventory-adjustment
    /// location when unset.
    adjustment_location: Option<LocationId>,
    engine: ValuationEngine,
}

impl<B> DiscrepancyAnalyzer<B>
where
    B: Backend,
{
    pub fn new(backend: B, classifier_config: ClassifierConfig) -> Self {
        Self {
            backend,
            classifier_config,
            adjustment_location: None,
            engine: ValuationEngine::new(),
        }
    }

    pub fn with_adjustment_location(mut self, location: Option<LocationId>) -> Self {
        self.adjustment_location = location;
        self
    }

    pub async fn analyze_products(&self, ids: &[ProductId]) -> ValuationResult<ReconciliationReport> {
        let snapshots = self.backend.fetch_products(ids).await?;
        let classifier = load_classifier(&self.backend, &self.classifier_config).await?;

        let mut report = ReconciliationReport::default();
        for &id in ids {
            let Some(snapshot) = snapshots.iter().find(|s| s.product_id == id) else {
                warn!(product_id = %id, "product not found on backend");
                report.missing_products.push(id);
                continue;
            };

            let history = load_history(&self.backend, &classifier, id).await?;
            let state = self.engine.fold(id, &history);
            report.warnings.extend(state.inconsistencies());

            let discrepancy = Discrepancy::analyze(id, snapshot.reported_quantity, state.net_quantity, snapshot.standard_cost);
            if let Some(w) = discrepancy.warning() {
                warn!(product_id = %id, delta = discrepancy.delta, warning = %w, "quantity divergence");
                report.warnings.push(w);
            }
            report.discrepancies.push(discrepancy);
        }
        Ok(report)
    }

    fn endpoints(&self, classifier: &MovementClassifier) -> ValuationResult<(LocationId, LocationId)> {
        let storage = classifier
            .primary_storage()
            .ok_or_else(|| ValuationError::validation("no internal storage location known"))?;
        let adjustment = self
            .adjustment_location
            .or_else(|| classifier.first_with_role(LocationRoleKind::InventoryAdjustment))
            .ok_or_else(|| ValuationError::validation("no inventory adjustment location known"))?;
        Ok((storage, adjustment))
    }

    /// Book each adjustment as a new movement dated now. Items are
    /// independent: one failure does not stop the rest.
    pub async fn apply_adjustments(&self, adjustments: &[AdjustmentMove]) -> ValuationResult<BatchApplyReport> {
        let classifier = load_classifier(&self.backend, &self.classifier_config).await?;
        let (storage, adjustment_location) = self.endpoints(&classifier)?;

        let mut report = BatchApplyReport::default();
        for adjustment in adjustments {
            let (source, dest) = match adjustment.kind() {
                DiscrepancyKind::Entry => (adjustment_location, storage),
                DiscrepancyKind::Exit => (storage, adjustment_location),
                DiscrepancyKind::None => {
                    report.failed_count += 1;
                    report.errors.push(AdjustmentFailure {
                        product_id: adjustment.product_id,
                        message: format!("quantity {} is within tolerance, nothing to book", adjustment.quantity),
                        retryable: false,
                    });
                    continue;
                }
            };

            let movement = NewMovement {
                product_id: adjustment.product_id,
                quantity: adjustment.movement_quantity(),
                unit_cost: adjustment.unit_cost,
                source_location_id: source,
                dest_location_id: dest,
                reference: adjustment.note.clone(),
                timestamp: Some(Utc::now()),
            };

            match self.backend.create_adjustment_movement(movement).await {
                Ok(id) => {
                    info!(product_id = %adjustment.product_id, movement_id = %id, quantity = adjustment.quantity, "adjustment booked");
                    report.success_count += 1;
                    report.created.push(id);
                }
                Err(err) => {
                    warn!(product_id = %adjustment.product_id, error = %err, "adjustment failed");
                    report.failed_count += 1;
                    report.errors.push(AdjustmentFailure {
                        product_id: adjustment.product_id,
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    });
                }
            }
        }
        Ok(report)
    }
}
