//! Unit-cost correction of a receipt.
//!
//! Flow:
//! 1. Validate the new cost and read everything needed (movement, direction,
//!    ledger entry, cost configuration). Nothing is written before all reads
//!    succeed.
//! 2. Patch the valuation-ledger entry, then the movement.
//! 3. Recompute the weighted average over the product's receipts.
//! 4. Push it to the product's standard cost unless the backend recomputes
//!    the cost itself.
//!
//! Compensating action: restore the ledger entry if the movement patch fails.
//!
//! Corrections of the same product are not serialized here; callers that run
//! them concurrently must do so themselves.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use stockval_core::{MovementId, ValuationError, ValuationResult};
use stockval_inventory::{ClassifierConfig, CostMethod, Direction, ValuationEngine, ValuationMode};

use crate::ports::{Backend, ValuationLedgerEntry};
use crate::valuation_service::{load_classifier, load_history};

/// How the backend costs the corrected product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostingInfo {
    pub cost_method: CostMethod,
    pub valuation_mode: ValuationMode,
    pub ledger_entry_patched: bool,
    /// The backend derives the product cost from its own ledger.
    pub backend_recomputes_cost: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub success: bool,
    pub new_cump: f64,
    /// Whether the product's standard cost was overwritten with `new_cump`.
    pub cump_updated: bool,
    pub costing_info: CostingInfo,
}

/// Any failure of a write port counts as a failed write, whatever the port reported.
fn as_write_failure(err: ValuationError) -> ValuationError {
    match err {
        ValuationError::Backend(e) => ValuationError::write_failed(e),
        other => other,
    }
}

/// Ledger value at `unit_cost`, keeping the sign of the current value.
fn ledger_value(entry: &ValuationLedgerEntry, unit_cost: f64) -> f64 {
    let magnitude = (entry.quantity * unit_cost).abs();
    if entry.value < 0.0 { -magnitude } else { magnitude }
}

pub struct PriceCorrectionCoordinator<B> {
    backend: B,
    classifier_config: ClassifierConfig,
    engine: ValuationEngine,
}

impl<B> PriceCorrectionCoordinator<B>
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

    pub async fn correct_unit_cost(&self, movement_id: MovementId, new_cost: f64) -> ValuationResult<CorrectionOutcome> {
        if !new_cost.is_finite() || new_cost < 0.0 {
            return Err(ValuationError::validation(format!(
                "unit cost must be a finite value >= 0 (got {new_cost})"
            )));
        }

        let movement = self
            .backend
            .fetch_movement(movement_id)
            .await?
            .ok_or_else(|| ValuationError::not_found("movement", movement_id))?;

        let classifier = load_classifier(&self.backend, &self.classifier_config).await?;
        let direction = classifier.classify(&movement);
        if direction != Direction::Inbound {
            return Err(ValuationError::validation(format!(
                "movement {movement_id} is {} and not editable; only receipts carry a cost",
                direction.as_str()
            )));
        }

        let product_id = movement.product_id;
        let ledger = self.backend.find_valuation_entry(movement_id).await?;
        let config = self.backend.fetch_cost_configuration(product_id).await?;

        if let Some(entry) = &ledger {
            self.backend
                .patch_valuation_ledger_entry(entry.id, new_cost, ledger_value(entry, new_cost))
                .await
                .map_err(as_write_failure)?;
        }

        if let Err(err) = self.backend.patch_movement_unit_cost(movement_id, new_cost).await {
            let err = as_write_failure(err);
            if let Some(entry) = &ledger {
                self.restore_ledger(entry).await;
            }
            warn!(movement_id = %movement_id, error = %err, "movement cost patch failed");
            return Err(err);
        }

        let mut history = load_history(&self.backend, &classifier, product_id).await?;
        // The backend may lag behind the write; the corrected cost is known.
        for m in history.iter_mut().filter(|m| m.record.id == movement_id) {
            m.record.unit_cost = new_cost;
        }
        let new_cump = self.engine.inbound_average(product_id, &history).cump;

        let recomputes = config.backend_recomputes_cost();
        let cump_updated = if recomputes {
            info!(product_id = %product_id, "backend recomputes average cost, standard cost left untouched");
            false
        } else {
            self.backend
                .patch_product_standard_cost(product_id, new_cump)
                .await
                .map_err(|err| {
                    error!(
                        product_id = %product_id,
                        movement_id = %movement_id,
                        "movement corrected but standard cost push failed"
                    );
                    as_write_failure(err)
                })?;
            true
        };

        info!(
            movement_id = %movement_id,
            product_id = %product_id,
            old_cost = movement.unit_cost,
            new_cost,
            new_cump,
            cump_updated,
            "unit cost corrected"
        );

        Ok(CorrectionOutcome {
            success: true,
            new_cump,
            cump_updated,
            costing_info: CostingInfo {
                cost_method: config.cost_method,
                valuation_mode: config.valuation_mode,
                ledger_entry_patched: ledger.is_some(),
                backend_recomputes_cost: recomputes,
            },
        })
    }

    async fn restore_ledger(&self, entry: &ValuationLedgerEntry) {
        match self
            .backend
            .patch_valuation_ledger_entry(entry.id, entry.unit_cost, entry.value)
            .await
        {
            Ok(()) => info!(ledger_entry_id = %entry.id, "ledger entry restored"),
            Err(err) => error!(
                ledger_entry_id = %entry.id,
                error = %err,
                "failed to restore ledger entry; ledger and movement disagree"
            ),
        }
    }
}
