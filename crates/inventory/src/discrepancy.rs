//! Reported-vs-computed quantity reconciliation.
//!
//! Differences are never fixed by editing history. Each discrepancy becomes a
//! proposed compensating movement that is booked as a new record.

use serde::{Deserialize, Serialize};

use stockval_core::{InconsistencyWarning, ProductId};

/// Differences within this band are floating-point noise.
pub const DISCREPANCY_EPSILON: f64 = 0.01;

/// Note attached to every compensating movement.
pub const ADJUSTMENT_NOTE: &str = "reconciliation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Backend holds more than the movements explain; stock must be added.
    Entry,
    /// Backend holds less than the movements explain; stock must be removed.
    Exit,
    None,
}

impl DiscrepancyKind {
    pub fn from_delta(delta: f64) -> Self {
        if delta > DISCREPANCY_EPSILON {
            DiscrepancyKind::Entry
        } else if delta < -DISCREPANCY_EPSILON {
            DiscrepancyKind::Exit
        } else {
            DiscrepancyKind::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub product_id: ProductId,
    pub reported_qty: f64,
    pub computed_qty: f64,
    /// `reported_qty - computed_qty`.
    pub delta: f64,
    pub unit_cost_for_adjustment: f64,
    pub kind: DiscrepancyKind,
}

impl Discrepancy {
    pub fn analyze(product_id: ProductId, reported_qty: f64, computed_qty: f64, standard_cost: f64) -> Self {
        let delta = reported_qty - computed_qty;
        Self {
            product_id,
            reported_qty,
            computed_qty,
            delta,
            unit_cost_for_adjustment: standard_cost,
            kind: DiscrepancyKind::from_delta(delta),
        }
    }

    pub fn needs_adjustment(&self) -> bool {
        self.kind != DiscrepancyKind::None
    }

    pub fn warning(&self) -> Option<InconsistencyWarning> {
        self.needs_adjustment().then(|| InconsistencyWarning::QuantityDivergence {
            product_id: self.product_id,
            reported: self.reported_qty,
            computed: self.computed_qty,
        })
    }

    /// Compensating movement for this discrepancy, if one is needed.
    pub fn proposed_adjustment(&self) -> Option<AdjustmentMove> {
        self.needs_adjustment().then(|| AdjustmentMove {
            product_id: self.product_id,
            quantity: self.delta,
            unit_cost: self.unit_cost_for_adjustment,
            note: ADJUSTMENT_NOTE.to_string(),
        })
    }
}

/// A movement proposed to bring the movement history in line with the
/// backend's on-hand quantity. `quantity` is signed: positive adds stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentMove {
    pub product_id: ProductId,
    pub quantity: f64,
    pub unit_cost: f64,
    pub note: String,
}

impl AdjustmentMove {
    pub fn kind(&self) -> DiscrepancyKind {
        DiscrepancyKind::from_delta(self.quantity)
    }

    /// Unsigned quantity of the movement that will be booked.
    pub fn movement_quantity(&self) -> f64 {
        self.quantity.abs()
    }
}

/// Collect the adjustments proposed for a batch of discrepancies.
pub fn proposed_adjustments<'a>(discrepancies: impl IntoIterator<Item = &'a Discrepancy>) -> Vec<AdjustmentMove> {
    discrepancies
        .into_iter()
        .filter_map(Discrepancy::proposed_adjustment)
        .collect()
}
