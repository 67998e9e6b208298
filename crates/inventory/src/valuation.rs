//! Weighted-average ("CUMP") valuation.
//!
//! The engine is a pure fold over classified movements of one product:
//!
//! - Inbound: `value += q * c; qty += q; cump = value / qty` (0 when qty <= 0).
//! - Outbound: leaves at the running cump, never at the movement's own price.
//! - Internal: skipped.
//!
//! Only `done` movements contribute. Input order is irrelevant: the engine
//! sorts by `(timestamp, id)` before folding. A negative running quantity is
//! kept as computed and reported through [`ProductCostState::inconsistencies`].

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockval_core::{InconsistencyWarning, MovementId, ProductId};

use crate::classify::{ClassifiedMovement, Direction};
use crate::movement::ProductSnapshot;

/// Quantities closer to zero than this are treated as zero when checking sign.
const QTY_TOLERANCE: f64 = 1e-9;

/// Upper bound on movement timestamps admitted into a fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cutoff {
    /// "As of now": every movement.
    #[default]
    Unbounded,
    /// Inclusive end of the given (UTC) day.
    EndOfDay(NaiveDate),
    /// Inclusive instant.
    At(DateTime<Utc>),
}

impl Cutoff {
    pub fn admits(&self, timestamp: DateTime<Utc>) -> bool {
        match self {
            Cutoff::Unbounded => true,
            Cutoff::EndOfDay(day) => match day.checked_add_days(Days::new(1)) {
                Some(next) => timestamp < next.and_time(chrono::NaiveTime::MIN).and_utc(),
                None => true,
            },
            Cutoff::At(instant) => timestamp <= *instant,
        }
    }

    pub fn is_historical(&self) -> bool {
        !matches!(self, Cutoff::Unbounded)
    }
}

/// Derived valuation state of a product. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCostState {
    pub product_id: ProductId,
    pub net_quantity: f64,
    pub cump: f64,
    pub stock_value: f64,
    pub total_inbound_qty: f64,
    pub total_outbound_qty: f64,
}

impl ProductCostState {
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            net_quantity: 0.0,
            cump: 0.0,
            stock_value: 0.0,
            total_inbound_qty: 0.0,
            total_outbound_qty: 0.0,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.net_quantity < -QTY_TOLERANCE
    }

    /// Data problems visible in this state.
    pub fn inconsistencies(&self) -> Vec<InconsistencyWarning> {
        if self.is_negative() {
            vec![InconsistencyWarning::NegativeQuantity {
                product_id: self.product_id,
                quantity: self.net_quantity,
            }]
        } else {
            Vec::new()
        }
    }
}

/// Running state right after one movement was folded (a kardex line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationStep {
    pub movement_id: MovementId,
    pub timestamp: DateTime<Utc>,
    pub reference: String,
    pub direction: Direction,
    pub quantity: f64,
    /// Cost the movement was valued at: its own cost when inbound, the running
    /// cump when outbound.
    pub unit_cost: f64,
    pub cump: f64,
    pub net_quantity: f64,
    pub stock_value: f64,
    pub product_code: Option<String>,
    pub product_name: Option<String>,
}

/// Stand-in valuation for a product that has no movement history at all.
///
/// Built from what the backend currently reports. It is an estimate and is
/// kept apart from computed results on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoHistoryEstimate {
    pub product_id: ProductId,
    pub quantity: f64,
    pub unit_cost: f64,
    pub stock_value: f64,
}

impl NoHistoryEstimate {
    pub fn from_snapshot(snapshot: &ProductSnapshot) -> Self {
        // The only place a quantity is clamped.
        let quantity = snapshot.reported_quantity.max(0.0);
        Self {
            product_id: snapshot.product_id,
            quantity,
            unit_cost: snapshot.standard_cost,
            stock_value: quantity * snapshot.standard_cost,
        }
    }
}

/// Result of valuing a product: computed from movements, or estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Valuation {
    Computed(ProductCostState),
    Estimated(NoHistoryEstimate),
}

impl Valuation {
    pub fn is_estimate(&self) -> bool {
        matches!(self, Valuation::Estimated(_))
    }

    pub fn computed(&self) -> Option<&ProductCostState> {
        match self {
            Valuation::Computed(state) => Some(state),
            Valuation::Estimated(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    qty: f64,
    value: f64,
    cump: f64,
    total_in: f64,
    total_out: f64,
}

impl Accumulator {
    /// Fold one movement. Returns the unit cost it was valued at, or `None`
    /// when the movement does not take part in valuation.
    fn apply(&mut self, movement: &ClassifiedMovement) -> Option<f64> {
        let q = movement.record.quantity;
        match movement.direction {
            Direction::Inbound => {
                let c = movement.record.unit_cost;
                self.value += q * c;
                self.qty += q;
                self.total_in += q;
                self.cump = if self.qty > 0.0 { self.value / self.qty } else { 0.0 };
                Some(c)
            }
            Direction::Outbound => {
                self.value -= q * self.cump;
                self.qty -= q;
                self.total_out += q;
                Some(self.cump)
            }
            Direction::Internal => None,
        }
    }

    fn state(&self, product_id: ProductId) -> ProductCostState {
        ProductCostState {
            product_id,
            net_quantity: self.qty,
            cump: self.cump,
            stock_value: self.qty * self.cump,
            total_inbound_qty: self.total_in,
            total_outbound_qty: self.total_out,
        }
    }
}

/// Stateless weighted-average valuation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuationEngine;

impl ValuationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Movements of `product_id` that contribute under `cutoff`, in fold order.
    fn contributing<'a>(
        product_id: ProductId,
        movements: &'a [ClassifiedMovement],
        cutoff: Cutoff,
    ) -> Vec<&'a ClassifiedMovement> {
        let mut selected: Vec<&ClassifiedMovement> = movements
            .iter()
            .filter(|m| {
                m.record.product_id == product_id
                    && m.record.is_done()
                    && cutoff.admits(m.record.timestamp)
            })
            .collect();
        selected.sort_by_key(|m| (m.record.timestamp, m.record.id));
        selected
    }

    /// Fold the full history ("as of now").
    pub fn fold(&self, product_id: ProductId, movements: &[ClassifiedMovement]) -> ProductCostState {
        self.fold_as_of(product_id, movements, Cutoff::Unbounded)
    }

    /// Fold the movements admitted by `cutoff`.
    pub fn fold_as_of(
        &self,
        product_id: ProductId,
        movements: &[ClassifiedMovement],
        cutoff: Cutoff,
    ) -> ProductCostState {
        let mut acc = Accumulator::default();
        for m in Self::contributing(product_id, movements, cutoff) {
            acc.apply(m);
        }
        acc.state(product_id)
    }

    /// Running state after every valued movement.
    pub fn timeline(
        &self,
        product_id: ProductId,
        movements: &[ClassifiedMovement],
        cutoff: Cutoff,
    ) -> Vec<ValuationStep> {
        let mut acc = Accumulator::default();
        let mut steps = Vec::new();
        for m in Self::contributing(product_id, movements, cutoff) {
            let Some(unit_cost) = acc.apply(m) else {
                continue;
            };
            steps.push(ValuationStep {
                movement_id: m.record.id,
                timestamp: m.record.timestamp,
                reference: m.record.reference.clone(),
                direction: m.direction,
                quantity: m.record.quantity,
                unit_cost,
                cump: acc.cump,
                net_quantity: acc.qty,
                stock_value: acc.qty * acc.cump,
                product_code: m.record.product_code.clone(),
                product_name: m.record.product_name.clone(),
            });
        }
        steps
    }

    /// Weighted average over inbound movements only: `Σ q·c / Σ q`.
    ///
    /// Used after a cost correction, where only receipt prices changed.
    pub fn inbound_average(&self, product_id: ProductId, movements: &[ClassifiedMovement]) -> ProductCostState {
        let inbound: Vec<ClassifiedMovement> = movements
            .iter()
            .filter(|m| m.direction == Direction::Inbound)
            .cloned()
            .collect();
        self.fold(product_id, &inbound)
    }

    /// Fold every product found in `movements`.
    pub fn fold_by_product(
        &self,
        movements: &[ClassifiedMovement],
        cutoff: Cutoff,
    ) -> BTreeMap<ProductId, ProductCostState> {
        let mut products: Vec<ProductId> = movements.iter().map(|m| m.record.product_id).collect();
        products.sort();
        products.dedup();
        products
            .into_iter()
            .map(|p| (p, self.fold_as_of(p, movements, cutoff)))
            .collect()
    }

    /// Computed valuation, or the no-history estimate when the product has no
    /// valued movement at all. Historical cutoffs never estimate: a product
    /// without movements before the cutoff simply had nothing on hand.
    pub fn value_or_estimate(
        &self,
        snapshot: &ProductSnapshot,
        movements: &[ClassifiedMovement],
        cutoff: Cutoff,
    ) -> Valuation {
        let has_history = Self::contributing(snapshot.product_id, movements, Cutoff::Unbounded)
            .iter()
            .any(|m| m.direction != Direction::Internal);

        if !has_history && !cutoff.is_historical() {
            return Valuation::Estimated(NoHistoryEstimate::from_snapshot(snapshot));
        }
        Valuation::Computed(self.fold_as_of(snapshot.product_id, movements, cutoff))
    }
}
