//! Inventory valuation domain.
//!
//! Pure, deterministic logic over movement records already fetched from the
//! backend: classification, weighted-average valuation, discrepancy analysis
//! and report export. No IO apart from writing an export to a caller-provided
//! writer.

pub mod classify;
pub mod discrepancy;
pub mod movement;
pub mod report;
pub mod valuation;

pub use classify::{ClassifiedMovement, ClassifierConfig, Direction, MovementClassifier, Resolution};
pub use discrepancy::{
    proposed_adjustments, AdjustmentMove, Discrepancy, DiscrepancyKind, ADJUSTMENT_NOTE,
    DISCREPANCY_EPSILON,
};
pub use movement::{
    CostConfiguration, CostMethod, LocationRole, LocationRoleKind, MovementRecord, MovementStatus,
    ProductSnapshot, ValuationMode,
};
pub use report::{write_report, ExportError, ExportLocale, ReportRow};
pub use valuation::{
    Cutoff, NoHistoryEstimate, ProductCostState, Valuation, ValuationEngine, ValuationStep,
};
