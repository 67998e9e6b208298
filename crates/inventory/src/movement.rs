use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockval_core::{LocationId, MovementId, ProductId, ValuationError, ValuationResult};

/// Lifecycle status of a stock movement on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementStatus {
    Draft,
    Confirmed,
    Assigned,
    Done,
    Cancelled,
}

impl MovementStatus {
    /// Backend spelling of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            MovementStatus::Draft => "draft",
            MovementStatus::Confirmed => "confirmed",
            MovementStatus::Assigned => "assigned",
            MovementStatus::Done => "done",
            MovementStatus::Cancelled => "cancel",
        }
    }

    /// Parse a backend status tag. Older schemas spell cancellation `cancel`;
    /// `waiting` and `partially_available` are reservation states and map to
    /// `Confirmed` / `Assigned`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "draft" => Some(MovementStatus::Draft),
            "confirmed" | "waiting" => Some(MovementStatus::Confirmed),
            "assigned" | "partially_available" => Some(MovementStatus::Assigned),
            "done" => Some(MovementStatus::Done),
            "cancel" | "cancelled" => Some(MovementStatus::Cancelled),
            _ => None,
        }
    }
}

/// Canonical stock movement, independent of the backend schema version.
///
/// Quantity is always non-negative. Direction is derived from the locations,
/// see [`crate::classify::MovementClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub id: MovementId,
    pub timestamp: DateTime<Utc>,
    pub product_id: ProductId,
    pub quantity: f64,
    pub unit_cost: f64,
    pub source_location_id: LocationId,
    pub dest_location_id: LocationId,
    pub status: MovementStatus,
    pub reference: String,
    /// Display name, when the payload carried one.
    pub product_name: Option<String>,
    /// Internal reference / SKU, when the payload carried one.
    pub product_code: Option<String>,
}

impl MovementRecord {
    /// Build a record, rejecting negative or non-finite quantities and costs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MovementId,
        timestamp: DateTime<Utc>,
        product_id: ProductId,
        quantity: f64,
        unit_cost: f64,
        source_location_id: LocationId,
        dest_location_id: LocationId,
        status: MovementStatus,
        reference: impl Into<String>,
    ) -> ValuationResult<Self> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(ValuationError::validation(format!(
                "movement {id}: quantity must be a finite value >= 0 (got {quantity})"
            )));
        }
        if !unit_cost.is_finite() {
            return Err(ValuationError::validation(format!(
                "movement {id}: unit cost must be finite"
            )));
        }
        Ok(Self {
            id,
            timestamp,
            product_id,
            quantity,
            unit_cost,
            source_location_id,
            dest_location_id,
            status,
            reference: reference.into(),
            product_name: None,
            product_code: None,
        })
    }

    pub fn with_product_label(mut self, code: Option<String>, name: Option<String>) -> Self {
        self.product_code = code;
        self.product_name = name;
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == MovementStatus::Done
    }
}

/// Role a backend declares for a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationRoleKind {
    Supplier,
    Internal,
    Customer,
    Transit,
    Production,
    InventoryAdjustment,
}

impl LocationRoleKind {
    /// Map a backend usage tag. Unknown tags (`view`, custom usages) yield `None`.
    pub fn from_usage(usage: &str) -> Option<Self> {
        match usage.trim() {
            "supplier" => Some(LocationRoleKind::Supplier),
            "internal" => Some(LocationRoleKind::Internal),
            "customer" => Some(LocationRoleKind::Customer),
            "transit" => Some(LocationRoleKind::Transit),
            "production" => Some(LocationRoleKind::Production),
            "inventory" | "inventory_adjustment" => Some(LocationRoleKind::InventoryAdjustment),
            _ => None,
        }
    }
}

/// A location with its backend-declared role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRole {
    pub id: LocationId,
    pub role: Option<LocationRoleKind>,
    pub display_name: String,
}

impl LocationRole {
    pub fn new(id: LocationId, role: Option<LocationRoleKind>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            role,
            display_name: display_name.into(),
        }
    }
}

/// What the backend currently reports for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    /// On-hand quantity as computed by the backend.
    pub reported_quantity: f64,
    /// The product's authoritative cost field.
    pub standard_cost: f64,
}

/// Costing strategy configured on the backend for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostMethod {
    Standard,
    Fifo,
    Average,
    Other(String),
}

impl CostMethod {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "standard" => CostMethod::Standard,
            "fifo" => CostMethod::Fifo,
            "average" => CostMethod::Average,
            other => CostMethod::Other(other.to_string()),
        }
    }
}

/// When the backend books valuation entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMode {
    Manual,
    RealTime,
    Other(String),
}

impl ValuationMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "manual" | "manual_periodic" => ValuationMode::Manual,
            "real_time" => ValuationMode::RealTime,
            other => ValuationMode::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostConfiguration {
    pub cost_method: CostMethod,
    pub valuation_mode: ValuationMode,
}

impl CostConfiguration {
    /// Under moving-average + real-time valuation the backend recomputes the
    /// product cost from its own ledger entries, so the core must not push one.
    pub fn backend_recomputes_cost(&self) -> bool {
        self.cost_method == CostMethod::Average && self.valuation_mode == ValuationMode::RealTime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let err = MovementRecord::new(
            MovementId::new(1),
            at(),
            ProductId::new(1),
            -3.0,
            10.0,
            LocationId::new(1),
            LocationId::new(2),
            MovementStatus::Done,
            "WH/IN/0001",
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::Validation(_)));
    }

    #[test]
    fn status_parsing_accepts_backend_spellings() {
        assert_eq!(MovementStatus::parse("cancel"), Some(MovementStatus::Cancelled));
        assert_eq!(MovementStatus::parse("partially_available"), Some(MovementStatus::Assigned));
        assert_eq!(MovementStatus::parse("done"), Some(MovementStatus::Done));
        assert_eq!(MovementStatus::parse("exploded"), None);
    }

    #[test]
    fn only_average_real_time_is_backend_recomputed() {
        let cfg = |m: &str, v: &str| CostConfiguration {
            cost_method: CostMethod::parse(m),
            valuation_mode: ValuationMode::parse(v),
        };
        assert!(cfg("average", "real_time").backend_recomputes_cost());
        assert!(!cfg("average", "manual_periodic").backend_recomputes_cost());
        assert!(!cfg("standard", "real_time").backend_recomputes_cost());
        assert!(!cfg("fifo", "real_time").backend_recomputes_cost());
    }

    #[test]
    fn usage_tags_map_to_roles() {
        assert_eq!(LocationRoleKind::from_usage("inventory"), Some(LocationRoleKind::InventoryAdjustment));
        assert_eq!(LocationRoleKind::from_usage("internal"), Some(LocationRoleKind::Internal));
        assert_eq!(LocationRoleKind::from_usage("view"), None);
    }
}
