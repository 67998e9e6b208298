//! Ports the services depend on.
//!
//! The version adapter implements all of them over a [`crate::backend::BackendTransport`];
//! tests may implement them directly. Reads fail with
//! [`stockval_core::ValuationError::Backend`], writes with
//! [`stockval_core::ValuationError::BackendWrite`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockval_core::{LedgerEntryId, LocationId, MovementId, ProductId, ValuationResult};
use stockval_inventory::{CostConfiguration, LocationRole, MovementRecord, MovementStatus, ProductSnapshot};

/// Server-side restriction of a movement fetch. All fields are optional and
/// combine conjunctively. Result order is not guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub status: Option<MovementStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl MovementFilter {
    /// Every done movement of one product.
    pub fn done_for(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            status: Some(MovementStatus::Done),
            ..Self::default()
        }
    }
}

/// Data of a movement to create and validate on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    /// Non-negative; direction comes from the locations.
    pub quantity: f64,
    pub unit_cost: f64,
    pub source_location_id: LocationId,
    pub dest_location_id: LocationId,
    pub reference: String,
    /// Backend assigns "now" when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Backend valuation-ledger entry of one movement.
///
/// `value` is signed: positive for receipts, negative for issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationLedgerEntry {
    pub id: LedgerEntryId,
    pub movement_id: MovementId,
    pub quantity: f64,
    pub unit_cost: f64,
    pub value: f64,
}

#[async_trait::async_trait]
pub trait MovementSource: Send + Sync {
    async fn fetch_movements(&self, filter: &MovementFilter) -> ValuationResult<Vec<MovementRecord>>;

    async fn fetch_movement(&self, id: MovementId) -> ValuationResult<Option<MovementRecord>>;

    async fn fetch_locations(&self) -> ValuationResult<Vec<LocationRole>>;
}

#[async_trait::async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Snapshots of the requested products; unknown ids are omitted.
    async fn fetch_products(&self, ids: &[ProductId]) -> ValuationResult<Vec<ProductSnapshot>>;

    async fn fetch_cost_configuration(&self, product_id: ProductId) -> ValuationResult<CostConfiguration>;

    async fn find_valuation_entry(&self, movement_id: MovementId) -> ValuationResult<Option<ValuationLedgerEntry>>;
}

#[async_trait::async_trait]
pub trait CostWriter: Send + Sync {
    async fn patch_movement_unit_cost(&self, id: MovementId, unit_cost: f64) -> ValuationResult<()>;

    async fn patch_product_standard_cost(&self, product_id: ProductId, cost: f64) -> ValuationResult<()>;

    /// Create and validate a movement, returning its id.
    async fn create_adjustment_movement(&self, movement: NewMovement) -> ValuationResult<MovementId>;

    async fn patch_valuation_ledger_entry(&self, id: LedgerEntryId, unit_cost: f64, value: f64) -> ValuationResult<()>;
}

/// Everything the services need from a backend.
pub trait Backend: MovementSource + ProductCatalog + CostWriter {}

impl<T> Backend for T where T: MovementSource + ProductCatalog + CostWriter {}

#[async_trait::async_trait]
impl<T> MovementSource for Arc<T>
where
    T: MovementSource + ?Sized,
{
    async fn fetch_movements(&self, filter: &MovementFilter) -> ValuationResult<Vec<MovementRecord>> {
        (**self).fetch_movements(filter).await
    }

    async fn fetch_movement(&self, id: MovementId) -> ValuationResult<Option<MovementRecord>> {
        (**self).fetch_movement(id).await
    }

    async fn fetch_locations(&self) -> ValuationResult<Vec<LocationRole>> {
        (**self).fetch_locations().await
    }
}

#[async_trait::async_trait]
impl<T> ProductCatalog for Arc<T>
where
    T: ProductCatalog + ?Sized,
{
    async fn fetch_products(&self, ids: &[ProductId]) -> ValuationResult<Vec<ProductSnapshot>> {
        (**self).fetch_products(ids).await
    }

    async fn fetch_cost_configuration(&self, product_id: ProductId) -> ValuationResult<CostConfiguration> {
        (**self).fetch_cost_configuration(product_id).await
    }

    async fn find_valuation_entry(&self, movement_id: MovementId) -> ValuationResult<Option<ValuationLedgerEntry>> {
        (**self).find_valuation_entry(movement_id).await
    }
}

#[async_trait::async_trait]
impl<T> CostWriter for Arc<T>
where
    T: CostWriter + ?Sized,
{
    async fn patch_movement_unit_cost(&self, id: MovementId, unit_cost: f64) -> ValuationResult<()> {
        (**self).patch_movement_unit_cost(id, unit_cost).await
    }

    async fn patch_product_standard_cost(&self, product_id: ProductId, cost: f64) -> ValuationResult<()> {
        (**self).patch_product_standard_cost(product_id, cost).await
    }

    async fn create_adjustment_movement(&self, movement: NewMovement) -> ValuationResult<MovementId> {
        (**self).create_adjustment_movement(movement).await
    }

    async fn patch_valuation_ledger_entry(&self, id: LedgerEntryId, unit_cost: f64, value: f64) -> ValuationResult<()> {
        (**self).patch_valuation_ledger_entry(id, unit_cost, value).await
    }
}
