//! Backend access driven by a [`VersionProfile`].
//!
//! One adapter serves every supported schema: field names come from the
//! profile's alias chains and optional behavior from its feature flags.
//! Raw records are converted to domain types here and never leave.

use serde_json::{Value as JsonValue, json};
use tracing::{debug, info, warn};

use stockval_core::{
    BackendError, LedgerEntryId, LocationId, MovementId, ProductId, ValuationError, ValuationResult,
};
use stockval_inventory::{
    CostConfiguration, CostMethod, LocationRole, LocationRoleKind, MovementRecord, MovementStatus,
    ProductSnapshot, ValuationMode,
};

use crate::adapter::payload;
use crate::adapter::profile::{CanonicalField, VersionProfile};
use crate::backend::{BackendTransport, Domain, Operator, Record};
use crate::ports::{
    CostWriter, MovementFilter, MovementSource, NewMovement, ProductCatalog, ValuationLedgerEntry,
};

const MOVEMENT_FIELDS: [CanonicalField; 8] = [
    CanonicalField::MovementDate,
    CanonicalField::MovementProduct,
    CanonicalField::MovementQuantity,
    CanonicalField::MovementUnitCost,
    CanonicalField::MovementSource,
    CanonicalField::MovementDestination,
    CanonicalField::MovementStatus,
    CanonicalField::MovementReference,
];

const PRODUCT_FIELDS: [CanonicalField; 4] = [
    CanonicalField::ProductCode,
    CanonicalField::ProductName,
    CanonicalField::ProductQuantity,
    CanonicalField::ProductStandardCost,
];

const LEDGER_FIELDS: [CanonicalField; 4] = [
    CanonicalField::LedgerMovement,
    CanonicalField::LedgerQuantity,
    CanonicalField::LedgerUnitCost,
    CanonicalField::LedgerValue,
];

/// Workflow action that validates a movement.
const VALIDATE_ACTION: &str = "_action_done";

#[derive(Debug, Clone)]
pub struct VersionAdapter<T> {
    transport: T,
    profile: VersionProfile,
}

impl<T> VersionAdapter<T>
where
    T: BackendTransport,
{
    pub fn new(transport: T, profile: VersionProfile) -> Self {
        Self { transport, profile }
    }

    pub fn profile(&self) -> &VersionProfile {
        &self.profile
    }

    fn aliases(&self, field: CanonicalField) -> &[String] {
        self.profile.aliases(field)
    }

    /// Primary backend name of a field the adapter writes or filters on.
    fn field_name(&self, field: CanonicalField) -> ValuationResult<&str> {
        self.profile.primary(field).ok_or_else(|| {
            ValuationError::validation(format!(
                "profile {} has no backend field for {field:?}",
                self.profile.version_key
            ))
        })
    }

    fn movement_domain(&self, filter: &MovementFilter) -> ValuationResult<Domain> {
        let mut domain = Domain::new();
        if let Some(product_id) = filter.product_id {
            domain = domain.field_eq(self.field_name(CanonicalField::MovementProduct)?, product_id.get());
        }
        if let Some(status) = filter.status {
            domain = domain.field_eq(self.field_name(CanonicalField::MovementStatus)?, status.as_str());
        }
        let date_field = self.field_name(CanonicalField::MovementDate)?;
        if let Some(from) = filter.date_from {
            domain = domain.with(date_field, Operator::Gte, payload::format_datetime(from));
        }
        if let Some(to) = filter.date_to {
            domain = domain.with(date_field, Operator::Lte, payload::format_datetime(to));
        }
        Ok(domain)
    }

    /// Convert one movement record. Records lacking an identity, product,
    /// date or location are skipped; other gaps take defaults.
    fn movement_from_record(&self, record: &Record) -> Option<MovementRecord> {
        let id = record.get("id").and_then(JsonValue::as_i64)?;
        let product_id = payload::m2o_id(record, self.aliases(CanonicalField::MovementProduct))?;
        let timestamp = payload::datetime_field(record, self.aliases(CanonicalField::MovementDate))?;
        let source = payload::m2o_id(record, self.aliases(CanonicalField::MovementSource))?;
        let dest = payload::m2o_id(record, self.aliases(CanonicalField::MovementDestination))?;

        let quantity = payload::f64_field(record, self.aliases(CanonicalField::MovementQuantity)).unwrap_or(0.0);
        let unit_cost = payload::f64_field(record, self.aliases(CanonicalField::MovementUnitCost)).unwrap_or(0.0);
        let reference = payload::string_field(record, self.aliases(CanonicalField::MovementReference)).unwrap_or_default();
        let raw_status = payload::string_field(record, self.aliases(CanonicalField::MovementStatus)).unwrap_or_default();
        let status = MovementStatus::parse(&raw_status).unwrap_or_else(|| {
            debug!(movement_id = id, status = %raw_status, "unknown movement status, treating as draft");
            MovementStatus::Draft
        });

        let built = MovementRecord::new(
            MovementId::new(id),
            timestamp,
            ProductId::new(product_id),
            quantity,
            unit_cost,
            LocationId::new(source),
            LocationId::new(dest),
            status,
            reference,
        );
        match built {
            Ok(movement) => {
                let label = payload::m2o_label(record, self.aliases(CanonicalField::MovementProduct));
                Some(movement.with_product_label(None, label))
            }
            Err(err) => {
                warn!(movement_id = id, error = %err, "skipping invalid movement record");
                None
            }
        }
    }

    pub async fn fetch_movements(&self, filter: &MovementFilter) -> ValuationResult<Vec<MovementRecord>> {
        let domain = self.movement_domain(filter)?;
        let fields = self.profile.read_fields(&MOVEMENT_FIELDS);
        let records = self
            .transport
            .search_read(&self.profile.models.movement, &domain, &fields, filter.limit)
            .await?;

        let total = records.len();
        let movements: Vec<MovementRecord> = records.iter().filter_map(|r| self.movement_from_record(r)).collect();
        if movements.len() < total {
            warn!(
                fetched = total,
                usable = movements.len(),
                "some movement records lacked required fields"
            );
        }
        debug!(count = movements.len(), profile = %self.profile.version_key, "fetched movements");
        Ok(movements)
    }

    pub async fn fetch_movement(&self, id: MovementId) -> ValuationResult<Option<MovementRecord>> {
        let domain = Domain::new().field_eq("id", id.get());
        let fields = self.profile.read_fields(&MOVEMENT_FIELDS);
        let records = self
            .transport
            .search_read(&self.profile.models.movement, &domain, &fields, Some(1))
            .await?;
        Ok(records.first().and_then(|r| self.movement_from_record(r)))
    }

    pub async fn fetch_locations(&self) -> ValuationResult<Vec<LocationRole>> {
        let fields = self
            .profile
            .read_fields(&[CanonicalField::LocationUsage, CanonicalField::LocationName]);
        let records = self
            .transport
            .search_read(&self.profile.models.location, &Domain::new(), &fields, None)
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                let id = LocationId::new(record.get("id").and_then(JsonValue::as_i64)?);
                let role = match self.profile.location_id_overrides.get(&id) {
                    Some(forced) => Some(*forced),
                    None => payload::string_field(record, self.aliases(CanonicalField::LocationUsage))
                        .and_then(|usage| LocationRoleKind::from_usage(&usage)),
                };
                let name = payload::string_field(record, self.aliases(CanonicalField::LocationName)).unwrap_or_default();
                Some(LocationRole::new(id, role, name))
            })
            .collect())
    }

    pub async fn fetch_products(&self, ids: &[ProductId]) -> ValuationResult<Vec<ProductSnapshot>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let domain = Domain::new().with("id", Operator::In, json!(raw_ids));
        let fields = self.profile.read_fields(&PRODUCT_FIELDS);
        let records = self
            .transport
            .search_read(&self.profile.models.product, &domain, &fields, None)
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                let id = record.get("id").and_then(JsonValue::as_i64)?;
                Some(ProductSnapshot {
                    product_id: ProductId::new(id),
                    code: payload::string_field(record, self.aliases(CanonicalField::ProductCode)).unwrap_or_default(),
                    name: payload::string_field(record, self.aliases(CanonicalField::ProductName)).unwrap_or_default(),
                    reported_quantity: payload::f64_field(record, self.aliases(CanonicalField::ProductQuantity))
                        .unwrap_or(0.0),
                    standard_cost: payload::f64_field(record, self.aliases(CanonicalField::ProductStandardCost))
                        .unwrap_or(0.0),
                })
            })
            .collect())
    }

    /// Cost method and valuation mode of a product. Absent values read as
    /// the backend defaults (`standard`, `manual_periodic`).
    pub async fn fetch_cost_configuration(&self, product_id: ProductId) -> ValuationResult<CostConfiguration> {
        let domain = Domain::new().field_eq("id", product_id.get());
        let fields = self
            .profile
            .read_fields(&[CanonicalField::ProductCostMethod, CanonicalField::ProductValuation]);
        let records = self
            .transport
            .search_read(&self.profile.models.product, &domain, &fields, Some(1))
            .await?;
        let record = records
            .first()
            .ok_or_else(|| ValuationError::not_found("product", product_id))?;

        let method = payload::string_field(record, self.aliases(CanonicalField::ProductCostMethod))
            .map_or(CostMethod::Standard, |raw| CostMethod::parse(&raw));
        let mode = payload::string_field(record, self.aliases(CanonicalField::ProductValuation))
            .map_or(ValuationMode::Manual, |raw| ValuationMode::parse(&raw));
        Ok(CostConfiguration {
            cost_method: method,
            valuation_mode: mode,
        })
    }

    pub async fn find_valuation_entry(&self, movement_id: MovementId) -> ValuationResult<Option<ValuationLedgerEntry>> {
        if !self.profile.feature_flags.has_valuation_ledger {
            return Ok(None);
        }
        let domain = Domain::new().field_eq(self.field_name(CanonicalField::LedgerMovement)?, movement_id.get());
        let fields = self.profile.read_fields(&LEDGER_FIELDS);
        let records = self
            .transport
            .search_read(&self.profile.models.ledger, &domain, &fields, Some(1))
            .await?;

        let Some(record) = records.first() else {
            return Ok(None);
        };
        let id = record
            .get("id")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| BackendError::malformed("valuation entry without id"))?;
        Ok(Some(ValuationLedgerEntry {
            id: LedgerEntryId::new(id),
            movement_id,
            quantity: payload::f64_field(record, self.aliases(CanonicalField::LedgerQuantity)).unwrap_or(0.0),
            unit_cost: payload::f64_field(record, self.aliases(CanonicalField::LedgerUnitCost)).unwrap_or(0.0),
            value: payload::f64_field(record, self.aliases(CanonicalField::LedgerValue)).unwrap_or(0.0),
        }))
    }

    /// Create a movement and validate it so it counts as done.
    pub async fn create_movement(&self, data: NewMovement) -> ValuationResult<MovementId> {
        if !data.quantity.is_finite() || data.quantity < 0.0 {
            return Err(ValuationError::validation(format!(
                "movement quantity must be a finite value >= 0 (got {})",
                data.quantity
            )));
        }

        let mut values = Record::new();
        values.insert(self.field_name(CanonicalField::MovementProduct)?.to_string(), json!(data.product_id.get()));
        values.insert(self.field_name(CanonicalField::MovementQuantity)?.to_string(), json!(data.quantity));
        values.insert("product_uom_qty".to_string(), json!(data.quantity));
        values.insert(self.field_name(CanonicalField::MovementUnitCost)?.to_string(), json!(data.unit_cost));
        values.insert(
            self.field_name(CanonicalField::MovementSource)?.to_string(),
            json!(data.source_location_id.get()),
        );
        values.insert(
            self.field_name(CanonicalField::MovementDestination)?.to_string(),
            json!(data.dest_location_id.get()),
        );
        values.insert("name".to_string(), json!(data.reference));
        values.insert("origin".to_string(), json!(data.reference));
        if let Some(at) = data.timestamp {
            values.insert(
                self.field_name(CanonicalField::MovementDate)?.to_string(),
                json!(payload::format_datetime(at)),
            );
        }
        if self.profile.feature_flags.has_picked_flag {
            values.insert("picked".to_string(), json!(true));
        }

        let model = &self.profile.models.movement;
        let id = self
            .transport
            .create(model, values)
            .await
            .map_err(ValuationError::write_failed)?;
        self.transport
            .call_method(model, VALIDATE_ACTION, &[id])
            .await
            .map_err(ValuationError::write_failed)?;

        info!(movement_id = id, product_id = %data.product_id, quantity = data.quantity, "movement created and validated");
        Ok(MovementId::new(id))
    }

    pub async fn patch_movement_cost(&self, id: MovementId, unit_cost: f64) -> ValuationResult<()> {
        let mut values = Record::new();
        values.insert(self.field_name(CanonicalField::MovementUnitCost)?.to_string(), json!(unit_cost));
        self.transport
            .write(&self.profile.models.movement, &[id.get()], values)
            .await
            .map_err(ValuationError::write_failed)
    }

    pub async fn patch_valuation_entry(&self, id: LedgerEntryId, unit_cost: f64, value: f64) -> ValuationResult<()> {
        let mut values = Record::new();
        values.insert(self.field_name(CanonicalField::LedgerUnitCost)?.to_string(), json!(unit_cost));
        values.insert(self.field_name(CanonicalField::LedgerValue)?.to_string(), json!(value));
        self.transport
            .write(&self.profile.models.ledger, &[id.get()], values)
            .await
            .map_err(ValuationError::write_failed)
    }

    pub async fn patch_product_standard_cost(&self, product_id: ProductId, cost: f64) -> ValuationResult<()> {
        let mut values = Record::new();
        values.insert(self.field_name(CanonicalField::ProductStandardCost)?.to_string(), json!(cost));
        self.transport
            .write(&self.profile.models.product, &[product_id.get()], values)
            .await
            .map_err(ValuationError::write_failed)
    }
}

#[async_trait::async_trait]
impl<T> MovementSource for VersionAdapter<T>
where
    T: BackendTransport,
{
    async fn fetch_movements(&self, filter: &MovementFilter) -> ValuationResult<Vec<MovementRecord>> {
        VersionAdapter::fetch_movements(self, filter).await
    }

    async fn fetch_movement(&self, id: MovementId) -> ValuationResult<Option<MovementRecord>> {
        VersionAdapter::fetch_movement(self, id).await
    }

    async fn fetch_locations(&self) -> ValuationResult<Vec<LocationRole>> {
        VersionAdapter::fetch_locations(self).await
    }
}

#[async_trait::async_trait]
impl<T> ProductCatalog for VersionAdapter<T>
where
    T: BackendTransport,
{
    async fn fetch_products(&self, ids: &[ProductId]) -> ValuationResult<Vec<ProductSnapshot>> {
        VersionAdapter::fetch_products(self, ids).await
    }

    async fn fetch_cost_configuration(&self, product_id: ProductId) -> ValuationResult<CostConfiguration> {
        VersionAdapter::fetch_cost_configuration(self, product_id).await
    }

    async fn find_valuation_entry(&self, movement_id: MovementId) -> ValuationResult<Option<ValuationLedgerEntry>> {
        VersionAdapter::find_valuation_entry(self, movement_id).await
    }
}

#[async_trait::async_trait]
impl<T> CostWriter for VersionAdapter<T>
where
    T: BackendTransport,
{
    async fn patch_movement_unit_cost(&self, id: MovementId, unit_cost: f64) -> ValuationResult<()> {
        self.patch_movement_cost(id, unit_cost).await
    }

    async fn patch_product_standard_cost(&self, product_id: ProductId, cost: f64) -> ValuationResult<()> {
        VersionAdapter::patch_product_standard_cost(self, product_id, cost).await
    }

    async fn create_adjustment_movement(&self, movement: NewMovement) -> ValuationResult<MovementId> {
        self.create_movement(movement).await
    }

    async fn patch_valuation_ledger_entry(&self, id: LedgerEntryId, unit_cost: f64, value: f64) -> ValuationResult<()> {
        self.patch_valuation_entry(id, unit_cost, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::backend::InMemoryBackend;

    fn record(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn seeded(version: &str) -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new(version));
        backend.insert(
            "stock.location",
            record(json!({"id": 4, "usage": "supplier", "complete_name": "Partners/Vendors"})),
        );
        backend.insert(
            "stock.location",
            record(json!({"id": 8, "usage": "internal", "complete_name": "WH/Stock"})),
        );
        backend.insert(
            "stock.location",
            record(json!({"id": 20, "usage": "view", "name": "Back Warehouse"})),
        );
        backend
    }

    #[tokio::test]
    async fn v16_reads_quantity_done() {
        let backend = seeded("16.0");
        backend.insert(
            "stock.move",
            record(json!({
                "id": 1, "product_id": [7, "[WID] Widget"], "quantity_done": 12.0, "product_uom_qty": 15.0,
                "price_unit": 3.5, "location_id": [4, "Vendors"], "location_dest_id": [8, "WH/Stock"],
                "state": "done", "date": "2024-01-05 09:00:00", "picking_id": [2, "WH/IN/00002"]
            })),
        );
        let adapter = VersionAdapter::new(backend, VersionProfile::v16());

        let moves = adapter.fetch_movements(&MovementFilter::done_for(ProductId::new(7))).await.unwrap();
        assert_eq!(moves.len(), 1);
        let m = &moves[0];
        assert_eq!(m.quantity, 12.0);
        assert_eq!(m.unit_cost, 3.5);
        assert_eq!(m.reference, "WH/IN/00002");
        assert_eq!(m.timestamp, Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap());
        assert_eq!(m.product_name.as_deref(), Some("[WID] Widget"));
        assert!(m.is_done());
    }

    #[tokio::test]
    async fn records_without_required_fields_are_skipped() {
        let backend = seeded("17.0");
        backend.insert(
            "stock.move",
            record(json!({"id": 1, "product_id": [7, "W"], "quantity": 1.0, "state": "done",
                          "location_id": 4, "location_dest_id": 8})),
        );
        let adapter = VersionAdapter::new(backend, VersionProfile::v17());
        let moves = adapter.fetch_movements(&MovementFilter::default()).await.unwrap();
        assert!(moves.is_empty());
    }

    #[tokio::test]
    async fn locations_map_usage_and_overrides() {
        let backend = seeded("17.0");
        let profile = VersionProfile::v17().with_location_override(LocationId::new(20), LocationRoleKind::Internal);
        let adapter = VersionAdapter::new(backend, profile);

        let mut locations = adapter.fetch_locations().await.unwrap();
        locations.sort_by_key(|l| l.id);
        assert_eq!(locations[0].role, Some(LocationRoleKind::Supplier));
        assert_eq!(locations[1].display_name, "WH/Stock");
        assert_eq!(locations[2].role, Some(LocationRoleKind::Internal));
        assert_eq!(locations[2].display_name, "Back Warehouse");
    }

    #[tokio::test]
    async fn create_writes_profile_fields_and_validates() {
        for (version, profile, qty_field, picked) in [
            ("16.0", VersionProfile::v16(), "quantity_done", false),
            ("17.0", VersionProfile::v17(), "quantity", true),
        ] {
            let backend = seeded(version);
            let adapter = VersionAdapter::new(backend.clone(), profile);
            let id = adapter
                .create_movement(NewMovement {
                    product_id: ProductId::new(7),
                    quantity: 5.0,
                    unit_cost: 2.0,
                    source_location_id: LocationId::new(14),
                    dest_location_id: LocationId::new(8),
                    reference: "reconciliation".to_string(),
                    timestamp: None,
                })
                .await
                .unwrap();

            let stored = backend.record("stock.move", id.get()).unwrap();
            assert_eq!(stored[qty_field], json!(5.0));
            assert_eq!(stored["state"], json!("done"));
            assert_eq!(stored.get("picked").is_some(), picked, "{version}");
        }
    }

    #[tokio::test]
    async fn ledger_lookup_and_cost_configuration() {
        let backend = seeded("17.0");
        backend.insert(
            "stock.valuation.layer",
            record(json!({"id": 30, "stock_move_id": [1, "WH/IN/00001"], "quantity": 100.0, "unit_cost": 10.0, "value": 1000.0})),
        );
        backend.insert(
            "product.product",
            record(json!({"id": 7, "cost_method": "average", "valuation": "real_time"})),
        );
        let adapter = VersionAdapter::new(backend, VersionProfile::v17());

        let entry = adapter.find_valuation_entry(MovementId::new(1)).await.unwrap().unwrap();
        assert_eq!(entry.id, LedgerEntryId::new(30));
        assert_eq!(entry.value, 1000.0);
        assert!(adapter.find_valuation_entry(MovementId::new(2)).await.unwrap().is_none());

        let config = adapter.fetch_cost_configuration(ProductId::new(7)).await.unwrap();
        assert!(config.backend_recomputes_cost());

        let err = adapter.fetch_cost_configuration(ProductId::new(99)).await.unwrap_err();
        assert!(matches!(err, ValuationError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn transport_failures_on_writes_are_write_errors() {
        let backend = seeded("17.0");
        backend.fail_on(
            crate::backend::Operation::Write,
            "stock.move",
            BackendError::unreachable("relay down"),
        );
        let adapter = VersionAdapter::new(backend, VersionProfile::v17());
        let err = adapter.patch_movement_cost(MovementId::new(1), 4.0).await.unwrap_err();
        assert!(matches!(err, ValuationError::BackendWrite(_)));
        assert!(err.is_retryable());
    }
}
