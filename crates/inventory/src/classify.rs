//! Movement direction from location semantics.
//!
//! A location counts as internal storage by, in order of precedence:
//! 1. an explicitly configured internal location id,
//! 2. the backend role tag,
//! 3. a display-name keyword match.
//!
//! The keyword match is a legacy fallback for locations whose role tag is
//! missing. It is fragile (a customer location named "Stock Returns" would
//! match) and can be switched off with [`ClassifierConfig::name_heuristic`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use stockval_core::LocationId;

use crate::movement::{LocationRole, LocationRoleKind, MovementRecord};

/// Valuation-relevant direction of a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
    /// Transfers that neither enter nor leave internal storage. Not valued.
    Internal,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
            Direction::Internal => "internal",
        }
    }
}

/// Which precedence rule decided that a location is (or is not) storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    ConfiguredId,
    RoleTag,
    NameHeuristic,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Location ids that are internal storage regardless of their role tag.
    pub internal_location_ids: HashSet<LocationId>,
    /// Enable the display-name keyword fallback.
    pub name_heuristic: bool,
    /// Lower-case keywords matched against display names.
    pub storage_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            internal_location_ids: HashSet::new(),
            name_heuristic: true,
            storage_keywords: vec!["stock".to_string(), "warehouse".to_string()],
        }
    }
}

impl ClassifierConfig {
    pub fn with_internal_ids(mut self, ids: impl IntoIterator<Item = LocationId>) -> Self {
        self.internal_location_ids.extend(ids);
        self
    }

    pub fn with_name_heuristic(mut self, enabled: bool) -> Self {
        self.name_heuristic = enabled;
        self
    }
}

/// Classifies movements against a fixed set of known locations.
#[derive(Debug, Clone)]
pub struct MovementClassifier {
    config: ClassifierConfig,
    locations: HashMap<LocationId, LocationRole>,
}

impl MovementClassifier {
    pub fn new(config: ClassifierConfig, locations: impl IntoIterator<Item = LocationRole>) -> Self {
        Self {
            config,
            locations: locations.into_iter().map(|l| (l.id, l)).collect(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn location(&self, id: LocationId) -> Option<&LocationRole> {
        self.locations.get(&id)
    }

    /// First location carrying `role`, lowest id first.
    pub fn first_with_role(&self, role: LocationRoleKind) -> Option<LocationId> {
        self.locations
            .values()
            .filter(|l| l.role == Some(role))
            .map(|l| l.id)
            .min()
    }

    /// First location considered internal storage, configured ids first.
    pub fn primary_storage(&self) -> Option<LocationId> {
        self.config
            .internal_location_ids
            .iter()
            .min()
            .copied()
            .or_else(|| self.first_with_role(LocationRoleKind::Internal))
    }

    /// Decide whether `id` is internal storage and which rule decided it.
    pub fn resolve(&self, id: LocationId) -> (bool, Resolution) {
        if self.config.internal_location_ids.contains(&id) {
            return (true, Resolution::ConfiguredId);
        }

        let Some(location) = self.locations.get(&id) else {
            return (false, Resolution::Unresolved);
        };

        if let Some(role) = location.role {
            return (role == LocationRoleKind::Internal, Resolution::RoleTag);
        }

        if self.config.name_heuristic {
            let name = location.display_name.to_lowercase();
            if self
                .config
                .storage_keywords
                .iter()
                .any(|kw| name.contains(kw.as_str()))
            {
                debug!(
                    location_id = %id,
                    display_name = %location.display_name,
                    "location treated as storage by name heuristic"
                );
                return (true, Resolution::NameHeuristic);
            }
        }

        (false, Resolution::Unresolved)
    }

    pub fn is_storage(&self, id: LocationId) -> bool {
        self.resolve(id).0
    }

    pub fn classify(&self, movement: &MovementRecord) -> Direction {
        let source = self.is_storage(movement.source_location_id);
        let dest = self.is_storage(movement.dest_location_id);
        match (source, dest) {
            (false, true) => Direction::Inbound,
            (true, false) => Direction::Outbound,
            _ => Direction::Internal,
        }
    }

    /// Classify every movement, keeping the input order.
    pub fn classify_all(&self, movements: impl IntoIterator<Item = MovementRecord>) -> Vec<ClassifiedMovement> {
        movements
            .into_iter()
            .map(|record| {
                let direction = self.classify(&record);
                ClassifiedMovement { record, direction }
            })
            .collect()
    }
}

/// A movement paired with its direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMovement {
    pub record: MovementRecord,
    pub direction: Direction,
}

impl ClassifiedMovement {
    pub fn new(record: MovementRecord, direction: Direction) -> Self {
        Self { record, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MovementStatus;
    use chrono::{TimeZone, Utc};
    use stockval_core::{MovementId, ProductId};

    const VENDORS: LocationId = LocationId::new(1);
    const STOCK: LocationId = LocationId::new(8);
    const CUSTOMERS: LocationId = LocationId::new(5);
    const SHELF: LocationId = LocationId::new(9);
    const UNTAGGED: LocationId = LocationId::new(30);

    fn locations() -> Vec<LocationRole> {
        vec![
            LocationRole::new(VENDORS, Some(LocationRoleKind::Supplier), "Partners/Vendors"),
            LocationRole::new(STOCK, Some(LocationRoleKind::Internal), "WH/Stock"),
            LocationRole::new(CUSTOMERS, Some(LocationRoleKind::Customer), "Partners/Customers"),
            LocationRole::new(SHELF, Some(LocationRoleKind::Internal), "WH/Stock/Shelf 1"),
            LocationRole::new(UNTAGGED, None, "Overflow Stock"),
        ]
    }

    fn movement(from: LocationId, to: LocationId) -> MovementRecord {
        MovementRecord::new(
            MovementId::new(1),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ProductId::new(1),
            1.0,
            1.0,
            from,
            to,
            MovementStatus::Done,
            "",
        )
        .unwrap()
    }

    #[test]
    fn receipt_issue_and_transfer() {
        let c = MovementClassifier::new(ClassifierConfig::default(), locations());
        assert_eq!(c.classify(&movement(VENDORS, STOCK)), Direction::Inbound);
        assert_eq!(c.classify(&movement(STOCK, CUSTOMERS)), Direction::Outbound);
        assert_eq!(c.classify(&movement(STOCK, SHELF)), Direction::Internal);
        assert_eq!(c.classify(&movement(VENDORS, CUSTOMERS)), Direction::Internal);
    }

    #[test]
    fn configured_id_beats_role_tag() {
        let config = ClassifierConfig::default().with_internal_ids([CUSTOMERS]);
        let c = MovementClassifier::new(config, locations());
        assert_eq!(c.resolve(CUSTOMERS), (true, Resolution::ConfiguredId));
        assert_eq!(c.classify(&movement(VENDORS, CUSTOMERS)), Direction::Inbound);
    }

    #[test]
    fn role_tag_beats_name_heuristic() {
        // "Partners/Vendors Stock" would match the keyword, but the tag says supplier.
        let mut locs = locations();
        locs[0].display_name = "Partners/Vendors Stock".to_string();
        let c = MovementClassifier::new(ClassifierConfig::default(), locs);
        assert_eq!(c.resolve(VENDORS), (false, Resolution::RoleTag));
    }

    #[test]
    fn untagged_location_falls_back_to_name() {
        let c = MovementClassifier::new(ClassifierConfig::default(), locations());
        assert_eq!(c.resolve(UNTAGGED), (true, Resolution::NameHeuristic));

        let strict = MovementClassifier::new(
            ClassifierConfig::default().with_name_heuristic(false),
            locations(),
        );
        assert_eq!(strict.resolve(UNTAGGED), (false, Resolution::Unresolved));
        assert_eq!(strict.classify(&movement(VENDORS, UNTAGGED)), Direction::Internal);
    }

    #[test]
    fn unknown_location_is_not_storage() {
        let c = MovementClassifier::new(ClassifierConfig::default(), locations());
        assert_eq!(c.resolve(LocationId::new(999)), (false, Resolution::Unresolved));
    }

    #[test]
    fn primary_storage_prefers_configured_ids() {
        let c = MovementClassifier::new(ClassifierConfig::default(), locations());
        assert_eq!(c.primary_storage(), Some(STOCK));
        let configured = MovementClassifier::new(
            ClassifierConfig::default().with_internal_ids([LocationId::new(12)]),
            locations(),
        );
        assert_eq!(configured.primary_storage(), Some(LocationId::new(12)));
    }
}
