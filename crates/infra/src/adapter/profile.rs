//! Version profiles: per-schema field aliases and capabilities.
//!
//! Backend schema differences are data, not code. A [`VersionProfile`] lists,
//! for every canonical field, the backend field names to try in order; the
//! adapter reads through that chain and never branches on a version number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use stockval_core::LocationId;
use stockval_inventory::LocationRoleKind;

/// Schema-independent name of a field the adapter reads or writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    MovementDate,
    MovementProduct,
    MovementQuantity,
    MovementUnitCost,
    MovementSource,
    MovementDestination,
    MovementStatus,
    MovementReference,
    LocationUsage,
    LocationName,
    ProductCode,
    ProductName,
    ProductQuantity,
    ProductStandardCost,
    ProductCostMethod,
    ProductValuation,
    LedgerMovement,
    LedgerQuantity,
    LedgerUnitCost,
    LedgerValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Movements carry the done quantity in an explicit `quantity` field.
    pub has_explicit_quantity_field: bool,
    /// Movements must be flagged `picked` before validation.
    pub has_picked_flag: bool,
    /// The backend keeps a per-movement valuation ledger.
    pub has_valuation_ledger: bool,
}

/// Backend model names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelNames {
    pub movement: String,
    pub location: String,
    pub product: String,
    pub ledger: String,
}

impl Default for ModelNames {
    fn default() -> Self {
        Self {
            movement: "stock.move".to_string(),
            location: "stock.location".to_string(),
            product: "product.product".to_string(),
            ledger: "stock.valuation.layer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionProfile {
    pub version_key: String,
    pub field_aliases: BTreeMap<CanonicalField, Vec<String>>,
    /// Location roles forced regardless of what the backend declares.
    pub location_id_overrides: BTreeMap<LocationId, LocationRoleKind>,
    pub feature_flags: FeatureFlags,
    pub models: ModelNames,
}

impl VersionProfile {
    /// Candidate names for `field`, most specific first.
    pub fn aliases(&self, field: CanonicalField) -> &[String] {
        self.field_aliases.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Primary backend name of `field`, used for writes and domains.
    pub fn primary(&self, field: CanonicalField) -> Option<&str> {
        self.aliases(field).first().map(String::as_str)
    }

    /// Every backend field any alias chain of `fields` can read.
    pub fn read_fields(&self, fields: &[CanonicalField]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for field in fields {
            for alias in self.aliases(*field) {
                if !names.contains(alias) {
                    names.push(alias.clone());
                }
            }
        }
        names
    }

    pub fn with_location_override(mut self, id: LocationId, role: LocationRoleKind) -> Self {
        self.location_id_overrides.insert(id, role);
        self
    }

    fn base(version_key: &str, quantity_aliases: &[&str], flags: FeatureFlags) -> Self {
        use CanonicalField::*;

        let table: [(CanonicalField, &[&str]); 20] = [
            (MovementDate, &["date", "date_done"]),
            (MovementProduct, &["product_id"]),
            (MovementQuantity, quantity_aliases),
            (MovementUnitCost, &["price_unit"]),
            (MovementSource, &["location_id"]),
            (MovementDestination, &["location_dest_id"]),
            (MovementStatus, &["state"]),
            (MovementReference, &["reference", "picking_id", "origin"]),
            (LocationUsage, &["usage"]),
            (LocationName, &["complete_name", "display_name", "name"]),
            (ProductCode, &["default_code"]),
            (ProductName, &["display_name", "name"]),
            (ProductQuantity, &["qty_available"]),
            (ProductStandardCost, &["standard_price"]),
            (ProductCostMethod, &["cost_method"]),
            (ProductValuation, &["valuation"]),
            (LedgerMovement, &["stock_move_id"]),
            (LedgerQuantity, &["quantity"]),
            (LedgerUnitCost, &["unit_cost"]),
            (LedgerValue, &["value"]),
        ];

        Self {
            version_key: version_key.to_string(),
            field_aliases: table
                .into_iter()
                .map(|(field, names)| (field, names.iter().map(|n| n.to_string()).collect()))
                .collect(),
            location_id_overrides: BTreeMap::new(),
            feature_flags: flags,
            models: ModelNames::default(),
        }
    }

    pub fn v16() -> Self {
        Self::base(
            "16",
            &["quantity_done", "product_uom_qty"],
            FeatureFlags {
                has_explicit_quantity_field: false,
                has_picked_flag: false,
                has_valuation_ledger: true,
            },
        )
    }

    pub fn v17() -> Self {
        Self::base(
            "17",
            &["quantity", "product_uom_qty"],
            FeatureFlags {
                has_explicit_quantity_field: true,
                has_picked_flag: true,
                has_valuation_ledger: true,
            },
        )
    }

    pub fn v18() -> Self {
        Self {
            version_key: "18".to_string(),
            ..Self::v17()
        }
    }
}

/// Reduce a server version string to its major key.
///
/// `"17"`, `"17.0"`, `"17.0+e"` and `"saas~17.2"` all give `"17"`.
pub fn normalize_version_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = trimmed.rsplit('~').next().unwrap_or(trimmed);
    without_prefix
        .chars()
        .take_while(char::is_ascii_digit)
        .collect()
}

/// Known profiles keyed by major version.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    profiles: BTreeMap<u32, VersionProfile>,
}

impl ProfileTable {
    pub fn builtin() -> Self {
        let mut table = Self {
            profiles: BTreeMap::new(),
        };
        table.register(16, VersionProfile::v16());
        table.register(17, VersionProfile::v17());
        table.register(18, VersionProfile::v18());
        table
    }

    pub fn register(&mut self, major: u32, profile: VersionProfile) {
        self.profiles.insert(major, profile);
    }

    pub fn newest(&self) -> Option<&VersionProfile> {
        self.profiles.values().next_back()
    }

    /// Profile for `version`, falling back to the newest known one.
    ///
    /// Returns `None` only when the table is empty.
    pub fn resolve(&self, version: &str) -> Option<VersionProfile> {
        let key = normalize_version_key(version);
        if let Some(profile) = key.parse::<u32>().ok().and_then(|major| self.profiles.get(&major)) {
            return Some(profile.clone());
        }

        let fallback = self.newest()?;
        warn!(
            requested = %version,
            fallback = %fallback.version_key,
            "unknown backend version, degrading to newest known profile"
        );
        Some(fallback.clone())
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::builtin()
    }
}
