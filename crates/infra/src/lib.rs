//! Infrastructure layer: backend transports, version adapter, services, config.

pub mod adapter;
pub mod backend;
pub mod config;
pub mod correction;
pub mod ports;
pub mod reconciliation;
pub mod valuation_service;


pub use adapter::{BackendSession, VersionAdapter, VersionProfile};
pub use backend::{BackendTransport, InMemoryBackend, RelayTransport};
pub use config::{ConfigError, Settings};
pub use correction::{CorrectionOutcome, CostingInfo, PriceCorrectionCoordinator};
pub use ports::{Backend, CostWriter, MovementFilter, MovementSource, NewMovement, ProductCatalog, ValuationLedgerEntry};
pub use reconciliation::{AdjustmentFailure, BatchApplyReport, DiscrepancyAnalyzer, ReconciliationReport};
pub use valuation_service::{BatchValuation, ProductValuation, ValuationService};
