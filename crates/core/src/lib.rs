//! `stockval-core`: shared building blocks of the valuation core.
//!
//! Identifiers, the error taxonomy and inconsistency warnings. No IO.

pub mod error;
pub mod id;
pub mod warning;

pub use error::{BackendError, BackendErrorKind, ValuationError, ValuationResult};
pub use id::{LedgerEntryId, LocationId, MovementId, ProductId};
pub use warning::InconsistencyWarning;
