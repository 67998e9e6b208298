//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide logging with the format from `STOCKVAL_LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::from_env());
}

/// Tracing configuration (filters, output formats).
pub mod tracing;

pub use crate::tracing::{LogFormat, ParseLogFormatError, init_with};
