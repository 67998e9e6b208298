//! Version-aware access to the backend.

pub mod payload;
pub mod profile;
pub mod session;
pub mod version_adapter;

pub use profile::{CanonicalField, FeatureFlags, ModelNames, ProfileTable, VersionProfile, normalize_version_key};
pub use session::BackendSession;
pub use version_adapter::VersionAdapter;
