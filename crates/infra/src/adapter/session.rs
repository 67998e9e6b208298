//! Version detection with an explicit, owned cache.

use tokio::sync::RwLock;
use tracing::info;

use stockval_core::{ValuationError, ValuationResult};

use crate::adapter::profile::{ProfileTable, VersionProfile};
use crate::adapter::version_adapter::VersionAdapter;
use crate::backend::BackendTransport;

/// Resolves the backend's [`VersionProfile`] once and hands out adapters.
///
/// A configured version key bypasses detection. The resolved profile stays
/// cached until [`BackendSession::invalidate`] is called.
#[derive(Debug)]
pub struct BackendSession<T> {
    transport: T,
    profiles: ProfileTable,
    configured_version: Option<String>,
    resolved: RwLock<Option<VersionProfile>>,
}

impl<T> BackendSession<T>
where
    T: BackendTransport + Clone,
{
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            profiles: ProfileTable::builtin(),
            configured_version: None,
            resolved: RwLock::new(None),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.configured_version = Some(version.into());
        self
    }

    pub fn with_profiles(mut self, profiles: ProfileTable) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn profile(&self) -> ValuationResult<VersionProfile> {
        if let Some(profile) = self.resolved.read().await.as_ref() {
            return Ok(profile.clone());
        }

        let mut slot = self.resolved.write().await;
        if let Some(profile) = slot.as_ref() {
            return Ok(profile.clone());
        }

        let version = match &self.configured_version {
            Some(configured) => configured.clone(),
            None => self.transport.server_version().await?,
        };
        let profile = self
            .profiles
            .resolve(&version)
            .ok_or_else(|| ValuationError::validation("no version profiles registered"))?;
        info!(server_version = %version, profile = %profile.version_key, "backend profile resolved");

        *slot = Some(profile.clone());
        Ok(profile)
    }

    pub async fn adapter(&self) -> ValuationResult<VersionAdapter<T>> {
        let profile = self.profile().await?;
        Ok(VersionAdapter::new(self.transport.clone(), profile))
    }

    /// Forget the resolved profile; the next call detects again.
    pub async fn invalidate(&self) {
        *self.resolved.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockval_core::BackendError;

    use crate::backend::{InMemoryBackend, Operation};

    #[tokio::test]
    async fn detected_profile_is_cached_until_invalidated() {
        let backend = Arc::new(InMemoryBackend::new("saas~17.2"));
        let session = BackendSession::new(backend.clone());
        assert_eq!(session.profile().await.unwrap().version_key, "17");

        // Detection no longer works, the cache still answers.
        backend.fail_on(Operation::Version, "", BackendError::unreachable("down"));
        assert_eq!(session.profile().await.unwrap().version_key, "17");

        session.invalidate().await;
        let err = session.profile().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn configured_version_skips_detection() {
        let backend = Arc::new(InMemoryBackend::new("17.0"));
        backend.fail_on(Operation::Version, "", BackendError::unreachable("down"));
        let session = BackendSession::new(backend).with_version("16.0");
        let adapter = session.adapter().await.unwrap();
        assert_eq!(adapter.profile().version_key, "16");
    }

    #[tokio::test]
    async fn unknown_server_version_degrades_to_newest() {
        let session = BackendSession::new(Arc::new(InMemoryBackend::new("19.0")));
        assert_eq!(session.profile().await.unwrap().version_key, "18");
    }
}
