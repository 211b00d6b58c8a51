//! Inert adapter for jurisdictions without an automated source.

use async_trait::async_trait;
use land_value_models::{AdapterDescriptor, LandValueRecord};

use crate::LandValueSource;

/// Nationwide BORIS-D portal, the reference for unregistered names.
pub const NATIONAL_PORTAL_URL: &str = "https://www.bodenrichtwerte-boris.de";

/// Adapter that never returns a value and points callers to a portal.
pub struct ManualLookupSource {
    descriptor: AdapterDescriptor,
}

impl ManualLookupSource {
    /// Creates a manual-lookup adapter.
    #[must_use]
    pub fn new(jurisdiction: &str, code: &str, reason: &str, reference_url: &str) -> Self {
        Self {
            descriptor: AdapterDescriptor::fallback(jurisdiction, code, reason, reference_url),
        }
    }

    /// Adapter for a name the router does not know.
    #[must_use]
    pub fn unregistered(name: &str) -> Self {
        Self::new(
            name,
            "",
            &format!("No land value source is registered for '{name}'"),
            NATIONAL_PORTAL_URL,
        )
    }
}

#[async_trait]
impl LandValueSource for ManualLookupSource {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn fetch_value(&self, _lat: f64, _lon: f64) -> Option<LandValueRecord> {
        None
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_returns_a_value_and_is_always_healthy() {
        let source = ManualLookupSource::unregistered("Atlantis");
        assert!(source.fetch_value(52.52, 13.40).await.is_none());
        assert!(source.health_check().await);

        let descriptor = source.descriptor();
        assert!(descriptor.is_fallback);
        assert!(descriptor.reason.as_deref().is_some_and(|r| r.contains("Atlantis")));
        assert_eq!(descriptor.reference_url.as_deref(), Some(NATIONAL_PORTAL_URL));
    }
}
