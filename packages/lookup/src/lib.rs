#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Land value lookup service.
//!
//! Ties the cache, the jurisdiction router and the adapters together and
//! reduces every lookup to one of three outcomes: a record, "not found at
//! these coordinates", or "no automated source, look it up here".

use futures::StreamExt as _;
use land_value_cache::{CacheError, LandValueCache};
use land_value_models::{AdapterDescriptor, LandValueRecord};
use land_value_source::{JurisdictionRouter, LandValueSource, http::HEALTH_TIMEOUT};
use serde::Serialize;

/// Adapters probed at the same time by [`LookupService::health_report`].
const HEALTH_CONCURRENCY: usize = 8;

/// Errors surfaced by the lookup service.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The cache could not be opened.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Coordinates outside the WGS84 range.
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates {
        /// Requested latitude.
        lat: f64,
        /// Requested longitude.
        lon: f64,
    },
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LookupOutcome {
    /// A positive land value.
    #[serde(rename_all = "camelCase")]
    Found {
        /// The record.
        record: LandValueRecord,
        /// Whether the record came from the cache.
        cached: bool,
    },
    /// The jurisdiction has a source but no value covers the point.
    NotFound,
    /// No automated source exists for the jurisdiction.
    #[serde(rename_all = "camelCase")]
    ManualLookup {
        /// Why no automated lookup is possible.
        reason: String,
        /// Where to look the value up by hand.
        reference_url: String,
    },
}

/// Health of one registered adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterHealth {
    /// Adapter identity.
    pub descriptor: AdapterDescriptor,
    /// Whether the upstream answered the probe.
    pub healthy: bool,
}

/// Cache → router → adapter → cache orchestration.
pub struct LookupService {
    router: JurisdictionRouter,
    cache: Option<LandValueCache>,
}

impl LookupService {
    /// Creates a service over `router`, optionally backed by `cache`.
    #[must_use]
    pub const fn new(router: JurisdictionRouter, cache: Option<LandValueCache>) -> Self {
        Self { router, cache }
    }

    /// Creates a service over every embedded jurisdiction and the cache
    /// configured through the environment.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Cache`] if the cache cannot be opened.
    pub fn from_env() -> Result<Self, LookupError> {
        let cache = LandValueCache::open_default()?;
        Ok(Self::new(JurisdictionRouter::new(), Some(cache)))
    }

    /// The jurisdiction router.
    #[must_use]
    pub const fn router(&self) -> &JurisdictionRouter {
        &self.router
    }

    /// The cache, if any.
    #[must_use]
    pub const fn cache(&self) -> Option<&LandValueCache> {
        self.cache.as_ref()
    }

    /// Looks up the land value at a WGS84 point, consulting the cache
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidCoordinates`] for coordinates outside
    /// the WGS84 range. Upstream and cache failures never surface here.
    pub async fn lookup(
        &self,
        lat: f64,
        lon: f64,
        jurisdiction: &str,
    ) -> Result<LookupOutcome, LookupError> {
        self.run(lat, lon, jurisdiction, true).await
    }

    /// Like [`Self::lookup`] but skips the cache read. Successful results
    /// are still written.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::InvalidCoordinates`] for coordinates outside
    /// the WGS84 range.
    pub async fn lookup_uncached(
        &self,
        lat: f64,
        lon: f64,
        jurisdiction: &str,
    ) -> Result<LookupOutcome, LookupError> {
        self.run(lat, lon, jurisdiction, false).await
    }

    async fn run(
        &self,
        lat: f64,
        lon: f64,
        jurisdiction: &str,
        read_cache: bool,
    ) -> Result<LookupOutcome, LookupError> {
        validate(lat, lon)?;

        let source = self.router.resolve(jurisdiction);
        let descriptor = source.descriptor().clone();
        let key = self.cache.as_ref().map(|cache| cache.key(lat, lon));

        if read_cache
            && let Some(record) = self.cached(key.as_deref(), &descriptor)
        {
            return Ok(LookupOutcome::Found {
                record,
                cached: true,
            });
        }

        let Some(record) = source
            .fetch_value(lat, lon)
            .await
            .filter(LandValueRecord::has_positive_value)
        else {
            return Ok(miss(descriptor));
        };

        if let (Some(cache), Some(key)) = (&self.cache, &key)
            && let Err(e) = cache.set(key, &record)
        {
            log::warn!("[{}] Failed to cache {key}: {e}", descriptor.code);
        }

        Ok(LookupOutcome::Found {
            record,
            cached: false,
        })
    }

    /// Reads a cached record belonging to the resolved jurisdiction.
    fn cached(
        &self,
        key: Option<&str>,
        descriptor: &AdapterDescriptor,
    ) -> Option<LandValueRecord> {
        let (cache, key) = (self.cache.as_ref()?, key?);
        match cache.get(key) {
            Ok(Some(record)) if record.jurisdiction == descriptor.jurisdiction => Some(record),
            Ok(Some(record)) => {
                log::debug!(
                    "[{}] Cached record for {key} belongs to {}, ignoring",
                    descriptor.code,
                    record.jurisdiction
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("[{}] Cache read for {key} failed: {e}", descriptor.code);
                None
            }
        }
    }

    /// Probes the adapter registered for `jurisdiction`.
    pub async fn health(&self, jurisdiction: &str) -> AdapterHealth {
        probe(self.router.resolve(jurisdiction).as_ref()).await
    }

    /// Probes every registered adapter, in registration order.
    pub async fn health_report(&self) -> Vec<AdapterHealth> {
        futures::stream::iter(self.router.sources())
            .map(|source| probe(source.as_ref()))
            .buffered(HEALTH_CONCURRENCY)
            .collect()
            .await
    }
}

async fn probe(source: &dyn LandValueSource) -> AdapterHealth {
    let descriptor = source.descriptor().clone();
    let healthy = tokio::time::timeout(HEALTH_TIMEOUT, source.health_check())
        .await
        .unwrap_or_else(|_| {
            log::debug!("[{}] Health check timed out", descriptor.code);
            false
        });
    AdapterHealth {
        descriptor,
        healthy,
    }
}

fn miss(descriptor: AdapterDescriptor) -> LookupOutcome {
    if descriptor.is_fallback {
        LookupOutcome::ManualLookup {
            reason: descriptor.reason.unwrap_or_default(),
            reference_url: descriptor.reference_url.unwrap_or_default(),
        }
    } else {
        LookupOutcome::NotFound
    }
}

fn validate(lat: f64, lon: f64) -> Result<(), LookupError> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(LookupError::InvalidCoordinates { lat, lon })
    }
}
