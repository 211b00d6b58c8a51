#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Land value adapter trait and jurisdiction adapters.
//!
//! Each jurisdiction implements the [`LandValueSource`] trait. Official
//! sources are config-driven [`sources::ogc::OgcSource`] instances built
//! from embedded TOML definitions; estimators, manual-lookup stubs and
//! chained compositions are hand-written. The [`registry`] maps
//! jurisdiction names to adapter instances.

pub mod definition;
pub mod discovery;
pub mod http;
pub mod ogc;
pub mod registry;
pub mod sources;
pub mod strategy;

use async_trait::async_trait;
use land_value_models::{AdapterDescriptor, LandValueRecord};
use land_value_parser::ParseError;

pub use registry::JurisdictionRouter;

/// Errors that can occur while querying an upstream service.
///
/// These never leave an adapter: the strategy loop classifies them, logs
/// them and moves on to the next candidate.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No response within the per-call budget.
    #[error("Request to {url} timed out")]
    NetworkTimeout {
        /// Requested URL.
        url: String,
    },

    /// Non-success status or an embedded service exception.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Status line or exception text.
        message: String,
    },

    /// Well-formed response without a matching feature.
    #[error("No matching feature")]
    EmptyResult,

    /// Response did not match any known shape.
    #[error("Parse error: {0}")]
    Parse(ParseError),

    /// No adapter is registered for the jurisdiction.
    #[error("No adapter configured for jurisdiction '{jurisdiction}'")]
    ConfigurationGap {
        /// Requested jurisdiction name.
        jurisdiction: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<ParseError> for SourceError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::LicenseRestricted => Self::EmptyResult,
            ParseError::ServiceException { message } => Self::Upstream { message },
            other => Self::Parse(other),
        }
    }
}

impl SourceError {
    /// Returns `true` if the failure means "no value for this candidate"
    /// rather than a broken candidate.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::EmptyResult)
    }
}

/// Contract implemented by every jurisdiction adapter.
///
/// Neither operation fails: internal errors are handled by trying the
/// next strategy, and exhausting all strategies yields `None`.
#[async_trait]
pub trait LandValueSource: Send + Sync {
    /// Static identity of this adapter.
    fn descriptor(&self) -> &AdapterDescriptor;

    /// Looks up the reference land value at a WGS84 coordinate.
    ///
    /// Returns `None` when no usable value could be obtained. A returned
    /// record always has a strictly positive `value`.
    async fn fetch_value(&self, lat: f64, lon: f64) -> Option<LandValueRecord>;

    /// Probes the primary endpoint with a short timeout.
    async fn health_check(&self) -> bool;
}
