#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical land value record and the static descriptor types shared by
//! every jurisdiction adapter.
//!
//! Every upstream service (WFS, WMS `GetFeatureInfo`, OGC API Features)
//! produces [`LandValueRecord`]s after parsing, regardless of which wire
//! format or field-naming convention the service uses.

pub mod strategy;

use serde::{Deserialize, Serialize};

pub use strategy::{BoundingBox, Crs, OutputFormat, Protocol, Strategy, WireFormat};

/// Sentinel for fields the upstream did not provide or that could not be
/// parsed.
pub const UNKNOWN: &str = "unknown";

/// Sentinel effective date for values the upstream marks as "currently
/// valid" without publishing a date.
pub const CURRENT: &str = "current";

/// A reference land value normalized to the canonical schema.
///
/// `value` is always strictly positive. Absence of a value is expressed by
/// returning no record at all, never by a zero or negative `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandValueRecord {
    /// Reference land value in EUR per square meter.
    pub value: f64,
    /// ISO date (`YYYY-MM-DD`) or one of [`UNKNOWN`] / [`CURRENT`].
    pub effective_date: String,
    /// Land use class code or free text (e.g. `"W"`, `"MI"`, `"Wohnbaufläche"`).
    pub land_use_class: String,
    /// Development status code (e.g. `"B"` for baureifes Land).
    pub development_status: String,
    /// Zone identifier (Bodenrichtwertzone). May be empty.
    pub zone_id: String,
    /// Municipality name. May be empty.
    pub municipality: String,
    /// Canonical jurisdiction name (e.g. `"Nordrhein-Westfalen"`).
    pub jurisdiction: String,
    /// Human-readable provenance (service + jurisdiction).
    pub source: String,
    /// Usage rights of the upstream data.
    pub license: String,
    /// Present only when the value is derived rather than official.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation: Option<Estimation>,
}

impl LandValueRecord {
    /// Returns `true` if the record satisfies the positive-value invariant.
    #[must_use]
    pub fn has_positive_value(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }

    /// Returns `true` if this record is an estimate rather than an official
    /// value.
    #[must_use]
    pub const fn is_estimate(&self) -> bool {
        self.estimation.is_some()
    }
}

/// Metadata attached to records that were inferred rather than published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimation {
    /// Estimation method identifier (e.g. `"market_reference_city"`).
    pub method: String,
    /// Market price the estimate was derived from, EUR/m².
    pub basis_price: f64,
    /// Factor applied to `basis_price` to obtain the estimated value.
    pub applied_factor: f64,
    /// Date of the market data (ISO date).
    pub as_of: String,
    /// Text shown to callers alongside the estimate.
    pub disclaimer: String,
}

/// Static identity of a jurisdiction adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDescriptor {
    /// Canonical jurisdiction name.
    pub jurisdiction: String,
    /// Two-letter jurisdiction code (e.g. `"NW"`).
    pub code: String,
    /// `true` when no automated official source exists.
    pub is_fallback: bool,
    /// Why the value must be looked up manually. Set for fallback adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Where to look the value up manually.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

impl AdapterDescriptor {
    /// Descriptor for an adapter backed by an official automated source.
    #[must_use]
    pub fn official(jurisdiction: &str, code: &str) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            code: code.to_string(),
            is_fallback: false,
            reason: None,
            reference_url: None,
        }
    }

    /// Descriptor for an adapter that only points to a manual lookup.
    #[must_use]
    pub fn fallback(jurisdiction: &str, code: &str, reason: &str, reference_url: &str) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            code: code.to_string(),
            is_fallback: true,
            reason: Some(reason.to_string()),
            reference_url: Some(reference_url.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LandValueRecord {
        LandValueRecord {
            value: 420.0,
            effective_date: "2024-01-01".to_string(),
            land_use_class: "W".to_string(),
            development_status: "B".to_string(),
            zone_id: "01234".to_string(),
            municipality: "Köln".to_string(),
            jurisdiction: "Nordrhein-Westfalen".to_string(),
            source: "BORIS.NRW WMS (Nordrhein-Westfalen)".to_string(),
            license: "dl-de/zero-2-0".to_string(),
            estimation: None,
        }
    }

    #[test]
    fn positive_value_invariant() {
        let mut record = sample();
        assert!(record.has_positive_value());
        record.value = 0.0;
        assert!(!record.has_positive_value());
        record.value = f64::NAN;
        assert!(!record.has_positive_value());
    }

    #[test]
    fn official_record_omits_estimation_in_json() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("estimation").is_none());
        assert_eq!(json["landUseClass"], "W");
    }

    #[test]
    fn fallback_descriptor_carries_reason_and_url() {
        let d = AdapterDescriptor::fallback("Bayern", "BY", "fee-based", "https://example.org");
        assert!(d.is_fallback);
        assert_eq!(d.reason.as_deref(), Some("fee-based"));
        assert_eq!(d.reference_url.as_deref(), Some("https://example.org"));
    }
}
