//! Config-driven jurisdiction definition.
//!
//! [`JurisdictionDefinition`] captures everything unique about one state's
//! land value service in a serializable config struct. A single generic
//! adapter ([`crate::sources::ogc::OgcSource`]) executes every official
//! definition, so per-state differences live in TOML rather than code.

use land_value_models::{Crs, OutputFormat, Protocol};
use land_value_parser::{DEFAULT_DEVELOPMENT_STATUS, DEFAULT_VALUE_CEILING, DecimalConvention};
use serde::Deserialize;

// ── Top-level definition ─────────────────────────────────────────────────

/// A complete jurisdiction definition, loaded from embedded TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionDefinition {
    /// Two-letter state code (e.g. `"NW"`).
    pub code: String,
    /// Canonical state name (e.g. `"Nordrhein-Westfalen"`).
    pub name: String,
    /// Additional names the router accepts (English names, short forms).
    #[serde(default)]
    pub aliases: Vec<String>,
    /// How the adapter for this jurisdiction is assembled.
    pub kind: AdapterKind,
    /// Service label used in the record's `source` field.
    pub source_label: String,
    /// Usage rights of the published data.
    pub license: String,
    /// Portal where values can be looked up by hand.
    pub reference_url: String,
    /// Why no automated official source exists. Required for
    /// [`AdapterKind::Manual`] and for chained definitions without a query.
    #[serde(default)]
    pub reason: Option<String>,
    /// Market reference table used as secondary source by
    /// [`AdapterKind::Chained`] definitions.
    #[serde(default)]
    pub market_region: Option<String>,
    /// Upstream query configuration. Absent for manual-only jurisdictions.
    #[serde(default)]
    pub query: Option<QueryConfig>,
}

impl JurisdictionDefinition {
    /// Provenance string written into every record of this jurisdiction.
    #[must_use]
    pub fn source(&self) -> String {
        format!("{} ({})", self.source_label, self.name)
    }

    /// Reason text for manual-lookup adapters.
    #[must_use]
    pub fn manual_reason(&self) -> String {
        self.reason.clone().unwrap_or_else(|| {
            format!(
                "No automated land value service is available for {}",
                self.name
            )
        })
    }
}

/// Adapter composition for a jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    /// Official OGC service queried directly.
    Official,
    /// Official service (or manual stub) backed by a market estimator.
    Chained,
    /// No automated source; callers are pointed to a portal.
    Manual,
}

// ── Query config ─────────────────────────────────────────────────────────

/// Parameters shared by all endpoints of one jurisdiction.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Half-width of the query box in meters.
    #[serde(default = "default_radius")]
    pub radius_m: f64,
    /// Exclusive upper bound for plausible values in EUR/m².
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    /// Decimal convention of textual numbers.
    #[serde(default)]
    pub decimal: Decimal,
    /// Development status for features without one.
    #[serde(default = "default_development")]
    pub default_development: String,
    /// Race candidate layers concurrently instead of trying them in order.
    #[serde(default)]
    pub race: bool,
    /// Number of layers raced together.
    #[serde(default = "default_race_batch")]
    pub race_batch: usize,
    /// Endpoints in priority order.
    pub endpoints: Vec<EndpointConfig>,
}

/// Serializable mirror of [`DecimalConvention`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decimal {
    /// Detect from the token.
    #[default]
    Auto,
    /// `1,250.5`
    Point,
    /// `1.250,5`
    Comma,
}

impl From<Decimal> for DecimalConvention {
    fn from(d: Decimal) -> Self {
        match d {
            Decimal::Auto => Self::Auto,
            Decimal::Point => Self::Point,
            Decimal::Comma => Self::Comma,
        }
    }
}

/// One upstream service endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Base URL without query string.
    pub url: String,
    /// Service protocol.
    pub protocol: Protocol,
    /// Protocol version (ignored for OGC API).
    #[serde(default)]
    pub version: String,
    /// Output formats in priority order.
    pub formats: Vec<OutputFormat>,
    /// Coordinate systems in priority order.
    pub crs: Vec<Crs>,
    /// Static layer list in priority order. Used as-is when discovery is
    /// off, and as fallback when discovery fails.
    #[serde(default)]
    pub layers: Vec<String>,
    /// Read the layer list from the capabilities document.
    #[serde(default)]
    pub discover: bool,
    /// Case-insensitive substrings a discovered layer must contain (any).
    #[serde(default)]
    pub layer_match: Vec<String>,
    /// Ordering applied to discovered layers.
    #[serde(default)]
    pub layer_order: LayerOrder,
    /// Keep at most this many discovered layers.
    #[serde(default)]
    pub max_layers: Option<usize>,
}

/// Ordering of discovered layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOrder {
    /// Capabilities document order.
    #[default]
    Document,
    /// Developed-land layers first, forest and agriculture last.
    LandUse,
    /// Most recent year embedded in the layer name first.
    YearDesc,
}

const fn default_radius() -> f64 {
    25.0
}

const fn default_ceiling() -> f64 {
    DEFAULT_VALUE_CEILING
}

fn default_development() -> String {
    DEFAULT_DEVELOPMENT_STATUS.to_string()
}

const fn default_race_batch() -> usize {
    4
}

/// Parses a TOML string into a [`JurisdictionDefinition`].
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_definition_toml(toml_str: &str) -> Result<JurisdictionDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
