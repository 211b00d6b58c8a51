//! Query strategy tuples: which endpoint, protocol, output format,
//! coordinate system and layer to try for one upstream request.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Upstream service protocol.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Protocol {
    /// OGC Web Feature Service (`GetFeature`).
    Wfs,
    /// OGC Web Map Service (`GetFeatureInfo`).
    Wms,
    /// OGC API - Features (`/collections/{id}/items`).
    OgcApi,
}

/// Which parser family handles a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum WireFormat {
    /// JSON feature collections (`GeoJSON`, Esri JSON).
    Json,
    /// `KEY = 'VALUE'` plain text.
    PlainText,
    /// HTML tables.
    Html,
    /// GML / namespaced XML.
    Xml,
}

/// Output format requested from an upstream service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputFormat {
    /// `application/geo+json`
    GeoJson,
    /// `application/json`
    Json,
    /// `text/plain`
    PlainText,
    /// `text/html`
    Html,
    /// `application/gml+xml; version=3.2`
    Gml32,
    /// `text/xml; subtype=gml/3.1.1`
    Gml31,
    /// `application/vnd.ogc.gml` (legacy WMS 1.1.1 servers)
    OgcGml,
}

impl OutputFormat {
    /// MIME type sent as `outputFormat` / `INFO_FORMAT` / `f`.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::GeoJson => "application/geo+json",
            Self::Json => "application/json",
            Self::PlainText => "text/plain",
            Self::Html => "text/html",
            Self::Gml32 => "application/gml+xml; version=3.2",
            Self::Gml31 => "text/xml; subtype=gml/3.1.1",
            Self::OgcGml => "application/vnd.ogc.gml",
        }
    }

    /// Parser family for responses in this format.
    #[must_use]
    pub const fn wire_format(self) -> WireFormat {
        match self {
            Self::GeoJson | Self::Json => WireFormat::Json,
            Self::PlainText => WireFormat::PlainText,
            Self::Html => WireFormat::Html,
            Self::Gml32 | Self::Gml31 | Self::OgcGml => WireFormat::Xml,
        }
    }
}

/// Coordinate reference systems used by the upstream services.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Crs {
    /// WGS84 geographic coordinates.
    #[serde(rename = "EPSG:4326")]
    #[strum(serialize = "EPSG:4326")]
    Wgs84,
    /// ETRS89 / UTM zone 32N.
    #[serde(rename = "EPSG:25832")]
    #[strum(serialize = "EPSG:25832")]
    Etrs89Utm32,
    /// ETRS89 / UTM zone 33N.
    #[serde(rename = "EPSG:25833")]
    #[strum(serialize = "EPSG:25833")]
    Etrs89Utm33,
}

impl Crs {
    /// Numeric EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => 4326,
            Self::Etrs89Utm32 => 25832,
            Self::Etrs89Utm33 => 25833,
        }
    }

    /// OGC URN form (`urn:ogc:def:crs:EPSG::25832`), used by WFS 2.0.
    #[must_use]
    pub fn urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg())
    }

    /// Whether coordinates are planar easting/northing in meters.
    #[must_use]
    pub const fn is_projected(self) -> bool {
        !matches!(self, Self::Wgs84)
    }

    /// UTM zone number for projected systems.
    #[must_use]
    pub const fn utm_zone(self) -> Option<u8> {
        match self {
            Self::Wgs84 => None,
            Self::Etrs89Utm32 => Some(32),
            Self::Etrs89Utm33 => Some(33),
        }
    }
}

/// Axis-aligned box in the coordinates of `crs`.
///
/// For [`Crs::Wgs84`] `x` is longitude and `y` is latitude; for projected
/// systems `x` is easting and `y` is northing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum x (west).
    pub min_x: f64,
    /// Minimum y (south).
    pub min_y: f64,
    /// Maximum x (east).
    pub max_x: f64,
    /// Maximum y (north).
    pub max_y: f64,
    /// Coordinate system of the corners.
    pub crs: Crs,
}

impl BoundingBox {
    /// Center point `(x, y)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            f64::midpoint(self.min_x, self.max_x),
            f64::midpoint(self.min_y, self.max_y),
        )
    }

    /// Width in CRS units.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height in CRS units.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// One candidate upstream query.
///
/// Built fresh per lookup and consumed in priority order by the strategy
/// loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Strategy {
    /// Service endpoint (without query string).
    pub endpoint: String,
    /// Service protocol.
    pub protocol: Protocol,
    /// Protocol version (e.g. `"2.0.0"`, `"1.3.0"`).
    pub version: String,
    /// Requested output format.
    pub format: OutputFormat,
    /// Coordinate system of the query bounding box.
    pub crs: Crs,
    /// Layer / feature type / collection identifier.
    pub layer: String,
}

impl Strategy {
    /// Creates a strategy tuple.
    #[must_use]
    pub fn new(
        endpoint: &str,
        protocol: Protocol,
        version: &str,
        format: OutputFormat,
        crs: Crs,
        layer: &str,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            protocol,
            version: version.to_string(),
            format,
            crs,
            layer: layer.to_string(),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} layer={} format={} crs={}",
            self.protocol, self.version, self.layer, self.format, self.crs
        )
    }
}
