//! Request builders for the three OGC protocol families.
//!
//! Each builder turns a [`Strategy`] plus a bounding box into a URL and
//! query parameter list. Axis order follows the protocol rules: WFS 2.0
//! and WMS 1.3.0 expect latitude first for EPSG:4326, older versions and
//! all projected systems expect easting/longitude first.

use land_value_models::{BoundingBox, Crs, Protocol, Strategy};

/// Pixel size of the virtual map used for `GetFeatureInfo`.
const MAP_SIZE: u32 = 101;

/// Pixel at the center of the virtual map.
const MAP_CENTER: u32 = MAP_SIZE / 2;

/// Maximum number of features requested per query.
const FEATURE_LIMIT: u32 = 10;

/// A fully specified GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request URL without query string.
    pub url: String,
    /// Query parameters in send order.
    pub query: Vec<(String, String)>,
}

impl Request {
    fn new(url: String) -> Self {
        Self {
            url,
            query: Vec::new(),
        }
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// Builds the feature query for `strategy` over `bbox`.
#[must_use]
pub fn feature_request(strategy: &Strategy, bbox: &BoundingBox) -> Request {
    match strategy.protocol {
        Protocol::Wfs => get_feature(strategy, bbox),
        Protocol::Wms => get_feature_info(strategy, bbox),
        Protocol::OgcApi => collection_items(strategy, bbox),
    }
}

/// Builds the capabilities request for an endpoint.
#[must_use]
pub fn capabilities_request(url: &str, protocol: Protocol, version: &str) -> Request {
    match protocol {
        Protocol::Wfs | Protocol::Wms => Request::new(url.to_string())
            .param("SERVICE", protocol.as_ref())
            .param("REQUEST", "GetCapabilities")
            .param("VERSION", version),
        Protocol::OgcApi => {
            Request::new(format!("{}/collections", url.trim_end_matches('/'))).param("f", "json")
        }
    }
}

/// Whether `(lat, lon)` axis order applies for this protocol version and
/// CRS.
fn latitude_first(protocol: Protocol, version: &str, crs: Crs) -> bool {
    if crs != Crs::Wgs84 {
        return false;
    }
    match protocol {
        Protocol::Wfs => version.starts_with('2'),
        Protocol::Wms => version == "1.3.0",
        Protocol::OgcApi => false,
    }
}

fn bbox_param(bbox: &BoundingBox, lat_first: bool) -> String {
    if lat_first {
        format!(
            "{},{},{},{}",
            bbox.min_y, bbox.min_x, bbox.max_y, bbox.max_x
        )
    } else {
        format!(
            "{},{},{},{}",
            bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
        )
    }
}

fn get_feature(strategy: &Strategy, bbox: &BoundingBox) -> Request {
    let wfs2 = strategy.version.starts_with('2');
    let lat_first = latitude_first(Protocol::Wfs, &strategy.version, bbox.crs);
    let srs = if wfs2 {
        bbox.crs.urn()
    } else {
        bbox.crs.to_string()
    };
    let (type_key, count_key) = if wfs2 {
        ("TYPENAMES", "COUNT")
    } else {
        ("TYPENAME", "MAXFEATURES")
    };

    Request::new(strategy.endpoint.clone())
        .param("SERVICE", "WFS")
        .param("REQUEST", "GetFeature")
        .param("VERSION", strategy.version.as_str())
        .param(type_key, strategy.layer.as_str())
        .param(count_key, FEATURE_LIMIT.to_string())
        .param("SRSNAME", srs.as_str())
        .param("OUTPUTFORMAT", strategy.format.mime())
        .param("BBOX", format!("{},{srs}", bbox_param(bbox, lat_first)))
}

fn get_feature_info(strategy: &Strategy, bbox: &BoundingBox) -> Request {
    let v13 = strategy.version == "1.3.0";
    let lat_first = latitude_first(Protocol::Wms, &strategy.version, bbox.crs);
    let (crs_key, i_key, j_key) = if v13 {
        ("CRS", "I", "J")
    } else {
        ("SRS", "X", "Y")
    };

    Request::new(strategy.endpoint.clone())
        .param("SERVICE", "WMS")
        .param("REQUEST", "GetFeatureInfo")
        .param("VERSION", strategy.version.as_str())
        .param("LAYERS", strategy.layer.as_str())
        .param("QUERY_LAYERS", strategy.layer.as_str())
        .param("STYLES", "")
        .param(crs_key, bbox.crs.to_string())
        .param("BBOX", bbox_param(bbox, lat_first))
        .param("WIDTH", MAP_SIZE.to_string())
        .param("HEIGHT", MAP_SIZE.to_string())
        .param(i_key, MAP_CENTER.to_string())
        .param(j_key, MAP_CENTER.to_string())
        .param("INFO_FORMAT", strategy.format.mime())
        .param("FEATURE_COUNT", FEATURE_LIMIT.to_string())
        .param("FORMAT", "image/png")
}

fn collection_items(strategy: &Strategy, bbox: &BoundingBox) -> Request {
    let url = format!(
        "{}/collections/{}/items",
        strategy.endpoint.trim_end_matches('/'),
        strategy.layer
    );
    let mut request = Request::new(url).param("bbox", bbox_param(bbox, false));
    if bbox.crs != Crs::Wgs84 {
        request = request.param(
            "bbox-crs",
            format!("http://www.opengis.net/def/crs/EPSG/0/{}", bbox.crs.epsg()),
        );
    }
    request
        .param("f", "json")
        .param("limit", FEATURE_LIMIT.to_string())
}
