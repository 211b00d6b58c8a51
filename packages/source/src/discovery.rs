//! Capability discovery.
//!
//! For services whose layer names change between releases, the adapter
//! reads the capabilities document and derives the candidate layer list
//! from it. Results are memoized per endpoint in a [`LayerMemo`] owned by
//! the adapter instance.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use land_value_models::Protocol;
use land_value_parser::{LandUseCategory, decode_body, gml, markers};
use regex::Regex;

use crate::definition::{EndpointConfig, LayerOrder};
use crate::{SourceError, http, ogc};

/// Opening `<Layer ...>` tag of a WMS capabilities document.
static LAYER_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[\w.-]+:)?Layer\b([^>]*)>").expect("valid regex"));

/// Any `<Layer` or `</Layer` tag, used to bound a layer's own segment.
static LAYER_BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)(?:[\w.-]+:)?Layer\b").expect("valid regex"));

static QUERYABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"queryable\s*=\s*["'](?:1|true)["']"#).expect("valid regex"));

/// `<Style>` blocks, whose `<Name>` is a style name, not a layer name.
static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w.-]+:)?Style\b[^>]*>.*?</(?:[\w.-]+:)?Style\s*>").expect("valid regex")
});

static FEATURE_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[\w.-]+:)?FeatureType\b[^>]*>(.*?)</(?:[\w.-]+:)?FeatureType\s*>")
        .expect("valid regex")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:19|20)\d{2}").expect("valid regex"));

/// A named layer found in a capabilities document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLayer {
    /// Layer / feature type / collection identifier.
    pub name: String,
    /// Whether the service marks the layer as queryable.
    pub queryable: bool,
    /// Whether the layer has child layers.
    pub group: bool,
}

/// Extracts named layers from a WMS capabilities document.
#[must_use]
pub fn wms_layers(xml: &str) -> Vec<DiscoveredLayer> {
    let mut layers = Vec::new();
    for open in LAYER_OPEN_RE.captures_iter(xml) {
        let (Some(tag), Some(attrs)) = (open.get(0), open.get(1)) else {
            continue;
        };
        let rest = &xml[tag.end()..];
        let boundary = LAYER_BOUNDARY_RE.captures(rest);
        let (segment, group) = match &boundary {
            Some(caps) => {
                let start = caps.get(0).map_or(rest.len(), |m| m.start());
                let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
                (&rest[..start], !closing)
            }
            None => (rest, false),
        };
        let segment = STYLE_RE.replace_all(segment, "");
        let Some(name) = gml::tag_values(&segment, "Name").into_iter().next() else {
            continue;
        };
        layers.push(DiscoveredLayer {
            name,
            queryable: QUERYABLE_RE.is_match(attrs.as_str()),
            group,
        });
    }
    layers
}

/// Extracts feature type names from a WFS capabilities document.
#[must_use]
pub fn wfs_layers(xml: &str) -> Vec<DiscoveredLayer> {
    FEATURE_TYPE_RE
        .captures_iter(xml)
        .filter_map(|caps| {
            let name = gml::tag_values(caps.get(1)?.as_str(), "Name")
                .into_iter()
                .next()?;
            Some(DiscoveredLayer {
                name,
                queryable: true,
                group: false,
            })
        })
        .collect()
}

/// Extracts collection ids from an OGC API `/collections` document.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the body is not JSON.
pub fn ogc_api_layers(text: &str) -> Result<Vec<DiscoveredLayer>, SourceError> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SourceError::Parse(e.into()))?;
    Ok(json
        .get("collections")
        .and_then(serde_json::Value::as_array)
        .map(|collections| {
            collections
                .iter()
                .filter_map(|c| c.get("id")?.as_str())
                .map(|id| DiscoveredLayer {
                    name: id.to_string(),
                    queryable: true,
                    group: false,
                })
                .collect()
        })
        .unwrap_or_default())
}

/// Applies the endpoint's filter, ordering and limit to discovered layers.
///
/// Queryable layers are preferred; when the service marks none as
/// queryable, every named layer is kept.
#[must_use]
pub fn select_layers(layers: Vec<DiscoveredLayer>, endpoint: &EndpointConfig) -> Vec<String> {
    let any_queryable = layers.iter().any(|l| l.queryable);
    let patterns: Vec<String> = endpoint
        .layer_match
        .iter()
        .map(|p| p.to_lowercase())
        .collect();

    let mut selected: Vec<DiscoveredLayer> = Vec::new();
    for layer in layers {
        if any_queryable && !layer.queryable {
            continue;
        }
        let lower = layer.name.to_lowercase();
        if !patterns.is_empty() && !patterns.iter().any(|p| lower.contains(p)) {
            continue;
        }
        if selected.iter().any(|s| s.name == layer.name) {
            continue;
        }
        selected.push(layer);
    }

    match endpoint.layer_order {
        LayerOrder::Document => {}
        LayerOrder::LandUse => selected.sort_by_key(|l| {
            (
                l.group,
                Reverse(LandUseCategory::classify(&l.name).priority()),
            )
        }),
        LayerOrder::YearDesc => selected.sort_by_key(|l| Reverse(latest_year(&l.name))),
    }

    let mut names: Vec<String> = selected.into_iter().map(|l| l.name).collect();
    if let Some(max) = endpoint.max_layers {
        names.truncate(max);
    }
    names
}

fn latest_year(name: &str) -> Option<u16> {
    YEAR_RE
        .find_iter(name)
        .filter_map(|m| m.as_str().parse().ok())
        .max()
}

/// Fetches and evaluates the capabilities document of `endpoint`.
///
/// # Errors
///
/// * Any error of [`http::fetch_body`]
/// * [`SourceError::Upstream`] if the document is an exception report
/// * [`SourceError::EmptyResult`] if no layer survives selection
pub async fn discover_layers(
    client: &http::HttpClient,
    endpoint: &EndpointConfig,
) -> Result<Vec<String>, SourceError> {
    let request = ogc::capabilities_request(&endpoint.url, endpoint.protocol, &endpoint.version);
    let body = http::fetch_body(client, &request.url, &request.query).await?;
    let text = decode_body(&body);

    if let Some(message) = markers::service_exception(&text) {
        return Err(SourceError::Upstream { message });
    }

    let layers = match endpoint.protocol {
        Protocol::Wms => wms_layers(&text),
        Protocol::Wfs => wfs_layers(&text),
        Protocol::OgcApi => ogc_api_layers(&text)?,
    };
    let names = select_layers(layers, endpoint);
    if names.is_empty() {
        return Err(SourceError::EmptyResult);
    }
    Ok(names)
}

/// Per-adapter memo of discovered layer lists, keyed by endpoint URL.
///
/// Two cold calls may both discover and both write; the second write wins
/// and both lists are equivalent.
#[derive(Debug, Default)]
pub struct LayerMemo {
    layers: RwLock<BTreeMap<String, Vec<String>>>,
}

impl LayerMemo {
    /// Returns the memoized layer list for `endpoint`.
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<Vec<String>> {
        self.layers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .cloned()
    }

    /// Stores the layer list for `endpoint`.
    pub fn insert(&self, endpoint: &str, layers: Vec<String>) {
        self.layers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint.to_string(), layers);
    }
}
