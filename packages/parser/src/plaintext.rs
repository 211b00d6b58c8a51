//! `KEY = 'VALUE'` plain text responses.
//!
//! `MapServer` groups results as `Layer '<name>'` / `Feature <id>:` blocks;
//! `GeoServer` uses `Results for FeatureType '<name>':` followed by
//! dash-separated records. Each record becomes one [`RawFeature`] tagged
//! with its sub-layer so that selection can rank sub-layers by land use.

use std::sync::LazyLock;

use regex::Regex;

use crate::RawFeature;

static LAYER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:Layer|Results for FeatureType)\s+'([^']*)'").expect("valid regex")
});

static FEATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*Feature\s+[^=]*:\s*$").expect("valid regex"));

static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-{3,}\s*$").expect("valid regex"));

static PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^=]+?)\s*=\s*(.*?)\s*$").expect("valid regex"));

/// Accumulates key/value lines into features.
struct Sections {
    layer: Option<String>,
    current: RawFeature,
    done: Vec<RawFeature>,
}

impl Sections {
    fn flush(&mut self) {
        let next = RawFeature::new(self.layer.as_deref());
        let finished = std::mem::replace(&mut self.current, next);
        if !finished.is_empty() {
            self.done.push(finished);
        }
    }

    fn enter_layer(&mut self, layer: &str) {
        self.flush();
        self.layer = Some(layer.to_string());
        self.current = RawFeature::new(Some(layer));
    }
}

/// Splits a plain text body into per-feature sections.
#[must_use]
pub fn features(text: &str) -> Vec<RawFeature> {
    let mut sections = Sections {
        layer: None,
        current: RawFeature::new(None),
        done: Vec::new(),
    };

    for line in text.lines() {
        if let Some(caps) = LAYER_RE.captures(line) {
            sections.enter_layer(&caps[1]);
        } else if FEATURE_RE.is_match(line) || SEPARATOR_RE.is_match(line) {
            sections.flush();
        } else if let Some(caps) = PAIR_RE.captures(line) {
            sections.current.insert_text(&caps[1], unquote(&caps[2]));
        }
    }
    sections.flush();

    sections.done
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .unwrap_or(value)
}
