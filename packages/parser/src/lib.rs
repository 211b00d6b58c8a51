#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Response parsers for upstream land value services.
//!
//! Every parser is a pure function of the response bytes plus a
//! [`ParseContext`]. Parsing happens in two steps: the wire-format module
//! ([`json`], [`gml`], [`plaintext`], [`html`]) splits the body into
//! [`RawFeature`]s, then the shared [`fields`] table maps each feature into
//! a [`LandValueRecord`] and [`select`] picks the best one.

pub mod date;
pub mod fields;
pub mod gml;
pub mod html;
pub mod json;
pub mod land_use;
pub mod markers;
pub mod number;
pub mod plaintext;
pub mod select;

use std::borrow::Cow;
use std::collections::BTreeMap;

use land_value_models::{LandValueRecord, WireFormat};

pub use fields::{FieldTable, STANDARD_FIELDS};
pub use land_use::LandUseCategory;
pub use number::DecimalConvention;

/// Values at or above this many EUR/m² are treated as unit or parsing
/// mistakes unless a context overrides it.
pub const DEFAULT_VALUE_CEILING: f64 = 500_000.0;

/// Development status assumed when a feature does not state one
/// (`B` = baureifes Land).
pub const DEFAULT_DEVELOPMENT_STATUS: &str = "B";

/// Errors produced while parsing an upstream response.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The body is a service exception report rather than data.
    #[error("Service exception: {message}")]
    ServiceException {
        /// Exception text reported by the service.
        message: String,
    },

    /// The body does not match any known shape for its format.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },

    /// The upstream marks the value as fee-gated.
    #[error("Value is licence restricted (fee-based)")]
    LicenseRestricted,

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One attribute value of a raw feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text as it appeared in the response.
    Text(String),
    /// A typed number (JSON numbers).
    Number(f64),
}

impl FieldValue {
    /// Textual form of the value.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Numeric form of the value, honouring `convention` for text.
    #[must_use]
    pub fn as_number(&self, convention: DecimalConvention) -> Option<f64> {
        match self {
            Self::Text(s) => number::parse_number(s, convention),
            Self::Number(n) => n.is_finite().then_some(*n),
        }
    }
}

/// An attribute bag extracted from a response before field mapping.
///
/// Keys are stored normalized (see [`normalize_key`]) so lookups are
/// insensitive to case, umlaut spelling and unit suffixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeature {
    /// Sub-layer or feature type the feature came from, when known.
    pub layer: Option<String>,
    /// Normalized attribute name to value.
    pub properties: BTreeMap<String, FieldValue>,
}

impl RawFeature {
    /// Creates an empty feature belonging to `layer`.
    #[must_use]
    pub fn new(layer: Option<&str>) -> Self {
        Self {
            layer: layer.map(str::to_string),
            properties: BTreeMap::new(),
        }
    }

    /// Inserts a text attribute. Empty values are ignored and the first
    /// value for a key wins.
    pub fn insert_text(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.insert(key, FieldValue::Text(value.to_string()));
    }

    /// Inserts a typed attribute. The first value for a key wins.
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        self.properties.entry(key).or_insert(value);
    }

    /// Looks up an attribute by normalized name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.properties.get(key)
    }

    /// Returns `true` if no attributes were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Normalizes an attribute name for synonym matching.
///
/// Lowercases, transliterates umlauts, drops a trailing unit in
/// parentheses/brackets or after `" in "`, strips a trailing colon and
/// joins words with `_`. `"Bodenrichtwert (€/m²):"` becomes
/// `"bodenrichtwert"`, `"Art der Nutzung"` becomes `"art_der_nutzung"`.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    let lower = transliterate(&key.to_lowercase());
    let mut cut = lower.as_str();
    if let Some(idx) = cut.find(['(', '[']) {
        cut = &cut[..idx];
    }
    if let Some(idx) = cut.find(" in ") {
        cut = &cut[..idx];
    }
    let cut = cut.trim().trim_end_matches(':').trim();

    let mut out = String::with_capacity(cut.len());
    for c in cut.chars() {
        if c.is_whitespace() || c == '-' || c == '.' || c == '/' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }
    out.trim_matches('_').to_string()
}

/// Replaces German umlauts and `ß` with their ASCII spellings.
#[must_use]
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'ä' => out.push_str("ae"),
            'ö' => out.push_str("oe"),
            'ü' => out.push_str("ue"),
            'Ä' => out.push_str("Ae"),
            'Ö' => out.push_str("Oe"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}

/// Per-call parsing context: provenance for the produced record plus the
/// few knobs that differ between jurisdictions.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Canonical jurisdiction name written into records.
    pub jurisdiction: String,
    /// Provenance string written into records.
    pub source: String,
    /// Licence string written into records.
    pub license: String,
    /// Development status used when a feature has none.
    pub default_development: String,
    /// Exclusive upper bound for plausible values.
    pub ceiling: f64,
    /// How textual numbers are written by this upstream.
    pub decimal: DecimalConvention,
    /// Sub-layer that was queried, used when features carry no layer.
    pub layer: Option<String>,
    /// Field synonym table.
    pub fields: &'static FieldTable,
}

impl ParseContext {
    /// Creates a context with default ceiling, development status and
    /// decimal detection.
    #[must_use]
    pub fn new(jurisdiction: &str, source: &str, license: &str) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            source: source.to_string(),
            license: license.to_string(),
            default_development: DEFAULT_DEVELOPMENT_STATUS.to_string(),
            ceiling: DEFAULT_VALUE_CEILING,
            decimal: DecimalConvention::Auto,
            layer: None,
            fields: &STANDARD_FIELDS,
        }
    }

    /// Overrides the plausibility ceiling.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: f64) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Overrides the decimal convention.
    #[must_use]
    pub const fn with_decimal(mut self, decimal: DecimalConvention) -> Self {
        self.decimal = decimal;
        self
    }

    /// Overrides the default development status.
    #[must_use]
    pub fn with_default_development(mut self, code: &str) -> Self {
        code.clone_into(&mut self.default_development);
        self
    }

    /// Sets the queried sub-layer.
    #[must_use]
    pub fn with_layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    /// Overrides the field synonym table.
    #[must_use]
    pub const fn with_fields(mut self, fields: &'static FieldTable) -> Self {
        self.fields = fields;
        self
    }
}

/// Decodes a response body. Invalid UTF-8 is read as ISO-8859-1, which
/// several older map servers still emit.
#[must_use]
pub fn decode_body(body: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(body) {
        Ok(s) => Cow::Borrowed(s.trim_start_matches('\u{feff}')),
        Err(_) => Cow::Owned(body.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Parses a response body of the given wire format into at most one
/// record.
///
/// Returns `Ok(None)` when the response is well formed but carries no
/// usable value.
///
/// # Errors
///
/// * [`ParseError::ServiceException`] if the body is an exception report
/// * [`ParseError::Malformed`] / [`ParseError::Json`] if the body does not
///   match the expected shape
/// * [`ParseError::LicenseRestricted`] if the only values found are
///   fee-gated
pub fn parse(
    format: WireFormat,
    body: &[u8],
    ctx: &ParseContext,
) -> Result<Option<LandValueRecord>, ParseError> {
    let text = decode_body(body);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(message) = markers::service_exception(text) {
        return Err(ParseError::ServiceException { message });
    }

    let features = match format {
        WireFormat::Json => json::features(text)?,
        WireFormat::Xml => gml::features(text)?,
        WireFormat::PlainText => plaintext::features(text),
        WireFormat::Html => html::features(text),
    };
    log::trace!(
        "[{}] {} feature(s) in {format} response",
        ctx.jurisdiction,
        features.len()
    );

    let decimal = ctx.decimal.for_format(format);
    let resolved;
    let ctx = if decimal == ctx.decimal {
        ctx
    } else {
        resolved = ctx.clone().with_decimal(decimal);
        &resolved
    };

    let mut extraction = fields::extract_all(&features, ctx);
    if extraction.candidates.is_empty()
        && format == WireFormat::Html
        && let Some(feature) = html::free_text_feature(text)
    {
        extraction = fields::extract_all(std::slice::from_ref(&feature), ctx);
    }

    if let Some(record) = select::select_best(extraction.candidates) {
        return Ok(Some(record));
    }

    if extraction.fee_gated || markers::is_fee_gated(text) {
        return Err(ParseError::LicenseRestricted);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::new("Hessen", "BORIS Hessen WMS (Hessen)", "dl-de/by-2-0")
    }

    #[test]
    fn normalizes_keys_with_units_and_umlauts() {
        assert_eq!(normalize_key("Bodenrichtwert (€/m²):"), "bodenrichtwert");
        assert_eq!(normalize_key("Art der Nutzung"), "art_der_nutzung");
        assert_eq!(normalize_key("Gemeinde-Name"), "gemeinde_name");
        assert_eq!(normalize_key("Größe in m²"), "groesse");
        assert_eq!(normalize_key("  BRW  "), "brw");
    }

    #[test]
    fn first_inserted_value_wins() {
        let mut feature = RawFeature::new(None);
        feature.insert_text("BRW", "100");
        feature.insert_text("brw", "200");
        feature.insert_text("leer", "   ");
        assert_eq!(feature.get("brw"), Some(&FieldValue::Text("100".into())));
        assert!(feature.get("leer").is_none());
    }

    #[test]
    fn latin1_bodies_are_decoded() {
        let body = b"NUTA = 'Gr\xfcnland'";
        assert_eq!(decode_body(body), "NUTA = 'Grünland'");
    }

    #[test]
    fn empty_body_is_not_found() {
        assert!(parse(WireFormat::Json, b"  \n", &ctx()).unwrap().is_none());
        assert!(parse(WireFormat::Xml, b"", &ctx()).unwrap().is_none());
    }

    #[test]
    fn exception_report_is_service_exception() {
        let body = br#"<?xml version="1.0"?>
<ServiceExceptionReport version="1.3.0">
  <ServiceException code="LayerNotDefined">Layer brw_2030 not defined</ServiceException>
</ServiceExceptionReport>"#;
        let err = parse(WireFormat::Xml, body, &ctx()).unwrap_err();
        match err {
            ParseError::ServiceException { message } => {
                assert!(message.contains("brw_2030"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn fee_marker_is_license_restricted() {
        let body = b"BRW = 'kostenpflichtig'\nSTAG = '2024-01-01'";
        assert!(matches!(
            parse(WireFormat::PlainText, body, &ctx()),
            Err(ParseError::LicenseRestricted)
        ));
    }

    #[test]
    fn html_free_text_fallback() {
        let body = "<html><body><p>Der Bodenrichtwert betr&auml;gt <b>385 €/m²</b> \
                    zum Stichtag 01.01.2024.</p></body></html>";
        let record = parse(WireFormat::Html, body.as_bytes(), &ctx())
            .unwrap()
            .unwrap();
        assert!((record.value - 385.0).abs() < f64::EPSILON);
        assert_eq!(record.effective_date, "2024-01-01");
        assert_eq!(record.jurisdiction, "Hessen");
        assert_eq!(record.development_status, "B");
    }

    #[test]
    fn period_decimals_in_gml_and_json_are_not_thousands() {
        let ctx = ParseContext::new("Brandenburg", "BORIS Brandenburg WFS", "dl-de/by-2-0")
            .with_ceiling(20_000.0);
        let gml = b"<wfs:FeatureCollection><wfs:member><b:brw><b:BRW>0.750</b:BRW>\
                    <b:NUTA>LW</b:NUTA></b:brw></wfs:member></wfs:FeatureCollection>";
        let record = parse(WireFormat::Xml, gml, &ctx).unwrap().unwrap();
        assert!((record.value - 0.75).abs() < 1e-9, "got {}", record.value);

        let json = br#"{"features":[{"properties":{"BRW":"1.250","NUTA":"W"}}]}"#;
        let record = parse(WireFormat::Json, json, &ctx).unwrap().unwrap();
        assert!((record.value - 1.25).abs() < 1e-9, "got {}", record.value);

        let text = b"BRW = '1.250'\nNUTA = 'W'";
        let record = parse(WireFormat::PlainText, text, &ctx).unwrap().unwrap();
        assert!((record.value - 1250.0).abs() < 1e-9, "got {}", record.value);
    }

    #[test]
    fn parsing_is_idempotent_for_every_format() {
        let cases: [(WireFormat, &[u8]); 4] = [
            (
                WireFormat::Json,
                br#"{"type":"FeatureCollection",
                     "features":[{"properties":{"BRW":250,"NUTA":"W"}}]}"#,
            ),
            (
                WireFormat::Xml,
                b"<wfs:FeatureCollection><wfs:member>\
                  <b:brw><b:BRW>250</b:BRW></b:brw>\
                  </wfs:member></wfs:FeatureCollection>",
            ),
            (WireFormat::PlainText, b"Layer 'brw'\n  Feature 1:\n    BRW = '250'\n"),
            (
                WireFormat::Html,
                b"<table><tr><td>BRW</td><td>250</td></tr>\
                  <tr><td>Nutzung</td><td>W</td></tr></table>",
            ),
        ];
        for (format, body) in cases {
            let first = parse(format, body, &ctx()).unwrap();
            let second = parse(format, body, &ctx()).unwrap();
            assert!(first.is_some(), "{format} produced no record");
            assert_eq!(first, second, "{format} not idempotent");
        }
    }
}
