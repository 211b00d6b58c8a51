//! Declarative field synonym table.
//!
//! Upstream services rename the same concept across states and schema
//! revisions (`BRW`, `bodenrichtwert`, `brwert`, ...). Each semantic field
//! is an ordered list of normalized attribute names evaluated against a
//! "first present, numeric, in range" rule for the value and "first
//! non-empty" for the text fields.

use land_value_models::{LandValueRecord, UNKNOWN};

use crate::date::normalize_date;
use crate::land_use::LandUseCategory;
use crate::markers::is_fee_marker;
use crate::select::Candidate;
use crate::{FieldValue, ParseContext, RawFeature};

/// Ordered synonym lists per semantic field. Names are in
/// [`crate::normalize_key`] form.
#[derive(Debug)]
pub struct FieldTable {
    /// Land value in EUR/m².
    pub value: &'static [&'static str],
    /// Reference date (Stichtag).
    pub effective_date: &'static [&'static str],
    /// Type of use (Art der Nutzung).
    pub land_use: &'static [&'static str],
    /// Development status (Entwicklungszustand).
    pub development: &'static [&'static str],
    /// Zone number.
    pub zone_id: &'static [&'static str],
    /// Municipality.
    pub municipality: &'static [&'static str],
}

/// Synonyms covering the BORIS-D VBORIS schema and the state-specific
/// variants seen across the sixteen services.
pub static STANDARD_FIELDS: FieldTable = FieldTable {
    value: &[
        "brw",
        "bodenrichtwert",
        "brwert",
        "brw_wert",
        "bodenrichtwert_eur",
        "brw_eur_qm",
        "richtwert",
        "value",
        "wert",
    ],
    effective_date: &[
        "stag",
        "stichtag",
        "brw_stichtag",
        "stichtag_brw",
        "stichtag_des_bodenrichtwerts",
        "datum",
        "gueltig_ab",
        "jahr",
    ],
    land_use: &[
        "nuta",
        "nutzungsart",
        "art_der_nutzung",
        "art_nutzung",
        "nutzung",
        "brw_nutzung",
        "art",
    ],
    development: &[
        "entw",
        "entwicklungszustand",
        "entwicklung",
        "ezst",
    ],
    zone_id: &[
        "wnum",
        "brwznr",
        "brwnummer",
        "brw_nummer",
        "zonennummer",
        "bodenrichtwertnummer",
        "bodenrichtwertzone",
        "zone",
        "zonen_nr",
        "nummer",
    ],
    municipality: &[
        "gena",
        "gemeinde",
        "gemeindename",
        "gemeinde_name",
        "gemeinde_ortsteil",
        "ort",
        "gemarkung",
        "municipality",
    ],
};

/// Outcome of looking up the value field on one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueLookup {
    /// A plausible value.
    Found(f64),
    /// Only fee markers or masked values were present.
    FeeGated,
    /// No present value parsed into the plausible range.
    Missing,
}

/// Result of mapping a batch of features.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Features that produced a plausible record.
    pub candidates: Vec<Candidate>,
    /// Whether at least one feature had a fee-gated value.
    pub fee_gated: bool,
}

impl FieldTable {
    /// Applies the "first present, numeric, `0 < v < ceiling`" rule.
    #[must_use]
    pub fn value(&self, feature: &RawFeature, ctx: &ParseContext) -> ValueLookup {
        let mut fee_gated = false;
        for name in self.value {
            let Some(raw) = feature.get(name) else {
                continue;
            };
            if let FieldValue::Text(text) = raw
                && is_fee_marker(text)
            {
                fee_gated = true;
                continue;
            }
            if let Some(v) = raw.as_number(ctx.decimal)
                && v > 0.0
                && v < ctx.ceiling
            {
                return ValueLookup::Found(v);
            }
        }
        if fee_gated {
            ValueLookup::FeeGated
        } else {
            ValueLookup::Missing
        }
    }

    /// Returns the first non-empty text among `names`.
    #[must_use]
    pub fn text(names: &[&str], feature: &RawFeature) -> Option<String> {
        names
            .iter()
            .filter_map(|name| feature.get(name))
            .map(|v| v.as_text().trim().to_string())
            .find(|s| !s.is_empty())
    }

    /// Maps one feature into a candidate record.
    #[must_use]
    pub fn to_candidate(&self, feature: &RawFeature, ctx: &ParseContext) -> Option<Candidate> {
        let ValueLookup::Found(value) = self.value(feature, ctx) else {
            return None;
        };

        let land_use_class = Self::text(self.land_use, feature);
        let layer = feature.layer.as_deref().or(ctx.layer.as_deref());
        let category = match (&land_use_class, layer) {
            (Some(class), _) => match LandUseCategory::classify(class) {
                LandUseCategory::Unknown => {
                    layer.map_or(LandUseCategory::Unknown, LandUseCategory::classify)
                }
                category => category,
            },
            (None, Some(layer)) => LandUseCategory::classify(layer),
            (None, None) => LandUseCategory::Unknown,
        };

        let record = LandValueRecord {
            value,
            effective_date: Self::text(self.effective_date, feature)
                .map_or_else(|| UNKNOWN.to_string(), |d| normalize_date(&d)),
            land_use_class: land_use_class.unwrap_or_else(|| UNKNOWN.to_string()),
            development_status: Self::text(self.development, feature).map_or_else(
                || ctx.default_development.clone(),
                |s| normalize_development(&s),
            ),
            zone_id: Self::text(self.zone_id, feature).unwrap_or_default(),
            municipality: Self::text(self.municipality, feature).unwrap_or_default(),
            jurisdiction: ctx.jurisdiction.clone(),
            source: ctx.source.clone(),
            license: ctx.license.clone(),
            estimation: None,
        };

        Some(Candidate { category, record })
    }
}

/// Maps every feature, tracking whether fee markers were seen.
#[must_use]
pub fn extract_all(features: &[RawFeature], ctx: &ParseContext) -> Extraction {
    let mut extraction = Extraction::default();
    for feature in features {
        if let Some(candidate) = ctx.fields.to_candidate(feature, ctx) {
            extraction.candidates.push(candidate);
        } else if ctx.fields.value(feature, ctx) == ValueLookup::FeeGated {
            extraction.fee_gated = true;
        }
    }
    extraction
}

/// Normalizes a development status to its short code.
///
/// Known long forms map to `B` (baureifes Land), `R` (Rohbauland), `E`
/// (Bauerwartungsland), `LF` (land- und forstwirtschaftliche Fläche) and
/// `SF` (sonstige Fläche). Anything else is returned trimmed, uppercased
/// when it already looks like a code.
#[must_use]
pub fn normalize_development(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = crate::transliterate(&trimmed.to_lowercase());
    let code = if lower.contains("baureif") {
        "B"
    } else if lower.contains("rohbau") {
        "R"
    } else if lower.contains("bauerwartung") {
        "E"
    } else if lower.contains("forst") || lower.contains("landwirt") || lower.contains("agrar") {
        "LF"
    } else if lower.contains("sonstig") {
        "SF"
    } else if trimmed.len() <= 4 {
        return trimmed.to_uppercase();
    } else {
        return trimmed.to_string();
    };
    code.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::new("Sachsen", "BORIS Sachsen WMS (Sachsen)", "dl-de/by-2-0")
            .with_default_development("B")
    }

    fn feature(pairs: &[(&str, &str)]) -> RawFeature {
        let mut f = RawFeature::new(None);
        for (k, v) in pairs {
            f.insert_text(k, v);
        }
        f
    }

    #[test]
    fn first_plausible_synonym_wins() {
        let f = feature(&[("BRW", "0"), ("Bodenrichtwert", "310,50"), ("wert", "999")]);
        assert_eq!(STANDARD_FIELDS.value(&f, &ctx()), ValueLookup::Found(310.5));
    }

    #[test]
    fn values_above_ceiling_are_rejected() {
        let f = feature(&[("BRW", "750000")]);
        assert_eq!(STANDARD_FIELDS.value(&f, &ctx()), ValueLookup::Missing);
        let low = ctx().with_ceiling(100.0);
        let f = feature(&[("BRW", "120"), ("wert", "80")]);
        assert_eq!(STANDARD_FIELDS.value(&f, &low), ValueLookup::Found(80.0));
    }

    #[test]
    fn fee_markers_are_reported() {
        let f = feature(&[("BRW", "***")]);
        assert_eq!(STANDARD_FIELDS.value(&f, &ctx()), ValueLookup::FeeGated);
        let extraction = extract_all(&[f], &ctx());
        assert!(extraction.fee_gated);
        assert!(extraction.candidates.is_empty());
    }

    #[test]
    fn maps_all_fields() {
        let f = feature(&[
            ("BRW", "185"),
            ("STAG", "01.01.2024"),
            ("NUTA", "W"),
            ("ENTW", "baureifes Land"),
            ("WNUM", "4711"),
            ("GENA", "Leipzig"),
        ]);
        let candidate = STANDARD_FIELDS.to_candidate(&f, &ctx()).unwrap();
        let r = candidate.record;
        assert!((r.value - 185.0).abs() < f64::EPSILON);
        assert_eq!(r.effective_date, "2024-01-01");
        assert_eq!(r.land_use_class, "W");
        assert_eq!(r.development_status, "B");
        assert_eq!(r.zone_id, "4711");
        assert_eq!(r.municipality, "Leipzig");
        assert_eq!(r.jurisdiction, "Sachsen");
        assert_eq!(candidate.category, LandUseCategory::Residential);
    }

    #[test]
    fn missing_text_fields_use_defaults() {
        let f = feature(&[("BRW", "42")]);
        let r = STANDARD_FIELDS
            .to_candidate(&f, &ctx().with_default_development("LF"))
            .unwrap()
            .record;
        assert_eq!(r.effective_date, UNKNOWN);
        assert_eq!(r.land_use_class, UNKNOWN);
        assert_eq!(r.development_status, "LF");
        assert!(r.zone_id.is_empty());
    }

    #[test]
    fn layer_name_classifies_when_land_use_missing() {
        let mut f = RawFeature::new(Some("brw_forst"));
        f.insert_text("BRW", "1,20");
        let candidate = STANDARD_FIELDS.to_candidate(&f, &ctx()).unwrap();
        assert_eq!(candidate.category, LandUseCategory::Forest);
        assert_eq!(candidate.record.land_use_class, UNKNOWN);
    }

    #[test]
    fn development_codes() {
        assert_eq!(normalize_development("b"), "B");
        assert_eq!(normalize_development("Rohbauland"), "R");
        assert_eq!(normalize_development("Bauerwartungsland"), "E");
        assert_eq!(normalize_development("Fläche der Land- oder Forstwirtschaft"), "LF");
        assert_eq!(normalize_development("sonstige Fläche"), "SF");
    }
}
