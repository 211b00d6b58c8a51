//! Locale-aware number parsing.
//!
//! German services write `1.250,50 €/m²` where others write `1250.50`.

use std::sync::LazyLock;

use land_value_models::WireFormat;
use regex::Regex;

/// Strips currency and area units so only the numeric token remains.
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)€|\beuro?\b|/\s*m²|/\s*m2\b|/\s*qm\b|\bm²|\bqm\b").expect("valid regex")
});

/// First number-like token (digits with `.`/`,` separators).
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d[\d.,]*").expect("valid regex"));

/// How a source writes decimal and thousands separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecimalConvention {
    /// `1,250.5`: period decimal, comma thousands.
    Point,
    /// `1.250,5`: comma decimal, period thousands.
    Comma,
    /// Guess from the token itself.
    #[default]
    Auto,
    /// Like [`Self::Auto`], but a lone period is always the decimal point.
    AutoPoint,
}

impl DecimalConvention {
    /// Convention to apply to a response of the given wire format.
    ///
    /// XML and JSON carry machine-written numbers (`0.750`), so `Auto`
    /// only guesses thousands grouping from a lone period in HTML and
    /// plain text.
    #[must_use]
    pub const fn for_format(self, format: WireFormat) -> Self {
        match (self, format) {
            (Self::Auto, WireFormat::Json | WireFormat::Xml) => Self::AutoPoint,
            (convention, _) => convention,
        }
    }
}

/// Parses a number embedded in free text such as `"1.250,00 €/m²"`.
///
/// With [`DecimalConvention::Auto`], when both separators appear the last
/// one is the decimal separator; a lone comma is a decimal separator; a
/// lone period followed by exactly three digits (or several periods) is a
/// thousands separator.
#[must_use]
pub fn parse_number(raw: &str, convention: DecimalConvention) -> Option<f64> {
    let cleaned = raw.replace(['\u{a0}', '\u{202f}', '\''], "");
    let cleaned = UNIT_RE.replace_all(&cleaned, " ");
    let token = NUMBER_RE.find(&cleaned)?.as_str();
    let token = token.trim_end_matches(['.', ',']);
    if token.is_empty() || token == "-" {
        return None;
    }

    let normalized = match resolve(token, convention) {
        DecimalConvention::Point => token.replace(',', ""),
        DecimalConvention::Comma => token.replace('.', "").replace(',', "."),
        DecimalConvention::Auto | DecimalConvention::AutoPoint => token.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Resolves [`DecimalConvention::Auto`] for a concrete token.
fn resolve(token: &str, convention: DecimalConvention) -> DecimalConvention {
    if !matches!(convention, DecimalConvention::Auto | DecimalConvention::AutoPoint) {
        return convention;
    }

    let last_comma = token.rfind(',');
    let last_period = token.rfind('.');
    match (last_comma, last_period) {
        (Some(c), Some(p)) => {
            if c > p {
                DecimalConvention::Comma
            } else {
                DecimalConvention::Point
            }
        }
        (Some(_), None) => DecimalConvention::Comma,
        (None, Some(p)) => {
            let periods = token.matches('.').count();
            let decimals = token.len() - p - 1;
            let grouped = decimals == 3 && convention == DecimalConvention::Auto;
            if periods > 1 || grouped {
                DecimalConvention::Comma
            } else {
                DecimalConvention::Point
            }
        }
        (None, None) => DecimalConvention::Point,
    }
}
