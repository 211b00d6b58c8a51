//! HTML `GetFeatureInfo` responses.
//!
//! Two table layouts occur in practice: key/value tables with two cells per
//! row (one feature per table) and header tables with one feature per body
//! row. When neither yields a usable value, [`free_text_feature`] searches
//! the flattened page text for an amount in EUR/m².

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::RawFeature;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// An amount followed by a currency-per-area unit.
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*)\s*(?:€|EUR|Euro)\s*(?:/|pro|je)\s*(?:m²|m2|qm)")
        .expect("valid regex")
});

static STICHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)stichtag\D{0,5}(\d{1,2}\.\d{1,2}\.\d{4}|\d{4}-\d{2}-\d{2})")
        .expect("valid regex")
});

/// Collapses whitespace in an element's text content.
fn cell_text(element: ElementRef<'_>) -> String {
    let joined = element.text().collect::<Vec<_>>().join(" ");
    WHITESPACE_RE.replace_all(&joined, " ").trim().to_string()
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| unreachable!())
}

/// Extracts features from every table in the document.
#[must_use]
pub fn features(text: &str) -> Vec<RawFeature> {
    let document = Html::parse_document(text);
    let table_sel = selector("table");
    let row_sel = selector("tr");
    let cell_sel = selector("th, td");
    let th_sel = selector("th");
    let caption_sel = selector("caption");

    let mut features = Vec::new();
    for table in document.select(&table_sel) {
        let layer = table.select(&caption_sel).next().map(cell_text);
        let rows: Vec<(Vec<String>, bool)> = table
            .select(&row_sel)
            .map(|row| {
                let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
                let all_header = !cells.is_empty() && row.select(&th_sel).count() == cells.len();
                (cells, all_header)
            })
            .filter(|(cells, _)| !cells.is_empty())
            .collect();

        let Some((first, _)) = rows.first() else {
            continue;
        };

        if is_header_table(&rows) {
            for (cells, _) in &rows[1..] {
                let mut feature = RawFeature::new(layer.as_deref());
                for (header, value) in first.iter().zip(cells) {
                    feature.insert_text(header, value);
                }
                if !feature.is_empty() {
                    features.push(feature);
                }
            }
        } else {
            let mut feature = RawFeature::new(layer.as_deref());
            for (cells, _) in &rows {
                if let [key, value] = cells.as_slice() {
                    feature.insert_text(key, value);
                }
            }
            if !feature.is_empty() {
                features.push(feature);
            }
        }
    }

    features
}

/// A table is a header table when its first row consists only of `<th>`
/// cells and data rows follow. A two-column header reading like
/// `Merkmal | Wert` still denotes a key/value table.
fn is_header_table(rows: &[(Vec<String>, bool)]) -> bool {
    let Some((first, true)) = rows.first() else {
        return false;
    };
    if rows.len() < 2 || first.len() < 2 {
        return false;
    }
    if first.len() == 2 {
        let label = first[0].to_lowercase();
        let key_value_header = ["merkmal", "attribut", "eigenschaft", "feld", "name", "key"]
            .iter()
            .any(|k| label.contains(k));
        return !key_value_header;
    }
    true
}

/// Builds a feature from the page's free text: the first EUR/m² amount
/// and, when present, the Stichtag.
#[must_use]
pub fn free_text_feature(text: &str) -> Option<RawFeature> {
    let document = Html::parse_document(text);
    let flattened = cell_text(document.root_element());

    let price = PRICE_RE.captures(&flattened)?;
    let mut feature = RawFeature::new(None);
    feature.insert_text("bodenrichtwert", &price[1]);
    if let Some(date) = STICHTAG_RE.captures(&flattened) {
        feature.insert_text("stichtag", &date[1]);
    }
    Some(feature)
}

#[cfg(test)]
mod tests {
    use crate::FieldValue;

    use super::*;

    fn text_of<'a>(feature: &'a RawFeature, key: &str) -> Option<&'a str> {
        match feature.get(key)? {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Number(_) => None,
        }
    }

    #[test]
    fn key_value_table() {
        let body = r"<html><body><table>
            <tr><td>Bodenrichtwert:</td><td>  1.150 €/m² </td></tr>
            <tr><td>Stichtag</td><td>01.01.2024</td></tr>
            <tr><td>Art der Nutzung</td><td><b>MI</b> (Mischgebiet)</td></tr>
        </table></body></html>";
        let features = features(body);
        assert_eq!(features.len(), 1);
        assert_eq!(text_of(&features[0], "bodenrichtwert"), Some("1.150 €/m²"));
        assert_eq!(text_of(&features[0], "art_der_nutzung"), Some("MI (Mischgebiet)"));
    }

    #[test]
    fn header_table_yields_one_feature_per_row() {
        let body = r"<table><caption>brw_bauland</caption>
            <tr><th>BRW</th><th>STAG</th><th>NUTA</th></tr>
            <tr><td>300</td><td>2024-01-01</td><td>W</td></tr>
            <tr><td>280</td><td>2022-01-01</td><td>W</td></tr>
        </table>";
        let features = features(body);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].layer.as_deref(), Some("brw_bauland"));
        assert_eq!(text_of(&features[1], "brw"), Some("280"));
    }

    #[test]
    fn two_column_header_table_with_merkmal_is_key_value() {
        let body = r"<table>
            <tr><th>Merkmal</th><th>Wert</th></tr>
            <tr><td>BRW</td><td>95</td></tr>
        </table>";
        let features = features(body);
        assert_eq!(features.len(), 1);
        assert_eq!(text_of(&features[0], "brw"), Some("95"));
    }

    #[test]
    fn free_text_price_and_date() {
        let body = "<div>Bodenrichtwert 72,50 EUR/m2 (Stichtag: 1.1.2023)</div>";
        let feature = free_text_feature(body).unwrap();
        assert_eq!(text_of(&feature, "bodenrichtwert"), Some("72,50"));
        assert_eq!(text_of(&feature, "stichtag"), Some("1.1.2023"));
    }

    #[test]
    fn pages_without_tables_or_prices() {
        assert!(features("<html><body><p>Keine Daten</p></body></html>").is_empty());
        assert!(free_text_feature("<p>Keine Daten</p>").is_none());
    }
}
