//! Effective date normalization.

use chrono::{DateTime, NaiveDate};
use land_value_models::{CURRENT, UNKNOWN};

/// Normalizes an upstream date to `YYYY-MM-DD`, [`CURRENT`] or [`UNKNOWN`].
///
/// Accepts `dd.mm.yyyy`, `yyyy-mm-dd` (optionally followed by a time),
/// `yyyymmdd`, `dd/mm/yyyy`, a bare year (mapped to January 1st, the usual
/// reference date) and epoch milliseconds as emitted by Esri services.
#[must_use]
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim().trim_matches(['\'', '"']).trim();
    if s.is_empty() {
        return UNKNOWN.to_string();
    }

    let lower = s.to_lowercase();
    if lower.contains("aktuell") || lower == CURRENT {
        return CURRENT.to_string();
    }

    parse_date(s).map_or_else(|| UNKNOWN.to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    for fmt in ["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    // ISO timestamps: keep only the date part
    if s.len() > 10
        && s.is_char_boundary(10)
        && let Ok(date) = NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d")
    {
        return Some(date);
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        match s.len() {
            4 => {
                let year = s.parse::<i32>().ok()?;
                if (1900..=2100).contains(&year) {
                    return NaiveDate::from_ymd_opt(year, 1, 1);
                }
            }
            8 => return NaiveDate::parse_from_str(s, "%Y%m%d").ok(),
            12 | 13 => {
                let ms = s.parse::<i64>().ok()?;
                return DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive());
            }
            _ => {}
        }
    }

    None
}
