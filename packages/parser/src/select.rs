//! Best-feature selection.
//!
//! When one query returns several features, prefer the one whose land use
//! ranks highest, then the most recent effective date. Fields are never
//! merged across features.

use land_value_models::{CURRENT, LandValueRecord};

use crate::land_use::LandUseCategory;

/// A parsed record together with its land use category.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Category used for ranking.
    pub category: LandUseCategory,
    /// The fully mapped record.
    pub record: LandValueRecord,
}

/// Sort key for effective dates: [`CURRENT`] is newest, unparseable dates
/// are oldest. ISO dates compare lexicographically.
fn date_rank(date: &str) -> (u8, &str) {
    if date == CURRENT {
        (2, "")
    } else if date.len() == 10 && date.as_bytes()[4] == b'-' {
        (1, date)
    } else {
        (0, "")
    }
}

/// Picks the best candidate. On a complete tie the earliest candidate wins.
#[must_use]
pub fn select_best(candidates: Vec<Candidate>) -> Option<LandValueRecord> {
    let mut best: Option<Candidate> = None;
    for candidate in candidates {
        let better = best.as_ref().is_none_or(|current| {
            let new_key = (
                candidate.category.priority(),
                date_rank(&candidate.record.effective_date),
            );
            let old_key = (
                current.category.priority(),
                date_rank(&current.record.effective_date),
            );
            new_key > old_key
        });
        if better {
            best = Some(candidate);
        }
    }
    best.map(|c| c.record)
}
