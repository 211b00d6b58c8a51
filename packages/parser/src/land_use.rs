//! Land use classification and ranking.
//!
//! Grouped queries return several sub-layers (building land, agriculture,
//! forest) for the same point. The ranking decides which one answers the
//! question "what is the land value here", preferring developed land.

/// Substring rules applied after exact code matching, in order.
const SUBSTRING_RULES: &[(&[&str], LandUseCategory)] = &[
    (&["wald", "forst", "forest"], LandUseCategory::Forest),
    (
        &["landwirt", "acker", "gruenland", "agrar", "agricultur"],
        LandUseCategory::Agriculture,
    ),
    (&["wohn", "residential"], LandUseCategory::Residential),
    (
        &["misch", "mixed", "kern", "dorf", "bauland", "baufl"],
        LandUseCategory::Mixed,
    ),
    (
        &["gewerb", "industr", "commercial", "handel"],
        LandUseCategory::Commercial,
    ),
    (&["sonder", "special"], LandUseCategory::Special),
];

/// Coarse land use category derived from a code, free text or layer name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandUseCategory {
    /// Wohnbaufläche (`W`, `WA`, `WR`, ...).
    Residential,
    /// Gemischte Baufläche (`M`, `MI`, `MD`, `MK`, ...) and generic building land.
    Mixed,
    /// Gewerbliche Baufläche (`G`, `GE`, `GI`).
    Commercial,
    /// Sonderbaufläche (`S`, `SO`).
    Special,
    /// Landwirtschaftliche Fläche (`LW`, `A`, `GR`).
    Agriculture,
    /// Forstwirtschaftliche Fläche (`F`).
    Forest,
    /// Could not be classified.
    Unknown,
}

impl LandUseCategory {
    /// Selection priority, higher wins.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Residential => 5,
            Self::Mixed => 4,
            Self::Commercial => 3,
            Self::Special | Self::Unknown => 2,
            Self::Agriculture => 1,
            Self::Forest => 0,
        }
    }

    /// Classifies a land use code, description or layer name.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Unknown;
        }

        let upper = trimmed.to_uppercase();
        let code = upper.split([' ', '(', '/']).next().unwrap_or_default();
        match code {
            "W" | "WS" | "WR" | "WA" | "WB" | "WO" => return Self::Residential,
            "M" | "MI" | "MD" | "MDW" | "MK" | "MU" => return Self::Mixed,
            "G" | "GE" | "GI" => return Self::Commercial,
            "S" | "SO" | "SE" => return Self::Special,
            "LW" | "L" | "A" | "GR" | "EGA" => return Self::Agriculture,
            "F" | "FW" => return Self::Forest,
            _ => {}
        }

        let lower = crate::transliterate(&trimmed.to_lowercase());
        SUBSTRING_RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
            .map_or(Self::Unknown, |(_, category)| *category)
    }
}

impl std::fmt::Display for LandUseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Residential => "residential",
            Self::Mixed => "mixed",
            Self::Commercial => "commercial",
            Self::Special => "special",
            Self::Agriculture => "agriculture",
            Self::Forest => "forest",
            Self::Unknown => "unknown",
        })
    }
}
