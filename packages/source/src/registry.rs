//! Jurisdiction registry: loads all definitions from embedded TOML configs
//! and maps jurisdiction names to adapter instances.
//!
//! Each `.toml` file in `packages/source/jurisdictions/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a jurisdiction means
//! creating a TOML file and adding it to the list below.

use std::collections::BTreeMap;
use std::sync::Arc;

use land_value_models::AdapterDescriptor;
use land_value_parser::transliterate;

use crate::definition::{AdapterKind, JurisdictionDefinition, parse_definition_toml};
use crate::sources::chained::ChainedSource;
use crate::sources::estimator::{MarketEstimateSource, market_table};
use crate::sources::manual::ManualLookupSource;
use crate::sources::ogc::OgcSource;
use crate::{LandValueSource, SourceError};

/// TOML configs embedded at compile time.
const JURISDICTION_TOMLS: &[(&str, &str)] = &[
    (
        "baden_wuerttemberg",
        include_str!("../jurisdictions/baden_wuerttemberg.toml"),
    ),
    ("bayern", include_str!("../jurisdictions/bayern.toml")),
    ("berlin", include_str!("../jurisdictions/berlin.toml")),
    (
        "brandenburg",
        include_str!("../jurisdictions/brandenburg.toml"),
    ),
    ("bremen", include_str!("../jurisdictions/bremen.toml")),
    ("hamburg", include_str!("../jurisdictions/hamburg.toml")),
    ("hessen", include_str!("../jurisdictions/hessen.toml")),
    (
        "mecklenburg_vorpommern",
        include_str!("../jurisdictions/mecklenburg_vorpommern.toml"),
    ),
    (
        "niedersachsen",
        include_str!("../jurisdictions/niedersachsen.toml"),
    ),
    (
        "nordrhein_westfalen",
        include_str!("../jurisdictions/nordrhein_westfalen.toml"),
    ),
    (
        "rheinland_pfalz",
        include_str!("../jurisdictions/rheinland_pfalz.toml"),
    ),
    ("saarland", include_str!("../jurisdictions/saarland.toml")),
    ("sachsen", include_str!("../jurisdictions/sachsen.toml")),
    (
        "sachsen_anhalt",
        include_str!("../jurisdictions/sachsen_anhalt.toml"),
    ),
    (
        "schleswig_holstein",
        include_str!("../jurisdictions/schleswig_holstein.toml"),
    ),
    ("thueringen", include_str!("../jurisdictions/thueringen.toml")),
];

/// Total number of configured jurisdictions (used in tests).
#[cfg(test)]
const EXPECTED_JURISDICTION_COUNT: usize = 16;

/// Returns all configured jurisdiction definitions, parsed from embedded
/// TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_jurisdictions() -> Vec<JurisdictionDefinition> {
    JURISDICTION_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_definition_toml(toml)
                .unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Builds the adapter for a definition.
///
/// Definitions that cannot be executed degrade to a manual-lookup adapter
/// rather than failing router construction.
#[must_use]
pub fn build_source(definition: &JurisdictionDefinition) -> Box<dyn LandValueSource> {
    let manual = || -> Box<dyn LandValueSource> {
        Box::new(ManualLookupSource::new(
            &definition.name,
            &definition.code,
            &definition.manual_reason(),
            &definition.reference_url,
        ))
    };
    let official = || -> Box<dyn LandValueSource> {
        match OgcSource::from_definition(definition) {
            Ok(source) => Box::new(source),
            Err(e) => {
                log::warn!("[{}] {e}, falling back to manual lookup", definition.code);
                manual()
            }
        }
    };

    match definition.kind {
        AdapterKind::Manual => manual(),
        AdapterKind::Official => official(),
        AdapterKind::Chained => {
            let primary = if definition.query.is_some() {
                official()
            } else {
                manual()
            };
            let table = definition.market_region.as_deref().and_then(market_table);
            let Some(table) = table else {
                log::warn!(
                    "[{}] No market table {:?}, using primary only",
                    definition.code,
                    definition.market_region
                );
                return primary;
            };
            let secondary =
                MarketEstimateSource::new(&definition.code, table, &definition.reference_url);
            Box::new(ChainedSource::new(primary, Box::new(secondary)))
        }
    }
}

/// Lookup keys for a name: the transliterated form (`ü` → `ue`) and the
/// folded form (`ü` → `u`), both reduced to lowercase alphanumerics.
fn name_keys(name: &str) -> [String; 2] {
    let lower = name.trim().to_lowercase();
    let compact = |s: &str| -> String { s.chars().filter(char::is_ascii_alphanumeric).collect() };
    let folded: String = lower
        .chars()
        .map(|c| match c {
            'ä' => 'a',
            'ö' => 'o',
            'ü' => 'u',
            other => other,
        })
        .collect();
    [compact(&transliterate(&lower)), compact(&folded)]
}

/// Maps jurisdiction names to adapter instances.
///
/// Built once at startup and shared for the process lifetime.
pub struct JurisdictionRouter {
    sources: Vec<Arc<dyn LandValueSource>>,
    index: BTreeMap<String, usize>,
}

impl JurisdictionRouter {
    /// Builds the router over every embedded definition.
    #[must_use]
    pub fn new() -> Self {
        Self::from_definitions(&all_jurisdictions())
    }

    /// Builds a router over the given definitions.
    #[must_use]
    pub fn from_definitions(definitions: &[JurisdictionDefinition]) -> Self {
        let mut router = Self::empty();
        for definition in definitions {
            let mut names = vec![definition.name.clone(), definition.code.clone()];
            names.extend(definition.aliases.iter().cloned());
            router.register(&names, Arc::from(build_source(definition)));
        }
        log::debug!("Registered {} jurisdiction adapter(s)", router.sources.len());
        router
    }

    /// A router without adapters.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sources: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Registers `source` under each of `names`. Later registrations win
    /// for names that were already taken.
    pub fn register(&mut self, names: &[String], source: Arc<dyn LandValueSource>) {
        let slot = self.sources.len();
        self.sources.push(source);
        for name in names {
            for key in name_keys(name) {
                if !key.is_empty() {
                    self.index.insert(key, slot);
                }
            }
        }
    }

    /// Returns the adapter registered for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ConfigurationGap`] if no adapter is
    /// registered under the name.
    pub fn try_get(&self, name: &str) -> Result<Arc<dyn LandValueSource>, SourceError> {
        name_keys(name)
            .iter()
            .find_map(|key| self.index.get(key))
            .map(|&slot| Arc::clone(&self.sources[slot]))
            .ok_or_else(|| SourceError::ConfigurationGap {
                jurisdiction: name.to_string(),
            })
    }

    /// Returns the adapter for `name`, or an inert manual-lookup adapter
    /// when none is registered.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Arc<dyn LandValueSource> {
        self.try_get(name).unwrap_or_else(|e| {
            log::info!("{e}, using manual lookup");
            Arc::new(ManualLookupSource::unregistered(name.trim()))
        })
    }

    /// Descriptors of all registered adapters, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<AdapterDescriptor> {
        self.sources
            .iter()
            .map(|source| source.descriptor().clone())
            .collect()
    }

    /// All registered adapters, in registration order.
    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn LandValueSource>] {
        &self.sources
    }
}

impl Default for JurisdictionRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_jurisdictions() {
        assert_eq!(all_jurisdictions().len(), EXPECTED_JURISDICTION_COUNT);
    }

    #[test]
    fn jurisdiction_codes_are_unique() {
        let definitions = all_jurisdictions();
        let mut codes: Vec<&str> = definitions.iter().map(|d| d.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), EXPECTED_JURISDICTION_COUNT);
    }

    #[test]
    fn all_jurisdictions_have_required_fields() {
        for def in &all_jurisdictions() {
            assert_eq!(def.code.len(), 2, "{}: code must have two letters", def.name);
            assert!(!def.name.is_empty(), "{}: name is empty", def.code);
            assert!(!def.source_label.is_empty(), "{}: no source label", def.code);
            assert!(!def.license.is_empty(), "{}: no license", def.code);
            assert!(
                def.reference_url.starts_with("https://"),
                "{}: reference_url must be https",
                def.code
            );
            match def.kind {
                AdapterKind::Official => {
                    let query = def.query.as_ref().unwrap_or_else(|| {
                        panic!("{}: official definition without query", def.code)
                    });
                    assert!(!query.endpoints.is_empty(), "{}: no endpoints", def.code);
                    assert!(query.ceiling > 0.0, "{}: ceiling must be positive", def.code);
                    for endpoint in &query.endpoints {
                        assert!(!endpoint.formats.is_empty(), "{}: no formats", def.code);
                        assert!(!endpoint.crs.is_empty(), "{}: no crs", def.code);
                        assert!(
                            endpoint.discover || !endpoint.layers.is_empty(),
                            "{}: no layers and no discovery",
                            def.code
                        );
                    }
                }
                AdapterKind::Chained => {
                    let region = def.market_region.as_deref().unwrap_or_else(|| {
                        panic!("{}: chained definition without market region", def.code)
                    });
                    assert!(market_table(region).is_some(), "{}: unknown market table", def.code);
                }
                AdapterKind::Manual => {
                    assert!(def.reason.is_some(), "{}: manual without reason", def.code);
                }
            }
        }
    }

    #[test]
    fn resolves_names_codes_and_aliases() {
        let router = JurisdictionRouter::new();
        for name in [
            "Nordrhein-Westfalen",
            "nordrhein westfalen",
            "NW",
            "NRW",
            "North Rhine-Westphalia",
        ] {
            let source = router.try_get(name).unwrap();
            assert_eq!(source.descriptor().code, "NW", "{name}");
        }
        for name in ["Thüringen", "Thueringen", "Thuringen", "TH"] {
            assert_eq!(router.try_get(name).unwrap().descriptor().code, "TH", "{name}");
        }
        assert_eq!(router.descriptors().len(), EXPECTED_JURISDICTION_COUNT);
    }

    #[test]
    fn composition_follows_kind() {
        let router = JurisdictionRouter::new();
        let bayern = router.try_get("Bayern").unwrap();
        let descriptor = bayern.descriptor();
        assert!(descriptor.is_fallback);
        assert!(descriptor.reason.is_some());
        assert!(descriptor.reference_url.is_some());

        let hessen = router.try_get("Hessen").unwrap();
        assert!(!hessen.descriptor().is_fallback);
    }

    #[tokio::test]
    async fn unknown_jurisdiction_resolves_to_manual_lookup() {
        let router = JurisdictionRouter::new();
        assert!(matches!(
            router.try_get("Atlantis"),
            Err(SourceError::ConfigurationGap { .. })
        ));

        let source = router.resolve("Atlantis");
        assert!(source.fetch_value(52.52, 13.40).await.is_none());
        assert!(source.health_check().await);
        let descriptor = source.descriptor();
        assert!(descriptor.is_fallback);
        assert!(descriptor.reason.as_deref().is_some_and(|r| !r.is_empty()));
        assert!(descriptor.reference_url.as_deref().is_some_and(|u| !u.is_empty()));
    }

    #[test]
    fn later_registration_wins() {
        let mut router = JurisdictionRouter::empty();
        router.register(
            &["Testland".to_string()],
            Arc::new(ManualLookupSource::new("Testland", "TA", "a", "https://a")),
        );
        router.register(
            &["Testland".to_string()],
            Arc::new(ManualLookupSource::new("Testland", "TB", "b", "https://b")),
        );
        assert_eq!(router.try_get("testland").unwrap().descriptor().code, "TB");
    }
}
