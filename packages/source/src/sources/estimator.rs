//! Market-price-derived land value estimates.
//!
//! Used as the secondary source of chained jurisdictions. The estimate is
//! the market reference price of the nearest listed city multiplied by a
//! land share factor. Every record carries an `estimation` block.

use async_trait::async_trait;
use geo::{Distance, Haversine, Point};
use land_value_models::{AdapterDescriptor, Estimation, LandValueRecord};
use serde::Deserialize;

use crate::LandValueSource;

/// Estimation method identifier written into records.
pub const METHOD: &str = "market_reference_city";

/// Market tables embedded at compile time.
const MARKET_TOMLS: &[(&str, &str)] = &[
    (
        "baden_wuerttemberg",
        include_str!("../../market/baden_wuerttemberg.toml"),
    ),
    ("bayern", include_str!("../../market/bayern.toml")),
];

/// Market reference prices for one region.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketTable {
    /// Jurisdiction the table covers.
    pub region: String,
    /// Date of the market data.
    pub as_of: String,
    /// Provenance of the market data.
    pub source: String,
    /// Usage rights of the market data.
    pub license: String,
    /// Text attached to every estimate.
    pub disclaimer: String,
    /// Coordinates farther than this from every listed city get no
    /// estimate.
    pub max_distance_km: f64,
    /// Reference cities.
    pub cities: Vec<ReferenceCity>,
}

/// One reference city of a [`MarketTable`].
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceCity {
    /// City name, written into the record's `municipality`.
    pub name: String,
    /// WGS84 latitude of the city center.
    pub lat: f64,
    /// WGS84 longitude of the city center.
    pub lon: f64,
    /// Average residential purchase price in EUR/m² of living space.
    pub basis_price: f64,
    /// Share of the purchase price attributed to land.
    pub applied_factor: f64,
}

/// Parses a market table.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_market_toml(toml_str: &str) -> Result<MarketTable, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

/// Returns the embedded market table with the given name.
///
/// # Panics
///
/// Panics if an embedded table is malformed.
#[must_use]
pub fn market_table(name: &str) -> Option<MarketTable> {
    MARKET_TOMLS.iter().find(|(n, _)| *n == name).map(|(n, toml)| {
        parse_market_toml(toml).unwrap_or_else(|e| panic!("Failed to parse market/{n}.toml: {e}"))
    })
}

/// Estimates land values from the nearest reference city.
pub struct MarketEstimateSource {
    descriptor: AdapterDescriptor,
    table: MarketTable,
}

impl MarketEstimateSource {
    /// Creates an estimator over `table` for the jurisdiction `code`.
    #[must_use]
    pub fn new(code: &str, table: MarketTable, reference_url: &str) -> Self {
        let descriptor = AdapterDescriptor::fallback(
            &table.region,
            code,
            "Values are estimated from market reference prices",
            reference_url,
        );
        Self { descriptor, table }
    }

    /// Nearest reference city and its distance in kilometers.
    fn nearest(&self, lat: f64, lon: f64) -> Option<(&ReferenceCity, f64)> {
        let here = Point::new(lon, lat);
        self.table
            .cities
            .iter()
            .map(|city| {
                let meters = Haversine.distance(here, Point::new(city.lon, city.lat));
                (city, meters / 1000.0)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Builds the estimate for a reference city.
    fn estimate(&self, city: &ReferenceCity) -> LandValueRecord {
        let value = (city.basis_price * city.applied_factor * 100.0).round() / 100.0;
        LandValueRecord {
            value,
            effective_date: self.table.as_of.clone(),
            land_use_class: "W".to_string(),
            development_status: land_value_parser::DEFAULT_DEVELOPMENT_STATUS.to_string(),
            zone_id: String::new(),
            municipality: city.name.clone(),
            jurisdiction: self.table.region.clone(),
            source: format!("{} ({})", self.table.source, self.table.region),
            license: self.table.license.clone(),
            estimation: Some(Estimation {
                method: METHOD.to_string(),
                basis_price: city.basis_price,
                applied_factor: city.applied_factor,
                as_of: self.table.as_of.clone(),
                disclaimer: self.table.disclaimer.clone(),
            }),
        }
    }
}

#[async_trait]
impl LandValueSource for MarketEstimateSource {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn fetch_value(&self, lat: f64, lon: f64) -> Option<LandValueRecord> {
        let label = &self.descriptor.code;
        let Some((city, km)) = self.nearest(lat, lon) else {
            log::debug!("[{label}] Market table is empty");
            return None;
        };
        if km > self.table.max_distance_km {
            log::debug!(
                "[{label}] Nearest reference city {} is {km:.1} km away, no estimate",
                city.name
            );
            return None;
        }

        let record = self.estimate(city);
        if !record.has_positive_value() {
            return None;
        }
        log::info!(
            "[{label}] Estimated {} EUR/m² from {} ({km:.1} km)",
            record.value,
            city.name
        );
        Some(record)
    }

    async fn health_check(&self) -> bool {
        !self.table.cities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> MarketEstimateSource {
        let table = market_table("baden_wuerttemberg").unwrap();
        MarketEstimateSource::new("BW", table, "https://www.gutachterausschuesse-bw.de")
    }

    #[test]
    fn embedded_tables_parse() {
        for (name, _) in MARKET_TOMLS {
            let table = market_table(name).unwrap();
            assert!(!table.cities.is_empty(), "{name}: no cities");
            for city in &table.cities {
                assert!(city.basis_price > 0.0, "{name}/{}", city.name);
                assert!(
                    city.applied_factor > 0.0 && city.applied_factor < 1.0,
                    "{name}/{}",
                    city.name
                );
            }
        }
        assert!(market_table("atlantis").is_none());
    }

    #[tokio::test]
    async fn estimates_from_nearest_city() {
        let source = estimator();
        // Stuttgart Schlossplatz
        let record = source.fetch_value(48.7784, 9.1800).await.unwrap();
        assert_eq!(record.municipality, "Stuttgart");
        assert!(record.has_positive_value());
        let estimation = record.estimation.unwrap();
        assert_eq!(estimation.method, METHOD);
        let expected = estimation.basis_price * estimation.applied_factor;
        assert!((record.value - expected).abs() < 0.01);
    }

    #[tokio::test]
    async fn far_away_points_get_no_estimate() {
        // Hamburg
        assert!(estimator().fetch_value(53.55, 9.99).await.is_none());
    }

    #[tokio::test]
    async fn health_reflects_table_contents() {
        let source = estimator();
        assert!(source.health_check().await);

        let mut empty = market_table("bayern").unwrap();
        empty.cities.clear();
        let source = MarketEstimateSource::new("BY", empty, "https://www.boris-bayern.de");
        assert!(!source.health_check().await);
        assert!(source.fetch_value(48.14, 11.58).await.is_none());
    }
}
