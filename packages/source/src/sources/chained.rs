//! Primary/secondary composition.
//!
//! The secondary adapter is consulted only when the primary has no
//! positive value. Records from the secondary always carry an
//! `estimation` block so callers can tell official from inferred values.

use async_trait::async_trait;
use land_value_models::{AdapterDescriptor, Estimation, LandValueRecord};

use crate::LandValueSource;

/// Method recorded when a secondary record arrives without estimation
/// metadata.
const UNSPECIFIED_METHOD: &str = "secondary_source";

/// Adapter composing an official primary with an estimating secondary.
pub struct ChainedSource {
    primary: Box<dyn LandValueSource>,
    secondary: Box<dyn LandValueSource>,
}

impl ChainedSource {
    /// Composes two adapters. The descriptor is the primary's.
    #[must_use]
    pub fn new(primary: Box<dyn LandValueSource>, secondary: Box<dyn LandValueSource>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl LandValueSource for ChainedSource {
    fn descriptor(&self) -> &AdapterDescriptor {
        self.primary.descriptor()
    }

    async fn fetch_value(&self, lat: f64, lon: f64) -> Option<LandValueRecord> {
        if let Some(record) = self.primary.fetch_value(lat, lon).await
            && record.has_positive_value()
        {
            return Some(record);
        }

        let label = &self.primary.descriptor().code;
        log::debug!("[{label}] Primary has no value, trying secondary");

        let mut record = self.secondary.fetch_value(lat, lon).await?;
        if !record.has_positive_value() {
            return None;
        }
        if record.estimation.is_none() {
            record.estimation = Some(Estimation {
                method: UNSPECIFIED_METHOD.to_string(),
                basis_price: record.value,
                applied_factor: 1.0,
                as_of: record.effective_date.clone(),
                disclaimer: format!(
                    "Not an official value. Derived from {}",
                    record.source
                ),
            });
        }
        Some(record)
    }

    async fn health_check(&self) -> bool {
        let (primary, secondary) =
            tokio::join!(self.primary.health_check(), self.secondary.health_check());
        primary || secondary
    }
}
