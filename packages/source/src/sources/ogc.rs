//! Generic adapter for official OGC land value services.
//!
//! One [`OgcSource`] executes any [`JurisdictionDefinition`] with a query
//! section: per endpoint it resolves the layer list (static or
//! discovered), expands it with the configured formats and coordinate
//! systems into candidate batches, and hands them to the strategy loop.

use std::time::Duration;

use async_trait::async_trait;
use land_value_models::{AdapterDescriptor, LandValueRecord, Protocol, Strategy};
use land_value_parser::{ParseContext, markers};

use crate::definition::{EndpointConfig, JurisdictionDefinition, QueryConfig};
use crate::discovery::{self, LayerMemo};
use crate::strategy::first_success;
use crate::{LandValueSource, SourceError, http, ogc};

/// Config-driven adapter for WFS, WMS and OGC API services.
pub struct OgcSource {
    descriptor: AdapterDescriptor,
    query: QueryConfig,
    ctx: ParseContext,
    client: http::HttpClient,
    memo: LayerMemo,
}

impl OgcSource {
    /// Builds the adapter for a definition.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ConfigurationGap`] if the definition has no
    /// query section or no endpoints.
    pub fn from_definition(definition: &JurisdictionDefinition) -> Result<Self, SourceError> {
        let query = definition
            .query
            .clone()
            .filter(|q| !q.endpoints.is_empty())
            .ok_or_else(|| SourceError::ConfigurationGap {
                jurisdiction: definition.name.clone(),
            })?;

        let ctx = ParseContext::new(&definition.name, &definition.source(), &definition.license)
            .with_ceiling(query.ceiling)
            .with_decimal(query.decimal.into())
            .with_default_development(&query.default_development);

        Ok(Self {
            descriptor: AdapterDescriptor::official(&definition.name, &definition.code),
            query,
            ctx,
            client: http::client(http::timeout_from_env()),
            memo: LayerMemo::default(),
        })
    }

    /// Points every endpoint at `url`.
    #[must_use]
    pub fn with_endpoint(mut self, url: &str) -> Self {
        for endpoint in &mut self.query.endpoints {
            url.clone_into(&mut endpoint.url);
        }
        self
    }

    /// Overrides the plausibility ceiling.
    #[must_use]
    pub const fn with_ceiling(mut self, ceiling: f64) -> Self {
        self.query.ceiling = ceiling;
        self.ctx.ceiling = ceiling;
        self
    }

    /// Overrides the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }

    /// Plausibility ceiling in effect.
    #[must_use]
    pub const fn ceiling(&self) -> f64 {
        self.query.ceiling
    }

    /// Layer list for an endpoint: memoized discovery result, fresh
    /// discovery, or the static list.
    async fn layers(&self, endpoint: &EndpointConfig) -> Vec<String> {
        if !endpoint.discover {
            return endpoint.layers.clone();
        }
        if let Some(layers) = self.memo.get(&endpoint.url) {
            return layers;
        }

        let label = &self.descriptor.code;
        match discovery::discover_layers(&self.client, endpoint).await {
            Ok(layers) => {
                log::debug!(
                    "[{label}] Discovered {} layer(s) at {}: {layers:?}",
                    layers.len(),
                    endpoint.url
                );
                self.memo.insert(&endpoint.url, layers.clone());
                layers
            }
            Err(e) => {
                log::warn!(
                    "[{label}] Layer discovery at {} failed ({e}), using {} static layer(s)",
                    endpoint.url,
                    endpoint.layers.len()
                );
                endpoint.layers.clone()
            }
        }
    }

    /// Expands one endpoint into candidate batches in priority order:
    /// formats, then coordinate systems, then layers.
    fn batches(&self, endpoint: &EndpointConfig, layers: &[String]) -> Vec<Vec<Strategy>> {
        let batch_size = if self.query.race {
            self.query.race_batch.max(1)
        } else {
            1
        };

        let mut batches = Vec::new();
        for &format in &endpoint.formats {
            for &crs in &endpoint.crs {
                for chunk in layers.chunks(batch_size) {
                    batches.push(
                        chunk
                            .iter()
                            .map(|layer| {
                                Strategy::new(
                                    &endpoint.url,
                                    endpoint.protocol,
                                    &endpoint.version,
                                    format,
                                    crs,
                                    layer,
                                )
                            })
                            .collect(),
                    );
                }
            }
        }
        batches
    }
}

/// Structural check of a capabilities response body.
fn looks_like_capabilities(protocol: Protocol, body: &str) -> bool {
    if markers::service_exception(body).is_some() {
        return false;
    }
    match protocol {
        Protocol::Wfs | Protocol::Wms => body.contains("Capabilities"),
        Protocol::OgcApi => serde_json::from_str::<serde_json::Value>(body)
            .is_ok_and(|json| json.get("collections").is_some()),
    }
}

#[async_trait]
impl LandValueSource for OgcSource {
    fn descriptor(&self) -> &AdapterDescriptor {
        &self.descriptor
    }

    async fn fetch_value(&self, lat: f64, lon: f64) -> Option<LandValueRecord> {
        let label = &self.descriptor.code;
        log::debug!("[{label}] Looking up ({lat:.6}, {lon:.6})");

        for endpoint in &self.query.endpoints {
            let layers = self.layers(endpoint).await;
            if layers.is_empty() {
                log::debug!("[{label}] No layers for {}, skipping", endpoint.url);
                continue;
            }

            let batches = self.batches(endpoint, &layers);
            if let Some(record) = first_success(
                &self.client,
                batches,
                lat,
                lon,
                self.query.radius_m,
                &self.ctx,
            )
            .await
            {
                return Some(record);
            }
        }

        log::info!("[{label}] No land value at ({lat:.6}, {lon:.6})");
        None
    }

    async fn health_check(&self) -> bool {
        let Some(endpoint) = self.query.endpoints.first() else {
            return false;
        };
        let request =
            ogc::capabilities_request(&endpoint.url, endpoint.protocol, &endpoint.version);
        let protocol = endpoint.protocol;
        http::probe(&self.client, &request.url, &request.query, |body| {
            looks_like_capabilities(protocol, body)
        })
        .await
    }
}
