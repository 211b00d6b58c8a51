//! The generic strategy loop.
//!
//! Candidates arrive as an ordered list of batches. A batch with one
//! strategy is queried on its own; a batch with several strategies is
//! raced and the first positive record wins, dropping the in-flight
//! losers. Batches are consumed strictly in order and no candidate is
//! retried.

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use land_value_models::{LandValueRecord, Strategy};
use land_value_parser::{ParseContext, parse};

use crate::{SourceError, http, ogc};

/// Runs one candidate query and parses the response.
///
/// # Errors
///
/// Returns the classified failure; [`SourceError::EmptyResult`] when the
/// response is well formed but carries no positive value.
pub async fn query_candidate(
    client: &http::HttpClient,
    strategy: &Strategy,
    lat: f64,
    lon: f64,
    radius_m: f64,
    ctx: &ParseContext,
) -> Result<LandValueRecord, SourceError> {
    let bbox = land_value_projection::bbox_around(strategy.crs, lat, lon, radius_m);
    let request = ogc::feature_request(strategy, &bbox);
    let body = http::fetch_body(client, &request.url, &request.query).await?;

    let ctx = ctx.clone().with_layer(&strategy.layer);
    match parse(strategy.format.wire_format(), &body, &ctx)? {
        Some(record) if record.has_positive_value() => Ok(record),
        _ => Err(SourceError::EmptyResult),
    }
}

/// Returns the first positive record produced by the candidate batches.
///
/// Every failure is logged and skipped. `None` means every candidate was
/// exhausted.
pub async fn first_success(
    client: &http::HttpClient,
    batches: Vec<Vec<Strategy>>,
    lat: f64,
    lon: f64,
    radius_m: f64,
    ctx: &ParseContext,
) -> Option<LandValueRecord> {
    let label = ctx.jurisdiction.as_str();
    let mut attempted = 0_usize;

    for batch in batches {
        attempted += batch.len();

        if let [strategy] = batch.as_slice() {
            match query_candidate(client, strategy, lat, lon, radius_m, ctx).await {
                Ok(record) => {
                    log::info!("[{label}] {strategy} -> {} EUR/m²", record.value);
                    return Some(record);
                }
                Err(e) => log_failure(label, strategy, &e),
            }
            continue;
        }

        let mut racing: FuturesUnordered<_> = batch
            .iter()
            .map(|strategy| async move {
                let result = query_candidate(client, strategy, lat, lon, radius_m, ctx).await;
                (strategy, result)
            })
            .collect();

        while let Some((strategy, result)) = racing.next().await {
            match result {
                Ok(record) => {
                    log::info!(
                        "[{label}] {strategy} won race of {} -> {} EUR/m²",
                        batch.len(),
                        record.value
                    );
                    return Some(record);
                }
                Err(e) => log_failure(label, strategy, &e),
            }
        }
    }

    log::debug!("[{label}] No value after {attempted} candidate(s)");
    None
}

fn log_failure(label: &str, strategy: &Strategy, e: &SourceError) {
    if e.is_not_found() {
        log::debug!("[{label}] {strategy}: no feature");
    } else {
        log::debug!("[{label}] {strategy} failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use land_value_models::{Crs, OutputFormat, Protocol};

    use super::*;

    fn ctx() -> ParseContext {
        ParseContext::new("Hessen", "BORIS Hessen (Hessen)", "dl-de/by-2-0")
    }

    fn wms(server: &MockServer, layer: &str, format: OutputFormat) -> Strategy {
        Strategy::new(
            &server.url("/wms"),
            Protocol::Wms,
            "1.3.0",
            format,
            Crs::Etrs89Utm32,
            layer,
        )
    }

    #[tokio::test]
    async fn moves_past_failures_to_the_first_hit() {
        let server = MockServer::start_async().await;
        let broken = server
            .mock_async(|when, then| {
                when.path("/wms").query_param("INFO_FORMAT", "application/json");
                then.status(500);
            })
            .await;
        let exception = server
            .mock_async(|when, then| {
                when.path("/wms").query_param("INFO_FORMAT", "text/html");
                then.status(200).body(
                    "<ServiceExceptionReport><ServiceException>InvalidFormat</ServiceException>\
                     </ServiceExceptionReport>",
                );
            })
            .await;
        let hit = server
            .mock_async(|when, then| {
                when.path("/wms").query_param("INFO_FORMAT", "text/plain");
                then.status(200).body("BRW = '350'\nSTAG = '2024-01-01'\nNUTA = 'W'\n");
            })
            .await;

        let batches = vec![
            vec![wms(&server, "brw", OutputFormat::Json)],
            vec![wms(&server, "brw", OutputFormat::Html)],
            vec![wms(&server, "brw", OutputFormat::PlainText)],
        ];
        let client = http::client(http::DEFAULT_TIMEOUT);
        let record = first_success(&client, batches, 50.11, 8.68, 25.0, &ctx())
            .await
            .unwrap();

        assert!((record.value - 350.0).abs() < f64::EPSILON);
        assert_eq!(record.land_use_class, "W");
        assert_eq!(broken.hits_async().await, 1);
        assert_eq!(exception.hits_async().await, 1);
        assert_eq!(hit.hits_async().await, 1);
    }

    #[tokio::test]
    async fn stops_at_first_hit() {
        let server = MockServer::start_async().await;
        let hit = server
            .mock_async(|when, then| {
                when.path("/wms").query_param("LAYERS", "first");
                then.status(200).body("BRW = '120'");
            })
            .await;
        let never = server
            .mock_async(|when, then| {
                when.path("/wms").query_param("LAYERS", "second");
                then.status(200).body("BRW = '999'");
            })
            .await;

        let batches = vec![
            vec![wms(&server, "first", OutputFormat::PlainText)],
            vec![wms(&server, "second", OutputFormat::PlainText)],
        ];
        let client = http::client(http::DEFAULT_TIMEOUT);
        let record = first_success(&client, batches, 50.11, 8.68, 25.0, &ctx())
            .await
            .unwrap();
        assert!((record.value - 120.0).abs() < f64::EPSILON);
        assert_eq!(hit.hits_async().await, 1);
        assert_eq!(never.hits_async().await, 0);
    }

    #[tokio::test]
    async fn race_returns_first_success_without_waiting_for_slow_losers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/wms").query_param("LAYERS", "slow");
                then.status(200).delay(Duration::from_secs(3)).body("BRW = '500'");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/wms").query_param("LAYERS", "empty");
                then.status(200).body("Search returned no results.");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.path("/wms").query_param("LAYERS", "fast");
                then.status(200).body("BRW = '210'");
            })
            .await;

        let batches = vec![vec![
            wms(&server, "slow", OutputFormat::PlainText),
            wms(&server, "empty", OutputFormat::PlainText),
            wms(&server, "fast", OutputFormat::PlainText),
        ]];
        let client = http::client(http::DEFAULT_TIMEOUT);
        let started = std::time::Instant::now();
        let record = first_success(&client, batches, 50.11, 8.68, 25.0, &ctx())
            .await
            .unwrap();
        assert!((record.value - 210.0).abs() < f64::EPSILON);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn exhaustion_yields_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/wms");
                then.status(200).body("<not-xml");
            })
            .await;

        let batches = vec![
            vec![wms(&server, "a", OutputFormat::Gml32)],
            vec![wms(&server, "b", OutputFormat::PlainText)],
        ];
        let client = http::client(http::DEFAULT_TIMEOUT);
        assert!(
            first_success(&client, batches, 50.11, 8.68, 25.0, &ctx())
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn zero_values_are_not_hits() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/wms");
                then.status(200).body("BRW = '0'");
            })
            .await;

        let client = http::client(http::DEFAULT_TIMEOUT);
        let err = query_candidate(
            &client,
            &wms(&server, "brw", OutputFormat::PlainText),
            50.11,
            8.68,
            25.0,
            &ctx(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
