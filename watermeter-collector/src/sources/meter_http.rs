use std::time::Duration;

use reqwest::{Client, Response};
use time::OffsetDateTime;
use watermeter_db::domain::Reading;

use crate::{
    pipeline::{PipelineError, Source},
    transform,
};

/// Meter payloads are a few hundred bytes; a larger body is not a reading.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Polls the meter's JSON endpoint with a plain GET.
pub struct HttpMeterSource {
    client: Client,
    url: String,
    meter_id: String,
}

impl HttpMeterSource {
    pub fn new(url: &str, meter_id: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.to_string(),
            meter_id: meter_id.to_string(),
        })
    }
}

async fn read_body(mut response: Response, limit: usize) -> Result<Vec<u8>, PipelineError> {
    let too_large = || PipelineError::Fetch(format!("meter response body exceeds {limit} bytes"));
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| PipelineError::Fetch(format!("failed to read meter response body: {e}")))?
    {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Stamp readings at whole-second resolution: `(time, meter_id)` is the primary key.
fn reading_time() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

#[async_trait::async_trait]
impl Source for HttpMeterSource {
    async fn fetch(&self) -> Result<Reading, PipelineError> {
        metrics::counter!("meter_polls_total").increment(1);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::Fetch(format!("failed to read meter at {}: {e}", self.url)))?;
        let body = read_body(response, MAX_BODY_BYTES).await?;

        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| PipelineError::Validation(format!("invalid JSON response from meter: {e}")))?;
        tracing::debug!(%payload, "meter reading");

        transform::reading_from_payload(&payload, &self.meter_id, reading_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        format!("http://{addr}/api/data")
    }

    fn source(url: &str) -> HttpMeterSource {
        HttpMeterSource::new(url, "test_meter", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn reads_and_converts_meter_payload() {
        let url = serve(Router::new().route(
            "/api/data",
            get(|| async {
                Json(json!({
                    "wifi_ssid": "TestNetwork",
                    "wifi_strength": -45,
                    "total_liter_m3": 123.456,
                    "active_liter_lpm": 2.5,
                    "total_liter_offset_m3": "0.5"
                }))
            }),
        ))
        .await;

        let reading = source(&url).fetch().await.unwrap();
        assert_eq!(reading.meter_id, "test_meter");
        assert_eq!(reading.total_liter_m3, 123.456);
        assert_eq!(reading.active_liter_lpm, 2.5);
        assert_eq!(reading.wifi_strength, -45);
        assert_eq!(reading.wifi_ssid.as_deref(), Some("TestNetwork"));
        assert_eq!(reading.total_liter_offset_m3, Some(0.5));
        assert_eq!(reading.time.nanosecond(), 0);
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_error() {
        let url = serve(Router::new().route("/api/data", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))).await;

        assert!(matches!(source(&url).fetch().await, Err(PipelineError::Fetch(_))));
    }

    #[tokio::test]
    async fn unreachable_meter_is_a_fetch_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/api/data");
        assert!(matches!(source(&url).fetch().await, Err(PipelineError::Fetch(_))));
    }

    #[tokio::test]
    async fn slow_meter_times_out_as_fetch_error() {
        let url = serve(Router::new().route(
            "/api/data",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        ))
        .await;

        let source = HttpMeterSource::new(&url, "test_meter", Duration::from_millis(100)).unwrap();
        assert!(matches!(source.fetch().await, Err(PipelineError::Fetch(_))));
    }

    #[tokio::test]
    async fn oversized_body_is_a_fetch_error() {
        let url = serve(Router::new().route(
            "/api/data",
            get(|| async { "x".repeat(MAX_BODY_BYTES + 1) }),
        ))
        .await;
        let err = source(&url).fetch().await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(ref msg) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_error() {
        let url = serve(Router::new().route("/api/data", get(|| async { "<html>not json</html>" }))).await;

        assert!(matches!(source(&url).fetch().await, Err(PipelineError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_required_field_is_a_validation_error() {
        let url = serve(Router::new().route(
            "/api/data",
            get(|| async { Json(json!({"total_liter_m3": 123.456, "wifi_strength": -45})) }),
        ))
        .await;

        assert!(matches!(source(&url).fetch().await, Err(PipelineError::Validation(_))));
    }
}
