//! Client for the police data API's stop-and-search endpoint.
//!
//! One request returns every stop-and-search record for a force in a
//! given month:
//!
//! ```text
//! GET {base_url}/stops-force?force={force}&date={YYYY-MM}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use police_data_stop_search_models::Period;

use crate::retry::{self, FetchFailure, Response, RetryPolicy};
use crate::{PeriodFetcher, RawRecord, SourceError};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://data.police.uk/api";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = "Police Data Analysis Tool - Academic Research";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`StopSearchClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root without a trailing slash.
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// [`PeriodFetcher`] backed by the live API.
pub struct StopSearchClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl StopSearchClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/stops-force", config.base_url.trim_end_matches('/')),
            retry: config.retry,
        })
    }
}

#[async_trait]
impl PeriodFetcher for StopSearchClient {
    async fn fetch_period(
        &self,
        force: &str,
        period: Period,
    ) -> Result<Vec<RawRecord>, FetchFailure> {
        if force.trim().is_empty() {
            return Err(FetchFailure::InvalidRequest {
                message: "force identifier must not be empty".to_string(),
            });
        }

        let date = period.to_string();
        let label = format!("{force} {date}");

        log::info!("[{label}] fetching stop and search records");

        let response = retry::send_json(
            || {
                self.http
                    .get(&self.endpoint)
                    .query(&[("force", force), ("date", date.as_str())])
            },
            &self.retry,
            &label,
        )
        .await?;

        let records = match response {
            Response::NotFound => Vec::new(),
            Response::Json(serde_json::Value::Array(records)) => records,
            Response::Json(other) => {
                log::warn!(
                    "[{label}] unexpected response shape (expected an array, got {}), treating as empty",
                    json_kind(&other)
                );
                Vec::new()
            }
        };

        log::info!("[{label}] retrieved {} records", records.len());

        Ok(records)
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer, retry: RetryPolicy) -> StopSearchClient {
        StopSearchClient::new(&ClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_millis(200),
            retry,
            ..ClientConfig::default()
        })
        .unwrap()
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn returns_records_for_period() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .and(query_param("force", "metropolitan"))
            .and(query_param("date", "2023-01"))
            .and(header("user-agent", DEFAULT_USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "Person search"},
                {"type": "Vehicle search"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let records = client
            .fetch_period("metropolitan", period("2023-01"))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "Person search");
    }

    #[tokio::test]
    async fn not_found_is_empty_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let records = client
            .fetch_period("metropolitan", period("2023-02"))
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn persistent_bad_gateway_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(502))
            .expect(u64::from(retry::MAX_RETRIES) + 1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(retry::MAX_RETRIES));
        let err = client
            .fetch_period("metropolitan", period("2023-03"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FetchFailure::RetriesExhausted {
                attempts: retry::MAX_RETRIES + 1,
                last: retry::RetryReason::BadGateway,
            }
        );
    }

    #[tokio::test]
    async fn service_unavailable_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let err = client
            .fetch_period("metropolitan", period("2023-04"))
            .await
            .unwrap_err();

        assert_eq!(err, FetchFailure::ServiceUnavailable);
    }

    #[tokio::test]
    async fn other_status_is_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(2));
        let err = client
            .fetch_period("metropolitan", period("2023-05"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchFailure::RetriesExhausted {
                attempts: 3,
                last: retry::RetryReason::Status(_),
            }
        ));
    }

    #[tokio::test]
    async fn recovers_after_transient_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"type": "Person search"}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let records = client
            .fetch_period("metropolitan", period("2023-06"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(1));
        let err = client
            .fetch_period("metropolitan", period("2023-07"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchFailure::RetriesExhausted {
                attempts: 2,
                last: retry::RetryReason::Timeout(_),
            }
        ));
    }

    #[tokio::test]
    async fn non_array_body_is_treated_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stops-force"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "odd"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let records = client
            .fetch_period("metropolitan", period("2023-08"))
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn empty_force_is_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, RetryPolicy::immediate(5));
        let err = client.fetch_period("  ", period("2023-09")).await.unwrap_err();

        assert!(matches!(err, FetchFailure::InvalidRequest { .. }));
    }
}
