//! HTTP producer for upstream JSON APIs
//!
//! Performs exactly one bounded request per call and classifies the response:
//! not-found becomes a negative outcome, success is parsed into the caller's
//! type, and everything else is a [`FetchError`]. Caching is left to the
//! orchestrator.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::outcome::{FetchError, Outcome};

/// Default time budget for one upstream call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default identifying user agent
pub const DEFAULT_USER_AGENT: &str = concat!("fetchcache/", env!("CARGO_PKG_VERSION"));

/// Client for fetching JSON documents from a rate-limited provider
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    timeout: Duration,
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamClient {
    /// Creates a client with the default timeout and user agent
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> UpstreamClientBuilder {
        UpstreamClientBuilder::default()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url` and parses a successful body as `T`
    ///
    /// # Returns
    /// * `Ok(Outcome::Positive(T))` - 2xx with a parseable body
    /// * `Ok(Outcome::Negative)` - 404
    /// * `Err(FetchError)` - any other status, timeout, transport or parse failure
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<Outcome<T>, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(url, "upstream reports not found");
            return Ok(Outcome::Negative);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let value = serde_json::from_slice(&body)?;
        Ok(Outcome::Positive(value))
    }

    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(error)
        }
    }
}

/// Builder for [`UpstreamClient`]
#[derive(Debug, Clone)]
pub struct UpstreamClientBuilder {
    timeout: Duration,
    user_agent: String,
    headers: Vec<(String, String)>,
}

impl Default for UpstreamClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl UpstreamClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header sent with every request (e.g. an API key)
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builds the client
    ///
    /// Headers with invalid names or values are skipped with a warning.
    pub fn build(self) -> UpstreamClient {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&self.user_agent) {
            Ok(value) => {
                headers.insert(USER_AGENT, value);
            }
            Err(e) => tracing::warn!(error = %e, "ignoring invalid user agent"),
        }
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "ignoring invalid header"),
            }
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                Client::new()
            });

        UpstreamClient {
            client,
            timeout: self.timeout,
        }
    }
}

/// Substitutes `{id}` in a URL template
pub fn url_for_id(template: &str, id: &str) -> String {
    template.replace("{id}", id)
}

/// Substitutes `{ids}` in a URL template with a comma-joined identifier list
pub fn url_for_ids<S: AsRef<str>>(template: &str, ids: &[S]) -> String {
    let joined = ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    template.replace("{ids}", &joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, PartialEq, Deserialize)]
    struct Details {
        icao24: String,
        registration: String,
    }

    #[tokio::test]
    async fn test_success_is_positive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/flights/details/abc123"))
            .and(header("accept", "application/json"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "icao24": "abc123",
                "registration": "N12345"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::builder().header("x-api-key", "secret").build();
        let url = url_for_id(&format!("{}/v1/flights/details/{{id}}", server.uri()), "abc123");
        let outcome = client.fetch_json::<Details>(&url).await.unwrap();

        assert_eq!(
            outcome,
            Outcome::Positive(Details {
                icao24: "abc123".to_string(),
                registration: "N12345".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_not_found_is_negative() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let outcome = UpstreamClient::new()
            .fetch_json::<Details>(&format!("{}/missing", server.uri()))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Negative);
    }

    #[tokio::test]
    async fn test_server_error_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = UpstreamClient::new()
            .fetch_json::<Details>(&server.uri())
            .await;

        assert!(matches!(result, Err(FetchError::Status(429))));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = UpstreamClient::new()
            .fetch_json::<Details>(&server.uri())
            .await;

        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::builder()
            .timeout(Duration::from_millis(100))
            .build();
        let result = client.fetch_json::<serde_json::Value>(&server.uri()).await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
    }

    #[test]
    fn test_url_templates() {
        assert_eq!(
            url_for_ids("https://api.example.com/markets?ids={ids}", &["bitcoin", "ethereum"]),
            "https://api.example.com/markets?ids=bitcoin,ethereum"
        );
        assert_eq!(url_for_id("https://x/{id}/details", "abc"), "https://x/abc/details");
    }
}
