#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ncsr/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! sec-api.io client for filing search and XBRL conversion.
//!
//! This crate provides access to two hosted endpoints:
//!
//! - The Query API, a paginated full-text search over EDGAR filings
//! - The XBRL-to-JSON API, which renders a filing's inline XBRL as JSON
//!
//! # Example
//!
//! ```no_run
//! use ncsr_core::{FilingSearch, SearchRequest, XbrlConverter};
//! use ncsr_secapi::{SecApiClient, SecApiConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SecApiClient::new(SecApiConfig::from_env()?)?;
//!
//!     let page = client
//!         .search(&SearchRequest::new(r#"formType:"N-CSR""#, 50))
//!         .await?;
//!     for hit in page.filings.unwrap_or_default() {
//!         println!("{:?} {:?}", hit.company_name, hit.link_to_filing_details);
//!     }
//!
//!     let xbrl = client
//!         .xbrl_to_json("https://www.sec.gov/Archives/edgar/data/819118/d1.htm")
//!         .await?;
//!     println!("has expense ratio: {}", xbrl.contains("ExpenseRatioPct"));
//!
//!     Ok(())
//! }
//! ```

mod config;

pub use config::{API_KEY_VAR, DEFAULT_QUERY_URL, DEFAULT_XBRL_URL, SecApiConfig};

use async_trait::async_trait;
use ncsr_core::{
    FilingSearch, NcsrError, Result, SearchPage, SearchRequest, XbrlConverter, XbrlJson,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Name reported by [`FilingSearch::name`] and [`XbrlConverter::name`].
const PROVIDER_NAME: &str = "sec-api.io";

/// Rate limiter to space out requests to the vendor
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_request: now.checked_sub(min_interval).unwrap_or(now),
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// sec-api.io client.
///
/// Implements [`FilingSearch`] and [`XbrlConverter`]. Requests share one
/// rate limiter, so concurrent extraction stays under the configured pace.
#[derive(Debug, Clone)]
pub struct SecApiClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    config: SecApiConfig,
}

impl SecApiClient {
    /// Create a new client from a config.
    ///
    /// # Example
    /// ```
    /// use ncsr_secapi::{SecApiClient, SecApiConfig};
    ///
    /// let config = SecApiConfig::new("your-api-key").unwrap();
    /// let client = SecApiClient::new(config).unwrap();
    /// ```
    pub fn new(config: SecApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| NcsrError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a new client with a pre-configured HTTP client.
    pub fn with_client(client: reqwest::Client, config: SecApiConfig) -> Self {
        Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.min_interval))),
            config,
        }
    }

    /// Returns the config this client was built with.
    #[must_use]
    pub const fn config(&self) -> &SecApiConfig {
        &self.config
    }

    /// Send a request and decode the JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T> {
        // Rate limit
        self.rate_limiter.lock().await.wait().await;

        let response = request
            .header(reqwest::header::AUTHORIZATION, self.config.api_key.as_str())
            .send()
            .await
            .map_err(|e| NcsrError::Network(e.to_string()))?;

        check_status(response.status(), url)?;

        response
            .json()
            .await
            .map_err(|e| NcsrError::Parse(format!("Failed to parse response from {}: {}", url, e)))
    }
}

#[async_trait]
impl FilingSearch for SecApiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let url = self.config.query_url.as_str();
        debug!(
            query = %request.query,
            from = request.from,
            size = request.size,
            "Searching filings"
        );

        let builder = self.client.post(url).json(&search_body(request));
        self.send_json(builder, url).await
    }
}

#[async_trait]
impl XbrlConverter for SecApiClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn xbrl_to_json(&self, filing_url: &str) -> Result<XbrlJson> {
        if filing_url.trim().is_empty() {
            return Err(NcsrError::InvalidParameter("Empty filing URL".to_string()));
        }

        let url = self.config.xbrl_url.as_str();
        debug!(filing_url, "Converting filing to XBRL JSON");

        let builder = self.client.get(url).query(&[("htm-url", filing_url)]);
        let body: Value = self.send_json(builder, url).await?;

        match body {
            Value::Object(map) => Ok(XbrlJson::from(map)),
            other => Err(NcsrError::Parse(format!(
                "Expected a JSON object from the XBRL converter for {}, got {}",
                filing_url,
                json_kind(&other)
            ))),
        }
    }
}

/// Build the Query API request body.
fn search_body(request: &SearchRequest) -> Value {
    let order = if request.descending { "desc" } else { "asc" };
    let mut sort = Map::new();
    sort.insert(request.sort_field.clone(), json!({ "order": order }));

    json!({
        "query": request.query,
        "from": request.from.to_string(),
        "size": request.size.to_string(),
        "sort": [sort],
    })
}

/// Map a response status to an error.
fn check_status(status: StatusCode, url: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(NcsrError::AuthenticationFailed(PROVIDER_NAME.to_string()))
        }
        StatusCode::TOO_MANY_REQUESTS => Err(NcsrError::RateLimited(PROVIDER_NAME.to_string())),
        _ => Err(NcsrError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_search_body() {
        let request = SearchRequest::new(
            r#"(formType:"N-CSR") AND filedAt:[2024-01-01 TO 2024-06-30]"#,
            50,
        )
        .next_page();
        let body = search_body(&request);

        assert_eq!(body["from"], "50");
        assert_eq!(body["size"], "50");
        assert_eq!(body["sort"][0]["filedAt"]["order"], "desc");
        assert_eq!(
            body["query"],
            r#"(formType:"N-CSR") AND filedAt:[2024-01-01 TO 2024-06-30]"#
        );
    }

    #[rstest]
    #[case(StatusCode::OK, None)]
    #[case(StatusCode::UNAUTHORIZED, Some("Authentication failed"))]
    #[case(StatusCode::FORBIDDEN, Some("Authentication failed"))]
    #[case(StatusCode::TOO_MANY_REQUESTS, Some("Rate limited"))]
    #[case(StatusCode::BAD_GATEWAY, Some("HTTP 502"))]
    fn test_check_status(#[case] status: StatusCode, #[case] expected: Option<&str>) {
        let result = check_status(status, "https://api.sec-api.io");
        match expected {
            None => assert!(result.is_ok()),
            Some(text) => assert!(result.unwrap_err().to_string().contains(text)),
        }
    }

    #[test]
    fn test_provider_names() {
        let client = SecApiClient::new(SecApiConfig::new("test-key").unwrap()).unwrap();
        assert_eq!(FilingSearch::name(&client), "sec-api.io");
        assert_eq!(XbrlConverter::name(&client), "sec-api.io");
        assert_eq!(client.config().api_key, "test-key");
    }

    #[tokio::test]
    async fn test_empty_filing_url_is_rejected() {
        let client = SecApiClient::new(SecApiConfig::new("test-key").unwrap()).unwrap();
        let result = client.xbrl_to_json("  ").await;
        assert!(matches!(result, Err(NcsrError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let mut limiter = RateLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
