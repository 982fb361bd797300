//! Connection settings for the sec-api.io endpoints.

use std::fmt;
use std::time::Duration;

use ncsr_core::{NcsrError, Result};

/// Query API endpoint.
pub const DEFAULT_QUERY_URL: &str = "https://api.sec-api.io";

/// XBRL-to-JSON converter endpoint.
pub const DEFAULT_XBRL_URL: &str = "https://api.sec-api.io/xbrl-to-json";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "SEC_API_KEY";

const QUERY_URL_VAR: &str = "SEC_API_QUERY_URL";
const XBRL_URL_VAR: &str = "SEC_API_XBRL_URL";
const TIMEOUT_VAR: &str = "SEC_API_TIMEOUT_SECS";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default spacing between requests.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Settings injected into [`SecApiClient`](crate::SecApiClient).
#[derive(Clone)]
pub struct SecApiConfig {
    /// API key sent in the `Authorization` header.
    pub api_key: String,
    /// Query API URL.
    pub query_url: String,
    /// XBRL-to-JSON URL.
    pub xbrl_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between consecutive requests.
    pub min_interval: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl SecApiConfig {
    /// Creates a config with default endpoints for the given key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(NcsrError::InvalidParameter(format!(
                "{API_KEY_VAR} is empty"
            )));
        }

        Ok(Self {
            api_key,
            query_url: DEFAULT_QUERY_URL.to_string(),
            xbrl_url: DEFAULT_XBRL_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            min_interval: DEFAULT_MIN_INTERVAL,
            user_agent: concat!("ncsr/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    /// Builds a config from the process environment.
    ///
    /// `SEC_API_KEY` is required; `SEC_API_QUERY_URL`, `SEC_API_XBRL_URL` and
    /// `SEC_API_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup(API_KEY_VAR)
            .ok_or_else(|| NcsrError::InvalidParameter(format!("{API_KEY_VAR} is not set")))?;
        let mut config = Self::new(api_key)?;

        if let Some(url) = lookup(QUERY_URL_VAR) {
            config.query_url = url;
        }
        if let Some(url) = lookup(XBRL_URL_VAR) {
            config.xbrl_url = url;
        }
        if let Some(secs) = lookup(TIMEOUT_VAR) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                NcsrError::InvalidParameter(format!("{TIMEOUT_VAR} must be a number: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the minimum spacing between requests.
    #[must_use]
    pub const fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }
}

impl fmt::Debug for SecApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecApiConfig")
            .field("api_key", &"<redacted>")
            .field("query_url", &self.query_url)
            .field("xbrl_url", &self.xbrl_url)
            .field("timeout", &self.timeout)
            .field("min_interval", &self.min_interval)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = SecApiConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("SEC_API_KEY"));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config = SecApiConfig::from_lookup(lookup(&[("SEC_API_KEY", "abc")])).unwrap();
        assert_eq!(config.query_url, DEFAULT_QUERY_URL);
        assert_eq!(config.xbrl_url, DEFAULT_XBRL_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);

        let config = SecApiConfig::from_lookup(lookup(&[
            ("SEC_API_KEY", "abc"),
            ("SEC_API_QUERY_URL", "http://localhost:9000"),
            ("SEC_API_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.query_url, "http://localhost:9000");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_bad_timeout() {
        let result = SecApiConfig::from_lookup(lookup(&[
            ("SEC_API_KEY", "abc"),
            ("SEC_API_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(NcsrError::InvalidParameter(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = SecApiConfig::new("very-secret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
