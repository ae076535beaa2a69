//! Client configuration.
//!
//! A `ClientConfig` is built once and handed to `MaxineClient::new`; the
//! client never mutates it afterwards.

use std::time::Duration;

/// Default registry location when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const ENV_BASE_URL: &str = "MAXINE_URL";
pub const ENV_API_KEY: &str = "MAXINE_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "MAXINE_TIMEOUT_SECS";

/// Immutable settings for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: None,
        }
    }

    /// Attach a credential sent as `X-API-Key` on every request. An empty
    /// key clears it.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Overall per-request timeout handed to the transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read `MAXINE_URL`, `MAXINE_API_KEY` and `MAXINE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);
        if let Some(api_key) = lookup(ENV_API_KEY) {
            config = config.with_api_key(api_key);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS)
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
        {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert!(config.api_key().is_none());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn environment_overrides_everything() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://registry:9000"),
            (ENV_API_KEY, "secret"),
            (ENV_TIMEOUT_SECS, "5"),
        ]));
        assert_eq!(config.base_url(), "http://registry:9000");
        assert_eq!(config.api_key(), Some("secret"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, ""),
            (ENV_API_KEY, ""),
            (ENV_TIMEOUT_SECS, "soon"),
        ]));
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "0")]));
        assert!(config.timeout().is_none());
    }

    #[test]
    fn setters_return_new_values() {
        let base = ClientConfig::new("http://a");
        let keyed = base.clone().with_api_key("k");
        assert!(base.api_key().is_none());
        assert_eq!(keyed.api_key(), Some("k"));
        assert!(keyed.with_api_key("").api_key().is_none());
    }
}
