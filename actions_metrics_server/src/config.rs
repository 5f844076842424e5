//! Server configuration, loaded from environment variables.

use std::time::Duration;

use actions_metrics::config::{DEFAULT_ACCRUAL_INTERVAL, DEFAULT_LOG_FETCH_TIMEOUT};
use actions_metrics::ReaderConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// GitHub webhook secret for HMAC validation.
    pub github_webhook_secret: String,
    /// Token used to download job logs. Empty disables log scraping.
    pub github_token: String,
    /// REST API root, overridable for GitHub Enterprise Server.
    pub github_api_url: String,
    /// Seconds between in-progress accruals.
    pub accrual_interval_secs: u64,
    /// Seconds allowed for one log lookup plus download.
    pub log_fetch_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let github_webhook_secret = get("GITHUB_WEBHOOK_SECRET").unwrap_or_default();
        let github_token = get("GITHUB_TOKEN").unwrap_or_default();
        let github_api_url = get("GITHUB_API_URL")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "https://api.github.com".to_string());
        let accrual_interval_secs = get("ACTIONS_METRICS_ACCRUAL_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_ACCRUAL_INTERVAL.as_secs());
        let log_fetch_timeout_secs = get("ACTIONS_METRICS_LOG_FETCH_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_LOG_FETCH_TIMEOUT.as_secs());

        if github_webhook_secret.is_empty() {
            tracing::warn!("GITHUB_WEBHOOK_SECRET not set -- webhook signature validation disabled");
        }
        if github_token.is_empty() {
            tracing::warn!("GITHUB_TOKEN not set -- queue/run duration and failure metrics disabled");
        }

        Self {
            github_webhook_secret,
            github_token,
            github_api_url,
            accrual_interval_secs,
            log_fetch_timeout_secs,
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::new()
            .with_accrual_interval(Duration::from_secs(self.accrual_interval_secs))
            .with_log_fetch_timeout(Duration::from_secs(self.log_fetch_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use actions_metrics::config::MAX_ACCRUAL_INTERVAL;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert!(config.github_token.is_empty());
        assert_eq!(config.accrual_interval_secs, 5);
        assert_eq!(config.log_fetch_timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("GITHUB_TOKEN", "ghs_abc"),
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3"),
            ("ACTIONS_METRICS_ACCRUAL_INTERVAL_SECS", "15"),
            ("ACTIONS_METRICS_LOG_FETCH_TIMEOUT_SECS", "10"),
        ]);
        assert_eq!(config.github_token, "ghs_abc");
        assert_eq!(config.github_api_url, "https://ghe.example.com/api/v3");

        let reader = config.reader_config();
        assert_eq!(reader.accrual_interval, Duration::from_secs(15));
        assert_eq!(reader.log_fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config(&[
            ("ACTIONS_METRICS_ACCRUAL_INTERVAL_SECS", "0"),
            ("ACTIONS_METRICS_LOG_FETCH_TIMEOUT_SECS", "soon"),
        ]);
        assert_eq!(config.accrual_interval_secs, 5);
        assert_eq!(config.log_fetch_timeout_secs, 30);
    }

    #[test]
    fn test_zero_timeout_and_huge_interval() {
        let config = config(&[
            ("ACTIONS_METRICS_ACCRUAL_INTERVAL_SECS", "18446744073709551615"),
            ("ACTIONS_METRICS_LOG_FETCH_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(config.log_fetch_timeout_secs, 30);

        let reader = config.reader_config();
        assert_eq!(reader.accrual_interval, MAX_ACCRUAL_INTERVAL);
        assert_eq!(reader.log_fetch_timeout, Duration::from_secs(30));
    }
}
