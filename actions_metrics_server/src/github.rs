//! GitHub integration: webhook signatures and the job log source.

use std::sync::Arc;
use std::time::Duration;

use actions_metrics::{GitHubLogSource, LogError, LogFetcher};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::ServerConfig;

type HmacSha256 = Hmac<Sha256>;

/// Validate a GitHub webhook signature (X-Hub-Signature-256).
pub fn validate_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return true;
    }

    let sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(sig_bytes) = hex::decode(sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// Log fetcher for the configured token, or `None` when no token is set.
pub fn log_fetcher(config: &ServerConfig, timeout: Duration) -> Result<Option<LogFetcher>, LogError> {
    if config.github_token.is_empty() {
        return Ok(None);
    }

    let source = GitHubLogSource::new(
        &config.github_api_url,
        Some(config.github_token.clone()),
        timeout,
    )?;
    Ok(Some(LogFetcher::new(Arc::new(source), timeout)?))
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
