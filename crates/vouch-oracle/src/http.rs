//! # HTTP Verification Oracle
//!
//! [`VerificationOracle`] over `reqwest`. One shared client per oracle with
//! the configured per-request timeout; safe to share through `Arc`.
//!
//! ## Error Mapping
//!
//! | Condition                         | Error                  |
//! |-----------------------------------|------------------------|
//! | connect failure, timeout, 5xx     | `OracleUnavailable`    |
//! | `/health` body unparseable        | `OracleUnavailable`    |
//! | `/verify` 4xx                     | `VerificationRejected` |
//! | `/verify` body unparseable        | `SignatureDecodeError` |
//!
//! Retries are not built in. The submitter wraps calls in
//! [`crate::retry::retry`].

use std::time::Duration;

use async_trait::async_trait;

use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::oracle::{HealthStatus, VerificationOracle, VerifyRequest, VerifyResponse};

/// Oracle reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOracle {
    /// Build a client for `config.base_url`.
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| OracleError::Config(format!("failed to build HTTP client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_request(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<reqwest::Response, OracleError> {
        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::OracleUnavailable(format!("{operation}: request timed out"))
            } else {
                OracleError::OracleUnavailable(format!("{operation}: {e}"))
            }
        })?;

        if resp.status().is_server_error() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::OracleUnavailable(format!(
                "{operation}: HTTP {status}: {}",
                excerpt(&body)
            )));
        }
        Ok(resp)
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[async_trait]
impl VerificationOracle for HttpOracle {
    async fn health(&self) -> Result<HealthStatus, OracleError> {
        let url = format!("{}/health", self.base_url);
        let resp = self.send_request(self.client.get(&url), "health").await?;
        if !resp.status().is_success() {
            return Err(OracleError::OracleUnavailable(format!(
                "health: HTTP {}",
                resp.status()
            )));
        }
        let health: HealthStatus = resp.json().await.map_err(|e| {
            OracleError::OracleUnavailable(format!("health: unreadable response: {e}"))
        })?;
        let circuits = health.circuits_loaded.count().ok_or_else(|| {
            OracleError::OracleUnavailable(format!(
                "health: malformed response: circuit count {:?} out of range",
                health.circuits_loaded
            ))
        })?;
        tracing::debug!(status = %health.status, circuits, "oracle health");
        Ok(health)
    }

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, OracleError> {
        let url = format!("{}/verify", self.base_url);
        let resp = self
            .send_request(self.client.post(&url).json(request), "verify")
            .await?;

        if resp.status().is_client_error() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            // Oracles report rejections in the body's `error` field when
            // they bother to send one.
            let reason = serde_json::from_str::<VerifyResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {status}: {}", excerpt(&body)));
            return Err(OracleError::VerificationRejected(reason));
        }

        resp.json().await.map_err(|e| {
            OracleError::SignatureDecodeError(format!("verify: response deserialization failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let oracle = HttpOracle::new(&OracleConfig::new("http://oracle.test/")).unwrap();
        assert_eq!(oracle.base_url(), "http://oracle.test");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            HttpOracle::new(&OracleConfig::new("not a url")),
            Err(OracleError::Config(_))
        ));
    }

    #[test]
    fn test_excerpt_caps_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), 200);
        assert_eq!(excerpt("short"), "short");
    }

    #[tokio::test]
    async fn test_closed_port_is_unavailable() {
        let mut config = OracleConfig::new("http://127.0.0.1:1");
        config.timeout_secs = 1;
        let oracle = HttpOracle::new(&config).unwrap();
        let err = oracle.health().await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
}
