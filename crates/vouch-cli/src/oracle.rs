//! `vouch health`: probe the verification oracle.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use vouch_oracle::{CircuitsLoaded, HttpOracle, OracleConfig, VerificationOracle};

use crate::{print_json, runtime, CliConfig};

/// Arguments for `vouch health`.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Oracle base URL; defaults to the configured one.
    #[arg(long)]
    pub url: Option<String>,
}

/// Output of `vouch health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// URL probed.
    pub url: String,
    /// Status string the oracle reported.
    pub status: String,
    /// Loaded-circuit report, as sent.
    pub circuits_loaded: CircuitsLoaded,
    /// Whether the oracle accepts proofs.
    pub healthy: bool,
}

/// Query `/health` once. Transport failures are errors, an unhealthy answer
/// is not.
pub async fn health(args: &HealthArgs, config: &CliConfig) -> Result<HealthReport> {
    let oracle_config = match &args.url {
        Some(url) => OracleConfig {
            base_url: url.clone(),
            ..config.oracle.clone()
        },
        None => config.oracle.clone(),
    };
    let oracle = HttpOracle::new(&oracle_config)?;
    let status = oracle.health().await?;
    Ok(HealthReport {
        url: oracle.base_url().to_string(),
        healthy: status.is_healthy(),
        status: status.status,
        circuits_loaded: status.circuits_loaded,
    })
}

/// Execute `vouch health`. Exit code 3 when the oracle is up but unhealthy.
pub fn run_health(args: &HealthArgs, config: &CliConfig) -> Result<u8> {
    let report = runtime()?.block_on(health(args, config))?;
    print_json(&report)?;
    Ok(if report.healthy { 0 } else { 3 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_healthy_with_circuit_names() {
        let server = server(serde_json::json!({
            "status": "ok",
            "circuits_loaded": ["developer", "whale"]
        }))
        .await;
        let args = HealthArgs {
            url: Some(server.uri()),
        };
        let report = health(&args, &CliConfig::default()).await.unwrap();
        assert!(report.healthy);
        assert_eq!(report.circuits_loaded.count(), Some(2));
        assert_eq!(report.url, server.uri());
    }

    #[tokio::test]
    async fn test_degraded_status_is_unhealthy() {
        let server = server(serde_json::json!({"status": "loading", "circuits_loaded": 0})).await;
        let mut config = CliConfig::default();
        config.oracle.base_url = server.uri();
        let report = health(&HealthArgs { url: None }, &config).await.unwrap();
        assert!(!report.healthy);
        assert_eq!(report.status, "loading");
    }

    #[tokio::test]
    async fn test_invalid_url_is_error() {
        let args = HealthArgs {
            url: Some("ftp://oracle.test".into()),
        };
        assert!(health(&args, &CliConfig::default()).await.is_err());
    }
}
