//! Guardian health monitor.
//!
//! Registers one federation from the environment, then reconnects it on a
//! fixed interval and logs the guardian health it observes. Connection
//! failures are logged and retried on the next tick.
//!
//! # Configuration
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `HEARTH_GUARDIANS` | required | comma-separated guardian base URLs |
//! | `HEARTH_THRESHOLD` | majority | guardians that must be online |
//! | `HEARTH_FEDERATION_NAME` | `hearth` | name logged with every report |
//! | `HEARTH_MONITOR_INTERVAL_SECS` | `30` | seconds between probes |
//! | `HEARTH_PROBE_TIMEOUT_MS` | `2000` | bound on a single probe |
//!
//! ```bash
//! export HEARTH_GUARDIANS="https://g0.example,https://g1.example,https://g2.example"
//! RUST_LOG=info cargo run --release -p hearth-monitor
//! ```

use std::time::Duration;

use hearth_config::FederationConfig;
use hearth_sdk::FederationOrchestrator;
use hearth_sdk::federation::NoGateway;
use hearth_transport::HttpGuardianTransport;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_NAME: &str = "hearth";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("hearth-monitor starting");

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    let guardians: Vec<String> = std::env::var("HEARTH_GUARDIANS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if guardians.is_empty() {
        tracing::error!("HEARTH_GUARDIANS is empty, nothing to monitor");
        std::process::exit(2);
    }

    let threshold = env_parse("HEARTH_THRESHOLD").unwrap_or(guardians.len() / 2 + 1);
    let name = std::env::var("HEARTH_FEDERATION_NAME").unwrap_or_else(|_| DEFAULT_NAME.to_owned());
    let interval = Duration::from_secs(
        env_parse("HEARTH_MONITOR_INTERVAL_SECS")
            .unwrap_or(DEFAULT_INTERVAL_SECS)
            .max(1),
    );
    let config = FederationConfig {
        probe_timeout_ms: env_parse("HEARTH_PROBE_TIMEOUT_MS")
            .unwrap_or(FederationConfig::DEFAULT.probe_timeout_ms),
        ..FederationConfig::DEFAULT
    };

    // -----------------------------------------------------------------------
    // Orchestrator init
    // -----------------------------------------------------------------------

    let transport =
        HttpGuardianTransport::new(config.probe_timeout() * 2).expect("HTTP transport");
    let cancel = CancellationToken::new();
    let orchestrator = FederationOrchestrator::new(config, transport, NoGateway, cancel.clone());

    let info = orchestrator
        .create_federation(&name, "monitored federation", &guardians, threshold)
        .expect("federation config");
    tracing::info!(
        federation_id = %info.id,
        name = %info.name,
        guardians = guardians.len(),
        threshold,
        "federation registered"
    );

    // -----------------------------------------------------------------------
    // Probe loop
    // -----------------------------------------------------------------------

    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                cancel.cancel();
                break;
            }
            _ = ticker.tick() => {}
        }

        match orchestrator.connect(&info.id).await {
            Ok(report) => tracing::info!(
                federation_id = %info.id,
                online = report.online,
                syncing = report.syncing,
                total = report.total,
                epoch_height = report.epoch_height,
                "quorum available"
            ),
            Err(hearth_sdk::SdkError::Cancelled) => break,
            Err(e) => tracing::warn!(federation_id = %info.id, error = %e, "quorum check failed"),
        }

        if let Ok(health) = orchestrator.guardian_health(&info.id) {
            tracing::info!(
                federation_id = %info.id,
                online_percentage = health.online_percentage,
                quorum_met = health.quorum_met,
                "guardian health"
            );
        }
    }

    orchestrator.shutdown().await;
    tracing::info!("hearth-monitor stopped");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parses an env var, logging and ignoring malformed values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed environment variable");
            None
        }
    }
}
