// Telemetry module for structured logging and metrics

use crate::config::LogFormat;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// `RUST_LOG` wins over `log_level` when set. JSON output carries the current
/// span and span list so request fields show up on every event.
pub fn init_logging(log_level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, format = ?format, "Structured logging initialized");

    Ok(())
}

/// Install the Prometheus recorder and describe every metric
///
/// The returned handle renders the exposition text for the `/metrics` route.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(
        "redis_commands_total",
        "Total number of Redis commands issued, by command and outcome"
    );
    describe_counter!(
        "redis_connection_attempts_total",
        "Total number of connection attempts (client setup plus probe), by outcome"
    );
    describe_histogram!(
        "redis_command_duration_seconds",
        "Duration of Redis commands in seconds, retries included"
    );

    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

#[inline]
pub fn record_command(command: &'static str, success: bool, duration_seconds: f64) {
    let outcome = if success { "success" } else { "error" };
    counter!("redis_commands_total", "command" => command, "outcome" => outcome).increment(1);
    histogram!("redis_command_duration_seconds", "command" => command).record(duration_seconds);
}

#[inline]
pub fn record_connection_attempt(success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!("redis_connection_attempts_total", "outcome" => outcome).increment(1);
}
