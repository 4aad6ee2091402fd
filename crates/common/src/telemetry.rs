use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use thiserror::Error;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ticketing-service".to_string(),
            log_level: "info".to_string(),
            jaeger_endpoint: Some("http://localhost:14268/api/traces".to_string()),
            enable_jaeger: false,
        }
    }
}

impl TelemetryConfig {
    /// Read `RUST_LOG`, `ENABLE_JAEGER` and `JAEGER_ENDPOINT`
    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enable_jaeger = lookup("ENABLE_JAEGER")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            service_name: service_name.to_string(),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            jaeger_endpoint: lookup("JAEGER_ENDPOINT"),
            enable_jaeger,
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("Failed to install Jaeger pipeline: {0}")]
    Tracer(String),

    #[error("Global subscriber already set: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Filter from the configured level; sqlx statement logs stay at warn unless asked for
fn env_filter(log_level: &str) -> Result<EnvFilter, ParseError> {
    let filter = EnvFilter::try_new(log_level)?;
    if log_level.contains("sqlx") {
        return Ok(filter);
    }
    Ok(filter.add_directive("sqlx=warn".parse::<Directive>()?))
}

/// Install the JSON log subscriber, plus a Jaeger exporter when enabled
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .with_current_span(true);

    let otel_layer = if config.enable_jaeger {
        let endpoint = config
            .jaeger_endpoint
            .clone()
            .unwrap_or_else(|| "localhost:6831".to_string());
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(endpoint)
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .map_err(|e| TelemetryError::Tracer(e.to_string()))?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.log_level)?)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = %config.service_name,
        jaeger = config.enable_jaeger,
        "Telemetry initialized"
    );
    Ok(())
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "ticketing-service");
        assert_eq!(config.log_level, "info");
        assert!(!config.enable_jaeger);
    }

    #[test]
    fn test_telemetry_config_from_lookup() {
        let config = TelemetryConfig::from_lookup("booking-service", |key| match key {
            "ENABLE_JAEGER" => Some("true".to_string()),
            "RUST_LOG" => Some("debug,sqlx=warn".to_string()),
            _ => None,
        });
        assert_eq!(config.service_name, "booking-service");
        assert_eq!(config.log_level, "debug,sqlx=warn");
        assert!(config.enable_jaeger);
        assert!(config.jaeger_endpoint.is_none());
    }

    #[test]
    fn test_env_filter_quiets_sqlx_by_default() {
        let filter = env_filter("info").unwrap();
        assert!(filter.to_string().contains("sqlx=warn"));

        let filter = env_filter("info,sqlx=debug").unwrap();
        assert!(!filter.to_string().contains("sqlx=warn"));
    }

    #[test]
    fn test_bad_filter_rejected() {
        assert!(env_filter("info,booking=verbose").is_err());
    }
}
