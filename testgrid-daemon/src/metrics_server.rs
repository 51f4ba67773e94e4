//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//!
//! ```ignore
//! install_metrics_recorder(&config.metrics)?;
//! // metrics::counter!() and friends now record to the Prometheus registry
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;

use testgrid_core::config::MetricsConfig;
use testgrid_core::metrics as m;

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process, from inside the tokio runtime.
///
/// # Errors
///
/// - Unsupported endpoint or unparsable listen address
/// - Socket binding fails
/// - Global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = metrics_addr(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    m::describe_metrics();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}

/// Resolve the scrape address from the `[metrics]` section.
pub fn metrics_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is supported",
            config.endpoint
        ));
    }
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_address() {
        let addr = metrics_addr(&MetricsConfig::default()).expect("addr");
        assert_eq!(addr.to_string(), "127.0.0.1:9100");
    }

    #[test]
    fn custom_endpoint_is_rejected() {
        let config = MetricsConfig {
            endpoint: "/prom".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(metrics_addr(&config).is_err());
    }

    #[test]
    fn hostname_is_not_an_address() {
        let config = MetricsConfig {
            listen_addr: "localhost".to_owned(),
            ..MetricsConfig::default()
        };
        assert!(metrics_addr(&config).is_err());
    }
}
