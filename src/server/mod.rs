//! HTTP server module
//!
//! Serves the latest poll results in Prometheus text format.

pub mod handlers;

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::metrics::PollMetrics;
use crate::sink::Snapshot;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Samples of the latest successful poll
    pub snapshot: Snapshot,
    pub metrics: PollMetrics,
}

/// Routes for `/`, `/health` and the configured metrics path
pub fn router(state: AppState) -> Router {
    let metrics_path = state.config.server.path.clone();

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(&metrics_path, get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolve the configured bind address
///
/// Accepts an IP address or `localhost`.
pub fn bind_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = if bind_address == "localhost" {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        bind_address.parse().map_err(|e| {
            anyhow::anyhow!(
                "Invalid bind_address '{}': {}. Use an IP address (e.g., '0.0.0.0', '127.0.0.1') or 'localhost'.",
                bind_address,
                e
            )
        })?
    };

    Ok(SocketAddr::from((ip, port)))
}

/// Serve until `shutdown` resolves
///
/// # Errors
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = bind_addr(&state.config.server.bind_address, state.config.server.port)?;
    let metrics_path = state.config.server.path.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, metrics_path = %metrics_path, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        assert_eq!(
            bind_addr("localhost", 9216).unwrap(),
            "127.0.0.1:9216".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            bind_addr("0.0.0.0", 9216).unwrap(),
            "0.0.0.0:9216".parse::<SocketAddr>().unwrap()
        );
        assert!(bind_addr("::1", 9216).unwrap().is_ipv6());
    }

    #[test]
    fn test_bind_addr_invalid() {
        let err = bind_addr("not-an-ip", 9216).unwrap_err();
        assert!(err.to_string().contains("Invalid bind_address 'not-an-ip'"));
    }
}
