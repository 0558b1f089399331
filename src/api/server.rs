//! Control API server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes::create_router;
use crate::config::ApiConfig;
use crate::runtime::ShowRegistry;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ShowRegistry>,

    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ShowRegistry>) -> Self {
        Self {
            registry,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub struct ApiServer {
    bind_address: SocketAddr,
    enable_cors: bool,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: &ApiConfig, registry: Arc<ShowRegistry>) -> Result<Self, ServerError> {
        let bind_address =
            config
                .bind_address
                .parse()
                .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                    address: config.bind_address.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            bind_address,
            enable_cors: config.enable_cors,
            state: AppState::new(registry),
        })
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Build the router with all routes and layers
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown_signal` resolves
    pub async fn serve_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                address: self.bind_address,
                source,
            })?;

        tracing::info!(address = %self.bind_address, "Control API listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Control API shut down");
        Ok(())
    }
}
