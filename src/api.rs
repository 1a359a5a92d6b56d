use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::routing::get;
use chrono::Utc;

use crate::alert::AlertQueue;
use crate::registry::Registry;
use crate::shutdown;

mod models;

/// Read-only view of the agent's shared state.
#[derive(Debug, Clone)]
pub struct AppState {
    host_id: Arc<str>,
    registry: Arc<Registry>,
    alerts: Arc<AlertQueue>,
}

impl AppState {
    pub fn new(host_id: &str, registry: Arc<Registry>, alerts: Arc<AlertQueue>) -> Self {
        Self {
            host_id: Arc::from(host_id),
            registry,
            alerts,
        }
    }
}

async fn health(state: State<AppState>) -> Json<models::Health> {
    Json(models::Health {
        status: "ok",
        host_id: state.host_id.to_string(),
        tracked_containers: state.registry.size(),
        pending_alerts: state.alerts.len(),
        timestamp: Utc::now(),
    })
}

async fn containers(state: State<AppState>) -> Json<models::Containers> {
    Json(models::Containers {
        containers: state.registry.entries(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind status endpoint to `{addr}`: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("status endpoint failed: {0}")]
    Serve(#[source] std::io::Error),
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(state: AppState) -> Self {
        let router = axum::Router::new()
            .route("/health", get(health))
            .route("/containers", get(containers))
            .with_state(state);
        Self { router }
    }

    /// Serves until the shutdown signal fires.
    pub async fn listen(
        self,
        addr: SocketAddr,
        mut shutdown: shutdown::Signal,
    ) -> Result<(), Error> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        log::info!("Status endpoint listening on {}", addr);
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await
            .map_err(Error::Serve)
    }
}
