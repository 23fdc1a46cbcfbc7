#![forbid(unsafe_code)]

pub mod config;
pub mod http;
pub mod metrics;
pub mod ota;
pub mod server;
pub mod store;

use std::sync::Arc;

use axum::middleware;

use metrics::Metrics;
use store::FirmwareStore;

#[derive(Clone)]
pub struct AppState {
    store: FirmwareStore,
    metrics: Arc<Metrics>,
    metrics_endpoint_enabled: bool,
}

impl AppState {
    pub fn new(store: FirmwareStore) -> Self {
        Self {
            store,
            metrics: Arc::new(Metrics::new()),
            metrics_endpoint_enabled: false,
        }
    }

    /// Mount the Prometheus `/metrics` endpoint (unmounted requests return `404`).
    pub fn with_metrics_endpoint(mut self, enabled: bool) -> Self {
        self.metrics_endpoint_enabled = enabled;
        self
    }

    pub fn store(&self) -> &FirmwareStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn metrics_endpoint_enabled(&self) -> bool {
        self.metrics_endpoint_enabled
    }
}

pub fn app(state: AppState) -> axum::Router {
    let metrics = Arc::clone(&state.metrics);
    http::router_with_state(state).route_layer(middleware::from_fn_with_state(
        metrics,
        http::observability::middleware,
    ))
}

pub use config::{Config, ServerConfig};
pub use server::{start, RunningServer};
