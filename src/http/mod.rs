pub mod firmware;
pub mod pages;

mod metrics;
pub(crate) mod observability;

use axum::{http::StatusCode, routing::get, Router};

use crate::AppState;

pub fn router_with_state(state: AppState) -> Router {
    let router = Router::<AppState>::new()
        .route("/bin/:project/:file", get(firmware::get_firmware))
        .route("/healthz", get(health))
        .route("/ready", get(ready))
        .route("/", get(pages::forbidden));
    let router = if state.metrics_endpoint_enabled() {
        router.route("/metrics", get(metrics::handle))
    } else {
        router
    };
    router.with_state(state)
}

async fn health() -> &'static str {
    "ok\n"
}

async fn ready(axum::extract::State(state): axum::extract::State<AppState>) -> StatusCode {
    if state.store().root().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
