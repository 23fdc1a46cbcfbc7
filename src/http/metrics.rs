use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::{metrics::Metrics, AppState};

pub(crate) async fn handle(State(state): State<AppState>) -> Response {
    let body = state.metrics().encode();
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(Metrics::metrics_content_type()),
        )],
        body,
    )
        .into_response()
}
