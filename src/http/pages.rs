use axum::{http::StatusCode, response::Html};

const FORBIDDEN_PAGE: &str = include_str!("../../assets/403.html");

/// `GET /`: there is nothing to browse, devices only fetch `/bin/...`.
pub async fn forbidden() -> (StatusCode, Html<&'static str>) {
    (StatusCode::FORBIDDEN, Html(FORBIDDEN_PAGE))
}
