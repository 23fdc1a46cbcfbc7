use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use esp_ota_server::{
    store::{DataDir, FirmwareStore},
    AppState,
};
use http_body_util::BodyExt;
use tempfile::tempdir;
use tower::ServiceExt;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn state(dir: &tempfile::TempDir) -> AppState {
    AppState::new(FirmwareStore::new(DataDir::new(dir.path()).expect("data dir")))
}

async fn body_text(res: axum::response::Response) -> String {
    let body = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn healthz_is_ok() {
    let dir = tempdir().expect("tempdir");
    let app = esp_ota_server::app(state(&dir));

    let res = app.oneshot(get("/healthz")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ok\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ready_tracks_data_dir() {
    let dir = tempdir().expect("tempdir");
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    let app = esp_ota_server::app(AppState::new(FirmwareStore::new(
        DataDir::new(&data_dir).unwrap(),
    )));

    let res = app.clone().oneshot(get("/ready")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    std::fs::remove_dir(&data_dir).unwrap();
    let res = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn root_is_forbidden_html_page() {
    let dir = tempdir().expect("tempdir");
    let app = esp_ota_server::app(state(&dir));

    let res = app.oneshot(get("/")).await.unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body_text(res).await.contains("403"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metrics_endpoint_is_not_mounted_by_default() {
    let dir = tempdir().expect("tempdir");
    let app = esp_ota_server::app(state(&dir));

    let res = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn metrics_endpoint_counts_probes() {
    let dir = tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("proj")).unwrap();
    std::fs::write(dir.path().join("proj").join("fw.bin"), b"firmware").unwrap();
    let app = esp_ota_server::app(state(&dir).with_metrics_endpoint(true));

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/bin/proj/fw.bin")
                .header("x-esp8266-mode", "sketch")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get("/bin/proj/missing.bin"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = body_text(res).await;
    assert!(text.contains("ota_decisions_total{result=\"send\"} 1"), "{text}");
    assert!(text.contains("firmware_errors_total{kind=\"bad_request\"} 1"), "{text}");
    assert!(text.contains("firmware_bytes_served_total 8"), "{text}");
    assert!(
        text.contains(
            "http_requests_total{method=\"GET\",route=\"/bin/:project/:file\",status=\"200\"} 1"
        ),
        "{text}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_id_is_echoed_or_generated() {
    let dir = tempdir().expect("tempdir");
    let app = esp_ota_server::app(state(&dir));

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .header("x-request-id", "probe-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"].to_str().unwrap(), "probe-42");

    let res = app.oneshot(get("/healthz")).await.unwrap();
    let generated = res.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}
