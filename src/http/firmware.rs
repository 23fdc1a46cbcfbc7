use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;

use crate::{
    ota::{Probe, ProbeError},
    store::{OpenedFirmware, StoreError, CONTENT_TYPE_FIRMWARE},
    AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("firmware task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FirmwareError {
    /// Label used for `firmware_errors_total{kind}`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Probe(_) => "bad_request",
            Self::Store(err) if err.is_not_found() => "not_found",
            Self::Store(_) | Self::Task(_) => "io",
        }
    }
}

impl IntoResponse for FirmwareError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            Self::Probe(ProbeError::MissingMode) => (StatusCode::BAD_REQUEST, "bad request"),
            Self::Probe(ProbeError::Version(_)) => (StatusCode::BAD_REQUEST, "bad version header"),
            Self::Store(err) if err.is_not_found() => (StatusCode::NOT_FOUND, "no file"),
            Self::Store(_) | Self::Task(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };
        (status, msg).into_response()
    }
}

/// `GET /bin/:project/:file`
pub async fn get_firmware(
    State(state): State<AppState>,
    Path((project, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let span = tracing::Span::current();
    span.record("project", tracing::field::display(&project));
    span.record("file", tracing::field::display(&file));

    match serve_firmware(&state, project, file, &headers).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                FirmwareError::Probe(ProbeError::MissingMode) => {
                    tracing::debug!("probe without mode header rejected")
                }
                FirmwareError::Probe(err) => tracing::warn!(error = %err, "bad probe"),
                FirmwareError::Store(err) if err.is_not_found() => {
                    tracing::warn!(error = %err, "firmware not found")
                }
                err => tracing::error!(error = %err, "failed to serve firmware"),
            }
            state.metrics().inc_firmware_error(err.kind());
            err.into_response()
        }
    }
}

async fn serve_firmware(
    state: &AppState,
    project: String,
    file: String,
    headers: &HeaderMap,
) -> Result<Response, FirmwareError> {
    // Validated before any filesystem access.
    let probe = Probe::from_headers(headers)?;

    tracing::Span::current().record("esp_mode", tracing::field::display(&probe.mode));
    tracing::debug!(
        sta_mac = probe.headers.sta_mac.as_deref(),
        ap_mac = probe.headers.ap_mac.as_deref(),
        free_space = probe.headers.free_space.as_deref(),
        sketch_size = probe.headers.sketch_size.as_deref(),
        chip_size = probe.headers.chip_size.as_deref(),
        sdk_version = probe.headers.sdk_version.as_deref(),
        sketch_md5 = probe.sketch_md5.as_deref(),
        "ESP request headers"
    );
    if let Some(vmap) = &probe.version {
        tracing::info!(version_map = ?vmap, "ESP version map");
    }

    let store = state.store().clone();
    let opened = tokio::task::spawn_blocking(move || store.open(&project, &file)).await??;

    let decision = probe.decide(&opened.fingerprint);
    tracing::info!(
        esp_mode = %decision.mode,
        send_file = decision.send,
        file_path = %opened.path.display(),
        file_size = opened.fingerprint.size,
        "OTA decision"
    );
    state
        .metrics()
        .observe_decision(decision.send, opened.fingerprint.size);

    let mut response = if decision.send {
        firmware_body(opened)
    } else {
        StatusCode::NOT_MODIFIED.into_response()
    };
    for (name, value) in decision.fingerprint_headers() {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

fn firmware_body(opened: OpenedFirmware) -> Response {
    let size = opened.fingerprint.size;
    // Never send more than was hashed, even if the file grew in the meantime.
    let reader = tokio::fs::File::from_std(opened.file).take(size);

    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_FIRMWARE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    response
}
