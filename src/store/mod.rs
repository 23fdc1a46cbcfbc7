//! Firmware lookup under the data directory.
//!
//! Layout is flat: `<data-dir>/<project>/<file>`.

mod local_fs;

pub use local_fs::{DataDir, DataDirError, FirmwareStore, OpenedFirmware};

pub const CONTENT_TYPE_FIRMWARE: &str = "application/octet-stream";
pub const MAX_SEGMENT_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid path segment: {segment:?}")]
    InvalidSegment { segment: String },
    #[error("firmware not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error should be reported to the client as `404`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::InvalidSegment { .. })
    }
}

/// Validate a `project` or `file` URL segment.
///
/// Segments are opaque names restricted to ASCII `[A-Za-z0-9._-]`, so they can never escape the
/// data directory.
pub(crate) fn validate_segment(segment: &str) -> Result<(), StoreError> {
    let is_allowed = !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LEN
        && segment != "."
        && segment != ".."
        && segment
            .bytes()
            .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-'));

    if is_allowed {
        Ok(())
    } else {
        Err(StoreError::InvalidSegment {
            segment: truncate_for_error(segment, MAX_SEGMENT_LEN),
        })
    }
}

fn truncate_for_error(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }

    let mut end = max_len;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
