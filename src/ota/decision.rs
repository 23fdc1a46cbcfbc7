use axum::http::{HeaderMap, HeaderName, HeaderValue};

use super::fingerprint::Fingerprint;
use super::headers::ProbeHeaders;
use super::version::{parse_version_header, ParseVersionError, VersionMap};

/// Response header carrying the firmware MD5 (`x-MD5`; field names travel lowercase here).
pub const MD5_HEADER: &str = "x-md5";
/// Response header carrying the firmware SHA-512 (`x-SHA512`).
pub const SHA512_HEADER: &str = "x-sha512";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("missing x-esp8266-mode/x-esp32-mode header")]
    MissingMode,
    #[error(transparent)]
    Version(#[from] ParseVersionError),
}

/// A validated device probe.
///
/// Building a `Probe` never touches the filesystem, so malformed requests are rejected before the
/// firmware is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub mode: String,
    pub version: Option<VersionMap>,
    pub sketch_md5: Option<String>,
    pub headers: ProbeHeaders,
}

impl Probe {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ProbeError> {
        Self::from_probe_headers(ProbeHeaders::from_headers(headers))
    }

    pub fn from_probe_headers(headers: ProbeHeaders) -> Result<Self, ProbeError> {
        let mode = headers
            .mode
            .as_ref()
            .and_then(|values| values.first())
            .cloned()
            .ok_or(ProbeError::MissingMode)?;

        let version = headers
            .version
            .as_ref()
            .map(|values| parse_version_header(values.as_slice()))
            .transpose()?;

        let sketch_md5 = headers
            .sketch_md5
            .as_ref()
            .and_then(|values| values.first())
            .cloned();

        Ok(Self {
            mode,
            version,
            sketch_md5,
            headers,
        })
    }

    /// Decide whether the device needs `fingerprint`'s firmware.
    ///
    /// Defaults to sending. An `md5` entry in the version header can withhold it, and
    /// `sketch-md5`, when present, decides alone.
    pub fn decide(&self, fingerprint: &Fingerprint) -> Decision {
        let mut send = true;

        if let Some(md5) = self.version.as_ref().and_then(|vmap| vmap.get("md5")) {
            send = *md5 != fingerprint.md5;
        }
        if let Some(sketch_md5) = &self.sketch_md5 {
            send = *sketch_md5 != fingerprint.md5;
        }

        Decision {
            send,
            mode: self.mode.clone(),
            fingerprint: fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub send: bool,
    pub mode: String,
    pub fingerprint: Fingerprint,
}

impl Decision {
    /// Digest headers attached to both `200` and `304` responses.
    pub fn fingerprint_headers(&self) -> [(HeaderName, HeaderValue); 2] {
        // Lowercase hex is always a valid header value.
        [
            (
                HeaderName::from_static(MD5_HEADER),
                HeaderValue::from_str(&self.fingerprint.md5)
                    .unwrap_or_else(|_| HeaderValue::from_static("")),
            ),
            (
                HeaderName::from_static(SHA512_HEADER),
                HeaderValue::from_str(&self.fingerprint.sha512)
                    .unwrap_or_else(|_| HeaderValue::from_static("")),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ota::fingerprint::fingerprint_reader;

    const CONTENT: &[u8] = b"firmware image";

    fn fingerprint() -> Fingerprint {
        fingerprint_reader(CONTENT).unwrap()
    }

    fn headers(pairs: &[(&'static str, String)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn decide(pairs: &[(&'static str, String)]) -> Decision {
        Probe::from_headers(&headers(pairs))
            .unwrap()
            .decide(&fingerprint())
    }

    #[test]
    fn mode_is_required() {
        let err = Probe::from_headers(&headers(&[(
            "x-esp8266-sketch-md5",
            fingerprint().md5,
        )]))
        .unwrap_err();
        assert_eq!(err, ProbeError::MissingMode);
    }

    #[test]
    fn sends_by_default() {
        let decision = decide(&[("x-esp8266-mode", "sketch".into())]);
        assert!(decision.send);
        assert_eq!(decision.mode, "sketch");
    }

    #[test]
    fn matching_sketch_md5_withholds() {
        let decision = decide(&[
            ("x-esp32-mode", "sketch".into()),
            ("x-esp32-sketch-md5", fingerprint().md5),
        ]);
        assert!(!decision.send);
    }

    #[test]
    fn differing_sketch_md5_sends() {
        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-sketch-md5", "deadbeef".into()),
        ]);
        assert!(decision.send);
    }

    #[test]
    fn sketch_md5_compare_is_exact() {
        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-sketch-md5", fingerprint().md5.to_ascii_uppercase()),
        ]);
        assert!(decision.send, "uppercase md5 must not match");

        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-sketch-md5", format!(" {}", fingerprint().md5)),
        ]);
        assert!(decision.send, "padded md5 must not match");
    }

    #[test]
    fn version_md5_withholds() {
        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-version", format!("fw:1.2.3 md5:{}", fingerprint().md5)),
        ]);
        assert!(!decision.send);
    }

    #[test]
    fn sketch_md5_overrides_version_md5() {
        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-version", format!("md5:{}", fingerprint().md5)),
            ("x-esp8266-sketch-md5", "deadbeef".into()),
        ]);
        assert!(decision.send);

        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-version", "md5:deadbeef".into()),
            ("x-esp8266-sketch-md5", fingerprint().md5),
        ]);
        assert!(!decision.send);
    }

    #[test]
    fn version_without_md5_keeps_default() {
        let decision = decide(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-version", "13.3.0.3(tasmota-4M)".into()),
        ]);
        assert!(decision.send);
    }

    #[test]
    fn malformed_version_is_rejected() {
        let err = Probe::from_headers(&headers(&[
            ("x-esp8266-mode", "sketch".into()),
            ("x-esp8266-version", "foo:1.2.3 bar".into()),
        ]))
        .unwrap_err();
        assert!(matches!(err, ProbeError::Version(_)));
    }

    #[test]
    fn fingerprint_headers_carry_both_digests() {
        let decision = decide(&[("x-esp8266-mode", "sketch".into())]);
        let [(md5_name, md5), (sha_name, sha)] = decision.fingerprint_headers();
        assert_eq!(md5_name, MD5_HEADER);
        assert_eq!(md5.to_str().unwrap(), fingerprint().md5);
        assert_eq!(sha_name, SHA512_HEADER);
        assert_eq!(sha.to_str().unwrap(), fingerprint().sha512);
    }

    #[test]
    fn repeated_decisions_are_identical() {
        let pairs = [
            ("x-esp8266-mode", "sketch".to_string()),
            ("x-esp8266-sketch-md5", "deadbeef".to_string()),
        ];
        assert_eq!(decide(&pairs), decide(&pairs));
    }
}
