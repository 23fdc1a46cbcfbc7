//! Update-decision protocol for ESP8266/ESP32 OTA probes.
//!
//! A device probing `GET /bin/:project/:file` identifies itself through vendor-prefixed request
//! headers. [`Probe::from_headers`] extracts and validates them without touching the filesystem,
//! [`fingerprint_reader`] hashes the stored firmware, and [`Probe::decide`] compares the two.

pub mod decision;
pub mod fingerprint;
pub mod headers;
pub mod version;

pub use decision::{Decision, Probe, ProbeError};
pub use fingerprint::{
    fingerprint_file, fingerprint_reader, Fingerprint, FingerprintError, FingerprintedFile,
};
pub use headers::{lookup, ProbeHeaders, VENDOR_PREFIXES};
pub use version::{parse_version_header, ParseVersionError, VersionMap, UNKNOWN_VERSION_KEY};
