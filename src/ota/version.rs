use std::collections::BTreeMap;

/// Key used for a version header that carries no `key:value` structure at all,
/// e.g. Tasmota's `13.3.0.3(tasmota-4M)`.
pub const UNKNOWN_VERSION_KEY: &str = "ver";

pub type VersionMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to parse version: {token}")]
pub struct ParseVersionError {
    pub token: String,
}

/// Parse `x-esp*-version` header values into a key/value map.
///
/// A value without any `:` is stored whole under [`UNKNOWN_VERSION_KEY`]. Otherwise the value is
/// split on single spaces and every token must be `key:value` (split on the first colon); one
/// malformed token fails the whole parse. Later keys overwrite earlier ones.
pub fn parse_version_header<S: AsRef<str>>(values: &[S]) -> Result<VersionMap, ParseVersionError> {
    let mut vmap = VersionMap::new();

    for value in values {
        let value = value.as_ref();
        if !value.contains(':') {
            vmap.insert(UNKNOWN_VERSION_KEY.to_string(), value.to_string());
            continue;
        }

        for token in value.split(' ') {
            let Some((key, val)) = token.split_once(':') else {
                return Err(ParseVersionError {
                    token: token.to_string(),
                });
            };
            vmap.insert(key.to_string(), val.to_string());
        }
    }

    Ok(vmap)
}
