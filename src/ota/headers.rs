use axum::http::HeaderMap;

/// Vendor header prefixes, in lookup priority order.
///
/// ESP8266 Arduino cores send `x-esp8266-*`, ESP32 cores send `x-esp32-*`. Both carry the same
/// field names with the same meaning.
pub const VENDOR_PREFIXES: [&str; 2] = ["x-esp8266-", "x-esp32-"];

pub const MODE: &str = "mode";
pub const VERSION: &str = "version";
pub const SKETCH_MD5: &str = "sketch-md5";

/// Look up a probe field under each vendor prefix in turn.
///
/// Returns every value of the first prefixed header name that is present, or `None` if neither
/// prefix supplies the field. Header names are matched case-insensitively.
pub fn lookup(headers: &HeaderMap, key: &str) -> Option<Vec<String>> {
    let key = key.to_ascii_lowercase();
    VENDOR_PREFIXES.iter().find_map(|prefix| {
        let name = format!("{prefix}{key}");
        let values: Vec<String> = headers
            .get_all(name.as_str())
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect();
        (!values.is_empty()).then_some(values)
    })
}

fn first(headers: &HeaderMap, key: &str) -> Option<String> {
    lookup(headers, key).and_then(|values| values.into_iter().next())
}

/// Every probe field a device may send, normalized across vendor prefixes.
///
/// Only `mode`, `version` and `sketch_md5` take part in the update decision; the rest is kept for
/// request logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeHeaders {
    pub mode: Option<Vec<String>>,
    pub version: Option<Vec<String>>,
    pub sketch_md5: Option<Vec<String>>,
    pub sta_mac: Option<String>,
    pub ap_mac: Option<String>,
    pub free_space: Option<String>,
    pub sketch_size: Option<String>,
    pub chip_size: Option<String>,
    pub sdk_version: Option<String>,
}

impl ProbeHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            mode: lookup(headers, MODE),
            version: lookup(headers, VERSION),
            sketch_md5: lookup(headers, SKETCH_MD5),
            sta_mac: first(headers, "sta-mac"),
            ap_mac: first(headers, "ap-mac"),
            free_space: first(headers, "free-space"),
            sketch_size: first(headers, "sketch-size"),
            chip_size: first(headers, "chip-size"),
            sdk_version: first(headers, "sdk-version"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn finds_esp8266_prefix() {
        let h = headers(&[("x-esp8266-mode", "sketch")]);
        assert_eq!(lookup(&h, "mode"), Some(vec!["sketch".to_string()]));
    }

    #[test]
    fn finds_esp32_prefix() {
        let h = headers(&[("x-esp32-mode", "sketch")]);
        assert_eq!(lookup(&h, "mode"), Some(vec!["sketch".to_string()]));
    }

    #[test]
    fn missing_field_is_not_an_error() {
        assert_eq!(lookup(&HeaderMap::new(), "mode"), None);
    }

    #[test]
    fn esp8266_wins_over_esp32() {
        let h = headers(&[("x-esp32-mode", "spiffs"), ("x-esp8266-mode", "sketch")]);
        assert_eq!(lookup(&h, "mode"), Some(vec!["sketch".to_string()]));
    }

    #[test]
    fn key_is_case_insensitive() {
        let h = headers(&[("x-esp8266-sketch-md5", "abc")]);
        assert_eq!(lookup(&h, "Sketch-MD5"), Some(vec!["abc".to_string()]));
    }

    #[test]
    fn returns_all_values_in_order() {
        let h = headers(&[("x-esp32-version", "fw:1.2.3"), ("x-esp32-version", "hv:1.0")]);
        assert_eq!(
            lookup(&h, "version"),
            Some(vec!["fw:1.2.3".to_string(), "hv:1.0".to_string()])
        );
    }

    #[test]
    fn probe_headers_collects_informational_fields() {
        let h = headers(&[
            ("x-esp8266-mode", "sketch"),
            ("x-esp8266-sta-mac", "18:FE:AA:AA:AA:AA"),
            ("x-esp8266-free-space", "671744"),
            ("x-esp32-chip-size", "4194304"),
        ]);
        let probe = ProbeHeaders::from_headers(&h);
        assert_eq!(probe.mode, Some(vec!["sketch".to_string()]));
        assert_eq!(probe.sta_mac.as_deref(), Some("18:FE:AA:AA:AA:AA"));
        assert_eq!(probe.free_space.as_deref(), Some("671744"));
        assert_eq!(probe.chip_size.as_deref(), Some("4194304"));
        assert_eq!(probe.version, None);
        assert_eq!(probe.sketch_md5, None);
    }
}
