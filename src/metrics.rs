use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

/// Prometheus metrics for the OTA server.
///
/// All label sets are fixed and low-cardinality; project and file names are deliberately not
/// used as labels.
pub struct Metrics {
    registry: Registry,

    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    ota_decisions_total: IntCounterVec,
    firmware_errors_total: IntCounterVec,
    firmware_bytes_served_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let build_info = IntGaugeVec::new(
            Opts::new(
                "esp_ota_server_build_info",
                "Build information for esp-ota-server.",
            ),
            &["version"],
        )
        .expect("esp_ota_server_build_info metric must be valid");
        registry
            .register(Box::new(build_info.clone()))
            .expect("esp_ota_server_build_info must register");
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1);

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests."),
            &["route", "method", "status"],
        )
        .expect("http_requests_total metric must be valid");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("http_requests_total must register");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds.",
            )
            .buckets(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["route", "method"],
        )
        .expect("http_request_duration_seconds metric must be valid");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("http_request_duration_seconds must register");

        let ota_decisions_total = IntCounterVec::new(
            Opts::new(
                "ota_decisions_total",
                "OTA probe decisions by outcome (send or not_modified).",
            ),
            &["result"],
        )
        .expect("ota_decisions_total metric must be valid");
        registry
            .register(Box::new(ota_decisions_total.clone()))
            .expect("ota_decisions_total must register");

        let firmware_errors_total = IntCounterVec::new(
            Opts::new(
                "firmware_errors_total",
                "Total number of rejected or failed firmware probes.",
            ),
            &["kind"],
        )
        .expect("firmware_errors_total metric must be valid");
        registry
            .register(Box::new(firmware_errors_total.clone()))
            .expect("firmware_errors_total must register");

        let firmware_bytes_served_total = IntCounter::new(
            "firmware_bytes_served_total",
            "Total firmware bytes sent with 200 responses.",
        )
        .expect("firmware_bytes_served_total metric must be valid");
        registry
            .register(Box::new(firmware_bytes_served_total.clone()))
            .expect("firmware_bytes_served_total must register");

        let this = Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            ota_decisions_total,
            firmware_errors_total,
            firmware_bytes_served_total,
        };

        // Stable exposition before the first probe arrives.
        for result in ["send", "not_modified"] {
            this.ota_decisions_total.with_label_values(&[result]);
        }
        for kind in ["bad_request", "not_found", "io"] {
            this.firmware_errors_total.with_label_values(&[kind]);
        }

        this
    }

    pub fn observe_http_request(&self, route: &str, method: &str, status: u16, duration: Duration) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[route, method, &status])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[route, method])
            .observe(duration.as_secs_f64());
    }

    pub fn observe_decision(&self, send: bool, bytes: u64) {
        let result = if send { "send" } else { "not_modified" };
        self.ota_decisions_total.with_label_values(&[result]).inc();
        if send {
            self.firmware_bytes_served_total.inc_by(bytes);
        }
    }

    pub fn inc_firmware_error(&self, kind: &str) {
        self.firmware_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn encode(&self) -> Vec<u8> {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&metric_families, &mut buf)
            .expect("prometheus encoding must succeed");
        buf
    }

    pub fn metrics_content_type() -> &'static str {
        // Prometheus text exposition format.
        "text/plain; version=0.0.4"
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
