//! Wire formats and `Accept` based content negotiation.
mod accept;

use std::fmt;

use crate::encode::{FamilyEncoder, OpenMetricsEncoder, PrometheusEncoder};

const PROTO_TYPE: (&str, &str) = ("application", "vnd.google.protobuf");
const PROTO_PROTOCOL: &str = "io.prometheus.client.MetricFamily";
const TEXT_TYPE: (&str, &str) = ("text", "plain");
const TEXT_VERSION: &str = "0.0.4";
const OPEN_METRICS_TYPE: (&str, &str) = ("application", "openmetrics-text");

/// OpenMetrics text format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMetricsVersion {
    V0_0_1,
    V1_0_0,
}

impl OpenMetricsVersion {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            OpenMetricsVersion::V0_0_1 => "0.0.1",
            OpenMetricsVersion::V1_0_0 => "1.0.0",
        }
    }
}

/// Exposition wire format.
///
/// `Display` renders the canonical `Content-Type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Prometheus text format 0.0.4 (baseline).
    #[default]
    Text,
    /// Length-delimited `io.prometheus.client.MetricFamily` protobuf messages.
    ProtoDelimited,
    /// OpenMetrics text, terminated by `# EOF`.
    OpenMetrics(OpenMetricsVersion),
}

impl Format {
    /// Canonical media type for the `Content-Type` header.
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Text => "text/plain; version=0.0.4; charset=utf-8",
            Format::ProtoDelimited => {
                "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited"
            }
            Format::OpenMetrics(OpenMetricsVersion::V0_0_1) => {
                "application/openmetrics-text; version=0.0.1; charset=utf-8"
            }
            Format::OpenMetrics(OpenMetricsVersion::V1_0_0) => {
                "application/openmetrics-text; version=1.0.0; charset=utf-8"
            }
        }
    }

    /// Build a fresh per-request encoder for this format.
    pub fn encoder(&self) -> Box<dyn FamilyEncoder + Send> {
        match self {
            Format::Text => Box::new(PrometheusEncoder::new(prometheus::TextEncoder::new())),
            Format::ProtoDelimited => {
                Box::new(PrometheusEncoder::new(prometheus::ProtobufEncoder::new()))
            }
            Format::OpenMetrics(_) => Box::new(OpenMetricsEncoder::new()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.content_type())
    }
}

/// Pick the response format for an `Accept` header value.
///
/// Media ranges are tried in preference order and the first one naming a supported
/// format wins. OpenMetrics is only eligible when `enable_open_metrics` is set.
/// Wildcards never select a format; anything unmatched falls back to [`Format::Text`].
pub fn negotiate(accept: &str, enable_open_metrics: bool) -> Format {
    for range in accept::parse_accept(accept) {
        if range.q <= 0.0 {
            continue;
        }
        let version = range.param("version").unwrap_or("");

        if range.is(PROTO_TYPE.0, PROTO_TYPE.1)
            && range.param("proto") == Some(PROTO_PROTOCOL)
            && range
                .param("encoding")
                .is_some_and(|e| e.eq_ignore_ascii_case("delimited"))
        {
            return Format::ProtoDelimited;
        }
        if range.is(TEXT_TYPE.0, TEXT_TYPE.1) && (version.is_empty() || version == TEXT_VERSION) {
            return Format::Text;
        }
        if enable_open_metrics && range.is(OPEN_METRICS_TYPE.0, OPEN_METRICS_TYPE.1) {
            match version {
                "1.0.0" => return Format::OpenMetrics(OpenMetricsVersion::V1_0_0),
                "" | "0.0.1" => return Format::OpenMetrics(OpenMetricsVersion::V0_0_1),
                _ => {}
            }
        }
    }
    Format::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTO_ACCEPT: &str =
        "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited";

    #[test]
    fn unmatched_accept_falls_back_to_text() {
        for accept in [
            "",
            "*/*",
            "text/*",
            "application/json",
            "text/html, application/xhtml+xml",
            "text/plain; version=9.9.9",
            "application/vnd.google.protobuf;proto=other.Type;encoding=delimited",
            "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=text",
        ] {
            assert_eq!(negotiate(accept, false), Format::Text, "accept={accept:?}");
            assert_eq!(negotiate(accept, true), Format::Text, "accept={accept:?}");
        }
    }

    #[test]
    fn selects_protobuf_delimited() {
        assert_eq!(negotiate(PROTO_ACCEPT, false), Format::ProtoDelimited);
    }

    #[test]
    fn open_metrics_requires_flag() {
        let accept = "application/openmetrics-text; version=1.0.0";
        assert_eq!(negotiate(accept, false), Format::Text);
        assert_eq!(
            negotiate(accept, true),
            Format::OpenMetrics(OpenMetricsVersion::V1_0_0)
        );
        assert_eq!(
            negotiate("application/openmetrics-text", true),
            Format::OpenMetrics(OpenMetricsVersion::V0_0_1)
        );
    }

    #[test]
    fn prometheus_scraper_header_prefers_open_metrics() {
        let accept = "application/openmetrics-text;version=1.0.0,application/openmetrics-text;version=0.0.1;q=0.75,text/plain;version=0.0.4;q=0.5,*/*;q=0.1";
        assert_eq!(
            negotiate(accept, true),
            Format::OpenMetrics(OpenMetricsVersion::V1_0_0)
        );
        assert_eq!(negotiate(accept, false), Format::Text);
    }

    #[test]
    fn quality_values_decide_order() {
        let accept = format!("text/plain;q=0.5, {PROTO_ACCEPT};q=0.7");
        assert_eq!(negotiate(&accept, false), Format::ProtoDelimited);

        let accept = format!("text/plain;q=0.8, {PROTO_ACCEPT};q=0.7");
        assert_eq!(negotiate(&accept, false), Format::Text);
    }

    #[test]
    fn zero_quality_is_never_selected() {
        let accept = format!("{PROTO_ACCEPT};q=0");
        assert_eq!(negotiate(&accept, false), Format::Text);
    }

    #[test]
    fn display_is_content_type() {
        assert_eq!(
            Format::Text.to_string(),
            "text/plain; version=0.0.4; charset=utf-8"
        );
        assert!(Format::ProtoDelimited.to_string().contains("encoding=delimited"));
        assert!(
            Format::OpenMetrics(OpenMetricsVersion::V0_0_1)
                .to_string()
                .starts_with("application/openmetrics-text; version=0.0.1")
        );
    }
}
