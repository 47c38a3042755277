use std::io::Write;

use prometheus::{Encoder, TextEncoder, proto::MetricFamily};

use crate::encode::{EncodeError, FamilyEncoder};

const EOF_MARKER: &[u8] = b"# EOF\n";

/// OpenMetrics text encoder.
///
/// Built on top of the text 0.0.4 output, rewritten to OpenMetrics rules:
/// - counter metadata (`# HELP`/`# TYPE`) names drop the `_total` suffix;
/// - counter samples always carry the `_total` suffix;
/// - `untyped` families are declared as `unknown`;
/// - the stream is terminated by `# EOF` on [`FamilyEncoder::close`].
#[derive(Debug, Default)]
pub struct OpenMetricsEncoder {
    text: TextEncoder,
    scratch: Vec<u8>,
}

impl OpenMetricsEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FamilyEncoder for OpenMetricsEncoder {
    fn encode(&mut self, family: &MetricFamily, out: &mut dyn Write) -> Result<(), EncodeError> {
        self.scratch.clear();
        self.text
            .encode(std::slice::from_ref(family), &mut self.scratch)
            .map_err(|e| EncodeError::family(family, e))?;

        let text =
            std::str::from_utf8(&self.scratch).map_err(|e| EncodeError::family(family, e))?;
        out.write_all(rewrite_family(text).as_bytes())?;
        Ok(())
    }

    fn close(&mut self, out: &mut dyn Write) -> Result<(), EncodeError> {
        out.write_all(EOF_MARKER)?;
        Ok(())
    }
}

/// Rewrite the text 0.0.4 lines of one family into OpenMetrics form.
fn rewrite_family(text: &str) -> String {
    let counter = text.lines().find_map(|line| {
        let (name, kind) = line.strip_prefix("# TYPE ")?.split_once(' ')?;
        (kind == "counter").then_some(name)
    });

    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match metadata(line) {
            Some((directive, name, rest)) => {
                let name = match counter {
                    Some(c) if c == name => name.strip_suffix("_total").unwrap_or(name),
                    _ => name,
                };
                let rest = if directive == "TYPE" && rest == "untyped" {
                    "unknown"
                } else {
                    rest
                };
                out.push_str("# ");
                out.push_str(directive);
                out.push(' ');
                out.push_str(name);
                if !rest.is_empty() {
                    out.push(' ');
                    out.push_str(rest);
                }
            }
            None => match counter {
                Some(c) if !c.ends_with("_total") && sample_name(line) == c => {
                    out.push_str(c);
                    out.push_str("_total");
                    out.push_str(&line[c.len()..]);
                }
                _ => out.push_str(line),
            },
        }
        out.push('\n');
    }
    out
}

/// Metric name of a sample line, up to the labels or the value.
fn sample_name(line: &str) -> &str {
    if line.starts_with('#') {
        return "";
    }
    let end = line.find(['{', ' ']).unwrap_or(line.len());
    &line[..end]
}

/// Split `# HELP name rest` / `# TYPE name rest` lines.
fn metadata(line: &str) -> Option<(&str, &str, &str)> {
    let body = line.strip_prefix("# ")?;
    let (directive, tail) = body.split_once(' ')?;
    if directive != "HELP" && directive != "TYPE" {
        return None;
    }
    let (name, rest) = tail.split_once(' ').unwrap_or((tail, ""));
    Some((directive, name, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::tests::families;
    use prometheus::{
        CounterVec, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry,
    };

    #[test]
    fn counter_metadata_drops_total_suffix() {
        let mut enc = OpenMetricsEncoder::new();
        let mut out = Vec::new();

        enc.encode(&families(&["jobs_total"])[0], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("# HELP jobs help for jobs_total\n"), "{text}");
        assert!(text.contains("# TYPE jobs counter\n"), "{text}");
        assert!(text.contains("\njobs_total 1\n"), "{text}");
    }

    fn encode_one(registry: &Registry) -> String {
        let mut enc = OpenMetricsEncoder::new();
        let mut out = Vec::new();
        enc.encode(&registry.gather()[0], &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn counter_samples_gain_total_suffix() {
        let registry = Registry::new();
        let jobs = IntCounter::new("jobs", "Jobs").unwrap();
        registry.register(Box::new(jobs.clone())).unwrap();
        jobs.inc();

        let text = encode_one(&registry);
        assert_eq!(text, "# HELP jobs Jobs\n# TYPE jobs counter\njobs_total 1\n");
    }

    #[test]
    fn labelled_counter_samples_gain_total_suffix() {
        let registry = Registry::new();
        let requests = CounterVec::new(Opts::new("requests", "Requests"), &["code"]).unwrap();
        registry.register(Box::new(requests.clone())).unwrap();
        requests.with_label_values(&["200"]).inc();
        requests.with_label_values(&["500"]).inc_by(2.0);

        let text = encode_one(&registry);
        assert!(text.contains("# TYPE requests counter\n"), "{text}");
        assert!(text.contains("requests_total{code=\"200\"} 1\n"), "{text}");
        assert!(text.contains("requests_total{code=\"500\"} 2\n"), "{text}");
        assert!(!text.contains("\nrequests{"), "{text}");
    }

    #[test]
    fn histogram_lines_pass_through() {
        let registry = Registry::new();
        let latency = Histogram::with_opts(
            HistogramOpts::new("latency_seconds", "Latency").buckets(vec![0.1, 1.0]),
        )
        .unwrap();
        registry.register(Box::new(latency.clone())).unwrap();
        latency.observe(0.5);

        let text = encode_one(&registry);
        assert!(text.contains("# TYPE latency_seconds histogram\n"), "{text}");
        assert!(text.contains("latency_seconds_bucket{le=\"0.1\"} 0\n"), "{text}");
        assert!(text.contains("latency_seconds_bucket{le=\"1\"} 1\n"), "{text}");
        assert!(text.contains("latency_seconds_bucket{le=\"+Inf\"} 1\n"), "{text}");
        assert!(text.contains("latency_seconds_sum 0.5\n"), "{text}");
        assert!(text.contains("latency_seconds_count 1\n"), "{text}");
        assert!(!text.contains("_total"), "{text}");
    }

    #[test]
    fn summary_lines_pass_through() {
        let text = "# HELP rpc_seconds RPC latency\n# TYPE rpc_seconds summary\n\
                    rpc_seconds{quantile=\"0.5\"} 0.2\nrpc_seconds_sum 1.5\nrpc_seconds_count 7\n";
        assert_eq!(rewrite_family(text), text);
    }

    #[test]
    fn gauges_are_left_alone() {
        let registry = Registry::new();
        let gauge = Gauge::new("queue_depth", "Queued items").unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge.set(3.0);

        let mut enc = OpenMetricsEncoder::new();
        let mut out = Vec::new();
        enc.encode(&registry.gather()[0], &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# TYPE queue_depth gauge\nqueue_depth 3\n"), "{text}");
    }

    #[test]
    fn close_writes_eof_marker() {
        let mut enc = OpenMetricsEncoder::new();
        let mut out = Vec::new();

        for mf in families(&["a_total", "b_total"]) {
            enc.encode(&mf, &mut out).unwrap();
        }
        enc.close(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("b_total 1\n# EOF\n"), "{text}");
        assert_eq!(text.matches("# EOF").count(), 1);
    }

    #[test]
    fn rewrites_untyped_to_unknown() {
        let text = "# HELP x some help\n# TYPE x untyped\nx 1\n";
        assert_eq!(
            rewrite_family(text),
            "# HELP x some help\n# TYPE x unknown\nx 1\n"
        );
    }

    #[test]
    fn help_without_text_is_preserved() {
        let text = "# HELP y\n# TYPE y gauge\ny 2\n";
        assert_eq!(rewrite_family(text), text);
    }
}
