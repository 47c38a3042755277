//! Per-family encoders writing into a response body.
//!
//! Each family is serialized into a scratch buffer first and only then copied to
//! the output. A family rejected by the encoder therefore never leaves partial
//! bytes on the stream, which is what makes [`EncodeError::Family`] skippable.
mod openmetrics;
pub use openmetrics::OpenMetricsEncoder;

use std::io::{self, Write};

use prometheus::proto::MetricFamily;
use thiserror::Error;

/// Encoding failure for a single family or for the whole stream.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The family was rejected before any of its bytes were written.
    #[error("metric family {name:?} could not be encoded: {reason}")]
    Family { name: String, reason: String },

    /// Writing to the output failed; the stream is unusable.
    #[error("writing metrics to the response failed: {0}")]
    Stream(#[from] io::Error),
}

impl EncodeError {
    /// `true` when the output itself is broken and nothing more can be sent.
    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, EncodeError::Stream(_))
    }

    pub(crate) fn family(family: &MetricFamily, reason: impl ToString) -> Self {
        EncodeError::Family {
            name: family.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Wire-format encoder bound to one response.
pub trait FamilyEncoder {
    /// Encode one family and append it to `out`.
    fn encode(&mut self, family: &MetricFamily, out: &mut dyn Write) -> Result<(), EncodeError>;

    /// Write the end-of-stream marker, if the format has one.
    fn close(&mut self, _out: &mut dyn Write) -> Result<(), EncodeError> {
        Ok(())
    }
}

/// Adapter over the `prometheus` crate encoders (text 0.0.4, protobuf delimited).
#[derive(Debug)]
pub struct PrometheusEncoder<E> {
    inner: E,
    scratch: Vec<u8>,
}

impl<E: prometheus::Encoder> PrometheusEncoder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
        }
    }
}

impl<E: prometheus::Encoder> FamilyEncoder for PrometheusEncoder<E> {
    fn encode(&mut self, family: &MetricFamily, out: &mut dyn Write) -> Result<(), EncodeError> {
        self.scratch.clear();
        self.inner
            .encode(std::slice::from_ref(family), &mut self.scratch)
            .map_err(|e| EncodeError::family(family, e))?;
        out.write_all(&self.scratch)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use prometheus::{IntCounter, Registry};

    /// Gather one incremented counter family per name, sorted by name.
    pub(crate) fn families(names: &[&str]) -> Vec<MetricFamily> {
        let registry = Registry::new();
        for name in names {
            let counter = IntCounter::new(*name, format!("help for {name}")).unwrap();
            registry.register(Box::new(counter.clone())).unwrap();
            counter.inc();
        }
        registry.gather()
    }

    pub(crate) struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn text_encoder_appends_family() {
        let mut enc = PrometheusEncoder::new(prometheus::TextEncoder::new());
        let mut out = Vec::new();

        for mf in families(&["a_total", "b_total"]) {
            enc.encode(&mf, &mut out).unwrap();
        }
        enc.close(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("# TYPE a_total counter\na_total 1\n"));
        assert!(text.contains("# TYPE b_total counter\nb_total 1\n"));
        assert!(text.find("a_total").unwrap() < text.find("b_total").unwrap());
    }

    #[test]
    fn invalid_family_leaves_output_untouched() {
        let mut enc = PrometheusEncoder::new(prometheus::TextEncoder::new());
        let mut out = b"prefix\n".to_vec();

        let err = enc.encode(&MetricFamily::default(), &mut out).unwrap_err();
        assert!(!err.is_stream());
        assert_eq!(out, b"prefix\n");
    }

    #[test]
    fn write_failure_is_stream_error() {
        let mut enc = PrometheusEncoder::new(prometheus::ProtobufEncoder::new());
        let mf = families(&["c_total"]).remove(0);

        let err = enc.encode(&mf, &mut BrokenWriter).unwrap_err();
        assert!(err.is_stream());
    }
}
