use std::io::{self, Write};

use flate2::{Compression, write::GzEncoder};

/// Response body sink, optionally gzip-compressed.
///
/// Counts the uncompressed bytes accepted so the handler knows whether the
/// response has started.
pub(crate) struct Body {
    sink: Sink,
    written: usize,
}

enum Sink {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

impl Body {
    pub fn new(gzip: bool) -> Self {
        let sink = if gzip {
            Sink::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            Sink::Plain(Vec::new())
        };
        Self { sink, written: 0 }
    }

    #[inline]
    pub fn written(&self) -> usize {
        self.written
    }

    #[inline]
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self.sink {
            Sink::Plain(_) => None,
            Sink::Gzip(_) => Some("gzip"),
        }
    }

    /// Final bytes, with the gzip trailer if compressed.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        match self.sink {
            Sink::Plain(buf) => Ok(buf),
            Sink::Gzip(enc) => enc.finish(),
        }
    }
}

impl Write for Body {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.sink {
            Sink::Plain(out) => out.write(buf)?,
            Sink::Gzip(enc) => enc.write(buf)?,
        };
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Plain(_) => Ok(()),
            Sink::Gzip(enc) => enc.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn plain_body_counts_bytes() {
        let mut body = Body::new(false);
        assert_eq!(body.written(), 0);

        body.write_all(b"up 1\n").unwrap();
        assert_eq!(body.written(), 5);
        assert_eq!(body.content_encoding(), None);
        assert_eq!(body.finish().unwrap(), b"up 1\n");
    }

    #[test]
    fn gzip_body_round_trips() {
        let mut body = Body::new(true);
        body.write_all(b"up 1\n").unwrap();
        assert_eq!(body.written(), 5);
        assert_eq!(body.content_encoding(), Some("gzip"));

        let compressed = body.finish().unwrap();
        let mut text = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "up 1\n");
    }
}
