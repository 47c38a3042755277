use std::{borrow::Cow, fmt};

/// Content type of every error and rejection body.
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Request attributes the handler looks at.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    /// Raw `Accept` header value.
    pub accept: Option<String>,
    /// Raw `Accept-Encoding` header value.
    pub accept_encoding: Option<String>,
}

impl ScrapeRequest {
    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
        self.accept_encoding = Some(accept_encoding.into());
        self
    }

    /// `true` if `gzip` is listed in `Accept-Encoding`.
    pub fn accepts_gzip(&self) -> bool {
        self.accept_encoding.as_deref().is_some_and(|v| {
            v.split(',').map(str::trim).any(|part| {
                let coding = part.split(';').next().unwrap_or("").trim();
                coding.eq_ignore_ascii_case("gzip") && !rejects(part)
            })
        })
    }
}

/// `gzip;q=0` explicitly refuses the coding.
fn rejects(part: &str) -> bool {
    part.split(';').skip(1).any(|p| {
        p.trim()
            .strip_prefix("q=")
            .and_then(|q| q.trim().parse::<f32>().ok())
            .is_some_and(|q| q <= 0.0)
    })
}

/// Complete response produced by the exposition handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub status: u16,
    pub content_type: String,
    /// `Content-Encoding` to announce; always `None` for error bodies.
    pub content_encoding: Option<&'static str>,
    pub body: Vec<u8>,
}

impl ScrapeResponse {
    /// Uncompressed plain-text response.
    pub fn plain(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: PLAIN_TEXT.to_string(),
            content_encoding: None,
            body: message.into().into_bytes(),
        }
    }

    /// 503 Service Unavailable.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::plain(503, message)
    }

    /// 500 carrying the error text.
    pub fn internal_error(err: &dyn fmt::Display) -> Self {
        Self::plain(
            500,
            format!("An error has occurred while serving metrics:\n\n{err}"),
        )
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text (lossy). Compressed bodies are not decoded.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
