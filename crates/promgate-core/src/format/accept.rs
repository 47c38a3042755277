//! `Accept` header parsing.
//!
//! Media ranges are returned in preference order: descending quality, then
//! concrete types before wildcards. Equal ranges keep their header order.

/// Single media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaRange<'a> {
    pub kind: &'a str,
    pub subtype: &'a str,
    pub params: Vec<(&'a str, &'a str)>,
    pub q: f32,
}

impl<'a> MediaRange<'a> {
    /// Case-insensitive `type/subtype` comparison.
    pub fn is(&self, kind: &str, subtype: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind) && self.subtype.eq_ignore_ascii_case(subtype)
    }

    /// Parameter value by case-insensitive name.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    fn specificity(&self) -> u8 {
        match (self.kind, self.subtype) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }
}

/// Parse an `Accept` header value into media ranges sorted by preference.
///
/// Malformed ranges (no `/`) are skipped. An unparsable `q` counts as `0`.
pub(crate) fn parse_accept(header: &str) -> Vec<MediaRange<'_>> {
    let mut ranges: Vec<MediaRange<'_>> = header.split(',').filter_map(parse_range).collect();

    ranges.sort_by(|a, b| {
        b.q.total_cmp(&a.q)
            .then_with(|| b.specificity().cmp(&a.specificity()))
    });
    ranges
}

fn parse_range(raw: &str) -> Option<MediaRange<'_>> {
    let mut parts = raw.split(';');
    let media = parts.next()?.trim();
    let (kind, subtype) = media.split_once('/')?;
    let (kind, subtype) = (kind.trim(), subtype.trim());
    if kind.is_empty() || subtype.is_empty() {
        return None;
    }

    let mut q = 1.0;
    let mut params = Vec::new();
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');

        if key.eq_ignore_ascii_case("q") {
            q = value.parse::<f32>().unwrap_or(0.0);
        } else {
            params.push((key, value));
        }
    }

    Some(MediaRange {
        kind,
        subtype,
        params,
        q,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header_has_no_ranges() {
        assert!(parse_accept("").is_empty());
        assert!(parse_accept(" , ,").is_empty());
    }

    #[test]
    fn parses_params_and_quality() {
        let ranges = parse_accept("text/plain; version=0.0.4; q=0.5");
        assert_eq!(ranges.len(), 1);

        let r = &ranges[0];
        assert!(r.is("text", "plain"));
        assert_eq!(r.param("version"), Some("0.0.4"));
        assert_eq!(r.param("VERSION"), Some("0.0.4"));
        assert_eq!(r.q, 0.5);
    }

    #[test]
    fn sorts_by_quality_then_specificity() {
        let ranges = parse_accept("*/*;q=0.1, text/*, text/plain;q=0.9, application/json");
        let order: Vec<_> = ranges
            .iter()
            .map(|r| format!("{}/{}", r.kind, r.subtype))
            .collect();

        assert_eq!(
            order,
            ["application/json", "text/*", "text/plain", "*/*"]
        );
    }

    #[test]
    fn invalid_quality_is_zero() {
        let ranges = parse_accept("text/plain;q=abc");
        assert_eq!(ranges[0].q, 0.0);
    }

    #[test]
    fn quoted_values_are_unquoted() {
        let ranges = parse_accept(r#"application/openmetrics-text; version="1.0.0""#);
        assert_eq!(ranges[0].param("version"), Some("1.0.0"));
    }

    #[test]
    fn skips_malformed_ranges() {
        let ranges = parse_accept("garbage, /plain, text/, text/plain");
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].is("text", "plain"));
    }
}
