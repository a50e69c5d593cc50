//! Parsing and normalization of the `Range` request header.
//!
//! Only single byte ranges are processed. Multi-range requests are valid
//! HTTP, but a client may ask for pathological range sets (every byte
//! separately, overlapping spans) that are expensive to serve, so they
//! are recognized and ignored: the response degrades to a full 200.

use axum::http::header::RANGE;
use axum::http::HeaderMap;

/// A normalized byte range with inclusive bounds.
///
/// Invariant: `start <= end < length` of the resource it was
/// normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte position, inclusive.
    pub start: u64,
    /// Last byte position, inclusive.
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Number of bytes covered by this range.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Format as a `Content-Range` header value.
    pub fn to_content_range(&self, total_length: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total_length)
    }
}

/// Outcome of examining a request's `Range` header against a resource
/// of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable range was requested; serve the full representation.
    /// Covers an absent header, multiple ranges, and malformed input.
    None,
    /// A single range that fits the resource.
    Satisfiable(ByteRange),
    /// A range was requested but cannot be satisfied (416).
    Unsatisfiable,
}

/// Examine the `Range` header of a request against `length`.
///
/// Repeated `Range` header lines and comma-separated range sets are
/// treated the same as malformed input: not a range request.
pub fn parse_range(headers: &HeaderMap, length: u64) -> RangeRequest {
    let mut values = headers.get_all(RANGE).iter();
    let Some(value) = values.next() else {
        return RangeRequest::None;
    };
    if values.next().is_some() {
        tracing::debug!("multiple Range header lines, serving full response");
        return RangeRequest::None;
    }
    let Ok(value) = value.to_str() else {
        return RangeRequest::None;
    };
    parse_range_value(value, length)
}

/// Parse a single `Range` header value, e.g. `bytes=0-499`, `bytes=500-`,
/// or `bytes=-200`.
pub fn parse_range_value(value: &str, length: u64) -> RangeRequest {
    let Some(spec) = value.strip_prefix("bytes=") else {
        return RangeRequest::None;
    };
    let spec = spec.trim();

    if spec.contains(',') {
        tracing::debug!("multi-range request, serving full response");
        return RangeRequest::None;
    }

    let Some((start, end)) = parse_spec(spec) else {
        return RangeRequest::None;
    };

    if length == 0 {
        return RangeRequest::Unsatisfiable;
    }

    match normalize(start, end, length) {
        Some(range) => RangeRequest::Satisfiable(range),
        None => RangeRequest::Unsatisfiable,
    }
}

/// Split a byte-range-spec into its optional first and last positions.
/// Returns `None` for anything outside the grammar, including the
/// `end < start` case the RFC declares invalid.
fn parse_spec(spec: &str) -> Option<(Option<u64>, Option<u64>)> {
    let (start, end) = spec.split_once('-')?;
    let start = match start.trim() {
        "" => None,
        s => Some(s.parse::<u64>().ok()?),
    };
    let end = match end.trim() {
        "" => None,
        s => Some(s.parse::<u64>().ok()?),
    };
    match (start, end) {
        (None, None) => None,
        (Some(s), Some(e)) if e < s => None,
        parsed => Some(parsed),
    }
}

/// Normalize a parsed byte-range-spec against the resource length.
/// Returns `None` when the spec cannot identify any byte of the
/// resource (unsatisfiable).
pub fn normalize(start: Option<u64>, end: Option<u64>, length: u64) -> Option<ByteRange> {
    match (start, end) {
        // X-[Y]
        (Some(start), end) => {
            if start >= length {
                return None;
            }
            let end = end.map_or(length - 1, |end| end.min(length - 1));
            Some(ByteRange::new(start, end))
        }
        // suffix -N: the last N bytes
        (None, Some(suffix_length)) => {
            if suffix_length == 0 {
                return None;
            }
            let bytes = suffix_length.min(length);
            let start = length - bytes;
            Some(ByteRange::new(start, start + bytes - 1))
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn absent_header_is_not_a_range_request() {
        let headers = HeaderMap::new();
        assert_eq!(RangeRequest::None, parse_range(&headers, 1000));
    }

    #[test]
    fn closed_range() {
        assert_eq!(
            RangeRequest::Satisfiable(ByteRange::new(0, 499)),
            parse_range_value("bytes=0-499", 1000),
        );
    }

    #[test]
    fn open_ended_range() {
        assert_eq!(
            RangeRequest::Satisfiable(ByteRange::new(500, 999)),
            parse_range_value("bytes=500-", 1000),
        );
    }

    #[test]
    fn suffix_range() {
        assert_eq!(
            RangeRequest::Satisfiable(ByteRange::new(800, 999)),
            parse_range_value("bytes=-200", 1000),
        );
    }

    #[test]
    fn suffix_longer_than_resource_covers_everything() {
        let range = assert_matches!(
            parse_range_value("bytes=-2000", 1000),
            RangeRequest::Satisfiable(range) => range
        );
        assert_eq!(ByteRange::new(0, 999), range);
        assert_eq!(1000, range.length());
    }

    #[test]
    fn suffix_of_zero_is_unsatisfiable() {
        assert_eq!(RangeRequest::Unsatisfiable, parse_range_value("bytes=-0", 1000));
    }

    #[test]
    fn end_clamped_to_resource_length() {
        assert_eq!(
            RangeRequest::Satisfiable(ByteRange::new(0, 999)),
            parse_range_value("bytes=0-9999", 1000),
        );
    }

    #[test]
    fn start_beyond_resource_is_unsatisfiable() {
        assert_eq!(RangeRequest::Unsatisfiable, parse_range_value("bytes=2000-3000", 1000));
        assert_eq!(RangeRequest::Unsatisfiable, parse_range_value("bytes=1000-", 1000));
    }

    #[test]
    fn zero_length_resource_is_unsatisfiable() {
        assert_eq!(RangeRequest::Unsatisfiable, parse_range_value("bytes=0-10", 0));
    }

    #[test]
    fn multi_range_degrades_to_full_response() {
        assert_eq!(RangeRequest::None, parse_range_value("bytes=0-10,20-30", 1000));
        assert_eq!(RangeRequest::None, parse_range_value("bytes=0-0,-1", 1000));
    }

    #[test]
    fn repeated_header_lines_degrade_to_full_response() {
        let mut headers = HeaderMap::new();
        headers.append(RANGE, "bytes=0-10".parse().unwrap());
        headers.append(RANGE, "bytes=20-30".parse().unwrap());
        assert_eq!(RangeRequest::None, parse_range(&headers, 1000));
    }

    #[test]
    fn malformed_specs_degrade_to_full_response() {
        for value in [
            "bytes=",
            "bytes=-",
            "bytes=abc-def",
            "bytes=10",
            "items=0-10",
            "bytes=30-20",
        ] {
            assert_eq!(RangeRequest::None, parse_range_value(value, 1000), "{value}");
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let length = 1000;
        for spec in [(Some(0), Some(499)), (Some(500), None), (None, Some(200))] {
            let first = normalize(spec.0, spec.1, length).unwrap();
            let again = normalize(Some(first.start), Some(first.end), length).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn suffix_normalization_bounds() {
        // N >= length pins the range to the whole resource
        for length in [1, 10, 1000] {
            let range = normalize(None, Some(length + 5), length).unwrap();
            assert_eq!(0, range.start);
            assert_eq!(length - 1, range.end);
        }
        // N < length yields exactly N bytes ending at the last byte
        let range = normalize(None, Some(10), 1000).unwrap();
        assert_eq!(10, range.length());
        assert_eq!(999, range.end);
    }

    #[test]
    fn content_range_formatting() {
        assert_eq!("bytes 500-999/1000", ByteRange::new(500, 999).to_content_range(1000));
    }
}
