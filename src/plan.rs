//! Decides status code, headers, and body policy for a file response.
//!
//! The plan is fully committed before any body byte is produced, because
//! transports finalize headers on the first body write.

use std::time::SystemTime;

use axum::http::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
    LAST_MODIFIED,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use percent_encoding::{percent_encode, NON_ALPHANUMERIC};

use crate::etag::EntityTag;
use crate::precondition::{truncate_to_seconds, ConditionalHeaders, Precondition};
use crate::range::{parse_range, ByteRange, RangeRequest};
use crate::source::SourceMetadata;

pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Static configuration of a file response, fixed before the backing
/// store is consulted. Runtime facts (length, modification time) arrive
/// separately as [`SourceMetadata`] so the descriptor itself never
/// mutates once execution starts.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Value for the `Content-Type` header.
    pub content_type: String,
    /// When set, the response carries `Content-Disposition: attachment`
    /// with this file name.
    pub download_name: Option<String>,
    /// Overrides the modification time reported by the source.
    pub last_modified: Option<SystemTime>,
    /// Entity tag advertised for the representation.
    pub etag: Option<EntityTag>,
    /// Whether `Range` requests are honored for this response.
    pub range_support: bool,
}

impl FileDescriptor {
    pub fn new(content_type: impl Into<String>) -> Self {
        FileDescriptor {
            content_type: content_type.into(),
            download_name: None,
            last_modified: None,
            etag: None,
            range_support: false,
        }
    }
}

impl Default for FileDescriptor {
    fn default() -> Self {
        FileDescriptor::new(APPLICATION_OCTET_STREAM)
    }
}

/// The committed status/header set for one response, plus the body
/// policy derived alongside it.
#[derive(Debug)]
pub struct ResponsePlan {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// False for 304/412/416 and HEAD: headers only, empty body.
    pub serve_body: bool,
    /// The byte span to serve when this is a 206 response.
    pub range: Option<ByteRange>,
}

impl ResponsePlan {
    fn suppressed(status: StatusCode, headers: HeaderMap) -> Self {
        ResponsePlan { status, headers, serve_body: false, range: None }
    }
}

/// Produce the status code, response headers, and body policy for a file
/// request.
///
/// The outcome depends only on the request method, the request's
/// conditional and range headers, and the resource's metadata — never on
/// body content. Responses that suppress the body (304, 412, 416, HEAD)
/// still carry the validator headers a cache needs.
pub fn plan(
    method: &Method,
    request_headers: &HeaderMap,
    descriptor: &FileDescriptor,
    metadata: &SourceMetadata,
) -> ResponsePlan {
    let last_modified = descriptor
        .last_modified
        .or(metadata.modified)
        .map(truncate_to_seconds);
    let etag = descriptor.etag.as_ref();

    let conditional = ConditionalHeaders::from_headers(request_headers);
    let state = conditional.evaluate(last_modified, etag);

    // Validators are sent on every outcome, including 304 and 412.
    let mut headers = HeaderMap::new();
    if let Some(last_modified) = last_modified {
        headers.insert(LAST_MODIFIED, date_value(last_modified));
    }
    if let Some(etag) = etag {
        headers.insert(ETAG, etag.to_header_value());
    }

    match state {
        Precondition::NotModified => {
            tracing::debug!("precondition state NotModified, responding 304");
            return ResponsePlan::suppressed(StatusCode::NOT_MODIFIED, headers);
        }
        Precondition::Failed => {
            tracing::debug!("precondition state Failed, responding 412");
            return ResponsePlan::suppressed(StatusCode::PRECONDITION_FAILED, headers);
        }
        Precondition::Unspecified | Precondition::ShouldProcess => {}
    }

    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&descriptor.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(APPLICATION_OCTET_STREAM)),
    );
    if let Some(name) = &descriptor.download_name {
        headers.insert(CONTENT_DISPOSITION, attachment_value(name));
    }

    let serve_body = *method != Method::HEAD;

    let Some(length) = metadata.length else {
        // Without a known length there is nothing to validate ranges
        // against; stream the whole representation.
        return ResponsePlan { status: StatusCode::OK, headers, serve_body, range: None };
    };

    // Content-Length covers the entire file here; a satisfiable range
    // request overwrites it with the range length below.
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));

    if descriptor.range_support {
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

        let method_allows_range = *method == Method::GET || *method == Method::HEAD;
        if method_allows_range && conditional.if_range_valid(last_modified, etag) {
            match parse_range(request_headers, length) {
                RangeRequest::None => {}
                RangeRequest::Unsatisfiable => {
                    // RFC 9110: a 416 should tell the client the current
                    // representation length via `bytes */length`.
                    headers.insert(
                        CONTENT_RANGE,
                        HeaderValue::from_str(&format!("bytes */{length}"))
                            .expect("content range value is ASCII"),
                    );
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(0u64));
                    return ResponsePlan::suppressed(
                        StatusCode::RANGE_NOT_SATISFIABLE,
                        headers,
                    );
                }
                RangeRequest::Satisfiable(range) => {
                    headers.insert(
                        CONTENT_RANGE,
                        HeaderValue::from_str(&range.to_content_range(length))
                            .expect("content range value is ASCII"),
                    );
                    headers.insert(CONTENT_LENGTH, HeaderValue::from(range.length()));
                    return ResponsePlan {
                        status: StatusCode::PARTIAL_CONTENT,
                        headers,
                        serve_body,
                        range: Some(range),
                    };
                }
            }
        }
    }

    ResponsePlan { status: StatusCode::OK, headers, serve_body, range: None }
}

fn date_value(time: SystemTime) -> HeaderValue {
    HeaderValue::from_str(&httpdate::fmt_http_date(time)).expect("HTTP dates are ASCII")
}

/// Build a `Content-Disposition: attachment` value per RFC 6266. Plain
/// ASCII names are carried in a quoted `filename`; anything else is
/// percent-encoded into the `filename*` extended parameter.
fn attachment_value(name: &str) -> HeaderValue {
    let plain = name
        .bytes()
        .all(|byte| (0x20..=0x7e).contains(&byte) && byte != b'"' && byte != b'\\');
    let value = if plain {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            percent_encode(name.as_bytes(), NON_ALPHANUMERIC),
        )
    };
    HeaderValue::from_str(&value).expect("encoded file name is ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    const LENGTH: u64 = 1000;
    const LAST_MODIFIED_DATE: &str = "Tue, 14 Nov 2023 22:13:20 GMT";

    fn last_modified() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn metadata() -> SourceMetadata {
        SourceMetadata { length: Some(LENGTH), modified: Some(last_modified()) }
    }

    fn descriptor() -> FileDescriptor {
        let mut descriptor = FileDescriptor::new("text/plain");
        descriptor.range_support = true;
        descriptor
    }

    fn request(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    fn header<'a>(plan: &'a ResponsePlan, name: &str) -> Option<&'a str> {
        plan.headers.get(name).map(|value| value.to_str().unwrap())
    }

    #[test]
    fn plain_get_serves_whole_file() {
        let plan = plan(&Method::GET, &request(&[]), &descriptor(), &metadata());
        assert_eq!(StatusCode::OK, plan.status);
        assert!(plan.serve_body);
        assert_eq!(None, plan.range);
        assert_eq!(Some("1000"), header(&plan, "content-length"));
        assert_eq!(Some("text/plain"), header(&plan, "content-type"));
        assert_eq!(Some("bytes"), header(&plan, "accept-ranges"));
        assert_eq!(Some(LAST_MODIFIED_DATE), header(&plan, "last-modified"));
        assert_eq!(None, header(&plan, "content-range"));
    }

    #[test]
    fn open_ended_range_is_partial_content() {
        let request = request(&[("range", "bytes=500-")]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::PARTIAL_CONTENT, plan.status);
        assert_eq!(Some(ByteRange::new(500, 999)), plan.range);
        assert_eq!(Some("bytes 500-999/1000"), header(&plan, "content-range"));
        assert_eq!(Some("500"), header(&plan, "content-length"));
        assert!(plan.serve_body);
    }

    #[test]
    fn range_beyond_length_is_not_satisfiable() {
        let request = request(&[("range", "bytes=2000-3000")]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, plan.status);
        assert_eq!(Some("bytes */1000"), header(&plan, "content-range"));
        assert_eq!(Some("0"), header(&plan, "content-length"));
        assert!(!plan.serve_body);
        assert_eq!(None, plan.range);
    }

    #[test]
    fn multi_range_serves_full_body() {
        let request = request(&[("range", "bytes=0-10,20-30")]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::OK, plan.status);
        assert_eq!(None, header(&plan, "content-range"));
        assert_eq!(Some("1000"), header(&plan, "content-length"));
        assert!(plan.serve_body);
    }

    #[test]
    fn head_gets_identical_headers_without_body() {
        let request = request(&[("range", "bytes=500-")]);
        let get = plan(&Method::GET, &request, &descriptor(), &metadata());
        let head = plan(&Method::HEAD, &request, &descriptor(), &metadata());
        assert_eq!(get.status, head.status);
        assert_eq!(get.headers, head.headers);
        assert!(!head.serve_body);
    }

    #[test]
    fn post_ignores_range_header() {
        let request = request(&[("range", "bytes=500-")]);
        let plan = plan(&Method::POST, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::OK, plan.status);
        assert_eq!(None, plan.range);
    }

    #[test]
    fn not_modified_suppresses_content_headers() {
        let mut descriptor = descriptor();
        descriptor.etag = Some(EntityTag::strong("v2"));
        let request = request(&[("if-none-match", "\"v2\"")]);
        let plan = plan(&Method::GET, &request, &descriptor, &metadata());
        assert_eq!(StatusCode::NOT_MODIFIED, plan.status);
        assert!(!plan.serve_body);
        assert_eq!(Some("\"v2\""), header(&plan, "etag"));
        assert_eq!(Some(LAST_MODIFIED_DATE), header(&plan, "last-modified"));
        assert_eq!(None, header(&plan, "content-type"));
        assert_eq!(None, header(&plan, "content-length"));
    }

    #[test]
    fn precondition_failure_outranks_range_processing() {
        let request = request(&[
            ("if-unmodified-since", "Mon, 13 Nov 2023 00:00:00 GMT"),
            ("range", "bytes=0-10"),
        ]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::PRECONDITION_FAILED, plan.status);
        assert!(!plan.serve_body);
        assert_eq!(None, plan.range);
        assert_eq!(None, header(&plan, "content-range"));
    }

    #[test]
    fn stale_if_range_downgrades_to_full_response() {
        let request = request(&[
            ("range", "bytes=0-10"),
            ("if-range", "Mon, 13 Nov 2023 00:00:00 GMT"),
        ]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::OK, plan.status);
        assert_eq!(None, plan.range);
        assert_eq!(Some("1000"), header(&plan, "content-length"));
    }

    #[test]
    fn current_if_range_keeps_partial_response() {
        let request = request(&[
            ("range", "bytes=0-10"),
            ("if-range", LAST_MODIFIED_DATE),
        ]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata());
        assert_eq!(StatusCode::PARTIAL_CONTENT, plan.status);
        assert_eq!(Some(ByteRange::new(0, 10)), plan.range);
    }

    #[test]
    fn range_processing_disabled_by_default() {
        let descriptor = FileDescriptor::new("text/plain");
        let request = request(&[("range", "bytes=0-10")]);
        let plan = plan(&Method::GET, &request, &descriptor, &metadata());
        assert_eq!(StatusCode::OK, plan.status);
        assert_eq!(None, header(&plan, "accept-ranges"));
        assert_eq!(None, plan.range);
    }

    #[test]
    fn unknown_length_disables_range_processing() {
        let metadata = SourceMetadata { length: None, modified: None };
        let request = request(&[("range", "bytes=0-10")]);
        let plan = plan(&Method::GET, &request, &descriptor(), &metadata);
        assert_eq!(StatusCode::OK, plan.status);
        assert_eq!(None, header(&plan, "accept-ranges"));
        assert_eq!(None, header(&plan, "content-length"));
        assert!(plan.serve_body);
    }

    #[test]
    fn explicit_last_modified_wins_over_source() {
        let mut descriptor = descriptor();
        descriptor.last_modified = Some(UNIX_EPOCH + Duration::from_secs(1_600_000_000));
        let plan = plan(&Method::GET, &request(&[]), &descriptor, &metadata());
        assert_eq!(
            Some("Sun, 13 Sep 2020 12:26:40 GMT"),
            header(&plan, "last-modified"),
        );
    }

    #[test]
    fn download_name_sets_attachment_disposition() {
        let mut descriptor = descriptor();
        descriptor.download_name = Some("report.pdf".to_owned());
        let plan = plan(&Method::GET, &request(&[]), &descriptor, &metadata());
        assert_eq!(
            Some("attachment; filename=\"report.pdf\""),
            header(&plan, "content-disposition"),
        );
    }

    #[test]
    fn non_ascii_download_name_uses_extended_parameter() {
        assert_eq!(
            "attachment; filename*=UTF-8''caf%C3%A9%20menu%2Epdf",
            attachment_value("café menu.pdf").to_str().unwrap(),
        );
    }
}
