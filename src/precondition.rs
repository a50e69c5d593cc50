//! Conditional request evaluation per RFC 7232.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::header::{
    HeaderMap, HeaderName, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE,
};

use crate::etag::{EntityTag, TagList};

/// Result of evaluating the conditional headers of a request.
///
/// The variants are ordered by severity; the overall state of a request
/// is the maximum across the four header families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precondition {
    /// No applicable conditional header was present.
    Unspecified,
    /// The client's cached representation is current (304).
    NotModified,
    /// The preconditions hold; process the request normally (200/206).
    ShouldProcess,
    /// A precondition was not met (412).
    Failed,
}

/// The value of an `If-Range` header: a validator the client saw when it
/// fetched the bytes it already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfRange {
    Date(SystemTime),
    Tag(EntityTag),
}

/// The conditional headers of one request, parsed up front.
#[derive(Debug, Clone, Default)]
pub struct ConditionalHeaders {
    pub if_match: Option<TagList>,
    pub if_none_match: Option<TagList>,
    pub if_modified_since: Option<SystemTime>,
    pub if_unmodified_since: Option<SystemTime>,
    pub if_range: Option<IfRange>,
}

impl ConditionalHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        ConditionalHeaders {
            if_match: tag_list(headers, IF_MATCH),
            if_none_match: tag_list(headers, IF_NONE_MATCH),
            if_modified_since: http_date(headers, IF_MODIFIED_SINCE),
            if_unmodified_since: http_date(headers, IF_UNMODIFIED_SINCE),
            if_range: if_range(headers),
        }
    }

    /// Evaluate all four conditional header families against the
    /// resource's validators and reduce to the most restrictive state.
    ///
    /// The date comparisons operate at whole-second resolution, so
    /// `last_modified` must already be truncated (see
    /// [`truncate_to_seconds`]). Dates from the future are ignored.
    /// `If-Modified-Since` and `If-Unmodified-Since` are evaluated
    /// independently of each other.
    pub fn evaluate(
        &self,
        last_modified: Option<SystemTime>,
        etag: Option<&EntityTag>,
    ) -> Precondition {
        let mut if_match_state = Precondition::Unspecified;
        let mut if_none_match_state = Precondition::Unspecified;
        let mut if_modified_since_state = Precondition::Unspecified;
        let mut if_unmodified_since_state = Precondition::Unspecified;

        if let (Some(tags), Some(etag)) = (&self.if_match, etag) {
            if_match_state = if tags.matches(etag, true) {
                Precondition::ShouldProcess
            } else {
                Precondition::Failed
            };
        }

        if let (Some(tags), Some(etag)) = (&self.if_none_match, etag) {
            if_none_match_state = if tags.matches(etag, false) {
                Precondition::NotModified
            } else {
                Precondition::ShouldProcess
            };
        }

        let now = truncate_to_seconds(SystemTime::now());

        if let (Some(header_date), Some(last_modified)) = (self.if_modified_since, last_modified) {
            if header_date <= now {
                if_modified_since_state = if header_date < last_modified {
                    Precondition::ShouldProcess
                } else {
                    Precondition::NotModified
                };
            }
        }

        if let (Some(header_date), Some(last_modified)) =
            (self.if_unmodified_since, last_modified)
        {
            if header_date <= now {
                if_unmodified_since_state = if header_date >= last_modified {
                    Precondition::ShouldProcess
                } else {
                    Precondition::Failed
                };
            }
        }

        if_match_state
            .max(if_none_match_state)
            .max(if_modified_since_state)
            .max(if_unmodified_since_state)
    }

    /// Whether an `If-Range` header permits serving a partial response.
    ///
    /// A date form is honored only if the resource has not been modified
    /// since that date; an entity-tag form only on strong equality.
    /// An absent header always permits ranges.
    pub fn if_range_valid(
        &self,
        last_modified: Option<SystemTime>,
        etag: Option<&EntityTag>,
    ) -> bool {
        match &self.if_range {
            None => true,
            Some(IfRange::Date(date)) => match last_modified {
                Some(last_modified) => last_modified <= *date,
                None => true,
            },
            Some(IfRange::Tag(tag)) => match etag {
                Some(etag) => tag.strong_eq(etag),
                None => true,
            },
        }
    }
}

fn tag_list(headers: &HeaderMap, name: HeaderName) -> Option<TagList> {
    if !headers.contains_key(&name) {
        return None;
    }
    let values = headers
        .get_all(&name)
        .iter()
        .filter_map(|value| value.to_str().ok());
    match TagList::parse(values) {
        // A header whose items all failed to parse carries no condition.
        TagList::List(tags) if tags.is_empty() => None,
        list => Some(list),
    }
}

fn http_date(headers: &HeaderMap, name: HeaderName) -> Option<SystemTime> {
    let value = headers.get(&name)?.to_str().ok()?;
    httpdate::parse_http_date(value).ok()
}

fn if_range(headers: &HeaderMap) -> Option<IfRange> {
    let value = headers.get(IF_RANGE)?.to_str().ok()?;
    if value.starts_with('"') || value.starts_with("W/") {
        EntityTag::parse(value).map(IfRange::Tag)
    } else {
        httpdate::parse_http_date(value).ok().map(IfRange::Date)
    }
}

/// Drop sub-second precision from a timestamp. HTTP dates carry whole
/// seconds only, so validators must be compared at that resolution.
pub fn truncate_to_seconds(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => UNIX_EPOCH + Duration::from_secs(elapsed.as_secs()),
        Err(_) => time,
    }
}
