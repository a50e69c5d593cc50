//! Simple response builders: created/accepted resources, redirects, and
//! RFC 7807 problem details.
//!
//! Status-only responses are deliberately absent — `StatusCode` already
//! implements `IntoResponse`.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use serde::Serialize;

/// Default `type` URI and `title` per status code, populated once at
/// startup and never mutated.
static PROBLEM_DEFAULTS: Lazy<HashMap<u16, (&'static str, &'static str)>> = Lazy::new(|| {
    HashMap::from([
        (400, ("https://tools.ietf.org/html/rfc7231#section-6.5.1", "Bad Request")),
        (401, ("https://tools.ietf.org/html/rfc7235#section-3.1", "Unauthorized")),
        (403, ("https://tools.ietf.org/html/rfc7231#section-6.5.3", "Forbidden")),
        (404, ("https://tools.ietf.org/html/rfc7231#section-6.5.4", "Not Found")),
        (406, ("https://tools.ietf.org/html/rfc7231#section-6.5.6", "Not Acceptable")),
        (409, ("https://tools.ietf.org/html/rfc7231#section-6.5.8", "Conflict")),
        (415, ("https://tools.ietf.org/html/rfc7231#section-6.5.13", "Unsupported Media Type")),
        (422, ("https://tools.ietf.org/html/rfc4918#section-11.2", "Unprocessable Entity")),
        (500, ("https://tools.ietf.org/html/rfc7231#section-6.6.1", "An error occurred while processing your request.")),
    ])
});

fn location_value(location: &str) -> HeaderValue {
    assert!(!location.is_empty(), "location must not be empty");
    HeaderValue::try_from(location)
        .unwrap_or_else(|_| panic!("invalid location header value: {location:?}"))
}

fn json_response(status: StatusCode, content_type: &'static str, value: &impl Serialize) -> Response {
    match serde_json::to_vec(value) {
        Ok(buf) => {
            let mut response = Response::new(Body::from(buf));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            response
        }
        Err(error) => {
            tracing::error!(%error, "failed to serialize response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// 201 Created, with the location of the new resource and an optional
/// JSON body describing it.
#[derive(Debug)]
pub struct Created<T = ()> {
    location: Option<HeaderValue>,
    value: Option<T>,
}

impl Created<()> {
    /// # Panics
    ///
    /// Panics if `location` is empty or not a valid header value.
    pub fn at(location: &str) -> Self {
        Created { location: Some(location_value(location)), value: None }
    }

    /// A 201 without a `Location` header.
    pub fn bare() -> Self {
        Created { location: None, value: None }
    }

    /// Attach a JSON body.
    pub fn value<T: Serialize>(self, value: T) -> Created<T> {
        Created { location: self.location, value: Some(value) }
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        let mut response = match &self.value {
            Some(value) => json_response(StatusCode::CREATED, "application/json", value),
            None => StatusCode::CREATED.into_response(),
        };
        if let Some(location) = self.location {
            response.headers_mut().insert(LOCATION, location);
        }
        response
    }
}

/// 202 Accepted, optionally pointing at a status-monitor resource.
#[derive(Debug)]
pub struct Accepted<T = ()> {
    location: Option<HeaderValue>,
    value: Option<T>,
}

impl Accepted<()> {
    pub fn new() -> Self {
        Accepted { location: None, value: None }
    }

    /// # Panics
    ///
    /// Panics if `location` is empty or not a valid header value.
    pub fn at(location: &str) -> Self {
        Accepted { location: Some(location_value(location)), value: None }
    }

    /// Attach a JSON body.
    pub fn value<T: Serialize>(self, value: T) -> Accepted<T> {
        Accepted { location: self.location, value: Some(value) }
    }
}

impl Default for Accepted<()> {
    fn default() -> Self {
        Accepted::new()
    }
}

impl<T: Serialize> IntoResponse for Accepted<T> {
    fn into_response(self) -> Response {
        let mut response = match &self.value {
            Some(value) => json_response(StatusCode::ACCEPTED, "application/json", value),
            None => StatusCode::ACCEPTED.into_response(),
        };
        if let Some(location) = self.location {
            response.headers_mut().insert(LOCATION, location);
        }
        response
    }
}

/// A redirect response. The constructors cover the permanent ×
/// preserve-method matrix, so no invalid status can be constructed.
#[derive(Debug)]
pub struct Redirect {
    status: StatusCode,
    location: HeaderValue,
}

impl Redirect {
    /// 302 Found.
    ///
    /// # Panics
    ///
    /// Panics if `location` is empty or not a valid header value (as do
    /// the other constructors).
    pub fn temporary(location: &str) -> Self {
        Redirect { status: StatusCode::FOUND, location: location_value(location) }
    }

    /// 301 Moved Permanently.
    pub fn permanent(location: &str) -> Self {
        Redirect { status: StatusCode::MOVED_PERMANENTLY, location: location_value(location) }
    }

    /// 307 Temporary Redirect: the client must repeat the request with
    /// the same method and body.
    pub fn temporary_preserve_method(location: &str) -> Self {
        Redirect { status: StatusCode::TEMPORARY_REDIRECT, location: location_value(location) }
    }

    /// 308 Permanent Redirect, method-preserving.
    pub fn permanent_preserve_method(location: &str) -> Self {
        Redirect { status: StatusCode::PERMANENT_REDIRECT, location: location_value(location) }
    }

    /// 303 See Other: directs the client to GET the target.
    pub fn see_other(location: &str) -> Self {
        Redirect { status: StatusCode::SEE_OTHER, location: location_value(location) }
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.headers_mut().insert(LOCATION, self.location);
        response
    }
}

/// An RFC 7807 problem-details body, serialized as
/// `application/problem+json`. `type` and `title` default from the
/// status code where a default is known.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    type_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance: Option<String>,
}

impl Problem {
    pub fn from_status(status: StatusCode) -> Self {
        let defaults = PROBLEM_DEFAULTS.get(&status.as_u16());
        Problem {
            type_uri: defaults.map(|(type_uri, _)| (*type_uri).to_owned()),
            title: defaults.map(|(_, title)| (*title).to_owned()),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn type_uri(mut self, type_uri: impl Into<String>) -> Self {
        self.type_uri = Some(type_uri.into());
        self
    }

    /// Human-readable explanation specific to this occurrence.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// URI identifying this specific occurrence.
    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        json_response(status, "application/problem+json", &self)
    }
}
