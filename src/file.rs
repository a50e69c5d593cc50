//! The file response builder.

use std::path::PathBuf;
use std::time::SystemTime;

use axum::body::Body;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::FileResponseError;
use crate::plan::{plan, FileDescriptor, APPLICATION_OCTET_STREAM};
use crate::source::{BytesSource, FileProvider, FileSource, PathSource, StreamSource, VirtualSource};
use crate::stream::NoSeek;
use crate::AsyncSeekStart;

/// Builds an HTTP response that serves a file-like source, with
/// conditional request and byte-range support.
///
/// Construction configures the response (content type, download name,
/// validators, range support); [`respond`](Self::respond) then resolves
/// the source's metadata, commits a status/header plan, and streams the
/// body — or suppresses it for 304/412/416 and HEAD.
///
/// ```no_run
/// use axum::http::{HeaderMap, Method};
/// use axum::response::Response;
/// use axum_responses::{FileResponse, FileResponseError};
///
/// async fn download(
///     method: Method,
///     headers: HeaderMap,
/// ) -> Result<Response, FileResponseError> {
///     FileResponse::from_path("data/report.pdf")
///         .attachment("report.pdf")
///         .with_range_support()
///         .respond(&method, &headers)
///         .await
/// }
/// ```
pub struct FileResponse<S> {
    source: S,
    descriptor: FileDescriptor,
}

impl FileResponse<PathSource> {
    /// Serve a file from disk. The content type is guessed from the file
    /// extension and defaults to `application/octet-stream`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(APPLICATION_OCTET_STREAM);
        FileResponse {
            descriptor: FileDescriptor::new(content_type),
            source: PathSource::new(path),
        }
    }
}

impl FileResponse<BytesSource> {
    /// Serve an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        FileResponse {
            source: BytesSource::new(bytes),
            descriptor: FileDescriptor::default(),
        }
    }
}

impl<R> FileResponse<StreamSource<R>>
where
    R: AsyncRead + AsyncSeekStart + Send + 'static,
{
    /// Serve a seekable reader with a known length.
    pub fn from_seekable(reader: R, length: u64) -> Self {
        FileResponse {
            source: StreamSource::sized(reader, length),
            descriptor: FileDescriptor::default(),
        }
    }
}

impl<R> FileResponse<StreamSource<R>>
where
    R: AsyncRead + tokio::io::AsyncSeek + Send + Unpin + 'static,
{
    /// Serve a seekable reader, measuring its length with a seek to the
    /// end of the stream.
    pub async fn measure(reader: R) -> std::io::Result<Self> {
        Ok(FileResponse {
            source: StreamSource::measure(reader).await?,
            descriptor: FileDescriptor::default(),
        })
    }
}

impl<R> FileResponse<StreamSource<NoSeek<R>>>
where
    R: AsyncRead + Send + 'static,
{
    /// Serve a forward-only reader of unknown length. Such responses
    /// carry no `Content-Length` and never advertise range support.
    pub fn from_stream(reader: R) -> Self {
        FileResponse {
            source: StreamSource::unknown_length(reader),
            descriptor: FileDescriptor::default(),
        }
    }
}

impl<P: FileProvider> FileResponse<VirtualSource<P>> {
    /// Serve a logical path through a [`FileProvider`]. The content type
    /// is guessed from the path's extension.
    pub fn from_provider(provider: P, path: impl Into<String>) -> Self {
        let path = path.into();
        let content_type = mime_guess::from_path(&path)
            .first_raw()
            .unwrap_or(APPLICATION_OCTET_STREAM);
        FileResponse {
            descriptor: FileDescriptor::new(content_type),
            source: VirtualSource::new(provider, path),
        }
    }
}

impl<S> FileResponse<S> {
    /// Set the `Content-Type` header.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.descriptor.content_type = content_type.into();
        self
    }

    /// Mark the response as a download with the given file name
    /// (`Content-Disposition: attachment`).
    pub fn attachment(mut self, file_name: impl Into<String>) -> Self {
        self.descriptor.download_name = Some(file_name.into());
        self
    }

    /// Advertise an entity tag for the representation, enabling
    /// `If-Match`/`If-None-Match`/`If-Range` evaluation.
    pub fn etag(mut self, etag: crate::EntityTag) -> Self {
        self.descriptor.etag = Some(etag);
        self
    }

    /// Override the modification time reported by the source.
    pub fn last_modified(mut self, when: SystemTime) -> Self {
        self.descriptor.last_modified = Some(when);
        self
    }

    /// Honor `Range` request headers for this response.
    pub fn with_range_support(mut self) -> Self {
        self.descriptor.range_support = true;
        self
    }
}

impl<S: FileSource> FileResponse<S> {
    /// Execute the response against one request.
    ///
    /// Resolves source metadata, evaluates preconditions and ranges,
    /// and produces the final response. All headers are committed before
    /// the body stream is handed to the transport. A missing file fails
    /// here, before anything is written.
    pub async fn respond(
        mut self,
        method: &Method,
        request_headers: &HeaderMap,
    ) -> Result<Response, FileResponseError> {
        let metadata = self.source.resolve().await?;
        let plan = plan(method, request_headers, &self.descriptor, &metadata);

        let body = if plan.serve_body {
            self.source.into_body(plan.range).await?
        } else {
            Body::empty()
        };

        let mut response = Response::new(body);
        *response.status_mut() = plan.status;
        *response.headers_mut() = plan.headers;
        Ok(response)
    }
}
