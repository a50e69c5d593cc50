//! # axum-responses
//!
//! HTTP response builders for [`axum`][1].
//!
//! The centerpiece is [`FileResponse`]: a builder that serves a file-like
//! source — an in-memory buffer, an async reader, a path on disk, or a
//! logical path behind a [`FileProvider`] — with conditional request
//! (`ETag`/`Last-Modified`) and single byte-range support. Header
//! planning is separated from body streaming, so 304/412/416 and HEAD
//! responses never touch the source's bytes.
//!
//! Multi-range requests are recognized and served as a plain 200 full
//! body; `multipart/byteranges` is intentionally unsupported.
//!
//! ```no_run
//! use axum::Router;
//! use axum::routing::get;
//! use axum::http::{HeaderMap, Method};
//! use axum::response::Response;
//!
//! use axum_responses::{FileResponse, FileResponseError};
//!
//! async fn video(
//!     method: Method,
//!     headers: HeaderMap,
//! ) -> Result<Response, FileResponseError> {
//!     FileResponse::from_path("media/talk.mp4")
//!         .with_range_support()
//!         .respond(&method, &headers)
//!         .await
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app: Router = Router::new().route("/talk.mp4", get(video));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! Alongside the file subsystem, the crate ships a handful of small
//! builders for everyday API responses: [`Created`], [`Accepted`],
//! [`Redirect`], and RFC 7807 [`Problem`] details.
//!
//! [1]: https://docs.rs/axum

mod error;
mod etag;
mod file;
mod plan;
mod precondition;
mod range;
mod responses;
mod source;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::AsyncSeek;

pub use error::FileResponseError;
pub use etag::{EntityTag, TagList};
pub use file::FileResponse;
pub use plan::{plan, FileDescriptor, ResponsePlan};
pub use precondition::{truncate_to_seconds, ConditionalHeaders, IfRange, Precondition};
pub use range::{parse_range, parse_range_value, ByteRange, RangeRequest};
pub use responses::{Accepted, Created, Problem, Redirect};
pub use source::{
    BytesSource, DirProvider, FileProvider, FileSource, FileStat, PathSource, SourceMetadata,
    StreamSource, VirtualSource,
};
pub use stream::{FileByteStream, NoSeek};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}
