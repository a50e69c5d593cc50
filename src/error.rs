use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::responses::Problem;

/// Failure while resolving or reading the backing store of a file
/// response. Raised before any response header is emitted, so the
/// framework is free to map it to whatever status it chooses.
#[derive(Error, Debug)]
pub enum FileResponseError {
    /// The requested file does not exist (or is not a regular file).
    #[error("could not find file: {0}")]
    NotFound(String),

    /// Any other I/O failure while statting or opening the source.
    #[error("file source error: {0}")]
    Io(#[from] io::Error),
}

/// Default mapping for applications that bubble the error straight out
/// of a handler: 404 or 500 as a problem-details body. The file path is
/// logged, not leaked to the client.
impl IntoResponse for FileResponseError {
    fn into_response(self) -> Response {
        match self {
            FileResponseError::NotFound(path) => {
                tracing::debug!(%path, "file response target missing");
                Problem::from_status(StatusCode::NOT_FOUND).into_response()
            }
            FileResponseError::Io(error) => {
                tracing::error!(%error, "file response source failed");
                Problem::from_status(StatusCode::INTERNAL_SERVER_ERROR).into_response()
            }
        }
    }
}
