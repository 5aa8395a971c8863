// src/transport/http.rs
use std::path::PathBuf;

use crate::Error as CrateError;
use crate::generator::FailureKind;
use snafu::Snafu;

/// Failures of a single send. None of these stop a run; the completion hook
/// records them and the next task proceeds.
///
/// Non-success statuses are not errors: a 4xx or 5xx response is still a
/// response and is reported as such.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// An error occurred during the transport of the request (e.g., network issue, DNS).
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: CrateError },

    /// The template declared no target url.
    #[snafu(display("Invocation has no target url"))]
    MissingUrl,

    /// The request itself was malformed or invalid before sending.
    #[snafu(display("Invalid HTTP request: {}", details))]
    InvalidRequest { details: String },

    /// A file backing the body (or a multipart part) could not be opened.
    #[snafu(display("Failed to open body file {}: {}", path.display(), source))]
    BodyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A timeout occurred.
    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// Other, unspecified HTTP client errors.
    #[snafu(display("Generic HTTP client error: {}", source))]
    ClientError { source: CrateError },
}

impl HttpError {
    pub const fn kind(&self) -> FailureKind {
        match self {
            HttpError::Transport { .. } => FailureKind::Connect,
            HttpError::MissingUrl | HttpError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            HttpError::BodyFile { .. } => FailureKind::Io,
            HttpError::Timeout => FailureKind::Timeout,
            HttpError::ClientError { .. } => FailureKind::Other,
        }
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            HttpError::Timeout
        } else if error.is_connect() {
            HttpError::Transport {
                source: Box::new(error),
            }
        } else if error.is_builder() {
            HttpError::InvalidRequest {
                details: error.to_string(),
            }
        } else {
            HttpError::ClientError {
                source: Box::new(error),
            }
        }
    }
}
