use reqwest::StatusCode;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::downloader::planer::ByteRange;
use crate::utils::multierr::MultiError;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("capability probe failed")]
    CapabilityProbe(#[from] ProbeError),

    #[error("HTTP request failed")]
    Fetch(#[source] FetchError),

    #[error("download failed: {failed} of {total} chunks failed")]
    ChunksFailed {
        failed: usize,
        total: usize,
        #[source]
        errors: MultiError<FetchError>,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DownloadError::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{probe} request failed")]
    Request {
        probe: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{probe} returned status {status}")]
    Status {
        probe: &'static str,
        status: StatusCode,
    },
}

/// Failure of a single fetch, tagged with the byte range it was responsible
/// for. `range` is `None` only for a whole-file fetch of unknown size.
#[derive(Debug)]
pub struct FetchError {
    pub range: Option<ByteRange>,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(range: Option<ByteRange>, kind: FetchErrorKind) -> Self {
        Self { range, kind }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, FetchErrorKind::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum FetchErrorKind {
    #[error("request failed")]
    Request(#[source] reqwest::Error),

    #[error("unexpected status code {0}")]
    Status(StatusCode),

    #[error("failed to read response body")]
    Body(#[source] reqwest::Error),

    #[error("failed to write to output")]
    Write(#[source] io::Error),

    #[error("expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("cancelled after a sibling chunk failed")]
    Cancelled,

    #[error("chunk task panicked: {0}")]
    TaskPanicked(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "bytes {}: {}", range, self.kind),
            None => write!(f, "whole file: {}", self.kind),
        }
    }
}

// The kind is part of this error's message, so the chain continues with
// whatever the kind wraps.
impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}
