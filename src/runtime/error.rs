use std::path::PathBuf;
use std::time::Duration;

use crate::container::ContainerID;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to socket `{path}`: {source}")]
    SocketConnect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP handshake with the runtime failed: {0}")]
    Handshake(#[source] hyper::Error),
    #[error("failed to build request for `{path}`: {reason}")]
    BuildRequest { path: String, reason: String },
    #[error("request `{path}` failed: {source}")]
    Request {
        path: String,
        #[source]
        source: hyper::Error,
    },
    #[error("request `{path}` timed out after {timeout:?}")]
    Timeout { path: String, timeout: Duration },
    #[error("container `{0}` not found")]
    NotFound(ContainerID),
    #[error("container `{0}` is not running")]
    NotRunning(ContainerID),
    #[error("runtime answered `{path}` with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),
    #[error("failed to decode response of `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Whether the container is gone or no longer running, so it should not
    /// be sampled again.
    pub fn is_vanished(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NotRunning(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
