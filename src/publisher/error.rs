use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid redis address `{url}`: {source}")]
    RedisAddress {
        url: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("failed to write heartbeat: {0}")]
    Redis(#[source] redis::RedisError),
    #[error("heartbeat write timed out after {0:?}")]
    HeartbeatTimeout(Duration),
    #[error("failed to send metrics: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;
