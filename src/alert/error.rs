#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to send alert digest: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("alert sink answered with status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, Error>;
