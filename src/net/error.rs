use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid request method: {0}")]
    InvalidMethod(String),
}
