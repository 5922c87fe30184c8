//! Error types for the instance group client.

use thiserror::Error;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("compute API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed compute API response: {0}")]
    Decode(String),
}
