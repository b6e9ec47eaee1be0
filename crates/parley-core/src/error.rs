//! Error types for chat responders.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponderError {
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("request to chat service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chat service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ResponderError>;
