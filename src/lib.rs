use crate::http::HttpError;
use thiserror::Error;

/// Error types for the echobin library
#[derive(Error, Debug)]
pub enum Error {
    /// Transport errors (bind, accept, connect, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// HTTP protocol errors surfaced outside a request/response cycle
    #[error("HTTP error: {0}")]
    Http(HttpError),
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Io(e) => Error::Io(e),
            other => Error::Http(other),
        }
    }
}

/// Result type for the echobin library
pub type Result<T> = std::result::Result<T, Error>;

pub mod common;
pub mod http;
pub mod security;

// Re-export main types for convenience
pub use common::ServerTrait;
pub use http::{
    Dispatcher, Entropy, HttpClient, HttpConfig, HttpServer, IncomingRequest, OutgoingResponse,
    Router,
};
