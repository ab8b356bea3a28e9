use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;

/// Failure conditions a transport can report for a single call.
///
/// These are raw conditions; [`Error`](crate::Error) classifies them.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("unable to parse configuration {path}: {message}")]
    ConfigParser { path: String, message: String },

    #[error("no credentials available: {0}")]
    NoCredentials(String),

    #[error("profile {profile} not found in {path}")]
    NoProfile { profile: String, path: String },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Name resolution, connection refused/reset or connect timeout.
    #[error("connection failure: {0}")]
    Connection(String),

    /// Non-success HTTP status, with the decoded error body when there was one.
    #[error("HTTP status {status}")]
    Http { status: u16, body: Option<Json> },

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Executes one signed call of a named action.
///
/// Returns the decoded JSON body, or `None` when the service answered with
/// an empty body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, action: &str, payload: &Json) -> Result<Option<Json>, TransportError>;
}
