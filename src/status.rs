//! HTTP status codes for surfacing client failures from a web handler.

use crate::error::{Error, ErrorKind};

/// Environment variable that makes missing credentials look like rate limiting.
pub const NO_CREDENTIALS_RATE_LIMIT_ENV: &str = "DYANMODB_NO_CREDS_RATE_LIMIT";

/// Maps client errors onto the status a web service should answer with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusPolicy {
    /// Report `NoCredentialsError` as 429 instead of 500
    pub no_credentials_rate_limit: bool,
}

impl StatusPolicy {
    pub fn new(no_credentials_rate_limit: bool) -> Self {
        Self {
            no_credentials_rate_limit,
        }
    }

    /// Read the policy from [`NO_CREDENTIALS_RATE_LIMIT_ENV`]; unset means disabled.
    pub fn from_env() -> Self {
        let flag = std::env::var(NO_CREDENTIALS_RATE_LIMIT_ENV).unwrap_or_default();
        Self::new(Self::parse_flag(&flag))
    }

    pub fn status_for(&self, error: &Error) -> u16 {
        self.status_and_reason(error).0
    }

    /// Status code plus a short reason phrase suitable for a response body.
    pub fn status_and_reason(&self, error: &Error) -> (u16, &'static str) {
        match error.kind() {
            ErrorKind::ConditionalCheckFailedException => (409, "Conflict"),
            ErrorKind::NoCredentialsError if self.no_credentials_rate_limit => (429, "Too Many Requests"),
            ErrorKind::ThroughputExceeded | ErrorKind::ThrottlingException => (429, "Too Many Requests"),
            _ => (500, "Internal Server Error"),
        }
    }

    /// `true` only for the text `true`, in any case.
    pub fn parse_flag(value: &str) -> bool {
        value.trim().eq_ignore_ascii_case("true")
    }
}
