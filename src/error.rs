use crate::transport::TransportError;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::fmt;
use thiserror::Error;

/// Status the transport reports for a client-side request timeout.
pub const CLIENT_TIMEOUT_STATUS: u16 = 599;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Closed set of failure classifications.
///
/// Each kind carries a stable name, used verbatim in
/// [`Measurement`](crate::Measurement) records, and a static retryable flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Credential and configuration resolution
    ConfigNotFound,
    ConfigParserError,
    NoCredentialsError,
    NoProfileError,

    // Request rejected by the service
    ValidationException,
    ConditionalCheckFailedException,
    MalformedQueryString,
    MissingParameter,
    InvalidParameterValue,
    InvalidParameterCombination,
    InvalidQueryParameter,
    InvalidAction,

    // Resource state
    ResourceNotFound,
    ResourceInUse,
    LimitExceeded,
    ItemCollectionSizeLimitExceeded,
    OptInRequired,

    // Transport
    RequestException,
    TimeoutException,
    RequestExpired,

    // Service overload
    ThroughputExceeded,
    ThrottlingException,
    ServiceUnavailable,
    InternalFailure,
    InternalServerError,

    /// Protocol violation or otherwise unclassifiable failure.
    DynamoDBException,

    /// Local codec failure. Never produced by the retry path.
    SerializationError,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "ConfigNotFound",
            Self::ConfigParserError => "ConfigParserError",
            Self::NoCredentialsError => "NoCredentialsError",
            Self::NoProfileError => "NoProfileError",
            Self::ValidationException => "ValidationException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::MalformedQueryString => "MalformedQueryString",
            Self::MissingParameter => "MissingParameter",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::InvalidParameterCombination => "InvalidParameterCombination",
            Self::InvalidQueryParameter => "InvalidQueryParameter",
            Self::InvalidAction => "InvalidAction",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::ResourceInUse => "ResourceInUse",
            Self::LimitExceeded => "LimitExceeded",
            Self::ItemCollectionSizeLimitExceeded => "ItemCollectionSizeLimitExceeded",
            Self::OptInRequired => "OptInRequired",
            Self::RequestException => "RequestException",
            Self::TimeoutException => "TimeoutException",
            Self::RequestExpired => "RequestExpired",
            Self::ThroughputExceeded => "ThroughputExceeded",
            Self::ThrottlingException => "ThrottlingException",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::InternalFailure => "InternalFailure",
            Self::InternalServerError => "InternalServerError",
            Self::DynamoDBException => "DynamoDBException",
            Self::SerializationError => "SerializationError",
        }
    }

    /// Whether another attempt may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestException
                | Self::TimeoutException
                | Self::RequestExpired
                | Self::ThroughputExceeded
                | Self::ThrottlingException
                | Self::ServiceUnavailable
                | Self::InternalFailure
                | Self::InternalServerError
        )
    }

    /// Map a service error code (the `__type` suffix) to its kind.
    ///
    /// Returns `None` for codes without a dedicated kind.
    pub fn from_service_code(code: &str) -> Option<Self> {
        let kind = match code {
            "ValidationException" => Self::ValidationException,
            "ConditionalCheckFailedException" => Self::ConditionalCheckFailedException,
            "MalformedQueryString" => Self::MalformedQueryString,
            "MissingParameter" => Self::MissingParameter,
            "InvalidParameterValue" => Self::InvalidParameterValue,
            "InvalidParameterCombination" => Self::InvalidParameterCombination,
            "InvalidQueryParameter" => Self::InvalidQueryParameter,
            "InvalidAction" => Self::InvalidAction,
            "ResourceNotFoundException" | "ResourceNotFound" => Self::ResourceNotFound,
            "ResourceInUseException" | "ResourceInUse" => Self::ResourceInUse,
            "LimitExceededException" | "LimitExceeded" => Self::LimitExceeded,
            "ItemCollectionSizeLimitExceededException" => Self::ItemCollectionSizeLimitExceeded,
            "OptInRequired" => Self::OptInRequired,
            "RequestExpired" => Self::RequestExpired,
            "ProvisionedThroughputExceededException" => Self::ThroughputExceeded,
            "ThrottlingException" | "RequestLimitExceeded" => Self::ThrottlingException,
            "ServiceUnavailable" | "ServiceUnavailableException" => Self::ServiceUnavailable,
            "InternalFailure" => Self::InternalFailure,
            "InternalServerError" => Self::InternalServerError,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify an HTTP error response.
    ///
    /// The sentinel timeout status wins over any body. Otherwise a recognised
    /// `__type` code selects its dedicated kind and anything else is a
    /// retryable `RequestException`.
    pub fn from_service_response(status: u16, body: Option<&Json>) -> Self {
        if status == CLIENT_TIMEOUT_STATUS {
            return Self::new(ErrorKind::TimeoutException, "request timed out");
        }

        let code = body
            .and_then(|b| b.get("__type"))
            .and_then(Json::as_str)
            .map(|t| t.rsplit('#').next().unwrap_or(t));
        let message = body
            .and_then(|b| b.get("message").or_else(|| b.get("Message")))
            .and_then(Json::as_str)
            .map(str::to_owned);

        match code.and_then(ErrorKind::from_service_code) {
            Some(kind) => Self::new(kind, message.unwrap_or_else(|| format!("HTTP {status}"))),
            None => {
                let detail = match (code, message) {
                    (Some(code), Some(message)) => format!("HTTP {status} {code}: {message}"),
                    (Some(code), None) => format!("HTTP {status} {code}"),
                    (None, Some(message)) => format!("HTTP {status}: {message}"),
                    (None, None) => format!("HTTP {status}"),
                };
                Self::new(ErrorKind::RequestException, detail)
            }
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::Http { status, body } => {
                return Error::from_service_response(*status, body.as_ref())
            }
            TransportError::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            TransportError::ConfigParser { .. } => ErrorKind::ConfigParserError,
            TransportError::NoCredentials(_) => ErrorKind::NoCredentialsError,
            TransportError::NoProfile { .. } => ErrorKind::NoProfileError,
            TransportError::Io(_) | TransportError::Connection(_) => ErrorKind::RequestException,
            TransportError::Protocol(_) => ErrorKind::DynamoDBException,
        };
        Error::with_source(kind, err.to_string(), err)
    }
}

/// Deserialize a response shape, treating a mismatch as a protocol violation.
///
/// Item-shaped members should be taken as raw JSON objects and decoded
/// separately, so a bad attribute value stays a `SerializationError`.
pub(crate) fn protocol<T: DeserializeOwned>(value: Json, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|err| Error::with_source(ErrorKind::DynamoDBException, format!("unexpected {what}"), err))
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::SerializationError, err.to_string(), err)
    }
}
