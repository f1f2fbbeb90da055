//! Error types for the Stripe transport core
//!
//! Every failure a caller can observe is one variant of [`Error`]. The five
//! API-facing kinds share a single [`ErrorDetails`] record so callers can
//! introspect status, raw body and the parsed error object uniformly.

use std::fmt;
use thiserror::Error;

use crate::response::ApiValue;

/// Main error type for Stripe API operations
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed API key, or HTTP 401
    #[error("{0}")]
    Authentication(ErrorDetails),

    /// HTTP 400 or 404; carries the offending parameter when known
    #[error("{0}")]
    InvalidRequest(ErrorDetails),

    /// HTTP 402; carries the parameter and a machine-readable decline code
    #[error("{0}")]
    Card(ErrorDetails),

    /// Any other non-2xx status, or a body that is not valid JSON
    #[error("{0}")]
    Api(ErrorDetails),

    /// Transport-level failure after retries were exhausted
    #[error("{0}")]
    ApiConnection(ErrorDetails),

    /// The request was cancelled through its cancellation token
    #[error("Request cancelled before a response was received")]
    Cancelled,

    /// Client settings that cannot be used to issue requests
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`] without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    InvalidRequest,
    Card,
    Api,
    ApiConnection,
    Cancelled,
    Configuration,
}

/// Everything known about a failed API call.
///
/// Built once at the point the failure is detected and moved straight into
/// the returned [`Error`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorDetails {
    /// Human-readable message
    pub message: String,
    /// Name of the offending request parameter
    pub param: Option<String>,
    /// Machine-readable error code (card declines)
    pub code: Option<String>,
    /// HTTP status of the response, if one was received
    pub http_status: Option<u16>,
    /// Raw response body
    pub http_body: Option<String>,
    /// Parsed response body, keys symbolized
    pub json_body: Option<ApiValue>,
}

impl ErrorDetails {
    /// Details carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach the HTTP status and raw body
    pub fn with_response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.http_status = Some(status);
        self.http_body = Some(body.into());
        self
    }

    /// Attach the parsed error object
    pub fn with_json_body(mut self, json_body: ApiValue) -> Self {
        self.json_body = Some(json_body);
        self
    }

    pub fn with_param(mut self, param: Option<String>) -> Self {
        self.param = param;
        self
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "(Status {}) {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Card(_) => ErrorKind::Card,
            Error::Api(_) => ErrorKind::Api,
            Error::ApiConnection(_) => ErrorKind::ApiConnection,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Shared details of the five API error kinds
    pub fn details(&self) -> Option<&ErrorDetails> {
        match self {
            Error::Authentication(details)
            | Error::InvalidRequest(details)
            | Error::Card(details)
            | Error::Api(details)
            | Error::ApiConnection(details) => Some(details),
            Error::Cancelled | Error::Configuration { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.details().map(|d| d.message.as_str())
    }

    pub fn http_status(&self) -> Option<u16> {
        self.details().and_then(|d| d.http_status)
    }

    pub fn http_body(&self) -> Option<&str> {
        self.details().and_then(|d| d.http_body.as_deref())
    }

    pub fn param(&self) -> Option<&str> {
        self.details().and_then(|d| d.param.as_deref())
    }

    pub fn code(&self) -> Option<&str> {
        self.details().and_then(|d| d.code.as_deref())
    }

    pub fn json_body(&self) -> Option<&ApiValue> {
        self.details().and_then(|d| d.json_body.as_ref())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Authentication => write!(f, "AuthenticationError"),
            ErrorKind::InvalidRequest => write!(f, "InvalidRequestError"),
            ErrorKind::Card => write!(f, "CardError"),
            ErrorKind::Api => write!(f, "APIError"),
            ErrorKind::ApiConnection => write!(f, "APIConnectionError"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
            ErrorKind::Configuration => write!(f, "ConfigurationError"),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Configuration {
            message: format!("Invalid URL: {}", err),
            source: Some(err.into()),
        }
    }
}
