//! # Structured Error Types
//!
//! The single error shape every handling path downstream operates on,
//! plus the fixed error-code enumeration.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::context::LogContext;

/// Message used whenever a failure carries no usable description
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Kinds of failure. New entries may be added; existing ones are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    TimeoutError,
    ValidationError,
    InvalidInput,
    Unauthorized,
    Forbidden,
    SessionExpired,
    NotFound,
    Conflict,
    InternalError,
    ServiceUnavailable,
    UnknownError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 12] = [
        ErrorCode::NetworkError,
        ErrorCode::TimeoutError,
        ErrorCode::ValidationError,
        ErrorCode::InvalidInput,
        ErrorCode::Unauthorized,
        ErrorCode::Forbidden,
        ErrorCode::SessionExpired,
        ErrorCode::NotFound,
        ErrorCode::Conflict,
        ErrorCode::InternalError,
        ErrorCode::ServiceUnavailable,
        ErrorCode::UnknownError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::SessionExpired => "SESSION_EXPIRED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status used when an error carries no explicit status code
    pub fn default_status(self) -> u16 {
        match self {
            ErrorCode::ValidationError | ErrorCode::InvalidInput => 400,
            ErrorCode::Unauthorized | ErrorCode::SessionExpired => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::TimeoutError => 408,
            ErrorCode::Conflict => 409,
            ErrorCode::NetworkError => 502,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::InternalError | ErrorCode::UnknownError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a string that is not one of the fixed codes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

/// The original failure an [`AppError`] was derived from
#[derive(Debug, Clone)]
pub enum Cause {
    /// A native Rust error
    Error(Arc<dyn StdError + Send + Sync>),
    /// A non-error value (string, JSON payload, panic payload)
    Value(Value),
}

impl Cause {
    /// JSON form used in error details
    pub fn to_value(&self) -> Value {
        match self {
            Cause::Error(err) => Value::String(err.to_string()),
            Cause::Value(value) => value.clone(),
        }
    }
}

/// Structured error.
///
/// Built once, either directly by code that knows the failure kind or by
/// [`normalize_error`](crate::normalize::normalize_error). Fields are read
/// through accessors; the builder methods are meant for construction only.
#[derive(Debug, Clone)]
pub struct AppError {
    id: Uuid,
    message: String,
    code: ErrorCode,
    status_code: Option<u16>,
    context: Option<LogContext>,
    is_operational: bool,
    cause: Option<Cause>,
    timestamp: DateTime<Utc>,
}

impl AppError {
    /// Creates an operational error with the given code and message
    pub fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message
        };

        Self {
            id: Uuid::new_v4(),
            message,
            code,
            status_code: None,
            context: None,
            is_operational: true,
            cause: None,
            timestamp: Utc::now(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Sets an explicit HTTP-style status code
    pub fn status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Replaces the context
    pub fn context(mut self, context: LogContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Adds a single context entry
    pub fn context_value<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        self.context
            .get_or_insert_with(LogContext::new)
            .insert(key, value);
        self
    }

    pub fn operational(mut self, is_operational: bool) -> Self {
        self.is_operational = is_operational;
        self
    }

    /// Chains this error with the native error that caused it
    pub fn cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Cause::Error(Arc::new(cause)));
        self
    }

    pub fn with_cause(mut self, cause: Option<Cause>) -> Self {
        self.cause = cause;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn explicit_status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Explicit status code, or the default for the error code
    pub fn http_status(&self) -> u16 {
        self.status_code.unwrap_or_else(|| self.code.default_status())
    }

    pub fn log_context(&self) -> Option<&LogContext> {
        self.context.as_ref()
    }

    pub fn is_operational(&self) -> bool {
        self.is_operational
    }

    pub fn original_cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Full structured form, as exposed in development error responses
    pub fn to_details(&self) -> ErrorDetails {
        ErrorDetails {
            name: "AppError".to_string(),
            message: self.message.clone(),
            code: self.code,
            status_code: self.status_code,
            context: self.context.clone(),
            is_operational: self.is_operational,
            cause: self.cause.as_ref().map(Cause::to_value),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;

        if let Some(status) = self.status_code {
            write!(f, " (Status: {})", status)?;
        }

        Ok(())
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(Cause::Error(err)) => Some(err.as_ref() as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

/// JSON form of an [`AppError`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub name: String,
    pub message: String,
    pub code: ErrorCode,
    pub status_code: Option<u16>,
    pub context: Option<LogContext>,
    pub is_operational: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Value>,
}

/// Failures while wiring up the logging/error stack itself
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid environment name: {0}")]
    InvalidEnvironment(String),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),
}
