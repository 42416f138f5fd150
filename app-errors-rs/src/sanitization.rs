//! # Error Sanitization
//!
//! User-facing messages and API-safe error envelopes. Nothing produced
//! here for end users carries raw messages, stack traces or internal
//! context; structured details only appear in development mode and are
//! redacted even then.

use std::collections::HashSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::settings::{environment, Environment};
use crate::context::LogContext;
use crate::normalize::{normalize_error, Thrown};
use crate::types::{ErrorCode, ErrorDetails};

/// Sentence used for internal, unknown and unmapped codes
pub const FALLBACK_USER_MESSAGE: &str =
    "Something went wrong. Please try again or contact support if the problem persists.";

// Credential-looking values that must not leave the process even in details
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // API keys, tokens, credentials
        r#"(?i)(api[_-]?key|token|secret|password|credential)s?["']?\s*[=:]\s*["']?([^"'\s]+)"#,
        // OAuth 2.0 bearer tokens
        r"(?i)bearer\s+([a-zA-Z0-9\._\-]+)",
        // JWTs
        r"eyJ[a-zA-Z0-9\-_]+\.eyJ[a-zA-Z0-9\-_]+\.[a-zA-Z0-9\-_]+",
        // Email addresses
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        // Card numbers
        r"\b(?:\d{4}[-\s]?){3}\d{4}\b",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

// Context keys whose values are dropped entirely
static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password", "secret", "token", "credential", "auth", "ssn",
        "credit_card", "card_number", "cvv", "private_key", "api_key",
        "apikey", "access_token", "refresh_token", "session_id", "cookie",
    ]
    .into_iter()
    .collect()
});

const REDACTED: &str = "[REDACTED]";

/// Friendly sentence for an error code
pub fn friendly_message(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::NetworkError => {
            "Unable to connect. Please check your internet connection and try again."
        }
        ErrorCode::TimeoutError => "The request took too long. Please try again.",
        ErrorCode::ValidationError | ErrorCode::InvalidInput => {
            "Please check your input and try again."
        }
        ErrorCode::Unauthorized => "You need to sign in to continue.",
        ErrorCode::Forbidden => "You don't have permission to perform this action.",
        ErrorCode::SessionExpired => "Your session has expired. Please sign in again.",
        ErrorCode::NotFound => "The requested resource was not found.",
        ErrorCode::Conflict => {
            "This action conflicts with the current state. Please refresh and try again."
        }
        ErrorCode::ServiceUnavailable => {
            "The service is temporarily unavailable. Please try again later."
        }
        ErrorCode::InternalError | ErrorCode::UnknownError => FALLBACK_USER_MESSAGE,
    }
}

/// Friendly sentence for a raw code string; unmapped codes get the fallback
pub fn friendly_message_for_code(code: &str) -> &'static str {
    code.parse::<ErrorCode>()
        .map(friendly_message)
        .unwrap_or(FALLBACK_USER_MESSAGE)
}

/// Normalizes the input and returns the safe sentence for its code
pub fn get_user_friendly_message<T: Into<Thrown>>(input: T) -> &'static str {
    friendly_message(normalize_error(input, None).code())
}

/// Body of a [`SafeErrorResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeErrorBody {
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Client-safe error envelope: `{ "error": { message, code, details? } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeErrorResponse {
    pub error: SafeErrorBody,
}

impl SafeErrorResponse {
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Builds a client-safe envelope using the process environment
pub fn create_safe_error_response<T: Into<Thrown>>(input: T, include_details: bool) -> SafeErrorResponse {
    create_safe_error_response_for(environment(), input, include_details)
}

/// Builds a client-safe envelope.
///
/// `details` is attached only when the caller asks for it AND `env` is
/// development; production responses never carry it.
pub fn create_safe_error_response_for<T: Into<Thrown>>(
    env: Environment,
    input: T,
    include_details: bool,
) -> SafeErrorResponse {
    let err = normalize_error(input, None);

    let details = if include_details && env.is_development() {
        let mut details = err.to_details();
        details.context = details.context.map(|ctx| redact_context(&ctx));
        Some(details)
    } else {
        None
    };

    SafeErrorResponse {
        error: SafeErrorBody {
            message: friendly_message(err.code()).to_string(),
            code: err.code(),
            details,
        },
    }
}

/// Determines if a context key is sensitive
fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_KEYS.contains(key_lower.as_str())
        || SENSITIVE_KEYS.iter().any(|sensitive| key_lower.contains(*sensitive))
}

/// Masks credential-looking fragments of a string
fn redact_str(value: &str) -> String {
    let mut sanitized = value.to_string();
    for pattern in SENSITIVE_PATTERNS.iter() {
        sanitized = pattern
            .replace_all(&sanitized, |caps: &regex::Captures| {
                if caps.len() > 2 {
                    // Keep the key name but redact the value
                    format!("{}={}", &caps[1], REDACTED)
                } else {
                    REDACTED.to_string()
                }
            })
            .into_owned();
    }
    sanitized
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if is_sensitive_key(k) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), redact_value(v))
                    }
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Copy of `context` with sensitive keys and credential-like strings masked
pub fn redact_context(context: &LogContext) -> LogContext {
    match redact_value(&Value::Object(context.as_map().clone())) {
        Value::Object(map) => LogContext::from(map),
        _ => LogContext::new(),
    }
}
