//! # Error Handling
//!
//! Normalize, log, count, and hand the structured error back so the
//! boundary can decide what to show.

use crate::context::LogContext;
use crate::logger::{Logger, LOGGER};
use crate::monitoring::record_handled_error;
use crate::normalize::{normalize_error, Thrown};
use crate::types::AppError;

/// Prefix of the message logged for every handled error
pub const HANDLED_PREFIX: &str = "Error handled: ";

/// Normalizes `input` and logs it through the active global logger
pub fn handle_error<T: Into<Thrown>>(input: T, context: Option<LogContext>) -> AppError {
    handle_error_with(&LOGGER, input, context)
}

/// Normalizes `input` and logs it at error level through `logger`.
///
/// The logged context is the error's own context, then the caller's
/// context, then `errorCode` and `isOperational`; later entries win.
pub fn handle_error_with<T: Into<Thrown>>(
    logger: &dyn Logger,
    input: T,
    context: Option<LogContext>,
) -> AppError {
    let err = normalize_error(input, context.clone());

    let derived = LogContext::new()
        .with("errorCode", err.code())
        .with("isOperational", err.is_operational());
    let log_context = err
        .log_context()
        .cloned()
        .unwrap_or_default()
        .merged(context.unwrap_or_default())
        .merged(derived);

    let thrown = Thrown::Structured(err.clone());
    logger.error(
        &format!("{}{}", HANDLED_PREFIX, err.message()),
        Some(&thrown),
        Some(log_context),
    );
    record_handled_error(&err);

    err
}
