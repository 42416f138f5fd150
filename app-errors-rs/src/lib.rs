//! # Logging and Error Normalization
//!
//! The logging and error-handling core shared by the event marketplace
//! services and front-end adapters.
//!
//! ## Features
//!
//! - Swappable leveled [`Logger`] with a sink-chain default implementation
//! - A single structured error type, [`AppError`], with a fixed code set
//! - Normalization of any thrown value into [`AppError`]
//! - User-friendly messages and client-safe error envelopes
//! - Global handlers for panics, failed background tasks and library errors
//! - Origin-tagged logger and error scopes for call sites
//!
//! Library code should take a `&dyn Logger` (or an `Arc<dyn Logger>`); the
//! global accessors are meant for the composition root.

pub mod context;
pub mod global_handlers;
pub mod handling;
pub mod logger;
pub mod logging;
pub mod monitoring;
pub mod normalize;
pub mod sanitization;
pub mod scope;
pub mod settings;
pub mod sink;
pub mod types;

use std::sync::Arc;

// Re-export commonly used types
pub use context::LogContext;
pub use global_handlers::{
    cleanup_global_error_handlers, handlers_installed, setup_global_error_handlers, spawn_reported,
    EscapedErrorLayer,
};
pub use handling::{handle_error, handle_error_with};
pub use logger::{get_logger, set_logger, GlobalLogger, LogLevel, LogRecord, Logger, SinkLogger, LOGGER};
pub use logging::{current_correlation_id, init_logging, set_correlation_id, with_correlation_id};
pub use normalize::{is_operational_error, normalize_error, ResultExt, Thrown};
pub use sanitization::{
    create_safe_error_response, create_safe_error_response_for, friendly_message,
    friendly_message_for_code, get_user_friendly_message, SafeErrorResponse,
};
pub use scope::{ErrorScope, HandleOptions, Notifier, ScopedLogger};
pub use settings::{environment, set_environment, Environment, LoggingConfig, Settings};
pub use sink::{ConsoleSink, LogSink, MemorySink, TracingSink};
pub use types::{AppError, ErrorCode, ErrorDetails, SetupError};

/// Loads settings from the environment and wires up the logging stack
pub fn init() -> Result<Settings, SetupError> {
    let settings = Settings::load()?;
    init_with_settings(settings)
}

/// Wires up the logging stack from explicit settings: environment flag,
/// tracing subscriber, and a console logger as the active logger.
pub fn init_with_settings(settings: Settings) -> Result<Settings, SetupError> {
    set_environment(settings.environment);
    init_logging(&settings.logging)?;
    set_logger(Arc::new(SinkLogger::console()));

    tracing::info!(environment = %settings.environment, "Error handling initialized");
    Ok(settings)
}
