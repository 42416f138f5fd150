//! # Scoped Logging and Error Handling
//!
//! Thin decorators that tag every log record and handled error with a
//! stable origin label (typically the component or module name).

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::LogContext;
use crate::handling::handle_error_with;
use crate::logger::{GlobalLogger, Logger};
use crate::normalize::Thrown;
use crate::sanitization::friendly_message;
use crate::types::AppError;

/// Context key carrying the origin label
pub const ORIGIN_KEY: &str = "component";

fn origin_context(origin: Option<&str>, context: Option<LogContext>) -> Option<LogContext> {
    match origin {
        Some(origin) => {
            let tag = LogContext::new().with(ORIGIN_KEY, origin);
            Some(context.unwrap_or_default().merged(tag))
        }
        None => context,
    }
}

/// Logger that adds `{component: <origin>}` to every call
#[derive(Clone)]
pub struct ScopedLogger {
    origin: Option<String>,
    logger: Arc<dyn Logger>,
}

impl ScopedLogger {
    /// Scoped view of the global logger, resolved at call time
    pub fn new(origin: Option<&str>) -> Self {
        Self::with_logger(origin, Arc::new(GlobalLogger))
    }

    pub fn with_logger(origin: Option<&str>, logger: Arc<dyn Logger>) -> Self {
        Self {
            origin: origin.map(str::to_string),
            logger,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    fn tagged(&self, context: Option<LogContext>) -> Option<LogContext> {
        origin_context(self.origin.as_deref(), context)
    }

    /// Handles an error with the origin label merged into its context
    pub fn handle_error<T: Into<Thrown>>(&self, input: T, context: Option<LogContext>) -> AppError {
        handle_error_with(self.logger.as_ref(), input, self.tagged(context))
    }
}

impl fmt::Debug for ScopedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedLogger").field("origin", &self.origin).finish()
    }
}

impl Logger for ScopedLogger {
    fn debug(&self, message: &str, context: Option<LogContext>) {
        self.logger.debug(message, self.tagged(context));
    }

    fn info(&self, message: &str, context: Option<LogContext>) {
        self.logger.info(message, self.tagged(context));
    }

    fn warn(&self, message: &str, context: Option<LogContext>) {
        self.logger.warn(message, self.tagged(context));
    }

    fn error(&self, message: &str, error: Option<&Thrown>, context: Option<LogContext>) {
        self.logger.error(message, error, self.tagged(context));
    }
}

/// Surface for transient user notifications (toasts, banners)
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Callback receiving the normalized error
pub type ErrorCallback = Arc<dyn Fn(&AppError) + Send + Sync>;

/// Presentation options for [`ErrorScope::handle`]
#[derive(Clone)]
pub struct HandleOptions {
    /// Show a notification to the user
    pub show_notification: bool,
    /// Replaces the friendly message in the notification
    pub notification_message: Option<String>,
    /// Called with the normalized error after logging
    pub on_error: Option<ErrorCallback>,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            show_notification: true,
            notification_message: None,
            on_error: None,
        }
    }
}

impl HandleOptions {
    pub fn silent() -> Self {
        Self {
            show_notification: false,
            ..Self::default()
        }
    }

    pub fn notification_message<S: Into<String>>(mut self, message: S) -> Self {
        self.notification_message = Some(message.into());
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&AppError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleOptions")
            .field("show_notification", &self.show_notification)
            .field("notification_message", &self.notification_message)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Error handler for one origin, with optional user notification
#[derive(Clone)]
pub struct ErrorScope {
    logger: ScopedLogger,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ErrorScope {
    pub fn new(origin: Option<&str>) -> Self {
        Self {
            logger: ScopedLogger::new(origin),
            notifier: None,
        }
    }

    pub fn with_logger(origin: Option<&str>, logger: Arc<dyn Logger>) -> Self {
        Self {
            logger: ScopedLogger::with_logger(origin, logger),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    /// Logs the error, notifies the user if asked, then runs the callback
    pub fn handle<T: Into<Thrown>>(&self, input: T, options: &HandleOptions) -> AppError {
        let err = self.logger.handle_error(input, None);

        if options.show_notification {
            if let Some(notifier) = &self.notifier {
                let message = options
                    .notification_message
                    .as_deref()
                    .unwrap_or_else(|| friendly_message(err.code()));
                notifier.notify(message);
            }
        }

        if let Some(callback) = &options.on_error {
            callback(&err);
        }

        err
    }

    /// Awaits `operation`; on failure the error is handled and `None`
    /// returned instead of propagating.
    pub async fn guard<F, T, E>(&self, operation: F, options: &HandleOptions) -> Option<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<Thrown>,
    {
        match operation.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.handle(err, options);
                None
            }
        }
    }
}

impl fmt::Debug for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorScope")
            .field("origin", &self.logger.origin())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}
