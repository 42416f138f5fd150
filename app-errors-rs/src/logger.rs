//! # Logger
//!
//! Leveled emission behind a swappable [`Logger`] trait, a sink-chain
//! default implementation, and the process-wide active logger used at the
//! composition root.

use std::fmt;
use std::sync::{Arc, RwLock};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};

use crate::context::LogContext;
use crate::logging::current_correlation_id;
use crate::normalize::Thrown;
use crate::settings::{environment, Environment};
use crate::sink::{ConsoleSink, LogSink};

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single formatted emission handed to sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
}

impl LogRecord {
    pub fn new<S: Into<String>>(level: LogLevel, message: S, context: LogContext) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            context,
        }
    }

    /// `[<ISO-8601>] [<LEVEL>] <message> <JSON context>`; the context part is
    /// left out when empty.
    pub fn format_line(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        if self.context.is_empty() {
            format!("[{}] [{}] {}", timestamp, self.level, self.message)
        } else {
            format!(
                "[{}] [{}] {} {}",
                timestamp,
                self.level,
                self.message,
                self.context.to_json_string()
            )
        }
    }
}

/// Leveled logging interface. Call sites depend on this, never on a sink.
pub trait Logger: Send + Sync {
    /// Emits only in development mode
    fn debug(&self, message: &str, context: Option<LogContext>);

    fn info(&self, message: &str, context: Option<LogContext>);

    fn warn(&self, message: &str, context: Option<LogContext>);

    /// Emits an error. A supplied error value is merged into the context
    /// under the `error` key.
    fn error(&self, message: &str, error: Option<&Thrown>, context: Option<LogContext>);
}

/// Default logger: fans every record out to a chain of sinks
#[derive(Clone)]
pub struct SinkLogger {
    sinks: Vec<Arc<dyn LogSink>>,
    environment: Option<Environment>,
}

impl SinkLogger {
    /// Logger with the given sinks, following the process environment
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self {
            sinks,
            environment: None,
        }
    }

    /// Logger writing formatted lines to stdout/stderr
    pub fn console() -> Self {
        Self::new(vec![Arc::new(ConsoleSink::default()) as Arc<dyn LogSink>])
    }

    pub fn with_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Pins the environment instead of reading it on every call
    pub fn with_environment(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    fn debug_enabled(&self) -> bool {
        self.environment.unwrap_or_else(environment).is_development()
    }

    fn emit(&self, level: LogLevel, message: &str, context: Option<LogContext>) {
        let mut context = context.unwrap_or_default();
        if let Some(correlation_id) = current_correlation_id() {
            if !context.contains_key("correlationId") {
                context.insert("correlationId", correlation_id);
            }
        }

        let record = LogRecord::new(level, message, context);
        for sink in &self.sinks {
            sink.write(&record);
        }
    }
}

impl Default for SinkLogger {
    fn default() -> Self {
        Self::console()
    }
}

impl fmt::Debug for SinkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkLogger")
            .field("sinks", &self.sinks.len())
            .field("environment", &self.environment)
            .finish()
    }
}

impl Logger for SinkLogger {
    fn debug(&self, message: &str, context: Option<LogContext>) {
        if self.debug_enabled() {
            self.emit(LogLevel::Debug, message, context);
        }
    }

    fn info(&self, message: &str, context: Option<LogContext>) {
        self.emit(LogLevel::Info, message, context);
    }

    fn warn(&self, message: &str, context: Option<LogContext>) {
        self.emit(LogLevel::Warn, message, context);
    }

    fn error(&self, message: &str, error: Option<&Thrown>, context: Option<LogContext>) {
        let context = match error {
            Some(error) => {
                let described = LogContext::new().with("error", error.describe());
                Some(context.unwrap_or_default().merged(described))
            }
            None => context,
        };
        self.emit(LogLevel::Error, message, context);
    }
}

static ACTIVE_LOGGER: Lazy<RwLock<Arc<dyn Logger>>> =
    Lazy::new(|| RwLock::new(Arc::new(SinkLogger::console()) as Arc<dyn Logger>));

/// Replaces the active logger and returns the previous one. Last write wins.
pub fn set_logger(logger: Arc<dyn Logger>) -> Arc<dyn Logger> {
    let mut active = ACTIVE_LOGGER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *active, logger)
}

/// Shared handle to the active logger. Another caller may swap it at any time.
pub fn get_logger() -> Arc<dyn Logger> {
    ACTIVE_LOGGER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Facade resolving the active logger at call time
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLogger;

/// The process-wide logging facade
pub static LOGGER: GlobalLogger = GlobalLogger;

impl Logger for GlobalLogger {
    fn debug(&self, message: &str, context: Option<LogContext>) {
        get_logger().debug(message, context);
    }

    fn info(&self, message: &str, context: Option<LogContext>) {
        get_logger().info(message, context);
    }

    fn warn(&self, message: &str, context: Option<LogContext>) {
        get_logger().warn(message, context);
    }

    fn error(&self, message: &str, error: Option<&Thrown>, context: Option<LogContext>) {
        get_logger().error(message, error, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_context;
    use crate::logging::with_correlation_id;
    use crate::sink::MemorySink;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::io;

    fn memory_logger(env: Environment) -> (SinkLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = SinkLogger::new(vec![sink.clone() as Arc<dyn LogSink>]).with_environment(env);
        (logger, sink)
    }

    #[test]
    fn test_debug_only_in_development() {
        let (logger, sink) = memory_logger(Environment::Production);
        logger.debug("cache warmed", None);
        assert!(sink.is_empty());

        let (logger, sink) = memory_logger(Environment::Development);
        logger.debug("cache warmed", None);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].level, LogLevel::Debug);
    }

    #[test]
    fn test_info_and_warn_always_emit() {
        let (logger, sink) = memory_logger(Environment::Production);
        logger.info("booking created", Some(log_context! { "bookingId" => "bk-1" }));
        logger.warn("vendor slow", None);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].context.get("bookingId"), Some(&Value::from("bk-1")));
        assert_eq!(records[1].level, LogLevel::Warn);
    }

    #[test]
    fn test_error_merges_native_error() {
        let (logger, sink) = memory_logger(Environment::Production);
        let err = Thrown::from(io::Error::new(io::ErrorKind::Other, "socket closed"));

        logger.error("payment failed", Some(&err), Some(log_context! { "k" => "v" }));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        let context = &records[0].context;
        assert_eq!(context.get("k"), Some(&Value::from("v")));

        let error = context.get("error").unwrap();
        assert_eq!(error["message"], "socket closed");
        assert!(error.get("name").is_some());
        assert!(error.get("stack").is_some());
    }

    #[test]
    fn test_error_with_raw_value() {
        let (logger, sink) = memory_logger(Environment::Production);
        let raw = Thrown::Opaque(json!({ "status": 500 }));

        logger.error("upstream said no", Some(&raw), None);
        assert_eq!(sink.records()[0].context.get("error"), Some(&json!({ "status": 500 })));
    }

    #[test]
    fn test_error_without_value_keeps_context() {
        let (logger, sink) = memory_logger(Environment::Production);
        logger.error("plain", None, None);

        let record = &sink.records()[0];
        assert!(record.context.is_empty());
        assert_eq!(record.level, LogLevel::Error);
    }

    #[test]
    fn test_format_line() {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let mut record = LogRecord::new(LogLevel::Warn, "slow vendor", LogContext::new());
        record.timestamp = timestamp;
        assert_eq!(record.format_line(), "[2026-03-14T09:26:53.000Z] [WARN] slow vendor");

        record.context = log_context! { "ms" => 1200 };
        assert_eq!(
            record.format_line(),
            r#"[2026-03-14T09:26:53.000Z] [WARN] slow vendor {"ms":1200}"#
        );
    }

    #[test]
    fn test_correlation_id_attached() {
        let (logger, sink) = memory_logger(Environment::Production);

        with_correlation_id("req-77", || logger.info("inside request", None));
        logger.info("outside request", None);

        let records = sink.records();
        assert_eq!(records[0].context.get("correlationId"), Some(&Value::from("req-77")));
        assert!(records[1].context.get("correlationId").is_none());
    }

    #[test]
    fn test_fan_out_to_all_sinks() {
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        let logger = SinkLogger::new(vec![first.clone() as Arc<dyn LogSink>])
            .with_shared_sink(second.clone())
            .with_environment(Environment::Production);

        logger.info("guest list imported", None);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(logger.sink_count(), 2);
    }
}
