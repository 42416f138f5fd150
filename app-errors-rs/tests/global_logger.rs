use std::sync::{Arc, Mutex};

use app_errors::{
    get_logger, handle_error, log_context, set_logger, AppError, ErrorCode, GlobalLogger, LogContext,
    Logger, Thrown, LOGGER,
};

#[derive(Debug, Clone, PartialEq)]
struct Call {
    level: &'static str,
    message: String,
    error: Option<serde_json::Value>,
    context: Option<LogContext>,
}

#[derive(Default)]
struct RecordingLogger {
    calls: Mutex<Vec<Call>>,
}

impl RecordingLogger {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, level: &'static str, message: &str, error: Option<&Thrown>, context: Option<LogContext>) {
        self.calls.lock().unwrap().push(Call {
            level,
            message: message.to_string(),
            error: error.map(Thrown::describe),
            context,
        });
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, context: Option<LogContext>) {
        self.push("debug", message, None, context);
    }

    fn info(&self, message: &str, context: Option<LogContext>) {
        self.push("info", message, None, context);
    }

    fn warn(&self, message: &str, context: Option<LogContext>) {
        self.push("warn", message, None, context);
    }

    fn error(&self, message: &str, error: Option<&Thrown>, context: Option<LogContext>) {
        self.push("error", message, error, context);
    }
}

// Single test: it swaps the process-wide logger.
#[test]
fn test_swapping_the_global_logger() {
    // facade obtained before the swap must still reach the new logger
    let facade = GlobalLogger;

    let mock = Arc::new(RecordingLogger::default());
    let previous = set_logger(mock.clone());

    LOGGER.info("x", Some(log_context! { "a" => 1 }));
    assert_eq!(
        mock.calls(),
        vec![Call {
            level: "info",
            message: "x".to_string(),
            error: None,
            context: Some(log_context! { "a" => 1 }),
        }]
    );

    facade.warn("late bound", None);
    assert_eq!(mock.calls().len(), 2);
    assert_eq!(mock.calls()[1].level, "warn");

    get_logger().debug("via handle", None);
    assert_eq!(mock.calls()[2].level, "debug");

    let handled = handle_error(AppError::new(ErrorCode::Conflict, "slot taken"), None);
    assert_eq!(handled.code(), ErrorCode::Conflict);

    let calls = mock.calls();
    let last = calls.last().unwrap();
    assert_eq!(last.level, "error");
    assert_eq!(last.message, "Error handled: slot taken");
    assert_eq!(last.error.as_ref().unwrap()["message"], "slot taken");
    let context = last.context.as_ref().unwrap();
    assert_eq!(context.get("errorCode").unwrap(), "CONFLICT");
    assert_eq!(context.get("isOperational").unwrap(), true);

    // last write wins; restoring puts the original back
    let second = Arc::new(RecordingLogger::default());
    set_logger(second.clone());
    LOGGER.info("to second", None);
    assert_eq!(second.calls().len(), 1);
    assert_eq!(mock.calls().len(), 4);

    set_logger(previous);
    LOGGER.info("to original", None);
    assert_eq!(second.calls().len(), 1);
    assert_eq!(mock.calls().len(), 4);
}
