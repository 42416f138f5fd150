//! # Error Normalization
//!
//! Classifies any thrown value into a [`Thrown`] variant up front, then
//! converts it into the single [`AppError`] shape.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::sync::Arc;
use serde_json::{json, Value};

use crate::context::LogContext;
use crate::types::{AppError, Cause, ErrorCode, GENERIC_ERROR_MESSAGE};

/// A native error together with the metadata captured when it was thrown
#[derive(Debug, Clone)]
pub struct NativeError {
    name: String,
    error: Arc<dyn StdError + Send + Sync>,
    stack: Option<String>,
}

impl NativeError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            name: std::any::type_name::<E>().to_string(),
            error: Arc::new(error),
            stack: capture_stack(&Backtrace::capture()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// `{name, message, stack}` snapshot
    pub fn snapshot(&self) -> Value {
        json!({
            "name": self.name,
            "message": self.message(),
            "stack": self.stack,
        })
    }
}

fn capture_stack(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Anything that can be thrown at the error pipeline
#[derive(Debug, Clone)]
pub enum Thrown {
    /// Already normalized
    Structured(AppError),
    /// A native Rust error
    Native(NativeError),
    /// A bare message
    Message(String),
    /// Any other value
    Opaque(Value),
}

impl Thrown {
    pub fn native<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Thrown::Native(NativeError::new(error))
    }

    /// Classifies a panic payload
    pub fn from_panic_payload(payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            Thrown::Message((*message).to_string())
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Thrown::Message(message.clone())
        } else if let Some(err) = payload.downcast_ref::<AppError>() {
            Thrown::Structured(err.clone())
        } else {
            Thrown::Opaque(Value::Null)
        }
    }

    /// How the value appears under the `error` key of a log record.
    ///
    /// Proper errors are reduced to `{name, message, stack}`; anything else
    /// is included as-is.
    pub fn describe(&self) -> Value {
        match self {
            Thrown::Structured(err) => json!({
                "name": "AppError",
                "message": err.message(),
                "stack": Value::Null,
            }),
            Thrown::Native(native) => native.snapshot(),
            Thrown::Message(message) => Value::String(message.clone()),
            Thrown::Opaque(value) => value.clone(),
        }
    }
}

impl From<AppError> for Thrown {
    fn from(err: AppError) -> Self {
        Thrown::Structured(err)
    }
}

impl From<NativeError> for Thrown {
    fn from(err: NativeError) -> Self {
        Thrown::Native(err)
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Thrown::Message(message)
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Thrown::Message(message.to_string())
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        match value {
            Value::String(message) => Thrown::Message(message),
            other => Thrown::Opaque(other),
        }
    }
}

impl From<std::io::Error> for Thrown {
    fn from(err: std::io::Error) -> Self {
        Thrown::native(err)
    }
}

impl From<serde_json::Error> for Thrown {
    fn from(err: serde_json::Error) -> Self {
        Thrown::native(err)
    }
}

impl From<Box<dyn StdError + Send + Sync>> for Thrown {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        let stack = capture_stack(&Backtrace::capture());
        Thrown::Native(NativeError {
            name: "Box<dyn Error>".to_string(),
            error: Arc::from(err),
            stack,
        })
    }
}

impl From<anyhow::Error> for Thrown {
    fn from(err: anyhow::Error) -> Self {
        let stack = capture_stack(err.backtrace());
        let boxed: Box<dyn StdError + Send + Sync> = err.into();
        Thrown::Native(NativeError {
            name: "anyhow::Error".to_string(),
            error: Arc::from(boxed),
            stack,
        })
    }
}

fn non_empty_or_generic(message: &str) -> String {
    if message.trim().is_empty() {
        GENERIC_ERROR_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

/// Converts any thrown value into an [`AppError`].
///
/// Structured input is returned unchanged and the supplied context is
/// ignored for it. Every other input becomes a non-operational
/// `UNKNOWN_ERROR`.
pub fn normalize_error<T: Into<Thrown>>(input: T, context: Option<LogContext>) -> AppError {
    match input.into() {
        Thrown::Structured(err) => err,
        Thrown::Native(native) => {
            let original = LogContext::new().with("originalError", native.snapshot());
            let context = LogContext::merge_opt(context, Some(original)).unwrap_or_default();

            AppError::new(ErrorCode::UnknownError, non_empty_or_generic(&native.message()))
                .operational(false)
                .context(context)
                .with_cause(Some(Cause::Error(native.error)))
        }
        Thrown::Message(message) => {
            let err = AppError::new(ErrorCode::UnknownError, non_empty_or_generic(&message))
                .operational(false);
            match context {
                Some(context) => err.context(context),
                None => err,
            }
        }
        Thrown::Opaque(value) => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(non_empty_or_generic)
                .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
            let original = LogContext::new().with("originalError", value.clone());
            let context = LogContext::merge_opt(context, Some(original)).unwrap_or_default();

            AppError::new(ErrorCode::UnknownError, message)
                .operational(false)
                .context(context)
                .with_cause(Some(Cause::Value(value)))
        }
    }
}

/// True only for a structured error flagged operational.
///
/// Raw errors are never operational here; normalize first to reflect
/// derived state.
pub fn is_operational_error(input: &Thrown) -> bool {
    matches!(input, Thrown::Structured(err) if err.is_operational())
}

/// Adapts `Result`s into the structured error shape
pub trait ResultExt<T> {
    /// Maps the error to an operational [`AppError`] with the given code.
    /// Already-structured errors pass through unchanged.
    fn with_code(self, code: ErrorCode) -> Result<T, AppError>;

    /// Normalizes the error with a lazily built context
    fn with_log_context<F>(self, context_fn: F) -> Result<T, AppError>
    where
        F: FnOnce() -> LogContext;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<Thrown>,
{
    fn with_code(self, code: ErrorCode) -> Result<T, AppError> {
        self.map_err(|error| match error.into() {
            Thrown::Structured(err) => err,
            other => {
                let normalized = normalize_error(other, None);
                let mut err = AppError::new(code, normalized.message())
                    .with_cause(normalized.original_cause().cloned());
                if let Some(context) = normalized.log_context() {
                    err = err.context(context.clone());
                }
                err
            }
        })
    }

    fn with_log_context<F>(self, context_fn: F) -> Result<T, AppError>
    where
        F: FnOnce() -> LogContext,
    {
        self.map_err(|error| normalize_error(error, Some(context_fn())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_context;
    use std::io;

    fn assert_valid(err: &AppError) {
        assert!(!err.message().trim().is_empty());
        assert!(ErrorCode::ALL.contains(&err.code()));
    }

    #[test]
    fn test_normalize_string() {
        let err = normalize_error("oops", None);
        assert_eq!(err.message(), "oops");
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert!(!err.is_operational());
    }

    #[test]
    fn test_normalize_native_error() {
        let err = normalize_error(io::Error::new(io::ErrorKind::Other, "boom"), None);

        assert_eq!(err.message(), "boom");
        assert_eq!(err.code(), ErrorCode::UnknownError);
        assert!(!err.is_operational());

        match err.original_cause() {
            Some(Cause::Error(cause)) => assert_eq!(cause.to_string(), "boom"),
            other => panic!("expected native cause, got {:?}", other),
        }

        let original = err.log_context().and_then(|c| c.get("originalError")).unwrap();
        assert_eq!(original["message"], "boom");
        assert!(original["name"].as_str().unwrap().contains("io::error::Error"));
        assert!(original.get("stack").is_some());
    }

    #[test]
    fn test_native_context_merged() {
        let ctx = log_context! { "bookingId" => "bk-7" };
        let err = normalize_error(io::Error::new(io::ErrorKind::Other, "disk full"), Some(ctx));
        let context = err.log_context().unwrap();

        assert_eq!(context.get("bookingId"), Some(&Value::from("bk-7")));
        assert!(context.contains_key("originalError"));
    }

    #[test]
    fn test_normalize_object_with_message() {
        let err = normalize_error(json!({ "message": "card declined", "status": 402 }), None);

        assert_eq!(err.message(), "card declined");
        assert!(!err.is_operational());
        let original = err.log_context().and_then(|c| c.get("originalError")).unwrap();
        assert_eq!(original["status"], 402);
    }

    #[test]
    fn test_normalize_garbage_never_panics() {
        let inputs: Vec<Thrown> = vec![
            Thrown::Opaque(Value::Null),
            Thrown::Opaque(json!(42)),
            Thrown::Opaque(json!([1, 2, 3])),
            Thrown::Opaque(json!({ "message": 5 })),
            Thrown::Opaque(json!({ "message": "" })),
            Thrown::Message(String::new()),
            Thrown::from(io::Error::new(io::ErrorKind::Other, "")),
        ];

        for input in inputs {
            let err = normalize_error(input, None);
            assert_valid(&err);
        }

        assert_eq!(normalize_error(Value::Null, None).message(), GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn test_json_string_is_message() {
        let err = normalize_error(json!("plain text"), None);
        assert_eq!(err.message(), "plain text");
        // messages carry no originalError
        assert!(err.log_context().is_none());
    }

    #[test]
    fn test_structured_passthrough() {
        let original = AppError::validation("Bad email").context_value("field", "email");
        let id = original.id();

        let normalized = normalize_error(original, Some(log_context! { "ignored" => true }));
        assert_eq!(normalized.id(), id);
        assert_eq!(normalized.code(), ErrorCode::ValidationError);
        assert!(!normalized.log_context().unwrap().contains_key("ignored"));

        let again = normalize_error(normalized.clone(), None);
        assert_eq!(again.id(), normalized.id());
        assert_eq!(again.message(), normalized.message());
        assert_eq!(again.code(), normalized.code());
    }

    #[test]
    fn test_is_operational_error() {
        let operational = AppError::new(ErrorCode::ValidationError, "Invalid guest list").operational(true);
        assert!(is_operational_error(&Thrown::from(operational)));

        let bug = AppError::new(ErrorCode::InternalError, "invariant broken").operational(false);
        assert!(!is_operational_error(&Thrown::from(bug)));

        let raw = io::Error::new(io::ErrorKind::Other, "all good, nothing to see");
        assert!(!is_operational_error(&Thrown::from(raw)));
        assert!(!is_operational_error(&Thrown::from("fine")));
    }

    #[test]
    fn test_panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static panic");
        assert!(matches!(Thrown::from_panic_payload(payload.as_ref()), Thrown::Message(m) if m == "static panic"));

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned panic"));
        assert!(matches!(Thrown::from_panic_payload(payload.as_ref()), Thrown::Message(m) if m == "owned panic"));

        let payload: Box<dyn Any + Send> = Box::new(17u32);
        assert!(matches!(Thrown::from_panic_payload(payload.as_ref()), Thrown::Opaque(Value::Null)));
    }

    #[test]
    fn test_anyhow_input() {
        let err = normalize_error(anyhow::anyhow!("vendor sync failed"), None);
        assert_eq!(err.message(), "vendor sync failed");
        let original = err.log_context().and_then(|c| c.get("originalError")).unwrap();
        assert_eq!(original["name"], "anyhow::Error");
    }

    #[test]
    fn test_describe() {
        let native = Thrown::from(io::Error::new(io::ErrorKind::Other, "boom")).describe();
        assert_eq!(native["message"], "boom");
        assert!(native.get("name").is_some());

        assert_eq!(Thrown::from("raw").describe(), Value::from("raw"));
        assert_eq!(Thrown::Opaque(json!({ "a": 1 })).describe(), json!({ "a": 1 }));
    }

    #[test]
    fn test_result_with_code() {
        let res: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::NotFound, "no such venue"));
        let err = res.with_code(ErrorCode::NotFound).unwrap_err();

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.message(), "no such venue");
        assert!(err.is_operational());
        assert!(err.original_cause().is_some());

        let res: Result<(), AppError> = Err(AppError::new(ErrorCode::Conflict, "double booking"));
        let err = res.with_code(ErrorCode::NotFound).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_result_with_log_context() {
        let res: Result<(), String> = Err("timeout talking to caterer".to_string());
        let err = res
            .with_log_context(|| log_context! { "operation" => "sync_caterers" })
            .unwrap_err();

        assert_eq!(err.message(), "timeout talking to caterer");
        assert_eq!(
            err.log_context().and_then(|c| c.get("operation")),
            Some(&Value::from("sync_caterers"))
        );
    }
}
