//! # Global Error Handlers
//!
//! Routes failures that escape every call-site boundary into the
//! normalizer and logger:
//!
//! - panics, through a process-wide panic hook
//! - failed background tasks, through [`spawn_reported`]
//! - ERROR events emitted by other libraries, through [`EscapedErrorLayer`]
//!
//! Nothing in here may panic while reporting; a panic inside the panic hook
//! aborts the process.

use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use futures::FutureExt;
use once_cell::sync::Lazy;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::context::LogContext;
use crate::handling::handle_error;
use crate::normalize::Thrown;
use crate::settings::environment;

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

static INSTALLED: AtomicBool = AtomicBool::new(false);

// Address of the hook we installed, zero when none
static OUR_HOOK: AtomicUsize = AtomicUsize::new(0);

// Bumped on every install; a hook only reports for its own generation
static GENERATION: AtomicUsize = AtomicUsize::new(0);

// Hook that was active before ours, restored on cleanup
static PREVIOUS_HOOK: Lazy<Mutex<Option<Arc<PanicHook>>>> = Lazy::new(|| Mutex::new(None));

thread_local! {
    // Set while a handler is reporting, so reporting cannot feed back into itself
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Whether [`setup_global_error_handlers`] is currently in effect
pub fn handlers_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}

/// Installs the panic hook and enables library error capture.
///
/// Calling it again while installed does nothing.
pub fn setup_global_error_handlers() {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }

    let previous: Arc<PanicHook> = Arc::from(panic::take_hook());
    *PREVIOUS_HOOK.lock().unwrap_or_else(|p| p.into_inner()) = Some(previous.clone());

    let generation = GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
    let hook: Box<PanicHook> = Box::new(move |info| {
        if handlers_installed() && GENERATION.load(Ordering::SeqCst) == generation {
            report_panic(info);
            // Already logged; development keeps the console quiet
            if environment().is_development() {
                return;
            }
        }
        previous(info);
    });
    OUR_HOOK.store(hook_address(&hook), Ordering::SeqCst);
    panic::set_hook(hook);

    tracing::debug!("Global error handlers installed");
}

/// Turns panic reporting and library error capture off.
///
/// When our hook is still the active one, the hook that was active before
/// installation is restored. If another hook was installed on top of ours,
/// it is left in place and ours only forwards to its predecessor from then on.
pub fn cleanup_global_error_handlers() {
    if !INSTALLED.swap(false, Ordering::SeqCst) {
        return;
    }

    let previous = PREVIOUS_HOOK.lock().unwrap_or_else(|p| p.into_inner()).take();
    let ours = OUR_HOOK.swap(0, Ordering::SeqCst);
    let current = panic::take_hook();
    match previous {
        Some(previous) if hook_address(&current) == ours => {
            panic::set_hook(Box::new(move |info| previous(info)));
        }
        _ => panic::set_hook(current),
    }

    tracing::debug!("Global error handlers removed");
}

fn hook_address(hook: &PanicHook) -> usize {
    hook as *const PanicHook as *const () as usize
}

/// Runs `report` unless this thread is already reporting.
///
/// A panic inside `report` is caught on the `spawn_reported` and tracing
/// layer paths. Inside the panic hook it cannot be: a second panic there
/// aborts the process.
fn guarded<F: FnOnce()>(report: F) {
    if REPORTING.with(|flag| flag.replace(true)) {
        return;
    }
    let _ = panic::catch_unwind(AssertUnwindSafe(report));
    REPORTING.with(|flag| flag.set(false));
}

fn report_panic(info: &PanicHookInfo<'_>) {
    guarded(|| {
        let mut context = LogContext::new().with("source", "panic");
        if let Some(name) = std::thread::current().name() {
            context.insert("thread", name);
        }
        if let Some(location) = info.location() {
            context.insert("filename", location.file());
            context.insert("lineno", location.line());
            context.insert("colno", location.column());
        }

        handle_error(Thrown::from_panic_payload(info.payload()), Some(context));
    });
}

/// Spawns a task whose failure is reported instead of silently dropped.
///
/// An `Err` result is reported with `source: "unhandledrejection"`. A panic
/// is reported with `source: "task_panic"` unless the panic hook is
/// installed and has already reported it. The task resolves to `None` on
/// any failure.
pub fn spawn_reported<F, T, E>(future: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<Thrown> + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                let thrown = err.into();
                guarded(|| {
                    handle_error(thrown, Some(LogContext::new().with("source", "unhandledrejection")));
                });
                None
            }
            Err(payload) => {
                if !handlers_installed() {
                    let thrown = Thrown::from_panic_payload(payload.as_ref());
                    guarded(|| {
                        handle_error(thrown, Some(LogContext::new().with("source", "task_panic")));
                    });
                }
                None
            }
        }
    })
}

/// Tracing layer forwarding ERROR events from other crates into
/// [`handle_error`] while the global handlers are installed.
///
/// This is a best-effort net for libraries that log failures instead of
/// returning them. Events from this crate's own target are ignored.
#[derive(Debug, Clone, Default)]
pub struct EscapedErrorLayer;

const OWN_TARGET: &str = "app_errors";

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S: Subscriber> Layer<S> for EscapedErrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() != Level::ERROR
            || !handlers_installed()
            || is_own_target(metadata.target())
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let mut context = LogContext::new()
            .with("source", "tracing")
            .with("target", metadata.target());
        if let Some(file) = metadata.file() {
            context.insert("filename", file);
        }
        if let Some(line) = metadata.line() {
            context.insert("lineno", line);
        }
        if !visitor.fields.is_empty() {
            context.insert("fields", visitor.fields);
        }

        let message = visitor.message.unwrap_or_default();
        guarded(|| {
            handle_error(Thrown::Message(message), Some(context));
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), value.into());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let mut rendered = String::new();
        let _ = write!(rendered, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(rendered);
        } else {
            self.fields.insert(field.name().to_string(), rendered.into());
        }
    }
}
