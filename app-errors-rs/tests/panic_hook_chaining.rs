use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use app_errors::{
    cleanup_global_error_handlers, handlers_installed, set_environment, set_logger,
    setup_global_error_handlers, Environment, LogSink, MemorySink, SinkLogger,
};

fn panic_on_thread(message: &'static str) {
    let joined = std::thread::spawn(move || panic!("{}", message)).join();
    assert!(joined.is_err());
}

fn counting_hook(count: &Arc<AtomicUsize>) -> Box<dyn Fn(&panic::PanicHookInfo<'_>) + Send + Sync> {
    let count = count.clone();
    Box::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    })
}

// Single test: it stacks hooks on the process-wide panic hook.
#[test]
fn test_panic_hook_chaining() {
    let sink = Arc::new(MemorySink::new());
    set_logger(Arc::new(SinkLogger::new(vec![sink.clone() as Arc<dyn LogSink>])));

    let earlier = Arc::new(AtomicUsize::new(0));
    panic::set_hook(counting_hook(&earlier));

    // production: logged, then the earlier hook still runs
    set_environment(Environment::Production);
    setup_global_error_handlers();
    panic_on_thread("checkout crashed");
    assert_eq!(earlier.load(Ordering::SeqCst), 1);
    assert_eq!(sink.len(), 1);

    // development: logged only
    set_environment(Environment::Development);
    panic_on_thread("seating chart crashed");
    assert_eq!(earlier.load(Ordering::SeqCst), 1);
    assert_eq!(sink.len(), 2);

    // cleanup puts the earlier hook back
    cleanup_global_error_handlers();
    panic_on_thread("after cleanup");
    assert_eq!(earlier.load(Ordering::SeqCst), 2);
    assert_eq!(sink.len(), 2);

    // a hook installed on top of ours survives cleanup
    set_environment(Environment::Production);
    setup_global_error_handlers();
    let ours = panic::take_hook();
    let later = Arc::new(AtomicUsize::new(0));
    let later_count = later.clone();
    panic::set_hook(Box::new(move |info| {
        later_count.fetch_add(1, Ordering::SeqCst);
        ours(info);
    }));

    panic_on_thread("reinstalled");
    assert_eq!(later.load(Ordering::SeqCst), 1);
    assert_eq!(earlier.load(Ordering::SeqCst), 3);
    assert_eq!(sink.len(), 3);

    cleanup_global_error_handlers();
    assert!(!handlers_installed());
    panic_on_thread("outer hook kept");
    assert_eq!(later.load(Ordering::SeqCst), 2);
    // ours now only forwards
    assert_eq!(earlier.load(Ordering::SeqCst), 4);
    assert_eq!(sink.len(), 3);

    // installing again does not revive the stale hook under the outer one
    setup_global_error_handlers();
    panic_on_thread("fresh install");
    assert_eq!(sink.len(), 4);
    cleanup_global_error_handlers();

    let _ = panic::take_hook();
}
