//! # Log Sinks
//!
//! Destinations for formatted log records. A [`SinkLogger`](crate::logger::SinkLogger)
//! writes each record to every sink in its chain.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::logger::{LogLevel, LogRecord};

/// A destination for log records. Writing never fails from the caller's
/// point of view; sinks swallow their own I/O errors.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord);
}

/// Writes formatted lines; errors and warnings go to stderr, the rest to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, record: &LogRecord) {
        let line = record.format_line();
        let _ = match record.level {
            LogLevel::Error | LogLevel::Warn => writeln!(io::stderr().lock(), "{}", line),
            LogLevel::Info | LogLevel::Debug => writeln!(io::stdout().lock(), "{}", line),
        };
    }
}

/// Forwards records as `tracing` events under the `app_errors` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, record: &LogRecord) {
        let context = record.context.to_json_string();
        match record.level {
            LogLevel::Debug => tracing::debug!(target: "app_errors", context = %context, "{}", record.message),
            LogLevel::Info => tracing::info!(target: "app_errors", context = %context, "{}", record.message),
            LogLevel::Warn => tracing::warn!(target: "app_errors", context = %context, "{}", record.message),
            LogLevel::Error => tracing::error!(target: "app_errors", context = %context, "{}", record.message),
        }
    }
}

/// Records kept by [`MemorySink::new`] before the oldest are evicted
pub const DEFAULT_MEMORY_LIMIT: usize = 1000;

/// Keeps the most recent records in memory for inspection.
///
/// Once `limit` records are held, each new record evicts the oldest one.
#[derive(Debug)]
pub struct MemorySink {
    records: Mutex<VecDeque<LogRecord>>,
    limit: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_LIMIT)
    }

    /// Sink holding at most `limit` records (at least one)
    pub fn with_capacity(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(limit.min(DEFAULT_MEMORY_LIMIT))),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Snapshot of the retained records, oldest first
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemorySink {
    fn write(&self, record: &LogRecord) {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while records.len() >= self.limit {
            records.pop_front();
        }
        records.push_back(record.clone());
    }
}
