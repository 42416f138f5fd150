//! # Log Context
//!
//! Open-ended key/value context attached to log records and structured
//! errors for correlation.

use std::fmt;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

/// Structured context carried by log records and errors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogContext(Map<String, Value>);

impl LogContext {
    /// Creates an empty context
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Adds a key-value pair and returns the context
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Serialize,
    {
        self.insert(key, value);
        self
    }

    /// Inserts a key-value pair.
    ///
    /// Values that cannot be represented as JSON are stored as a placeholder
    /// string rather than failing.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Serialize,
    {
        let value = serde_json::to_value(&value).unwrap_or_else(|e| {
            Value::String(format!("[unserializable {}: {}]", std::any::type_name::<V>(), e))
        });
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merges two contexts. Keys present in `overrides` win over `base`.
    pub fn merge(base: &LogContext, overrides: &LogContext) -> LogContext {
        let mut merged = base.clone();
        for (key, value) in overrides.iter() {
            merged.0.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Consuming form of [`LogContext::merge`]; `overrides` wins.
    pub fn merged(mut self, overrides: LogContext) -> LogContext {
        self.0.extend(overrides.0);
        self
    }

    /// Merges two optional contexts, returning `None` only when both are absent
    pub fn merge_opt(base: Option<LogContext>, overrides: Option<LogContext>) -> Option<LogContext> {
        match (base, overrides) {
            (Some(base), Some(overrides)) => Some(base.merged(overrides)),
            (Some(ctx), None) | (None, Some(ctx)) => Some(ctx),
            (None, None) => None,
        }
    }

    /// JSON string form of the context. Never fails.
    pub fn to_json_string(&self) -> String {
        match serde_json::to_string(&self.0) {
            Ok(json) => json,
            Err(_) => {
                // Keep whatever entries still serialize on their own
                let parts: Vec<String> = self
                    .0
                    .iter()
                    .map(|(k, v)| {
                        let value = serde_json::to_string(v)
                            .unwrap_or_else(|_| "\"[unserializable]\"".to_string());
                        format!("{:?}:{}", k, value)
                    })
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for LogContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

/// Builds a [`LogContext`] from `key => value` pairs
#[macro_export]
macro_rules! log_context {
    () => {
        $crate::context::LogContext::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::context::LogContext::new();
        $( ctx.insert($key, $value); )+
        ctx
    }};
}
