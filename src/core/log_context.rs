//! Typed record arguments and correlation context
//!
//! This module provides:
//! - `FieldValue`: a typed positional argument of a record
//! - `CorrelationContext`: the opaque handle a record carries for tracing a
//!   request across log lines
//! - `LogContext`: the stock correlation context (a name plus fields)
//! - `ContextGuard`: RAII guard installing a thread-scoped current context

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Value type for record arguments and context fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::UInt(u) => write!(f, "{}", u),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => f.write_str("null"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::String(s.clone())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        FieldValue::UInt(u)
    }
}

impl From<u32> for FieldValue {
    fn from(u: u32) -> Self {
        FieldValue::UInt(u64::from(u))
    }
}

impl From<usize> for FieldValue {
    fn from(u: usize) -> Self {
        FieldValue::UInt(u as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Opaque correlation handle carried by a record
///
/// The name is resolved only when a formatter asks for it, so producing it
/// may be arbitrarily expensive without slowing down the emitting thread.
pub trait CorrelationContext: Send + Sync + fmt::Debug {
    fn context_name(&self) -> Option<String>;
}

/// Correlation context with a name and optional structured fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    name: String,
    fields: BTreeMap<String, FieldValue>,
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<Arc<dyn CorrelationContext>>> = const { RefCell::new(None) };
}

impl LogContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the context
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Format fields as key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Install this context as the current one for the calling thread
    ///
    /// Records emitted on this thread without an explicit context pick it
    /// up until the returned guard is dropped.
    ///
    /// ```
    /// use fanout_logger::{CorrelationContext, LogContext};
    ///
    /// {
    ///     let _guard = LogContext::new("req-42").enter();
    ///     let current = LogContext::current().unwrap();
    ///     assert_eq!(current.context_name().as_deref(), Some("req-42"));
    /// }
    /// assert!(LogContext::current().is_none());
    /// ```
    pub fn enter(self) -> ContextGuard {
        ContextGuard::install(Arc::new(self))
    }

    /// Current context of the calling thread, if any
    pub fn current() -> Option<Arc<dyn CorrelationContext>> {
        CURRENT_CONTEXT.with(|current| current.borrow().clone())
    }
}

impl CorrelationContext for LogContext {
    fn context_name(&self) -> Option<String> {
        if self.name.is_empty() {
            None
        } else {
            Some(self.name.clone())
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{} {}", self.name, self.format_fields())
        }
    }
}

/// RAII guard for a thread-scoped correlation context
///
/// Dropping the guard restores whatever context was current before it was
/// installed, so guards nest.
pub struct ContextGuard {
    previous: Option<Arc<dyn CorrelationContext>>,
    // restoring must happen on the installing thread
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    /// Make `context` current on this thread
    pub fn install(context: Arc<dyn CorrelationContext>) -> Self {
        let previous = CURRENT_CONTEXT.with(|current| current.borrow_mut().replace(context));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_CONTEXT.with(|current| *current.borrow_mut() = previous);
    }
}
