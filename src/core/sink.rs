//! Sink trait for log output destinations

use super::{
    error::{LoggerError, Result},
    log_entry::LogEntry,
    metrics::QueueStats,
};
use std::sync::Arc;

/// Terminal consumer of log records
///
/// A sink is shared between the registry, every in-flight dispatch and, when
/// queued, its worker threads, so all methods take `&self`. Sinks that keep
/// mutable state guard it themselves.
///
/// # Example
///
/// ```
/// use fanout_logger::{LogEntry, Result, Sink};
/// use parking_lot::Mutex;
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Collect(Mutex<Vec<String>>);
///
/// impl Sink for Collect {
///     fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
///         self.0.lock().push(entry.message());
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "collect"
///     }
/// }
/// ```
pub trait Sink: Send + Sync {
    /// Consume one record
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()>;

    /// Release underlying resources
    ///
    /// Called once by the registry after the sink can no longer be reached by
    /// a new dispatch. Implementations must tolerate a second call.
    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// Whether `write` may run on several threads at once
    fn supports_concurrent_writes(&self) -> bool {
        false
    }

    /// Queue statistics, for sinks that buffer records
    fn stats(&self) -> Option<QueueStats> {
        None
    }
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        (**self).write(entry)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports_concurrent_writes(&self) -> bool {
        (**self).supports_concurrent_writes()
    }

    fn stats(&self) -> Option<QueueStats> {
        (**self).stats()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        (**self).write(entry)
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports_concurrent_writes(&self) -> bool {
        (**self).supports_concurrent_writes()
    }

    fn stats(&self) -> Option<QueueStats> {
        (**self).stats()
    }
}

/// Shared handle stored in registry snapshots
pub type SharedSink = Arc<dyn Sink>;

/// Write through `sink`, turning a panic inside it into a write error
pub(crate) fn guarded_write(sink: &dyn Sink, entry: &Arc<LogEntry>) -> Result<()> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.write(entry))) {
        Ok(result) => result,
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(LoggerError::writer(format!(
                "sink '{}' panicked: {}",
                sink.name(),
                panic_msg
            )))
        }
    }
}

/// Close `sink`, reporting a failure on the fallback channel
pub(crate) fn close_reporting(name: &str, sink: &dyn Sink) {
    if let Err(e) = sink.close() {
        eprintln!("[LOGGER ERROR] Failed to close output '{}': {}", name, e);
    }
}
