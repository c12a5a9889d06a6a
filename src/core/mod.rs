//! Core logger types: records, sinks, the level registry, queues and the
//! logger facade

pub mod error;
pub mod formatter;
pub mod global;
pub mod log_context;
pub mod log_entry;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod queue;
pub mod rate_limiter;
pub mod registry;
pub mod sink;
pub mod timestamp;

pub use error::{LoggerError, Result};
pub use formatter::{CallSiteFormatter, ContextFormatter, Formatter, FormatterChain, TimestampFormatter};
pub use global::{logger, set_logger, shutdown};
pub use log_context::{ContextGuard, CorrelationContext, FieldValue, LogContext};
pub use log_entry::LogEntry;
pub use log_level::LogLevel;
pub use logger::{Logger, LoggerBuilder};
pub use metrics::{LoggerMetrics, QueueMetrics, QueueStats};
pub use overflow_policy::{Backpressure, OverflowCallback};
pub use queue::{AsyncQueue, QueueConfig, DEFAULT_SHUTDOWN_TIMEOUT};
pub(crate) use queue::WriterGuard;
pub use rate_limiter::{RateLimit, RateLimiter};
pub use registry::{Dispatch, LevelMap, LevelRegistry, LevelSinks};
pub use sink::{SharedSink, Sink};
pub use timestamp::TimestampFormat;
