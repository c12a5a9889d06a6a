//! # Fanout Logger
//!
//! Structured logging core that routes each record to every sink
//! interested in its level.
//!
//! ## Features
//!
//! - **Lock-free dispatch**: the level registry is an atomically swapped
//!   immutable table; outputs can be added and removed while logging
//! - **Bounded queues**: [`AsyncQueue`] puts a worker pool and an explicit
//!   backpressure policy in front of any sink
//! - **Rotation**: size or age based file rotation with backup retention
//!   and optional gzip compression
//! - **Network shipping**: batched, rate-limited [`HttpSink`] with
//!   bulk-index and chat envelopes
//!
//! ## Example
//!
//! ```
//! use fanout_logger::prelude::*;
//! use std::sync::Arc;
//!
//! let queue = AsyncQueue::new(ConsoleSink::stderr(), QueueConfig::new(1024)).unwrap();
//! let logger = Logger::builder()
//!     .output("stderr", Arc::new(queue), LogLevel::Info)
//!     .build();
//!
//! fanout_logger::info!(logger, "listening on {}", 8080);
//! logger.close();
//! ```

pub mod config;
pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        AsyncQueue, Backpressure, ContextGuard, CorrelationContext, FieldValue, FormatterChain,
        LogContext, LogEntry, LogLevel, Logger, LoggerBuilder, LoggerError, QueueConfig, Result,
        SharedSink, Sink, TimestampFormat,
    };
    pub use crate::sinks::{ConsoleSink, HttpSink, RotatingFileSink, RotationPolicy, RotationStrategy};
}

pub use crate::config::{byte_size, install, setup_logger, SinkConfig};
pub use crate::core::{
    logger, set_logger, shutdown, AsyncQueue, Backpressure, CallSiteFormatter, ContextFormatter,
    ContextGuard, CorrelationContext, Dispatch, FieldValue, Formatter, FormatterChain, LevelMap,
    LevelRegistry, LevelSinks, LogContext, LogEntry, LogLevel, Logger, LoggerBuilder,
    LoggerError, LoggerMetrics, OverflowCallback, QueueConfig, QueueMetrics, QueueStats,
    RateLimit, RateLimiter, Result, SharedSink, Sink, TimestampFormat, TimestampFormatter,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
#[cfg(feature = "network")]
pub use crate::sinks::HttpTransport;
pub use crate::sinks::{
    truncate_at_char_boundary, BulkIndexEnvelope, ChatEnvelope, ConsoleSink, Envelope, HttpSink,
    HttpSinkConfig, RotatingFileSink, RotationPolicy, RotationStrategy, Transport,
};
