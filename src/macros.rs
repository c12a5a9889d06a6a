//! Logging macros capturing the call site and positional arguments.
//!
//! Every macro takes a string literal template whose `{}` placeholders are
//! filled from the remaining arguments when a sink renders the record.
//! Arguments are converted to [`FieldValue`](crate::FieldValue) at the call
//! site, so the record never holds borrowed data.
//!
//! With a logger as the first argument the record goes to that logger;
//! without one it goes to the process-wide default.
//!
//! # Examples
//!
//! ```
//! use fanout_logger::prelude::*;
//! use fanout_logger::{info, warn};
//!
//! let logger = Logger::new();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! // default logger
//! warn!("disk {} at {}%", "sda", 91);
//! ```

/// Log at an explicit level.
///
/// ```
/// # use fanout_logger::prelude::*;
/// # let logger = Logger::new();
/// use fanout_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// log!(LogLevel::Debug, "to the default logger");
/// ```
#[macro_export]
macro_rules! log {
    ($level:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::logger().log_args(
            $level,
            $template,
            ::std::vec![$($crate::FieldValue::from($arg)),*],
        )
    };
    ($logger:expr, $level:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $logger.log_args(
            $level,
            $template,
            ::std::vec![$($crate::FieldValue::from($arg)),*],
        )
    };
}

#[macro_export]
macro_rules! trace {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($crate::LogLevel::Trace, $template $(, $arg)*)
    };
    ($logger:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($crate::LogLevel::Debug, $template $(, $arg)*)
    };
    ($logger:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($crate::LogLevel::Info, $template $(, $arg)*)
    };
    ($logger:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Info, $template $(, $arg)*)
    };
}

/// Log a warning.
///
/// ```
/// # use fanout_logger::prelude::*;
/// # let logger = Logger::new();
/// use fanout_logger::warn;
/// warn!(logger, "Low disk space");
/// warn!(logger, "Retry attempt {} of {}", 3, 5);
/// ```
#[macro_export]
macro_rules! warn {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($crate::LogLevel::Warn, $template $(, $arg)*)
    };
    ($logger:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $template $(, $arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($crate::LogLevel::Error, $template $(, $arg)*)
    };
    ($logger:expr, $template:literal $(, $arg:expr)* $(,)?) => {
        $crate::log!($logger, $crate::LogLevel::Error, $template $(, $arg)*)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::sink::testing::RecordingSink;
    use crate::{LogLevel, Logger};

    #[test]
    fn test_macros_fill_placeholders() {
        let logger = Logger::new();
        let sink = RecordingSink::shared();
        logger.add_output("rec", sink.clone(), LogLevel::Trace);

        let user = String::from("alice");
        crate::trace!(logger, "enter");
        crate::debug!(logger, "user {} id {}", &user, 42u64);
        crate::info!(logger, "ratio {}", 0.5);
        crate::warn!(logger, "flag {}", true,);
        crate::error!(logger, "{} and {}", "a", "b");
        crate::log!(logger, LogLevel::Info, "explicit {}", -3i64);

        assert_eq!(
            sink.messages(),
            vec![
                "enter",
                "user alice id 42",
                "ratio 0.5",
                "flag true",
                "a and b",
                "explicit -3",
            ]
        );
        assert_eq!(
            sink.levels(),
            vec![
                LogLevel::Trace,
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error,
                LogLevel::Info,
            ]
        );
    }

    #[test]
    fn test_macro_call_site_is_this_file() {
        struct SiteProbe(parking_lot::Mutex<Vec<&'static str>>);
        impl crate::Sink for SiteProbe {
            fn write(&self, entry: &std::sync::Arc<crate::LogEntry>) -> crate::Result<()> {
                self.0.lock().push(entry.file);
                Ok(())
            }
            fn name(&self) -> &str {
                "site"
            }
        }

        let logger = Logger::new();
        let probe = std::sync::Arc::new(SiteProbe(parking_lot::Mutex::new(Vec::new())));
        logger.add_output("site", probe.clone(), LogLevel::Trace);

        crate::info!(logger, "where am I");
        assert!(probe.0.lock()[0].ends_with("macros.rs"));
    }
}
