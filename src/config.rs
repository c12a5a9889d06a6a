//! Sink configuration records and the glue turning them into a logger
//!
//! Field names follow the deployment files these records are read from
//! (`LogType`, `LogLevel`, ...). Any serde format crate can load them.
//!
//! ```
//! use fanout_logger::{setup_logger, SinkConfig};
//!
//! let configs: Vec<SinkConfig> = serde_json::from_str(
//!     r#"[{"LogType": "stderr", "LogLevel": 2, "LogDate": "%H:%M:%S"}]"#,
//! ).unwrap();
//!
//! let logger = setup_logger(&configs);
//! assert_eq!(logger.outputs(), vec!["stderr".to_string()]);
//! ```

use crate::core::{
    set_logger, AsyncQueue, FormatterChain, LogLevel, Logger, LoggerError, QueueConfig, Result,
    SharedSink, TimestampFormat,
};
use crate::sinks::{ConsoleSink, RotatingFileSink, RotationPolicy, RotationStrategy};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One configured output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SinkConfig {
    /// `stdout`, `stderr`, `file`, `filetime`, or any of these with a
    /// `queue` suffix
    pub log_type: String,
    pub log_file: String,
    /// strftime layout of the line timestamp; empty disables it
    pub log_date: String,
    /// Numeric threshold: 0 TRACE .. 4 ERROR
    pub log_level: i64,
    /// Roll size in bytes for `file` kinds; 0 never rolls
    pub log_size: u64,
    /// Roll interval in seconds for `filetime` kinds; 0 never rolls
    pub log_duration: u64,
    pub log_backup: usize,
    pub log_queue: usize,
    pub log_writers: usize,
}

impl SinkConfig {
    pub fn new(log_type: impl Into<String>) -> Self {
        Self {
            log_type: log_type.into(),
            ..Self::default()
        }
    }

    pub fn threshold(&self) -> LogLevel {
        LogLevel::from_threshold(self.log_level)
    }

    /// Registry key of the output: the file path for file kinds
    pub fn output_name(&self) -> &str {
        match self.log_type.as_str() {
            "stdout" | "stdoutqueue" => "stdout",
            "stderr" | "stderrqueue" => "stderr",
            _ => &self.log_file,
        }
    }

    fn chain(&self) -> FormatterChain {
        FormatterChain::standard(TimestampFormat::layout(&self.log_date))
    }

    fn queue_config(&self) -> QueueConfig {
        let capacity = if self.log_queue == 0 {
            QueueConfig::DEFAULT_CAPACITY
        } else {
            self.log_queue
        };
        QueueConfig::new(capacity).with_workers(self.log_writers.max(1))
    }

    fn rotation(&self) -> RotationPolicy {
        let strategy = match self.log_type.as_str() {
            "file" | "filequeue" if self.log_size > 0 => RotationStrategy::size(self.log_size),
            "filetime" | "filetimequeue" if self.log_duration > 0 => {
                RotationStrategy::time(Duration::from_secs(self.log_duration))
            }
            _ => RotationStrategy::Never,
        };
        RotationPolicy::new()
            .with_strategy(strategy)
            .with_max_backups(self.log_backup)
    }

    fn file_sink(&self) -> Result<RotatingFileSink> {
        if self.log_file.is_empty() {
            return Err(LoggerError::config(
                "sink config",
                format!("LogType '{}' needs a LogFile", self.log_type),
            ));
        }
        Ok(RotatingFileSink::new(&self.log_file, self.rotation())?.with_chain(self.chain()))
    }

    /// Construct the sink this record describes
    pub fn build_sink(&self) -> Result<SharedSink> {
        let sink: SharedSink = match self.log_type.as_str() {
            "stdout" => Arc::new(ConsoleSink::stdout().with_chain(self.chain())),
            "stderr" => Arc::new(ConsoleSink::stderr().with_chain(self.chain())),
            "stdoutqueue" => Arc::new(AsyncQueue::new(
                ConsoleSink::stdout().with_chain(self.chain()),
                self.queue_config(),
            )?),
            "stderrqueue" => Arc::new(AsyncQueue::new(
                ConsoleSink::stderr().with_chain(self.chain()),
                self.queue_config(),
            )?),
            "file" | "filetime" => Arc::new(self.file_sink()?),
            "filequeue" | "filetimequeue" => {
                Arc::new(AsyncQueue::new(self.file_sink()?, self.queue_config())?)
            }
            other => {
                return Err(LoggerError::config(
                    "sink config",
                    format!("unknown LogType '{}'", other),
                ))
            }
        };
        Ok(sink)
    }
}

/// Human-readable byte count: `1536` renders as `1.50 KB`
pub fn byte_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

    let mut unit = "B";
    let mut scaled = bytes as f64;
    for (idx, name) in UNITS.iter().enumerate().rev() {
        let base = 1u64 << (10 * (idx as u32 + 1));
        if bytes >= base {
            unit = name;
            scaled = bytes as f64 / base as f64;
            break;
        }
    }
    format!("{:.2} {}", scaled, unit)
}

/// Build a logger from configuration records
///
/// A record whose sink cannot be built is reported on stderr and skipped;
/// the others are installed regardless. Each record is then summarized on
/// the new logger at DEBUG.
pub fn setup_logger(configs: &[SinkConfig]) -> Logger {
    setup_reporting(configs, |config, e| {
        eprintln!(
            "[LOGGER ERROR] {} skipping output '{}': {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            config.output_name(),
            e
        )
    })
}

fn setup_reporting<F>(configs: &[SinkConfig], mut report: F) -> Logger
where
    F: FnMut(&SinkConfig, &LoggerError),
{
    let logger = Logger::new();

    for config in configs {
        match config.build_sink() {
            Ok(sink) => logger.add_output(config.output_name(), sink, config.threshold()),
            Err(e) => report(config, &e),
        }
    }

    for config in configs {
        logger.log_args(
            LogLevel::Debug,
            "LOG OUTPUT: LogLevel={}, LogType={}, LogFile={}, LogSize={}, LogDuration={}s, \
             LogBackup={}, LogQueue={}, LogWriters={}",
            vec![
                config.log_level.into(),
                config.log_type.as_str().into(),
                config.log_file.as_str().into(),
                byte_size(config.log_size).into(),
                config.log_duration.into(),
                config.log_backup.into(),
                config.log_queue.into(),
                config.log_writers.into(),
            ],
        );
    }

    logger
}

/// Build a logger from `configs` and make it the process-wide default
///
/// Returns the logger it replaced, still open.
pub fn install(configs: &[SinkConfig]) -> Arc<Logger> {
    set_logger(setup_logger(configs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldValue;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_deserialize_field_names() {
        let config: SinkConfig = serde_json::from_str(
            r#"{"LogType":"filequeue","LogFile":"/tmp/a.log","LogDate":"%H:%M","LogLevel":3,
                "LogSize":1048576,"LogBackup":4,"LogQueue":64,"LogWriters":2,"LogDuration":60}"#,
        )
        .unwrap();

        assert_eq!(config.log_type, "filequeue");
        assert_eq!(config.threshold(), LogLevel::Warn);
        assert_eq!(config.log_size, 1_048_576);
        assert_eq!(config.log_duration, 60);
        assert_eq!(config.output_name(), "/tmp/a.log");
        assert_eq!(config.rotation().strategy, RotationStrategy::size(1_048_576));
        assert_eq!(config.queue_config().capacity, 64);
    }

    #[test]
    fn test_missing_fields_default() {
        let config: SinkConfig = serde_json::from_str(r#"{"LogType":"stdout"}"#).unwrap();
        assert_eq!(config.threshold(), LogLevel::Trace);
        assert_eq!(config.queue_config().capacity, QueueConfig::DEFAULT_CAPACITY);
        assert_eq!(config.queue_config().workers, 1);
    }

    #[test]
    fn test_rotation_by_kind() {
        let mut config = SinkConfig::new("filetime");
        config.log_duration = 3600;
        assert_eq!(
            config.rotation().strategy,
            RotationStrategy::time(Duration::from_secs(3600))
        );

        config.log_duration = 0;
        assert_eq!(config.rotation().strategy, RotationStrategy::Never);
    }

    #[test]
    fn test_setup_skips_broken_outputs() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("app.log");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let bad = blocker.join("app.log");

        let configs = vec![
            SinkConfig {
                log_file: good.to_string_lossy().into_owned(),
                log_size: 1024,
                log_backup: 2,
                ..SinkConfig::new("file")
            },
            SinkConfig {
                log_file: bad.to_string_lossy().into_owned(),
                ..SinkConfig::new("file")
            },
            SinkConfig::new("carrier-pigeon"),
        ];

        let mut skipped = Vec::new();
        let logger = setup_reporting(&configs, |config, e| {
            assert!(e.is_configuration(), "unexpected error kind: {}", e);
            skipped.push(config.output_name().to_string());
        });
        assert_eq!(logger.outputs(), vec![good.to_string_lossy().into_owned()]);
        assert_eq!(skipped, vec![bad.to_string_lossy().into_owned(), String::new()]);

        logger.info("ready");
        logger.close();

        let contents = fs::read_to_string(&good).unwrap();
        assert!(contents.contains("LOG OUTPUT: LogLevel=0, LogType=file"));
        assert!(contents.contains("LogSize=1.00 KB"));
        assert!(contents.contains("LogType=carrier-pigeon"));
        assert!(contents.trim_end().ends_with("INFO ready"));
    }

    #[test]
    fn test_queued_file_drains_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queued.log");
        let config = SinkConfig {
            log_file: path.to_string_lossy().into_owned(),
            log_level: 2,
            log_queue: 16,
            log_writers: 4,
            ..SinkConfig::new("filetimequeue")
        };

        let logger = setup_logger(&[config]);
        assert!(!logger.enabled(LogLevel::Debug));
        for i in 0..10 {
            logger.log_args(LogLevel::Info, "line {}", vec![FieldValue::from(i as i64)]);
        }

        let stats = logger.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].1.capacity, 16);
        logger.close();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 10);
        assert!(lines[9].ends_with("INFO line 9"));
    }

    #[test]
    fn test_file_kind_needs_path() {
        match SinkConfig::new("file").build_sink() {
            Ok(_) => panic!("file kind without a path must not build"),
            Err(err) => assert!(err.is_configuration()),
        }
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(byte_size(0), "0.00 B");
        assert_eq!(byte_size(1023), "1023.00 B");
        assert_eq!(byte_size(1536), "1.50 KB");
        assert_eq!(byte_size(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(byte_size(1 << 60), "1.00 EB");
    }
}
