//! Formatter chain rendering the prefix of a log line
//!
//! Each formatter renders one piece of the record (time, call site,
//! correlation context). The chain runs them in order and joins the
//! non-empty pieces with a delimiter. Formatters only read the record, so
//! a chain can be shared freely between worker threads.

use super::log_entry::LogEntry;
use super::timestamp::TimestampFormat;
use std::fmt;
use std::sync::Arc;

/// One piece of a rendered line
pub trait Formatter: Send + Sync + fmt::Debug {
    /// Append this formatter's output to `out`, returning the bytes written
    fn render(&self, out: &mut String, entry: &LogEntry) -> usize;
}

/// Record time in a configurable layout
#[derive(Debug, Clone, Default)]
pub struct TimestampFormatter {
    format: TimestampFormat,
}

impl TimestampFormatter {
    pub fn new(format: TimestampFormat) -> Self {
        Self { format }
    }
}

impl Formatter for TimestampFormatter {
    fn render(&self, out: &mut String, entry: &LogEntry) -> usize {
        let rendered = self.format.format(&entry.timestamp);
        out.push_str(&rendered);
        rendered.len()
    }
}

/// Call site as `file:line`, file name without directories
#[derive(Debug, Clone, Copy, Default)]
pub struct CallSiteFormatter;

impl Formatter for CallSiteFormatter {
    fn render(&self, out: &mut String, entry: &LogEntry) -> usize {
        let file = entry.file_name();
        if file.is_empty() {
            return 0;
        }
        let start = out.len();
        out.push_str(file);
        out.push(':');
        out.push_str(&entry.line.to_string());
        out.len() - start
    }
}

/// Name of the record's correlation context; nothing when absent
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextFormatter;

impl Formatter for ContextFormatter {
    fn render(&self, out: &mut String, entry: &LogEntry) -> usize {
        match entry.context_name() {
            Some(name) => {
                out.push_str(&name);
                name.len()
            }
            None => 0,
        }
    }
}

/// Ordered list of formatters
///
/// # Examples
///
/// ```
/// use fanout_logger::{FormatterChain, LogEntry, LogLevel, TimestampFormat};
///
/// let chain = FormatterChain::standard(TimestampFormat::None);
/// let entry = LogEntry::new(LogLevel::Info, "hello").with_location("src/main.rs", 7);
///
/// let mut out = String::new();
/// chain.render(&mut out, &entry);
/// assert_eq!(out, "main.rs:7");
/// ```
#[derive(Debug, Clone)]
pub struct FormatterChain {
    formatters: Vec<Arc<dyn Formatter>>,
    delimiter: String,
}

impl FormatterChain {
    pub const DEFAULT_DELIMITER: &'static str = " ";

    pub fn new(formatters: Vec<Arc<dyn Formatter>>) -> Self {
        Self {
            formatters,
            delimiter: Self::DEFAULT_DELIMITER.to_string(),
        }
    }

    /// Chain producing nothing
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Timestamp, call site and context, in that order
    pub fn standard(timestamp: TimestampFormat) -> Self {
        Self::new(vec![
            Arc::new(TimestampFormatter::new(timestamp)),
            Arc::new(CallSiteFormatter),
            Arc::new(ContextFormatter),
        ])
    }

    /// Call site and context only, used for envelope location fields
    pub fn location() -> Self {
        Self::new(vec![Arc::new(CallSiteFormatter), Arc::new(ContextFormatter)])
    }

    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    #[must_use]
    pub fn push(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatters.push(Arc::new(formatter));
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }

    /// Render every formatter into `out`, returning the bytes appended
    pub fn render(&self, out: &mut String, entry: &LogEntry) -> usize {
        let start = out.len();
        for formatter in &self.formatters {
            let mark = out.len();
            if mark > start {
                out.push_str(&self.delimiter);
            }
            if formatter.render(out, entry) == 0 {
                // drop the delimiter pushed for an empty piece
                out.truncate(mark);
            }
        }
        out.len() - start
    }

    /// Render into a fresh string
    pub fn render_to_string(&self, entry: &LogEntry) -> String {
        let mut out = String::new();
        self.render(&mut out, entry);
        out
    }

    /// Full text line: chain output, level, then the rendered message
    pub fn render_line(&self, entry: &LogEntry) -> String {
        let mut line = String::with_capacity(64 + entry.template.len());
        if self.render(&mut line, entry) > 0 {
            line.push_str(&self.delimiter);
        }
        line.push_str(entry.level.to_str());
        line.push(' ');
        line.push_str(&entry.message());
        line
    }
}

impl Default for FormatterChain {
    fn default() -> Self {
        Self::standard(TimestampFormat::layout(TimestampFormat::DEFAULT_LAYOUT))
    }
}
