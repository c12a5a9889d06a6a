//! Log record structure

use super::log_context::{CorrelationContext, FieldValue};
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// A single log record
///
/// Built once per log call and shared between every interested sink as an
/// `Arc<LogEntry>`. Sinks only ever read it; a sink that needs the record
/// past its `write` call keeps the `Arc`, never a borrowed piece of it.
#[derive(Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub file: &'static str,
    pub line: u32,
    pub template: Cow<'static, str>,
    pub args: Vec<FieldValue>,
    /// Structured payload shipped as-is by envelopes that support it
    pub data: Option<serde_json::Value>,
    pub context: Option<Arc<dyn CorrelationContext>>,
}

impl LogEntry {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    fn sanitize_message(message: &str) -> Cow<'_, str> {
        if message.contains(['\n', '\r', '\t']) {
            Cow::Owned(
                message
                    .replace('\n', "\\n")
                    .replace('\r', "\\r")
                    .replace('\t', "\\t"),
            )
        } else {
            Cow::Borrowed(message)
        }
    }

    /// Create a record stamped with the caller's location
    #[track_caller]
    pub fn new(level: LogLevel, template: impl Into<Cow<'static, str>>) -> Self {
        let caller = Location::caller();
        Self {
            level,
            timestamp: Utc::now(),
            file: caller.file(),
            line: caller.line(),
            template: template.into(),
            args: Vec::new(),
            data: None,
            context: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<FieldValue>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<FieldValue>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn with_location(mut self, file: &'static str, line: u32) -> Self {
        self.file = file;
        self.line = line;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: Arc<dyn CorrelationContext>) -> Self {
        self.context = Some(context);
        self
    }

    /// File name of the call site without its directory
    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file)
    }

    /// Name of the attached correlation context, resolved now
    pub fn context_name(&self) -> Option<String> {
        self.context.as_ref().and_then(|ctx| ctx.context_name())
    }

    /// Render the template with its positional arguments
    ///
    /// Each `{}` takes the next argument; `{{` and `}}` are literal braces.
    /// Arguments left over once the template is exhausted are appended,
    /// separated by spaces. Placeholders without an argument are kept.
    ///
    /// ```
    /// use fanout_logger::{LogEntry, LogLevel};
    ///
    /// let entry = LogEntry::new(LogLevel::Info, "user {} logged in from {}")
    ///     .with_arg("alice")
    ///     .with_arg("10.0.0.1")
    ///     .with_arg(3);
    /// assert_eq!(entry.message(), "user alice logged in from 10.0.0.1 3");
    /// ```
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len() + self.args.len() * 8);
        let mut args = self.args.iter();
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    chars.next();
                    out.push(c);
                }
                ('{', Some('}')) => {
                    chars.next();
                    match args.next() {
                        Some(arg) => out.push_str(&arg.to_string()),
                        None => out.push_str("{}"),
                    }
                }
                _ => out.push(c),
            }
        }
        for arg in args {
            out.push(' ');
            out.push_str(&arg.to_string());
        }

        Self::sanitize_message(&out).into_owned()
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("level", &self.level)
            .field("timestamp", &self.timestamp)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("template", &self.template)
            .field("args", &self.args)
            .field("data", &self.data)
            .field("context", &self.context_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_context::LogContext;

    #[test]
    fn test_call_site_is_captured() {
        let entry = LogEntry::new(LogLevel::Info, "here");
        assert_eq!(entry.file_name(), "log_entry.rs");
        assert!(entry.line > 0);
    }

    #[test]
    fn test_message_rendering() {
        let entry = LogEntry::new(LogLevel::Warn, "{} of {} retries, {{literal}}")
            .with_args(vec![3.into(), 5.into()]);
        assert_eq!(entry.message(), "3 of 5 retries, {literal}");

        let entry = LogEntry::new(LogLevel::Warn, "missing {} and {}").with_arg(1);
        assert_eq!(entry.message(), "missing 1 and {}");
    }

    #[test]
    fn test_message_is_sanitized() {
        let entry = LogEntry::new(LogLevel::Info, "line one\nERROR fake")
            .with_arg("tab\there");
        assert_eq!(entry.message(), "line one\\nERROR fake tab\\there");
    }

    #[test]
    fn test_multibyte_template() {
        let entry = LogEntry::new(LogLevel::Info, "привет {} 🌍").with_arg("мир");
        assert_eq!(entry.message(), "привет мир 🌍");
    }

    #[test]
    fn test_context_name() {
        let entry = LogEntry::new(LogLevel::Info, "x")
            .with_context(Arc::new(LogContext::new("trace-1")));
        assert_eq!(entry.context_name().as_deref(), Some("trace-1"));
    }
}
