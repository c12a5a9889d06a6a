//! Console sink writing formatted lines to stdout, stderr or any writer

use crate::core::{FormatterChain, LogEntry, LoggerError, Result, Sink};
#[cfg(feature = "console")]
use colored::Colorize;
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

enum Target {
    Stdout,
    Stderr,
    Writer(Mutex<Box<dyn Write + Send>>),
}

/// Direct-write sink
///
/// Each record becomes one line, written with a single `write_all` so
/// concurrent records never interleave within a line.
///
/// # Examples
///
/// ```
/// use fanout_logger::{ConsoleSink, FormatterChain, TimestampFormat};
///
/// let sink = ConsoleSink::stdout()
///     .with_chain(FormatterChain::standard(TimestampFormat::layout("%H:%M:%S")))
///     .with_colors(false);
/// ```
pub struct ConsoleSink {
    name: String,
    target: Target,
    chain: FormatterChain,
    use_colors: bool,
}

impl ConsoleSink {
    fn with_target(name: &str, target: Target, use_colors: bool) -> Self {
        Self {
            name: name.to_string(),
            target,
            chain: FormatterChain::default(),
            use_colors,
        }
    }

    pub fn stdout() -> Self {
        Self::with_target("stdout", Target::Stdout, io::stdout().is_terminal())
    }

    pub fn stderr() -> Self {
        Self::with_target("stderr", Target::Stderr, io::stderr().is_terminal())
    }

    /// Sink writing to an arbitrary writer, without colors
    pub fn writer(name: &str, writer: Box<dyn Write + Send>) -> Self {
        Self::with_target(name, Target::Writer(Mutex::new(writer)), false)
    }

    #[must_use]
    pub fn with_chain(mut self, chain: FormatterChain) -> Self {
        self.chain = chain;
        self
    }

    /// Color the level name (requires the `console` feature)
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn format_line(&self, entry: &LogEntry) -> String {
        let mut line = String::with_capacity(96 + entry.template.len());
        if self.chain.render(&mut line, entry) > 0 {
            line.push_str(self.chain.delimiter());
        }
        self.push_level(&mut line, entry);
        line.push(' ');
        line.push_str(&entry.message());
        line.push('\n');
        line
    }

    #[cfg(feature = "console")]
    fn push_level(&self, line: &mut String, entry: &LogEntry) {
        if self.use_colors {
            let level = entry.level.to_str().color(entry.level.color_code());
            line.push_str(&level.to_string());
        } else {
            line.push_str(entry.level.to_str());
        }
    }

    #[cfg(not(feature = "console"))]
    fn push_level(&self, line: &mut String, entry: &LogEntry) {
        line.push_str(entry.level.to_str());
    }

    fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        match &self.target {
            Target::Stdout => io::stdout().lock().write_all(bytes),
            Target::Stderr => io::stderr().lock().write_all(bytes),
            Target::Writer(writer) => writer.lock().write_all(bytes),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        let line = self.format_line(entry);
        self.write_bytes(line.as_bytes())
            .map_err(|e| LoggerError::io_operation("write log line", self.name.clone(), e))
    }

    fn close(&self) -> Result<()> {
        match &self.target {
            Target::Stdout => io::stdout().flush()?,
            Target::Stderr => io::stderr().flush()?,
            Target::Writer(writer) => writer.lock().flush()?,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }
}

impl fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("name", &self.name)
            .field("chain", &self.chain)
            .field("use_colors", &self.use_colors)
            .finish()
    }
}
