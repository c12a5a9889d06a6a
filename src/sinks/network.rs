//! Batched, rate-limited network sink
//!
//! [`HttpSink`] buffers records in a bounded channel. One flush thread
//! collects them into batches, renders each batch through an [`Envelope`]
//! and hands the body to a [`Transport`], waiting on a token bucket
//! before every request. Two envelopes ship with the crate:
//!
//! - [`BulkIndexEnvelope`]: newline-delimited bulk-index documents
//! - [`ChatEnvelope`]: one chat-bot message per batch
//!
//! The HTTP transport lives behind the `network` feature; anything that
//! can move bytes can implement [`Transport`].

use crate::core::{
    Backpressure, FormatterChain, LogEntry, LoggerError, QueueMetrics, QueueStats, RateLimit,
    RateLimiter, Result, Sink, TimestampFormat, WriterGuard,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long the idle flush loop waits before re-checking for shutdown
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Moves a rendered batch to the remote side
pub trait Transport: Send {
    /// Deliver one request body; an `Err` triggers the retry policy
    fn post(&self, body: &[u8], content_type: &str) -> Result<()>;

    /// Human-readable destination, used in alerts
    fn endpoint(&self) -> String {
        "transport".to_string()
    }
}

/// Wire format applied to a batch before transmission
pub trait Envelope: Send {
    fn render(&self, batch: &[Arc<LogEntry>]) -> Result<Vec<u8>>;

    fn content_type(&self) -> &str {
        "application/json"
    }
}

/// Cut `s` to at most `limit` bytes without splitting a character
///
/// # Example
///
/// ```
/// use fanout_logger::truncate_at_char_boundary;
///
/// assert_eq!(truncate_at_char_boundary("héllo", 2), "h");
/// assert_eq!(truncate_at_char_boundary("héllo", 3), "hé");
/// assert_eq!(truncate_at_char_boundary("abc", 10), "abc");
/// ```
pub fn truncate_at_char_boundary(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One document line of the bulk-index envelope
#[derive(Serialize)]
struct BulkDocument<'a> {
    #[serde(rename = "ApplicationName")]
    application_name: &'a str,
    #[serde(rename = "Environment")]
    environment: &'a str,
    #[serde(rename = "Level")]
    level: &'a str,
    #[serde(rename = "Location", skip_serializing_if = "String::is_empty")]
    location: String,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    #[serde(rename = "Message", skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    timestamp: String,
}

/// Newline-delimited bulk-index envelope
///
/// Every record becomes an action line naming the target index (computed
/// from the record time with `index_format`, a strftime layout rendered in
/// UTC) followed by the document line. An empty `index_format` omits the
/// action lines. Records carrying a `data` payload ship it as `Data`
/// instead of a `Message`.
///
/// ```
/// use fanout_logger::{BulkIndexEnvelope, Envelope, LogEntry, LogLevel};
/// use std::sync::Arc;
///
/// let envelope = BulkIndexEnvelope::new("billing", "prod").with_index_format("logs-%Y.%m.%d");
/// let body = envelope.render(&[Arc::new(LogEntry::new(LogLevel::Info, "started"))]).unwrap();
/// let text = String::from_utf8(body).unwrap();
/// assert_eq!(text.lines().count(), 2);
/// assert!(text.starts_with(r#"{"index":{"_index":"logs-"#));
/// ```
#[derive(Debug, Clone)]
pub struct BulkIndexEnvelope {
    pub application_name: String,
    pub environment: String,
    pub index_format: String,
    location: FormatterChain,
}

impl BulkIndexEnvelope {
    pub fn new(application_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            environment: environment.into(),
            index_format: String::new(),
            location: FormatterChain::location(),
        }
    }

    #[must_use]
    pub fn with_index_format(mut self, index_format: impl Into<String>) -> Self {
        self.index_format = index_format.into();
        self
    }

    /// Chain rendering the `Location` field (call site and context by default)
    #[must_use]
    pub fn with_location_chain(mut self, chain: FormatterChain) -> Self {
        self.location = chain;
        self
    }

    fn push_index_line(&self, out: &mut Vec<u8>, entry: &LogEntry) -> Result<()> {
        let index = TimestampFormat::Custom(self.index_format.clone()).format(&entry.timestamp);
        if index.is_empty() {
            return Err(LoggerError::formatter(
                "bulk-index",
                format!("index format '{}' rendered nothing", self.index_format),
            ));
        }
        serde_json::to_writer(&mut *out, &serde_json::json!({ "index": { "_index": index } }))?;
        out.push(b'\n');
        Ok(())
    }
}

impl Envelope for BulkIndexEnvelope {
    fn render(&self, batch: &[Arc<LogEntry>]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(batch.len() * 256);
        for entry in batch {
            if !self.index_format.is_empty() {
                self.push_index_line(&mut out, entry)?;
            }

            // a structured payload replaces the text message
            let message = match entry.data {
                Some(_) => None,
                None => Some(format!("{} {}", entry.level, entry.message())),
            };

            let document = BulkDocument {
                application_name: &self.application_name,
                environment: &self.environment,
                level: entry.level.to_str(),
                location: self.location.render_to_string(entry),
                data: entry.data.as_ref(),
                message,
                timestamp: TimestampFormat::Rfc3339Millis.format(&entry.timestamp),
            };
            serde_json::to_writer(&mut out, &document)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    fn content_type(&self) -> &str {
        "application/x-ndjson"
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    #[serde(skip_serializing_if = "is_zero")]
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    disable_notification: bool,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Host name as the OS reports it; empty when it cannot be read
fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Chat-bot envelope: one message per batch
///
/// Each record renders as `<hostname> <chain> <LEVEL> <message>`; the
/// records of a batch are joined by newlines and the result is cut to
/// `text_limit` bytes on a character boundary (0 disables the cut).
#[derive(Debug, Clone)]
pub struct ChatEnvelope {
    pub chat_id: i64,
    pub hostname: String,
    pub text_limit: usize,
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: bool,
    pub disable_notification: bool,
    chain: FormatterChain,
}

impl ChatEnvelope {
    /// Chat APIs reject longer texts
    pub const DEFAULT_TEXT_LIMIT: usize = 1024;

    /// Minimum spacing the chat endpoints tolerate between requests
    pub const POST_DELAY: Duration = Duration::from_millis(1500);

    /// Envelope for `chat_id`, prefixing texts with the machine's host name
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            hostname: local_hostname(),
            text_limit: Self::DEFAULT_TEXT_LIMIT,
            parse_mode: None,
            disable_web_page_preview: false,
            disable_notification: false,
            chain: FormatterChain::location(),
        }
    }

    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    #[must_use]
    pub fn with_text_limit(mut self, text_limit: usize) -> Self {
        self.text_limit = text_limit;
        self
    }

    #[must_use]
    pub fn with_parse_mode(mut self, parse_mode: impl Into<String>) -> Self {
        self.parse_mode = Some(parse_mode.into());
        self
    }

    #[must_use]
    pub fn with_chain(mut self, chain: FormatterChain) -> Self {
        self.chain = chain;
        self
    }

    #[must_use]
    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }

    /// Text for a single record
    pub fn text_for(&self, entry: &LogEntry) -> String {
        let prefix = self.chain.render_to_string(entry);
        let mut text = String::with_capacity(64 + entry.template.len());
        for part in [self.hostname.as_str(), prefix.as_str()] {
            if !part.is_empty() {
                text.push_str(part);
                text.push(' ');
            }
        }
        text.push_str(entry.level.to_str());
        text.push(' ');
        text.push_str(&entry.message());
        text
    }
}

impl Envelope for ChatEnvelope {
    fn render(&self, batch: &[Arc<LogEntry>]) -> Result<Vec<u8>> {
        let text = batch
            .iter()
            .map(|entry| self.text_for(entry))
            .collect::<Vec<_>>()
            .join("\n");

        let message = ChatMessage {
            chat_id: self.chat_id,
            text: if self.text_limit > 0 {
                truncate_at_char_boundary(&text, self.text_limit)
            } else {
                &text
            },
            parse_mode: self.parse_mode.as_deref(),
            disable_web_page_preview: self.disable_web_page_preview,
            disable_notification: self.disable_notification,
        };
        Ok(serde_json::to_vec(&message)?)
    }
}

/// Batching, pacing and retry settings of an [`HttpSink`]
///
/// # Example
///
/// ```
/// use fanout_logger::{HttpSinkConfig, RateLimit};
/// use std::time::Duration;
///
/// let config = HttpSinkConfig::default()
///     .with_batch_size(50)
///     .with_rate_limit(RateLimit::new(2.0, 1))
///     .with_retry(3, Duration::from_millis(200));
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Records buffered before new ones are dropped
    pub capacity: usize,
    /// Records per request
    pub batch_size: usize,
    /// Longest a record waits for its batch to fill
    pub flush_interval: Duration,
    pub rate_limit: Option<RateLimit>,
    pub retry_delay: Duration,
    /// Requests per batch, the first one included
    pub max_attempts: u32,
    pub shutdown_timeout: Duration,
}

impl HttpSinkConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay = retry_delay;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// One message per request, paced for chat endpoints
    pub fn chat() -> Self {
        Self {
            batch_size: 1,
            rate_limit: Some(RateLimit::every(ChatEnvelope::POST_DELAY)),
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.batch_size == 0 || self.max_attempts == 0 {
            return Err(LoggerError::config(
                "http sink",
                "capacity, batch_size and max_attempts must be greater than zero",
            ));
        }
        if let Some(limit) = self.rate_limit {
            if limit.per_second.is_nan() || limit.per_second <= 0.0 {
                return Err(LoggerError::config(
                    "http sink",
                    format!("rate limit must refill, got {} per second", limit.per_second),
                ));
            }
        }
        Ok(())
    }
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            rate_limit: None,
            retry_delay: Duration::from_millis(500),
            max_attempts: 3,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

struct Shared {
    name: String,
    metrics: QueueMetrics,
    closed: AtomicBool,
}

impl Shared {
    fn drained(&self, receiver: &Receiver<Arc<LogEntry>>) -> bool {
        self.closed.load(Ordering::SeqCst) && self.metrics.writers() == 0 && receiver.is_empty()
    }

    /// Count a lost batch; alert on the first loss and every 1000th record
    fn failed(&self, records: u64, endpoint: &str, error: &LoggerError) {
        let before = self.metrics.add_write_errors(records);
        let after = before + records;
        if before == 0 || before / 1000 != after / 1000 {
            eprintln!(
                "[LOGGER ERROR] Output '{}' lost {} records sending to {} ({} failures so far): {}",
                self.name, records, endpoint, after, error
            );
        }
    }
}

/// State owned by the flush thread
struct FlushLoop {
    shared: Arc<Shared>,
    receiver: Receiver<Arc<LogEntry>>,
    transport: Box<dyn Transport>,
    envelope: Box<dyn Envelope>,
    limiter: Option<RateLimiter>,
    batch_size: usize,
    flush_interval: Duration,
    retry_delay: Duration,
    max_attempts: u32,
}

impl FlushLoop {
    fn run(mut self) {
        self.shared.metrics.reader_started();
        let mut batch = Vec::with_capacity(self.batch_size);

        loop {
            match self.receiver.recv_timeout(IDLE_POLL) {
                Ok(entry) => batch.push(entry),
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.drained(&self.receiver) {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.fill(&mut batch);
            self.flush(&batch);
            batch.clear();
        }

        self.shared.metrics.reader_stopped();
    }

    /// Top the batch up until it is full or its first record is due
    fn fill(&self, batch: &mut Vec<Arc<LogEntry>>) {
        let deadline = Instant::now() + self.flush_interval;
        while batch.len() < self.batch_size {
            let next = if self.shared.closed.load(Ordering::SeqCst) {
                self.receiver.try_recv().ok()
            } else {
                self.receiver.recv_deadline(deadline).ok()
            };
            match next {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
    }

    fn flush(&mut self, batch: &[Arc<LogEntry>]) {
        let records = batch.len() as u64;
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| self.envelope.render(batch)))
            .unwrap_or_else(|_| Err(LoggerError::formatter("envelope", "render panicked")));
        let body = match rendered {
            Ok(body) => body,
            Err(e) => {
                self.shared.failed(records, "envelope", &e);
                return;
            }
        };
        let content_type = self.envelope.content_type().to_string();

        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Some(limiter) = self.limiter.as_mut() {
                limiter.acquire();
            }

            match self.transport.post(&body, &content_type) {
                Ok(()) => {
                    self.shared.metrics.add_written(records);
                    return;
                }
                Err(e) if attempt >= self.max_attempts => {
                    self.shared.failed(records, &self.transport.endpoint(), &e);
                    return;
                }
                Err(_) => thread::sleep(self.retry_delay),
            }
        }
    }
}

/// Sink shipping batches of records to a remote endpoint
///
/// `write` only enqueues; a full buffer drops the record and counts it.
///
/// # Example
///
/// ```no_run
/// use fanout_logger::{BulkIndexEnvelope, HttpSink, HttpSinkConfig, HttpTransport, Sink};
///
/// let transport = HttpTransport::new(vec!["http://localhost:9200/_bulk".to_string()]).unwrap();
/// let envelope = BulkIndexEnvelope::new("billing", "prod").with_index_format("logs-%Y.%m.%d");
/// let sink = HttpSink::new("elastic", transport, envelope, HttpSinkConfig::default()).unwrap();
/// sink.close().unwrap();
/// ```
pub struct HttpSink {
    shared: Arc<Shared>,
    sender: Sender<Arc<LogEntry>>,
    capacity: usize,
    shutdown_timeout: Duration,
    flusher: Mutex<Option<thread::JoinHandle<()>>>,
}

impl HttpSink {
    pub fn new(
        name: &str,
        transport: impl Transport + 'static,
        envelope: impl Envelope + 'static,
        config: HttpSinkConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = bounded(config.capacity);
        let shared = Arc::new(Shared {
            name: name.to_string(),
            metrics: QueueMetrics::new(),
            closed: AtomicBool::new(false),
        });

        let flush_loop = FlushLoop {
            shared: Arc::clone(&shared),
            receiver,
            transport: Box::new(transport),
            envelope: Box::new(envelope),
            limiter: config.rate_limit.map(RateLimiter::new),
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            retry_delay: config.retry_delay,
            max_attempts: config.max_attempts,
        };

        let handle = thread::Builder::new()
            .name(format!("{}-flush", name))
            .spawn(move || flush_loop.run())
            .map_err(|e| LoggerError::io_operation("spawn flush thread", name, e))?;

        Ok(Self {
            shared,
            sender,
            capacity: config.capacity,
            shutdown_timeout: config.shutdown_timeout,
            flusher: Mutex::new(Some(handle)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.shared.metrics
    }

    fn dropped(&self) -> LoggerError {
        let dropped_count = self.shared.metrics.record_enqueue_error() + 1;
        if dropped_count == 1 || dropped_count % 1000 == 0 {
            eprintln!(
                "[LOGGER WARNING] Output '{}' buffer full, {} logs dropped.",
                self.shared.name, dropped_count
            );
        }
        LoggerError::queue_full(self.sender.len(), self.capacity)
    }

    fn join_flusher(&self) {
        let Some(handle) = self.flusher.lock().take() else {
            return;
        };
        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!("[LOGGER ERROR] Flush thread panicked during shutdown: {:?}", e);
                }
                return;
            }
            if start.elapsed() >= self.shutdown_timeout {
                eprintln!(
                    "[LOGGER WARNING] Output '{}' did not flush within {:?}. Some logs may be lost.",
                    self.shared.name, self.shutdown_timeout
                );
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Sink for HttpSink {
    fn write(&self, entry: &Arc<LogEntry>) -> Result<()> {
        let _writer = WriterGuard::enter(&self.shared.metrics);

        if self.is_closed() {
            self.shared.metrics.record_enqueue_error();
            return Err(LoggerError::queue_closed(self.shared.name.clone()));
        }

        match self.sender.try_send(Arc::clone(entry)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(self.dropped()),
            Err(TrySendError::Disconnected(_)) => {
                self.shared.metrics.record_enqueue_error();
                Err(LoggerError::queue_closed(self.shared.name.clone()))
            }
        }
    }

    /// Flush what is buffered, then stop the flush thread
    fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.join_flusher();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.shared.name
    }

    fn supports_concurrent_writes(&self) -> bool {
        true
    }

    fn stats(&self) -> Option<QueueStats> {
        Some(
            self.shared
                .metrics
                .snapshot(self.capacity, self.sender.len(), Backpressure::Drop),
        )
    }
}

impl Drop for HttpSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            eprintln!("[LOGGER ERROR] Failed to close output '{}': {}", self.name(), e);
        }
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink")
            .field("name", &self.shared.name)
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(feature = "network")]
pub use http::HttpTransport;

#[cfg(feature = "network")]
mod http {
    use super::Transport;
    use crate::core::{LoggerError, Result};
    use reqwest::blocking::Client;
    use reqwest::header::CONTENT_TYPE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Blocking HTTP POST transport
    ///
    /// Requests go to the current URL; after a failure the next request
    /// goes to the following URL in the list.
    #[derive(Debug)]
    pub struct HttpTransport {
        client: Client,
        urls: Vec<String>,
        headers: Vec<(String, String)>,
        basic_auth: Option<(String, String)>,
        current: AtomicUsize,
    }

    impl HttpTransport {
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

        pub fn new(urls: Vec<String>) -> Result<Self> {
            Self::with_timeout(urls, Self::DEFAULT_TIMEOUT)
        }

        pub fn with_timeout(urls: Vec<String>, timeout: Duration) -> Result<Self> {
            if urls.is_empty() {
                return Err(LoggerError::config("http transport", "at least one URL is required"));
            }
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| LoggerError::config("http transport", e.to_string()))?;

            Ok(Self {
                client,
                urls,
                headers: Vec::new(),
                basic_auth: None,
                current: AtomicUsize::new(0),
            })
        }

        #[must_use]
        pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.headers.push((name.into(), value.into()));
            self
        }

        /// Basic authentication header
        #[must_use]
        pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
            self.basic_auth = Some((user.into(), password.into()));
            self
        }

        fn current_url(&self) -> &str {
            let idx = self.current.load(Ordering::Relaxed) % self.urls.len();
            &self.urls[idx]
        }

        fn advance(&self) {
            self.current.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Transport for HttpTransport {
        fn post(&self, body: &[u8], content_type: &str) -> Result<()> {
            let url = self.current_url().to_string();
            let mut request = self
                .client
                .post(&url)
                .header(CONTENT_TYPE, content_type)
                .body(body.to_vec());
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some((user, password)) = &self.basic_auth {
                request = request.basic_auth(user, Some(password));
            }

            let outcome = match request.send() {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response.text().unwrap_or_default();
                    Err(LoggerError::transport(&url, Some(status), text))
                }
                Err(e) => Err(LoggerError::transport(&url, None, e.to_string())),
            };

            if outcome.is_err() {
                self.advance();
            }
            outcome
        }

        fn endpoint(&self) -> String {
            self.current_url().to_string()
        }
    }
}
