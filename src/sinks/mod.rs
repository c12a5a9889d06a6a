//! Sink implementations

pub mod console;
pub mod network;
pub mod rotating_file;

pub use console::ConsoleSink;
#[cfg(feature = "network")]
pub use network::HttpTransport;
pub use network::{
    truncate_at_char_boundary, BulkIndexEnvelope, ChatEnvelope, Envelope, HttpSink,
    HttpSinkConfig, Transport,
};
pub use rotating_file::{RotatingFileSink, RotationPolicy, RotationStrategy};
