//! Network logging example
//!
//! Ships records to a bulk-index endpoint and alerts a chat bot on errors.
//! Both endpoints come from the environment; unreachable endpoints only
//! show up in the sink statistics.
//!
//! Run with: BULK_URL=http://localhost:9200/_bulk cargo run --example network_logging

use fanout_logger::prelude::*;
use fanout_logger::{BulkIndexEnvelope, ChatEnvelope, HttpSinkConfig, HttpTransport, RateLimit};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Fanout Logger - Network Logging Example ===\n");

    let bulk_url =
        std::env::var("BULK_URL").unwrap_or_else(|_| "http://localhost:9200/_bulk".to_string());
    let bulk = HttpSink::new(
        "bulk",
        HttpTransport::new(vec![bulk_url])?,
        BulkIndexEnvelope::new("demo", "dev").with_index_format("logs-%Y.%m.%d"),
        HttpSinkConfig::default()
            .with_batch_size(50)
            .with_flush_interval(Duration::from_millis(500))
            .with_rate_limit(RateLimit::new(5.0, 2))
            .with_retry(2, Duration::from_millis(200)),
    )?;

    let logger = Logger::new().with_output("bulk", Arc::new(bulk), LogLevel::Info);

    if let Ok(chat_url) = std::env::var("CHAT_URL") {
        let chat = HttpSink::new(
            "chat",
            HttpTransport::new(vec![chat_url])?,
            ChatEnvelope::new(-100_123).with_hostname("demo-host"),
            HttpSinkConfig::chat(),
        )?;
        logger.add_output("chat", Arc::new(chat), LogLevel::Error);
    }

    for i in 0..20 {
        fanout_logger::info!(logger, "order {} accepted", i);
    }
    logger.log_data(
        LogLevel::Warn,
        "inventory low",
        serde_json::json!({"sku": "A-17", "left": 3}),
    );
    logger.error("payment gateway timeout");

    std::thread::sleep(Duration::from_secs(1));
    for (name, stats) in logger.stats() {
        println!(
            "{}: written {}, write errors {}, dropped {}",
            name, stats.written, stats.write_errors, stats.enqueue_errors
        );
    }
    logger.close();

    println!("\n=== Example completed ===");
    Ok(())
}
