//! File logging example
//!
//! Demonstrates a queued rotating file output and setup from
//! configuration records.
//!
//! Run with: cargo run --example file_logging

use fanout_logger::prelude::*;
use fanout_logger::{setup_logger, SinkConfig};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Fanout Logger - File Logging Example ===\n");

    let dir = std::env::temp_dir().join("fanout_logger_demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("app.log");

    println!("1. Queued rotating file at {}", path.display());
    let file = RotatingFileSink::new(
        &path,
        RotationPolicy::new()
            .with_max_size(4 * 1024)
            .with_max_backups(3)
            .with_compression(true),
    )?;
    let queue = AsyncQueue::new(
        file,
        QueueConfig::new(1024).with_backpressure(Backpressure::Block),
    )?;

    let logger = Logger::new().with_output("app.log", Arc::new(queue), LogLevel::Debug);
    for i in 0..200 {
        fanout_logger::info!(logger, "processed batch {} of {}", i + 1, 200);
    }

    for (name, stats) in logger.stats() {
        println!(
            "   {}: depth {}/{}, written {}, errors {}",
            name,
            stats.depth,
            stats.capacity,
            stats.written,
            stats.errors()
        );
    }
    logger.close();

    println!("\n2. Logger built from configuration records:");
    let configs: Vec<SinkConfig> = serde_json::from_str(&format!(
        r#"[
            {{"LogType": "stdout", "LogLevel": 1, "LogDate": "%H:%M:%S%.3f"}},
            {{"LogType": "filetimequeue", "LogLevel": 2, "LogFile": "{}",
              "LogDuration": 3600, "LogBackup": 24, "LogQueue": 256, "LogWriters": 1}}
        ]"#,
        dir.join("hourly.log").display()
    ))?;
    let logger = setup_logger(&configs);
    logger.warn("configured from records");
    logger.close();

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
