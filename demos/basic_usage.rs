//! Basic logger usage example
//!
//! Demonstrates console output, thresholds, positional arguments and
//! correlation contexts.
//!
//! Run with: cargo run --example basic_usage

use fanout_logger::prelude::*;
use fanout_logger::{info, warn};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Fanout Logger - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .output("stdout", Arc::new(ConsoleSink::stdout()), LogLevel::Trace)
        .build();

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");

    println!("\n2. Raising the threshold to INFO - trace and debug won't show:");
    logger.add_output("stdout", Arc::new(ConsoleSink::stdout()), LogLevel::Info);
    logger.trace("Trace message (hidden)");
    logger.debug("Debug message (hidden)");
    logger.info("Info message (visible)");

    println!("\n3. Positional arguments:");
    let port = 8080;
    info!(logger, "Server listening on port {}", port);
    warn!(logger, "Retry attempt {} of {}", 3, 5);

    println!("\n4. Correlation context:");
    {
        let _guard = LogContext::new("req-7f3a").with_field("user", "alice").enter();
        logger.info("Handling request");
    }
    logger.info("Outside the request");

    println!("\n5. Errors only on stderr:");
    logger.add_output_levels("stderr", Arc::new(ConsoleSink::stderr()), &[LogLevel::Error]);
    logger.error("Shown on stdout and stderr");
    println!("   outputs: {:?}", logger.outputs());

    logger.close();
    println!("\n=== Example completed successfully! ===");
    Ok(())
}
