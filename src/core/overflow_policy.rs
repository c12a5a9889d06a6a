//! Backpressure policies for bounded sink queues
//!
//! When a sink's queue is full, the policy decides whether the emitting
//! thread waits for room or the record is discarded and counted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy applied by `enqueue` when the queue is at capacity
///
/// # Example
///
/// ```
/// use fanout_logger::Backpressure;
/// use std::time::Duration;
///
/// // Default behavior: drop and count
/// assert_eq!(Backpressure::default(), Backpressure::Drop);
///
/// // Wait up to 50ms for a slot, then drop
/// let policy = Backpressure::BlockWithTimeout(Duration::from_millis(50));
/// assert!(policy.blocks());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backpressure {
    /// Fail immediately and increment the enqueue-error counter
    #[default]
    Drop,

    /// Block the caller until a worker makes room
    ///
    /// Warning: a stalled sink stalls every thread logging to it.
    Block,

    /// Block for at most the given duration, then drop
    BlockWithTimeout(Duration),
}

impl Backpressure {
    /// Whether the caller may be suspended by this policy
    pub fn blocks(&self) -> bool {
        !matches!(self, Backpressure::Drop)
    }
}

impl fmt::Display for Backpressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backpressure::Drop => write!(f, "Drop"),
            Backpressure::Block => write!(f, "Block"),
            Backpressure::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when records are dropped because a queue is full.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
