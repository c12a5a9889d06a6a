//! Lock-free level registry
//!
//! The registry publishes one immutable [`LevelMap`] through an
//! [`ArcSwap`]. Dispatch loads the current table without locking and reads
//! the sink set of one level from it. Every registration change builds a new
//! table from the current one and installs it with compare-and-swap,
//! retrying when another change won the race. Level sets that a change does
//! not touch are shared between the old and the new table.
//!
//! All levels live behind the same pointer, so a change is visible on every
//! level at once: no dispatch can observe a sink on WARN but not yet on
//! ERROR.

use super::{
    log_entry::LogEntry,
    log_level::LogLevel,
    sink::{close_reporting, guarded_write, SharedSink},
};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Immutable name → sink mapping for one level
pub type LevelSinks = Arc<HashMap<String, SharedSink>>;

/// Immutable per-level sink table
#[derive(Clone, Default)]
pub struct LevelMap {
    levels: [LevelSinks; LogLevel::COUNT],
}

impl LevelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sinks interested in `level`
    pub fn sinks(&self, level: LogLevel) -> &LevelSinks {
        &self.levels[level.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|sinks| sinks.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.levels.iter().any(|sinks| sinks.contains_key(name))
    }

    /// Levels on which `name` is registered, in ascending order
    pub fn levels_of(&self, name: &str) -> Vec<LogLevel> {
        LogLevel::ALL
            .iter()
            .copied()
            .filter(|level| self.sinks(*level).contains_key(name))
            .collect()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .levels
            .iter()
            .flat_map(|sinks| sinks.keys().cloned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        names
    }

    /// Handle registered under `name`, whichever level holds it
    pub fn get(&self, name: &str) -> Option<&SharedSink> {
        self.levels.iter().find_map(|sinks| sinks.get(name))
    }

    /// Every registration as `(name, sink)`, sorted by name
    pub fn outputs(&self) -> Vec<(String, SharedSink)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let sink = self.get(&name).cloned()?;
                Some((name, sink))
            })
            .collect()
    }

    /// Copy of this table with `name` bound to `sink` on exactly `levels`
    #[must_use]
    pub fn with_output(&self, name: &str, sink: &SharedSink, levels: &[LogLevel]) -> Self {
        let mut next = self.without_output(name);
        for level in levels {
            let slot = &mut next.levels[level.index()];
            let mut sinks: HashMap<String, SharedSink> = (**slot).clone();
            sinks.insert(name.to_string(), Arc::clone(sink));
            *slot = Arc::new(sinks);
        }
        next
    }

    /// Copy of this table with `name` removed from every level
    #[must_use]
    pub fn without_output(&self, name: &str) -> Self {
        let mut next = self.clone();
        for slot in next.levels.iter_mut() {
            if slot.contains_key(name) {
                let mut sinks: HashMap<String, SharedSink> = (**slot).clone();
                sinks.remove(name);
                *slot = Arc::new(sinks);
            }
        }
        next
    }

    /// Each distinct sink handle once, with one of its names
    fn distinct_sinks(&self) -> Vec<(String, SharedSink)> {
        let mut seen = HashSet::new();
        self.outputs()
            .into_iter()
            .filter(|(_, sink)| seen.insert(sink_addr(sink)))
            .collect()
    }
}

impl fmt::Debug for LevelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for level in LogLevel::ALL {
            let mut names: Vec<&String> = self.sinks(level).keys().collect();
            names.sort();
            map.entry(&level, &names);
        }
        map.finish()
    }
}

fn sink_addr(sink: &SharedSink) -> *const u8 {
    Arc::as_ptr(sink) as *const u8
}

/// Result of fanning one record out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Sinks that accepted the record
    pub delivered: usize,
    /// Sinks that refused or failed it
    pub failed: usize,
}

/// Concurrently reconfigurable level → sinks table
///
/// # Example
///
/// ```
/// use fanout_logger::{ConsoleSink, LevelRegistry, LogLevel};
/// use std::sync::Arc;
///
/// let registry = LevelRegistry::new();
/// registry.register("console", Arc::new(ConsoleSink::stderr()), LogLevel::Warn);
///
/// assert!(registry.snapshot(LogLevel::Info).is_empty());
/// assert!(registry.snapshot(LogLevel::Error).contains_key("console"));
///
/// assert!(registry.unregister("console"));
/// ```
pub struct LevelRegistry {
    table: ArcSwap<LevelMap>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(LevelMap::new()),
        }
    }

    /// Install `sink` on every level at or above `threshold`
    ///
    /// A previous registration under the same name is replaced and closed.
    pub fn register(&self, name: &str, sink: SharedSink, threshold: LogLevel) {
        self.register_levels(name, sink, threshold.at_or_above());
    }

    /// Install `sink` on exactly the given levels
    pub fn register_levels(&self, name: &str, sink: SharedSink, levels: &[LogLevel]) {
        let previous = self.table.rcu(|current| current.with_output(name, &sink, levels));

        if let Some(replaced) = previous.get(name) {
            if sink_addr(replaced) != sink_addr(&sink) {
                close_reporting(name, replaced.as_ref());
            }
        }
    }

    /// Remove `name` from every level, then close its sink
    ///
    /// Returns `false` when nothing was registered under `name`. Concurrent
    /// calls for the same name close the sink once: only the call whose swap
    /// removed it sees the handle.
    pub fn unregister(&self, name: &str) -> bool {
        let previous = self.table.rcu(|current| {
            if current.contains(name) {
                Arc::new(current.without_output(name))
            } else {
                Arc::clone(current)
            }
        });

        match previous.get(name) {
            Some(sink) => {
                close_reporting(name, sink.as_ref());
                true
            }
            None => false,
        }
    }

    /// Remove every registration and close each distinct sink once
    pub fn clear(&self) -> usize {
        let previous = self.table.swap(Arc::new(LevelMap::new()));
        let sinks = previous.distinct_sinks();
        for (name, sink) in &sinks {
            close_reporting(name, sink.as_ref());
        }
        sinks.len()
    }

    /// Current sink set for `level`
    #[inline]
    pub fn snapshot(&self, level: LogLevel) -> LevelSinks {
        Arc::clone(self.table.load().sinks(level))
    }

    /// Whether any sink observes `level`
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        !self.table.load().sinks(level).is_empty()
    }

    /// Copy of the whole table
    pub fn level_map(&self) -> Arc<LevelMap> {
        self.table.load_full()
    }

    /// Publish `map` as the whole table, returning the one it replaced
    ///
    /// Nothing is closed: sinks in the returned table stay open and belong
    /// to the caller.
    pub fn set_level_map(&self, map: LevelMap) -> Arc<LevelMap> {
        self.table.swap(Arc::new(map))
    }

    /// Forward `entry` to every sink interested in its level
    pub fn dispatch(&self, entry: &Arc<LogEntry>) -> Dispatch {
        Self::deliver(&self.snapshot(entry.level), entry)
    }

    /// Forward `entry` to every sink of an already loaded snapshot
    pub fn deliver(sinks: &LevelSinks, entry: &Arc<LogEntry>) -> Dispatch {
        let mut outcome = Dispatch::default();
        for sink in sinks.values() {
            match guarded_write(sink.as_ref(), entry) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => outcome.failed += 1,
            }
        }
        outcome
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LevelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelRegistry")
            .field("table", &*self.table.load())
            .finish()
    }
}
