//! Log level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Default)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Every level, least severe first
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// Number of distinct levels
    pub const COUNT: usize = 5;

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Slot of this level in per-level tables
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Levels observed by a sink registered with this level as its threshold
    ///
    /// ```
    /// use fanout_logger::LogLevel;
    ///
    /// assert_eq!(LogLevel::Warn.at_or_above(), &[LogLevel::Warn, LogLevel::Error]);
    /// assert_eq!(LogLevel::Trace.at_or_above().len(), 5);
    /// ```
    pub fn at_or_above(&self) -> &'static [LogLevel] {
        &Self::ALL[self.index()..]
    }

    /// Map the numeric threshold used by sink configuration to a level
    ///
    /// Anything outside `1..=4` observes everything.
    pub fn from_threshold(value: i64) -> Self {
        match value {
            4 => LogLevel::Error,
            3 => LogLevel::Warn,
            2 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Trace => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_membership() {
        for threshold in LogLevel::ALL {
            let observed = threshold.at_or_above();
            for level in LogLevel::ALL {
                assert_eq!(observed.contains(&level), level >= threshold);
            }
            // ERROR is observed by every threshold
            assert!(observed.contains(&LogLevel::Error));
        }
    }

    #[test]
    fn test_from_threshold() {
        assert_eq!(LogLevel::from_threshold(0), LogLevel::Trace);
        assert_eq!(LogLevel::from_threshold(3), LogLevel::Warn);
        assert_eq!(LogLevel::from_threshold(4), LogLevel::Error);
        assert_eq!(LogLevel::from_threshold(-7), LogLevel::Trace);
        assert_eq!(LogLevel::from_threshold(99), LogLevel::Trace);
    }

    #[test]
    fn test_parse() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("Error".parse::<LogLevel>(), Ok(LogLevel::Error));
        assert!("fatal".parse::<LogLevel>().is_err());
    }
}
