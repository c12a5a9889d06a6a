//! Property-based tests using proptest

use fanout_logger::{
    truncate_at_char_boundary, FieldValue, FormatterChain, LevelRegistry, LogContext, LogEntry,
    LogLevel, RateLimit, RateLimiter, Result, Sink, TimestampFormat,
};
use proptest::prelude::*;
use std::sync::Arc;

struct NullSink;

impl Sink for NullSink {
    fn write(&self, _entry: &Arc<LogEntry>) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

fn any_level() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

// Level tests
proptest! {
    #[test]
    fn test_log_level_str_roundtrip(level in any_level()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(parsed, level);
    }

    #[test]
    fn test_log_level_case_insensitive(level in any_level(), use_lower in any::<bool>()) {
        let text = if use_lower {
            level.to_str().to_lowercase()
        } else {
            level.to_str().to_string()
        };
        prop_assert_eq!(text.parse::<LogLevel>().unwrap(), level);
    }

    #[test]
    fn test_threshold_mapping_is_monotonic(a in 0i64..=4, b in 0i64..=4) {
        if a <= b {
            prop_assert!(LogLevel::from_threshold(a) <= LogLevel::from_threshold(b));
        }
    }

    #[test]
    fn test_out_of_range_threshold_means_trace(
        value in prop_oneof![i64::MIN..0i64, 5i64..i64::MAX],
    ) {
        prop_assert_eq!(LogLevel::from_threshold(value), LogLevel::Trace);
    }
}

// Registry membership
proptest! {
    #[test]
    fn test_registered_sink_observes_exactly_levels_at_or_above(
        threshold in any_level(),
        level in any_level(),
    ) {
        let registry = LevelRegistry::new();
        registry.register("out", Arc::new(NullSink), threshold);

        prop_assert_eq!(registry.snapshot(level).contains_key("out"), level >= threshold);
        // ERROR is observed by every threshold
        prop_assert!(registry.snapshot(LogLevel::Error).contains_key("out"));
    }

    #[test]
    fn test_unregister_empties_every_level(threshold in any_level()) {
        let registry = LevelRegistry::new();
        registry.register("out", Arc::new(NullSink), threshold);
        prop_assert!(registry.unregister("out"));

        for level in LogLevel::ALL {
            prop_assert!(registry.snapshot(level).is_empty());
        }
    }
}

// Truncation
proptest! {
    #[test]
    fn test_truncation_is_a_bounded_prefix(text in "\\PC*", limit in 0usize..64) {
        let cut = truncate_at_char_boundary(&text, limit);

        prop_assert!(text.starts_with(cut));
        if text.len() > limit {
            prop_assert!(cut.len() <= limit);
            // at most one partial character is dropped
            prop_assert!(limit - cut.len() < 4);
        } else {
            prop_assert_eq!(cut, text.as_str());
        }
    }

    #[test]
    fn test_truncating_a_multibyte_tail(prefix in "[a-z]{0,20}", ch in "[é€😀]") {
        let text = format!("{}{}", prefix, ch);
        let limit = text.len() - 1;
        let cut = truncate_at_char_boundary(&text, limit);

        prop_assert!(cut.len() < limit);
        prop_assert_eq!(cut, prefix.as_str());
    }
}

// Message rendering
proptest! {
    #[test]
    fn test_message_never_contains_raw_line_breaks(message in "(?s).{0,64}") {
        let entry = LogEntry::new(LogLevel::Info, message);
        let rendered = entry.message();
        prop_assert!(!rendered.contains('\n'));
        prop_assert!(!rendered.contains('\r'));
        prop_assert!(!rendered.contains('\t'));
    }

    #[test]
    fn test_placeholders_take_arguments_in_order(
        args in prop::collection::vec(any::<i64>(), 0..6),
    ) {
        let template = vec!["{}"; args.len()].join(",");
        let entry = LogEntry::new(LogLevel::Debug, template)
            .with_args(args.iter().copied().map(FieldValue::from).collect());

        let expected = args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(",");
        prop_assert_eq!(entry.message(), expected);
    }

    #[test]
    fn test_surplus_arguments_are_appended(word in "[a-z]{1,10}", extra in any::<u32>()) {
        let entry = LogEntry::new(LogLevel::Info, word.clone()).with_arg(extra);
        prop_assert_eq!(entry.message(), format!("{} {}", word, extra));
    }

    #[test]
    fn test_chain_output_never_has_stray_delimiters(
        with_context in any::<bool>(),
        line in 0u32..10_000,
    ) {
        let mut entry = LogEntry::new(LogLevel::Warn, "x").with_location("src/lib.rs", line);
        if with_context {
            entry = entry.with_context(Arc::new(LogContext::new("ctx")));
        }

        let chain = FormatterChain::standard(TimestampFormat::None).with_delimiter(" | ");
        let rendered = chain.render_to_string(&entry);

        prop_assert!(!rendered.starts_with(" | "));
        prop_assert!(!rendered.ends_with(" | "));
        prop_assert_eq!(rendered.matches(" | ").count(), usize::from(with_context));
    }
}

// Token bucket
proptest! {
    #[test]
    fn test_burst_is_granted_immediately(burst in 1u32..20) {
        let mut limiter = RateLimiter::new(RateLimit::new(0.001, burst));
        for _ in 0..burst {
            prop_assert!(limiter.try_acquire());
        }
        prop_assert!(!limiter.try_acquire());
    }
}
