//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry formatting and DefaultLogger.

use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "lumen::test".to_string(),
        message: "pass encoded".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Warn.label(), "WARN ");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = entry(LogSeverity::Info, None, None).format_plain();
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[lumen::test]"));
    assert!(line.ends_with("pass encoded"));
}

#[test]
fn test_format_plain_with_location() {
    let line = entry(LogSeverity::Error, Some("render_pass.rs"), Some(42)).format_plain();
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("pass encoded (render_pass.rs:42)"));
}

#[test]
fn test_format_plain_needs_both_file_and_line() {
    let line = entry(LogSeverity::Error, Some("render_pass.rs"), None).format_plain();
    assert!(!line.contains("render_pass.rs"));
}

#[test]
fn test_log_entry_clone() {
    let original = entry(LogSeverity::Debug, Some("a.rs"), Some(1));
    let cloned = original.clone();
    assert_eq!(cloned.severity, original.severity);
    assert_eq!(cloned.source, original.source);
    assert_eq!(cloned.line, Some(1));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_does_not_panic() {
    let logger = DefaultLogger;
    logger.log(&entry(LogSeverity::Trace, None, None));
    logger.log(&entry(LogSeverity::Error, Some("x.rs"), Some(7)));
}
