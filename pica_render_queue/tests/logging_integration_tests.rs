//! Integration tests for render queue logging
//!
//! These tests verify that scheduler events reach a custom logger.
//! No hardware required.
//!
//! Run with: cargo test --test logging_integration_tests

use pica_render_queue::pica::gpu::{HardwareEvent, MockGpu, MockGpuConfig};
use pica_render_queue::pica::log::{self, Logger, LogEntry, LogSeverity};
use pica_render_queue::pica::{Scheduler, SchedulerConfig};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn manual_scheduler() -> Scheduler<MockGpu> {
    Scheduler::new(MockGpu::new(MockGpuConfig::manual()), SchedulerConfig::default()).unwrap()
}

fn find<'a>(entries: &'a [LogEntry], severity: LogSeverity, text: &str) -> Option<&'a LogEntry> {
    entries
        .iter()
        .find(|e| e.severity == severity && e.message.contains(text))
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_scheduler_startup_is_logged() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let _s = manual_scheduler();

    {
        let captured = entries.lock().unwrap();
        let entry = find(&captured, LogSeverity::Info, "Render queue ready").unwrap();
        assert_eq!(entry.source, "pica::Scheduler");
        assert!(entry.file.is_none());
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_integration_spurious_completions_warn() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let mut s = manual_scheduler();
    s.advance(HardwareEvent::ClearDone);
    s.advance(HardwareEvent::TransferDone);

    {
        let captured = entries.lock().unwrap();
        assert!(find(&captured, LogSeverity::Warn, "Clear completion").is_some());
        assert!(find(&captured, LogSeverity::Warn, "Transfer completion").is_some());
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_integration_rejected_frame_rate_warns() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let mut s = manual_scheduler();
    assert_eq!(s.frame_rate(120.0), 60.0);

    {
        let captured = entries.lock().unwrap();
        let entry = find(&captured, LogSeverity::Warn, "Rejected frame rate").unwrap();
        assert_eq!(entry.source, "pica::FramePacer");
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_integration_invariant_violation_logs_error() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);

    let mut s = manual_scheduler();
    let result = panic::catch_unwind(AssertUnwindSafe(|| s.advance(HardwareEvent::RenderDone)));
    assert!(result.is_err());

    {
        let captured = entries.lock().unwrap();
        let entry = find(&captured, LogSeverity::Error, "Invariant violation").unwrap();
        assert!(entry.file.is_some());
        assert!(entry.line.is_some());
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_integration_reset_logger() {
    let (test_logger, entries) = TestLogger::new();
    log::set_logger(test_logger);
    log::reset_logger();

    let _s = manual_scheduler();
    assert!(entries.lock().unwrap().is_empty());
}
