//! Integration tests for the frame scheduler through the public API
//!
//! Uses the simulated device from the `mock-device` feature. No GPU required.
//!
//! Run with: cargo test --features mock-device --test scheduler_integration_tests

use frameflight_engine::frameflight::device::{
    AcquireOutcome, CommandTargetId, Extent2D, GraphicsDevice, MockGraphicsDevice,
};
use frameflight_engine::frameflight::frame::{FrameInfo, FrameScheduler, FrameStatus, SchedulerConfig};
use frameflight_engine::frameflight::log::{LogEntry, LogSeverity, Logger};
use frameflight_engine::frameflight::{Engine, Error, Result};
use serial_test::serial;
use std::sync::{Arc, Mutex};

// ============================================================================
// HELPERS
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn capture_logs() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

fn clear_pass(device: &mut MockGraphicsDevice, target: CommandTargetId, frame: &FrameInfo) -> Result<()> {
    device.begin_render_pass(target, frame.framebuffer, [0.0, 0.0, 0.0, 1.0])?;
    device.end_render_pass(target)
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_render_loop_with_resize() {
    let device = MockGraphicsDevice::new();
    let state = device.state_handle();
    let mut scheduler = FrameScheduler::new(device, Extent2D::new(800, 600), SchedulerConfig::default()).unwrap();
    let mut recorder = clear_pass;

    for frame in 0..20 {
        if frame == 10 {
            state.lock().unwrap().set_surface_extent(Some(Extent2D::new(1920, 1080)));
            scheduler.notify_resized(Extent2D::new(1920, 1080));
        }
        match scheduler.run_frame(&mut recorder).unwrap() {
            FrameStatus::Presented(presented) => assert_eq!(presented.frame_number, frame),
            FrameStatus::AcquireTimedOut => panic!("acquire should not time out"),
        }
    }

    assert_eq!(scheduler.frame_counter(), 20);
    assert_eq!(scheduler.extent(), Some(Extent2D::new(1920, 1080)));
    assert_eq!(scheduler.stats().recreations, 1);

    let counters = state.lock().unwrap().counters;
    assert_eq!(counters.presents, 20);
    assert_eq!(counters.reuse_violations, 0);
    assert_eq!(counters.semaphore_violations, 0);
    assert!(counters.max_outstanding <= 2);

    drop(scheduler);
    assert_eq!(state.lock().unwrap().live_objects(), 0);
}

#[test]
#[serial]
fn test_integration_recreation_is_logged() {
    let entries = capture_logs();

    let device = MockGraphicsDevice::new();
    let state = device.state_handle();
    let mut scheduler = FrameScheduler::new(device, Extent2D::new(800, 600), SchedulerConfig::default()).unwrap();
    let mut recorder = clear_pass;

    state.lock().unwrap().scripted_acquires.push_back(AcquireOutcome::Stale);
    scheduler.run_frame(&mut recorder).unwrap();

    let captured = entries.lock().unwrap();
    assert!(captured.iter().any(|entry| {
        entry.severity == LogSeverity::Info
            && entry.source == "frameflight::scheduler"
            && entry.message.starts_with("Swapchain recreated")
    }));
    drop(captured);

    drop(scheduler);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_failures_are_logged_with_location() {
    let entries = capture_logs();

    let device = MockGraphicsDevice::new();
    let state = device.state_handle();
    let mut scheduler = FrameScheduler::new(device, Extent2D::new(800, 600), SchedulerConfig::default()).unwrap();
    let mut recorder = clear_pass;

    state.lock().unwrap().fail_next_submit = true;
    let result = scheduler.run_frame(&mut recorder);
    assert!(matches!(result, Err(Error::Frame(_))));
    assert!(result.unwrap_err().is_fatal_for_rendering());

    let captured = entries.lock().unwrap();
    let error = captured
        .iter()
        .find(|entry| entry.source == "frameflight::scheduler" && entry.severity == LogSeverity::Error)
        .expect("submit failure should be logged");
    assert!(error.message.contains("Queue submit failed"));
    assert!(error.file.is_some());
    assert!(error.line.is_some());
    drop(captured);

    drop(scheduler);
    Engine::reset_logger();
}
