//! Unit tests for acquire / present result classification
//!
//! No GPU required: the raw `VkResult` values are fed in directly.

use super::*;

#[test]
fn test_acquire_ready_and_suboptimal() {
    assert_eq!(acquire_outcome(Ok((2, false))).unwrap(), AcquireOutcome::Ready(2));
    assert_eq!(acquire_outcome(Ok((1, true))).unwrap(), AcquireOutcome::Suboptimal(1));
}

#[test]
fn test_acquire_out_of_date_is_stale() {
    assert_eq!(
        acquire_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
        AcquireOutcome::Stale
    );
}

#[test]
fn test_acquire_timeout() {
    assert_eq!(acquire_outcome(Err(vk::Result::TIMEOUT)).unwrap(), AcquireOutcome::TimedOut);
    assert_eq!(acquire_outcome(Err(vk::Result::NOT_READY)).unwrap(), AcquireOutcome::TimedOut);
}

#[test]
fn test_acquire_device_lost_is_error() {
    let result = acquire_outcome(Err(vk::Result::ERROR_DEVICE_LOST));
    assert!(matches!(result, Err(Error::BackendError(_))));
}

#[test]
fn test_present_outcomes() {
    assert_eq!(present_outcome(Ok(false)).unwrap(), PresentOutcome::Presented);
    assert_eq!(present_outcome(Ok(true)).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(
        present_outcome(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
        PresentOutcome::Stale
    );
    assert!(present_outcome(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
}
