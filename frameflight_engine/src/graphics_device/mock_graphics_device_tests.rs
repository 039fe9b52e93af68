/// Unit tests for MockGraphicsDevice
///
/// The scheduler tests lean on the mock's bookkeeping, so the simulated
/// timeline itself is checked here first.

use std::time::Duration;

use crate::error::Error;
use crate::graphics_device::mock_graphics_device::*;
use crate::graphics_device::{
    AcquireOutcome, Extent2D, FramebufferDesc, GraphicsDevice, ImageUsage, PipelineStages,
    PresentMode, PresentOutcome, Submission, SwapchainDesc, TextureFormat,
};

fn swapchain_desc(extent: Extent2D, image_count: u32) -> SwapchainDesc {
    SwapchainDesc {
        extent,
        format: TextureFormat::B8G8R8A8_SRGB,
        present_mode: PresentMode::Fifo,
        image_count,
        usage: ImageUsage::COLOR_ATTACHMENT,
    }
}

// ============================================================================
// Swapchain Tests
// ============================================================================

#[test]
fn test_mock_swapchain_creation() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();

    let images = device.swapchain_images(swapchain).unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(device.state().counters.swapchains_created, 1);

    device.destroy_swapchain(swapchain);
    assert_eq!(device.state().counters.swapchains_destroyed, 1);
    assert!(device.state().images.is_empty());
}

#[test]
fn test_mock_swapchain_rejects_degenerate_extent() {
    let mut device = MockGraphicsDevice::new();
    let result = device.create_swapchain(&swapchain_desc(Extent2D::new(0, 600), 3));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_mock_swapchain_scripted_failure() {
    let mut device = MockGraphicsDevice::new();
    device.state().fail_swapchain_creations = 1;

    assert!(device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).is_err());
    assert!(device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).is_ok());
}

// ============================================================================
// Acquire / Present Tests
// ============================================================================

#[test]
fn test_mock_acquire_round_robin() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    let mut indices = Vec::new();
    for _ in 0..4 {
        match device.acquire_next_image(swapchain, None, semaphore).unwrap() {
            AcquireOutcome::Ready(index) => indices.push(index),
            other => panic!("unexpected outcome {:?}", other),
        }
        // Consume the signal so the next acquire is legal
        device.present(swapchain, *indices.last().unwrap(), semaphore).unwrap();
    }

    assert_eq!(indices, vec![0, 1, 2, 0]);
    assert_eq!(device.state().counters.semaphore_violations, 0);
}

#[test]
fn test_mock_acquire_stale_after_surface_change() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    device.state().set_surface_extent(Some(Extent2D::new(1024, 768)));

    let outcome = device.acquire_next_image(swapchain, None, semaphore).unwrap();
    assert_eq!(outcome, AcquireOutcome::Stale);
    // A failed acquire leaves the semaphore untouched
    assert!(!device.state().semaphores[semaphore]);
}

#[test]
fn test_mock_scripted_outcomes() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    device.state().scripted_acquires.push_back(AcquireOutcome::TimedOut);
    device.state().scripted_acquires.push_back(AcquireOutcome::Suboptimal(2));
    device.state().scripted_presents.push_back(PresentOutcome::Suboptimal);

    assert_eq!(device.acquire_next_image(swapchain, Some(Duration::from_millis(1)), semaphore).unwrap(), AcquireOutcome::TimedOut);
    assert_eq!(device.acquire_next_image(swapchain, None, semaphore).unwrap(), AcquireOutcome::Suboptimal(2));
    assert_eq!(device.present(swapchain, 2, semaphore).unwrap(), PresentOutcome::Suboptimal);
    assert_eq!(device.state().presented, vec![2]);
}

#[test]
fn test_mock_present_without_signal_is_a_violation() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    device.present(swapchain, 0, semaphore).unwrap();
    assert_eq!(device.state().counters.semaphore_violations, 1);
}

// ============================================================================
// Timeline Tests
// ============================================================================

#[test]
fn test_mock_fifo_completion() {
    let mut device = MockGraphicsDevice::new();
    let target_a = device.create_command_target().unwrap();
    let target_b = device.create_command_target().unwrap();
    let fence_a = device.create_fence(false).unwrap();
    let fence_b = device.create_fence(false).unwrap();

    for (target, fence) in [(target_a, fence_a), (target_b, fence_b)] {
        device.begin_commands(target).unwrap();
        device.end_commands(target).unwrap();
        device
            .submit(&Submission { command_target: target, wait: &[], signal: &[], fence: Some(fence) })
            .unwrap();
    }
    assert_eq!(device.state().outstanding(), 2);
    assert_eq!(device.state().counters.max_outstanding, 2);

    // Waiting on the first fence completes only the first submission
    assert!(device.wait_for_fence(fence_a, None).unwrap());
    assert!(device.is_fence_signaled(fence_a).unwrap());
    assert!(!device.is_fence_signaled(fence_b).unwrap());
    assert_eq!(device.state().outstanding(), 1);

    device.wait_idle().unwrap();
    assert!(device.is_fence_signaled(fence_b).unwrap());
    assert_eq!(device.state().outstanding(), 0);
}

#[test]
fn test_mock_wait_on_orphan_fence() {
    let mut device = MockGraphicsDevice::new();
    let fence = device.create_fence(false).unwrap();

    assert!(!device.wait_for_fence(fence, Some(Duration::from_millis(1))).unwrap());
    assert!(device.wait_for_fence(fence, None).is_err());
}

#[test]
fn test_mock_detects_reuse_before_completion() {
    let mut device = MockGraphicsDevice::new();
    let target = device.create_command_target().unwrap();
    let fence = device.create_fence(false).unwrap();

    device.begin_commands(target).unwrap();
    device.end_commands(target).unwrap();
    device
        .submit(&Submission { command_target: target, wait: &[], signal: &[], fence: Some(fence) })
        .unwrap();

    device.reset_fence(fence).unwrap();
    device.begin_commands(target).unwrap();
    assert_eq!(device.state().counters.reuse_violations, 2);
}

#[test]
fn test_mock_submit_consumes_and_signals_semaphores() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 3)).unwrap();
    let acquired = device.create_semaphore().unwrap();
    let rendered = device.create_semaphore().unwrap();
    let target = device.create_command_target().unwrap();

    device.acquire_next_image(swapchain, None, acquired).unwrap();
    device.begin_commands(target).unwrap();
    device.end_commands(target).unwrap();
    device
        .submit(&Submission {
            command_target: target,
            wait: &[(acquired, PipelineStages::COLOR_ATTACHMENT_OUTPUT)],
            signal: &[rendered],
            fence: None,
        })
        .unwrap();

    {
        let state = device.state();
        assert!(!state.semaphores[acquired]);
        assert!(state.semaphores[rendered]);
    }
    device.present(swapchain, 0, rendered).unwrap();
    assert_eq!(device.state().counters.semaphore_violations, 0);
}

#[test]
fn test_mock_scripted_submit_failure() {
    let mut device = MockGraphicsDevice::new();
    let target = device.create_command_target().unwrap();
    device.state().fail_next_submit = true;

    device.begin_commands(target).unwrap();
    device.end_commands(target).unwrap();
    let submission = Submission { command_target: target, wait: &[], signal: &[], fence: None };

    assert!(matches!(device.submit(&submission), Err(Error::BackendError(_))));
    assert!(device.submit(&submission).is_ok());
}

// ============================================================================
// Command recording Tests
// ============================================================================

#[test]
fn test_mock_render_pass_requires_recording() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 2)).unwrap();
    let image = device.swapchain_images(swapchain).unwrap()[0];
    let view = device.create_image_view(image, TextureFormat::B8G8R8A8_SRGB).unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDesc {
            color_view: view,
            color_format: TextureFormat::B8G8R8A8_SRGB,
            depth: None,
            extent: Extent2D::new(800, 600),
        })
        .unwrap();
    let target = device.create_command_target().unwrap();

    assert!(device.begin_render_pass(target, framebuffer, [0.0; 4]).is_err());

    device.begin_commands(target).unwrap();
    device.begin_render_pass(target, framebuffer, [0.0, 0.0, 0.0, 1.0]).unwrap();
    // Cannot close the command target with a render pass still open
    assert!(device.end_commands(target).is_err());
    device.end_render_pass(target).unwrap();
    device.end_commands(target).unwrap();

    assert_eq!(device.state().counters.render_passes, 1);
}

#[test]
fn test_mock_framebuffer_failure_is_out_of_memory() {
    let mut device = MockGraphicsDevice::new();
    let swapchain = device.create_swapchain(&swapchain_desc(Extent2D::new(800, 600), 2)).unwrap();
    let image = device.swapchain_images(swapchain).unwrap()[0];
    let view = device.create_image_view(image, TextureFormat::B8G8R8A8_SRGB).unwrap();
    let desc = FramebufferDesc {
        color_view: view,
        color_format: TextureFormat::B8G8R8A8_SRGB,
        depth: None,
        extent: Extent2D::new(800, 600),
    };

    device.state().fail_framebuffer_creation = true;
    assert_eq!(device.create_framebuffer(&desc), Err(Error::OutOfMemory));

    device.state().fail_framebuffer_creation = false;
    assert!(device.create_framebuffer(&desc).is_ok());
}

#[test]
fn test_mock_depth_attachment_requires_depth_format() {
    let mut device = MockGraphicsDevice::new();
    assert!(device.create_depth_attachment(Extent2D::new(800, 600), TextureFormat::B8G8R8A8_SRGB).is_err());
    assert!(device.create_depth_attachment(Extent2D::new(800, 600), TextureFormat::D32_FLOAT).is_ok());
}

#[test]
fn test_mock_state_handle_is_shared() {
    let device = MockGraphicsDevice::new();
    let handle = device.state_handle();

    std::thread::spawn(move || {
        lock(&handle).set_surface_extent(None);
    })
    .join()
    .unwrap();

    assert_eq!(device.state().surface.current_extent, None);
}
