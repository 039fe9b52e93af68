//! Unit tests for surface_chain.rs

use crate::error::Error;
use crate::frame::surface_chain::*;
use crate::graphics_device::{
    AcquireOutcome, Extent2D, GraphicsDevice, MockGraphicsDevice, MockState, PresentMode,
    PresentOutcome, SurfaceCapabilities, TextureFormat,
};

fn caps(current: Option<Extent2D>, min_images: u32, max_images: u32) -> SurfaceCapabilities {
    SurfaceCapabilities {
        current_extent: current,
        min_image_count: min_images,
        max_image_count: max_images,
        ..MockState::default_surface()
    }
}

// ============================================================================
// Selection rules
// ============================================================================

#[test]
fn test_choose_format_prefers_in_order() {
    let supported = [TextureFormat::R8G8B8A8_SRGB, TextureFormat::B8G8R8A8_SRGB];
    let preferred = [TextureFormat::B8G8R8A8_SRGB, TextureFormat::R8G8B8A8_SRGB];
    assert_eq!(choose_format(&preferred, &supported), Some(TextureFormat::B8G8R8A8_SRGB));
}

#[test]
fn test_choose_format_falls_back_to_first_supported() {
    let supported = [TextureFormat::A2B10G10R10_UNORM, TextureFormat::R8G8B8A8_UNORM];
    let preferred = [TextureFormat::B8G8R8A8_SRGB];
    assert_eq!(choose_format(&preferred, &supported), Some(TextureFormat::A2B10G10R10_UNORM));
    assert_eq!(choose_format(&preferred, &[]), None);
}

#[test]
fn test_choose_present_mode() {
    let supported = [PresentMode::Fifo, PresentMode::Mailbox];
    assert_eq!(choose_present_mode(PresentMode::Mailbox, &supported), PresentMode::Mailbox);
    assert_eq!(choose_present_mode(PresentMode::Immediate, &supported), PresentMode::Fifo);
}

#[test]
fn test_choose_extent() {
    let defined = caps(Some(Extent2D::new(800, 600)), 2, 8);
    assert_eq!(choose_extent(&defined, Extent2D::new(1920, 1080)), Extent2D::new(800, 600));

    let undefined = caps(None, 2, 8);
    assert_eq!(choose_extent(&undefined, Extent2D::new(1920, 1080)), Extent2D::new(1920, 1080));
    assert_eq!(choose_extent(&undefined, Extent2D::new(9000, 0)), Extent2D::new(4096, 1));
}

#[test]
fn test_choose_image_count() {
    assert_eq!(choose_image_count(&caps(None, 2, 8)), 3);
    assert_eq!(choose_image_count(&caps(None, 3, 3)), 3);
    // 0 = unbounded
    assert_eq!(choose_image_count(&caps(None, 4, 0)), 5);
}

// ============================================================================
// Build / destroy
// ============================================================================

#[test]
fn test_build_creates_views_depth_and_framebuffers() {
    let mut device = MockGraphicsDevice::new();
    let chain = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default()).unwrap();

    assert_eq!(chain.image_count(), 3);
    assert_eq!(chain.extent(), Extent2D::new(800, 600));
    assert_eq!(chain.format(), TextureFormat::B8G8R8A8_SRGB);
    assert_eq!(chain.present_mode(), PresentMode::Fifo);
    assert!(chain.depth_attachment().is_some());

    {
        let state = device.state();
        assert_eq!(state.views.len(), 3);
        assert_eq!(state.framebuffers.len(), 3);
        assert_eq!(state.depth_attachments.len(), 1);
        // Every framebuffer shares the one depth attachment
        assert!(state.framebuffers.values().all(|fb| fb.depth.map(|(d, _)| d) == chain.depth_attachment()));
    }

    let image = chain.image(2).unwrap();
    assert_eq!(image.index, 2);
    assert!(chain.image(3).is_none());

    chain.destroy(&mut device);
    assert_eq!(device.state().live_objects(), 0);
}

#[test]
fn test_build_without_depth() {
    let mut device = MockGraphicsDevice::new();
    let config = SurfaceChainConfig { depth_format: None, ..Default::default() };
    let chain = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &config).unwrap();

    assert!(chain.depth_attachment().is_none());
    assert!(device.state().depth_attachments.is_empty());
    chain.destroy(&mut device);
}

#[test]
fn test_build_uses_desired_extent_when_surface_undefined() {
    let mut device = MockGraphicsDevice::with_surface(caps(None, 2, 8));
    let chain = SurfaceChain::build(&mut device, Extent2D::new(1280, 720), &SurfaceChainConfig::default()).unwrap();
    assert_eq!(chain.extent(), Extent2D::new(1280, 720));
    chain.destroy(&mut device);
}

#[test]
fn test_build_rejects_degenerate_extent() {
    let mut device = MockGraphicsDevice::with_surface(caps(Some(Extent2D::new(0, 0)), 2, 8));
    let result = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default());

    assert!(matches!(result, Err(Error::ChainCreation(_))));
    assert_eq!(device.state().counters.swapchains_created, 0);
}

#[test]
fn test_build_rejects_empty_format_list() {
    let surface = SurfaceCapabilities { formats: Vec::new(), ..MockState::default_surface() };
    let mut device = MockGraphicsDevice::with_surface(surface);
    let result = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default());
    assert!(matches!(result, Err(Error::ChainCreation(_))));
}

#[test]
fn test_build_failure_releases_partial_resources() {
    let mut device = MockGraphicsDevice::new();
    device.state().fail_framebuffer_creation = true;

    let result = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default());
    assert!(matches!(result, Err(Error::ChainCreation(_))));

    let state = device.state();
    assert_eq!(state.counters.swapchains_created, 1);
    assert_eq!(state.counters.swapchains_destroyed, 1);
    assert_eq!(state.live_objects(), 0);
}

#[test]
fn test_swapchain_creation_failure_maps_to_chain_creation() {
    let mut device = MockGraphicsDevice::new();
    device.state().fail_swapchain_creations = 1;
    let result = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default());
    assert!(matches!(result, Err(Error::ChainCreation(_))));
}

#[test]
fn test_rebuild_at_same_extent_is_idempotent() {
    let mut device = MockGraphicsDevice::new();
    let config = SurfaceChainConfig::default();

    let first = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &config).unwrap();
    let (count, extent) = (first.image_count(), first.extent());
    first.destroy(&mut device);

    let second = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &config).unwrap();
    assert_eq!(second.image_count(), count);
    assert_eq!(second.extent(), extent);
    second.destroy(&mut device);
}

// ============================================================================
// Acquire / present
// ============================================================================

#[test]
fn test_acquire_and_present() {
    let mut device = MockGraphicsDevice::new();
    let chain = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default()).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    let outcome = chain.acquire_next(&mut device, None, semaphore).unwrap();
    assert_eq!(outcome, AcquireOutcome::Ready(0));
    assert_eq!(chain.present(&mut device, 0, semaphore).unwrap(), PresentOutcome::Presented);
}

#[test]
fn test_present_error_maps_to_frame_error() {
    let mut device = MockGraphicsDevice::new();
    let chain = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default()).unwrap();
    let semaphore = device.create_semaphore().unwrap();

    let result = chain.present(&mut device, 7, semaphore);
    assert!(matches!(result, Err(Error::Frame(_))));
}

#[test]
fn test_acquire_error_maps_to_acquire_error() {
    let mut device = MockGraphicsDevice::new();
    let chain = SurfaceChain::build(&mut device, Extent2D::new(800, 600), &SurfaceChainConfig::default()).unwrap();
    let semaphore = device.create_semaphore().unwrap();
    device.state().scripted_acquires.push_back(AcquireOutcome::Ready(9));

    let result = chain.acquire_next(&mut device, None, semaphore);
    assert!(matches!(result, Err(Error::Acquire(_))));
}
