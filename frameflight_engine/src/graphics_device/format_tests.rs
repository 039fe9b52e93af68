//! Unit tests for format.rs

use crate::graphics_device::{Extent2D, TextureFormat};

#[test]
fn test_extent_degenerate() {
    assert!(Extent2D::new(0, 0).is_degenerate());
    assert!(Extent2D::new(0, 600).is_degenerate());
    assert!(Extent2D::new(800, 0).is_degenerate());
    assert!(!Extent2D::new(1, 1).is_degenerate());
}

#[test]
fn test_extent_clamp_into_range() {
    let min = Extent2D::new(64, 64);
    let max = Extent2D::new(4096, 2048);

    assert_eq!(Extent2D::new(800, 600).clamp(min, max), Extent2D::new(800, 600));
    assert_eq!(Extent2D::new(10, 10).clamp(min, max), Extent2D::new(64, 64));
    assert_eq!(Extent2D::new(9000, 9000).clamp(min, max), Extent2D::new(4096, 2048));
}

#[test]
fn test_extent_clamp_tolerates_inverted_range() {
    // Some drivers report max < min for a minimized surface; min wins
    let clamped = Extent2D::new(500, 500).clamp(Extent2D::new(1, 1), Extent2D::new(0, 0));
    assert_eq!(clamped, Extent2D::new(1, 1));
}

#[test]
fn test_extent_from_winit_size() {
    let extent: Extent2D = winit::dpi::PhysicalSize::new(1280u32, 720u32).into();
    assert_eq!(extent, Extent2D::new(1280, 720));
    assert_eq!(extent.to_string(), "1280x720");
}

#[test]
fn test_depth_format_classification() {
    assert!(TextureFormat::D32_FLOAT.is_depth());
    assert!(TextureFormat::D24_UNORM_S8_UINT.is_depth());
    assert!(TextureFormat::D24_UNORM_S8_UINT.has_stencil());
    assert!(!TextureFormat::D32_FLOAT.has_stencil());
    assert!(!TextureFormat::B8G8R8A8_SRGB.is_depth());
}
