/// Swapchain types - what the surface supports and what acquire/present report

use crate::graphics_device::{Extent2D, ImageUsage, PresentMode, TextureFormat};

/// Snapshot of what the presentation surface currently supports
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    /// Size of the drawable as reported by the window system.
    ///
    /// `None` when the surface lets the swapchain decide (the extent then comes
    /// from the host's last resize notification, clamped into `[min_extent, max_extent]`).
    pub current_extent: Option<Extent2D>,
    pub min_extent: Extent2D,
    pub max_extent: Extent2D,
    pub min_image_count: u32,
    /// 0 means no upper bound
    pub max_image_count: u32,
    pub formats: Vec<TextureFormat>,
    pub present_modes: Vec<PresentMode>,
}

/// Descriptor for creating a swapchain
#[derive(Debug, Clone, PartialEq)]
pub struct SwapchainDesc {
    pub extent: Extent2D,
    pub format: TextureFormat,
    pub present_mode: PresentMode,
    pub image_count: u32,
    pub usage: ImageUsage,
}

/// Result of asking the swapchain for the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; the signal semaphore will be raised when it is renderable
    Ready(u32),
    /// Image acquired and usable, but the chain no longer matches the surface exactly
    Suboptimal(u32),
    /// The chain no longer matches the drawable and must be rebuilt before use
    Stale,
    /// No image became available within the timeout
    TimedOut,
}

/// Result of handing an image back for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    Stale,
}

impl PresentOutcome {
    /// The chain should be rebuilt before the next frame
    pub fn needs_recreation(&self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}
