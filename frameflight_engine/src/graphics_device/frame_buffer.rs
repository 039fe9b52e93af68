/// Framebuffer descriptor - binds one swapchain view and the optional depth attachment
///
/// Created once per swapchain image and rebuilt together with the chain.

use crate::graphics_device::{DepthAttachmentId, Extent2D, ImageViewId, TextureFormat};

/// Descriptor for creating a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Color attachment (a swapchain image view)
    pub color_view: ImageViewId,
    /// Format of the color attachment (selects a compatible render pass)
    pub color_format: TextureFormat,
    /// Optional depth attachment, shared by every framebuffer of the chain
    pub depth: Option<(DepthAttachmentId, TextureFormat)>,
    /// Size in pixels
    pub extent: Extent2D,
}
