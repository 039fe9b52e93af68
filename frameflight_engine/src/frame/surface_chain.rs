/// Surface chain - the rotating set of presentable images and everything sized to them
///
/// Owns the swapchain, one view and one framebuffer per image, and the shared
/// depth attachment. All of it is created and destroyed as one batch.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, DepthAttachmentId, Extent2D, FramebufferDesc, FramebufferId, GraphicsDevice,
    ImageId, ImageUsage, ImageViewId, PresentMode, PresentOutcome, SemaphoreId,
    SurfaceCapabilities, SwapchainDesc, SwapchainId, TextureFormat,
};
use crate::{engine_bail, engine_debug, engine_err, engine_info};

const SOURCE: &str = "frameflight::surface_chain";

/// How the chain is built
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceChainConfig {
    /// Color formats in order of preference
    pub preferred_formats: Vec<TextureFormat>,
    /// Used when the surface supports it, otherwise FIFO
    pub preferred_present_mode: PresentMode,
    /// Depth attachment format (`None` = no depth attachment)
    pub depth_format: Option<TextureFormat>,
    pub image_usage: ImageUsage,
}

impl Default for SurfaceChainConfig {
    fn default() -> Self {
        Self {
            preferred_formats: vec![TextureFormat::B8G8R8A8_SRGB, TextureFormat::R8G8B8A8_SRGB],
            preferred_present_mode: PresentMode::Fifo,
            depth_format: Some(TextureFormat::D32_FLOAT),
            image_usage: ImageUsage::COLOR_ATTACHMENT,
        }
    }
}

// ============================================================================
// Selection rules
// ============================================================================

/// First preferred format the surface supports, else the first supported format
pub fn choose_format(preferred: &[TextureFormat], supported: &[TextureFormat]) -> Option<TextureFormat> {
    preferred
        .iter()
        .find(|format| supported.contains(format))
        .or_else(|| supported.first())
        .copied()
}

/// Preferred mode if supported, else FIFO (always available)
pub fn choose_present_mode(preferred: PresentMode, supported: &[PresentMode]) -> PresentMode {
    if supported.contains(&preferred) {
        preferred
    } else {
        PresentMode::Fifo
    }
}

/// The surface's current extent when defined, else `desired` clamped into the supported range
pub fn choose_extent(caps: &SurfaceCapabilities, desired: Extent2D) -> Extent2D {
    match caps.current_extent {
        Some(current) => current,
        None => desired.clamp(caps.min_extent, caps.max_extent),
    }
}

/// One more than the minimum, capped at the maximum (0 = unbounded)
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        count.min(caps.max_image_count)
    } else {
        count
    }
}

// ============================================================================
// SurfaceChain
// ============================================================================

/// One presentable image and the objects bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentableImage {
    pub index: u32,
    pub image: ImageId,
    pub view: ImageViewId,
    pub framebuffer: FramebufferId,
}

#[derive(Debug)]
pub struct SurfaceChain {
    swapchain: SwapchainId,
    images: Vec<ImageId>,
    views: Vec<ImageViewId>,
    framebuffers: Vec<FramebufferId>,
    depth: Option<(DepthAttachmentId, TextureFormat)>,
    format: TextureFormat,
    present_mode: PresentMode,
    extent: Extent2D,
}

impl SurfaceChain {
    /// Build a chain for the current surface
    ///
    /// `desired_extent` is only used when the surface leaves the size to the
    /// swapchain. On failure, everything created so far is released.
    pub fn build<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        desired_extent: Extent2D,
        config: &SurfaceChainConfig,
    ) -> Result<Self> {
        let caps = device.surface_capabilities().map_err(|e| {
            engine_err!(SOURCE, kind = Error::ChainCreation, "Failed to query surface capabilities: {}", e)
        })?;

        let format = match choose_format(&config.preferred_formats, &caps.formats) {
            Some(format) => format,
            None => engine_bail!(SOURCE, kind = Error::ChainCreation, "Surface reports no supported formats"),
        };
        let present_mode = choose_present_mode(config.preferred_present_mode, &caps.present_modes);
        let extent = choose_extent(&caps, desired_extent);
        if extent.is_degenerate() {
            engine_bail!(SOURCE, kind = Error::ChainCreation, "Cannot build a chain at degenerate extent {}", extent);
        }
        let image_count = choose_image_count(&caps);

        let desc = SwapchainDesc {
            extent,
            format,
            present_mode,
            image_count,
            usage: config.image_usage,
        };
        let swapchain = device.create_swapchain(&desc).map_err(|e| {
            engine_err!(SOURCE, kind = Error::ChainCreation, "Failed to create swapchain: {}", e)
        })?;

        let mut chain = Self {
            swapchain,
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
            depth: None,
            format,
            present_mode,
            extent,
        };

        if let Err(e) = chain.create_attachments(device, config.depth_format) {
            chain.destroy(device);
            return Err(engine_err!(SOURCE, kind = Error::ChainCreation, "Failed to create chain attachments: {}", e));
        }

        engine_info!(
            SOURCE,
            "Surface chain built: {} images, {} {:?}, {:?}, depth {:?}",
            chain.images.len(),
            extent,
            format,
            present_mode,
            config.depth_format
        );
        Ok(chain)
    }

    /// Views, then depth, then framebuffers
    fn create_attachments<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        depth_format: Option<TextureFormat>,
    ) -> Result<()> {
        self.images = device.swapchain_images(self.swapchain)?;

        for image in &self.images {
            let view = device.create_image_view(*image, self.format)?;
            self.views.push(view);
        }

        if let Some(depth_format) = depth_format {
            let depth = device.create_depth_attachment(self.extent, depth_format)?;
            self.depth = Some((depth, depth_format));
        }

        for view in &self.views {
            let framebuffer = device.create_framebuffer(&FramebufferDesc {
                color_view: *view,
                color_format: self.format,
                depth: self.depth,
                extent: self.extent,
            })?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Request the next image, never blocking longer than `timeout`
    pub fn acquire_next<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        timeout: Option<Duration>,
        signal: SemaphoreId,
    ) -> Result<AcquireOutcome> {
        device
            .acquire_next_image(self.swapchain, timeout, signal)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Acquire, "Failed to acquire next image: {}", e))
    }

    /// Queue image `index` for presentation, gated on `wait`
    pub fn present<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        index: u32,
        wait: SemaphoreId,
    ) -> Result<PresentOutcome> {
        device
            .present(self.swapchain, index, wait)
            .map_err(|e| engine_err!(SOURCE, kind = Error::Frame, "Failed to present image {}: {}", index, e))
    }

    /// Release framebuffers, depth, views and the swapchain (reverse creation order)
    ///
    /// The GPU must no longer reference any of them.
    pub fn destroy<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        for framebuffer in self.framebuffers.into_iter().rev() {
            device.destroy_framebuffer(framebuffer);
        }
        if let Some((depth, _)) = self.depth {
            device.destroy_depth_attachment(depth);
        }
        for view in self.views.into_iter().rev() {
            device.destroy_image_view(view);
        }
        device.destroy_swapchain(self.swapchain);
        engine_debug!(SOURCE, "Surface chain destroyed");
    }

    // ===== ACCESSORS =====

    pub fn swapchain(&self) -> SwapchainId {
        self.swapchain
    }

    pub fn image(&self, index: u32) -> Option<PresentableImage> {
        let i = index as usize;
        Some(PresentableImage {
            index,
            image: *self.images.get(i)?,
            view: *self.views.get(i)?,
            framebuffer: *self.framebuffers.get(i)?,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn depth_attachment(&self) -> Option<DepthAttachmentId> {
        self.depth.map(|(depth, _)| depth)
    }
}

#[cfg(test)]
#[path = "surface_chain_tests.rs"]
mod tests;
