/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Native objects live in slotmap arenas keyed by the engine's typed handles.
/// An unknown or already destroyed handle is reported as
/// `Error::InvalidResource` and never reaches the driver.

use ash::vk;
use frameflight_engine::frameflight::device::{
    AcquireOutcome, CommandTargetId, DepthAttachmentId, DeviceConfig, Extent2D, FenceId,
    FramebufferDesc, FramebufferId, GraphicsDevice, ImageId, ImageViewId, PresentOutcome,
    SemaphoreId, Submission, SurfaceCapabilities, SwapchainDesc, SwapchainId, TextureFormat,
    ValidationStats,
};
use frameflight_engine::frameflight::{Error, Result};
use frameflight_engine::{engine_debug, engine_err, engine_error, engine_info};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::{Key, SlotMap};
use std::time::Duration;

use crate::debug::print_validation_stats_report;
use crate::vulkan_context::GpuContext;
use crate::vulkan_depth::DepthAttachment;
use crate::vulkan_format::{aspect_for, extent_to_vk, format_to_vk, pipeline_stages_to_vk, timeout_to_ns};
use crate::vulkan_render_pass::RenderPassCache;
use crate::vulkan_swapchain::{self, Swapchain};

const SOURCE: &str = "frameflight::vulkan";

/// Framebuffer record: the render pass and extent are needed to begin a pass
struct Framebuffer {
    handle: vk::Framebuffer,
    render_pass: vk::RenderPass,
    extent: Extent2D,
    has_depth: bool,
}

/// Log a failed Vulkan call; out-of-memory codes become `Error::OutOfMemory`
fn vk_err(what: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            engine_error!(SOURCE, "{}: {:?}", what, result);
            Error::OutOfMemory
        }
        _ => engine_err!(SOURCE, "{}: {:?}", what, result),
    }
}

/// Resolve a handle or report it as invalid
fn lookup<K: Key, V: Copy>(arena: &SlotMap<K, V>, key: K, what: &str) -> Result<V> {
    arena.get(key).copied().ok_or_else(|| {
        engine_error!(SOURCE, "Unknown {} handle {:?}", what, key);
        Error::InvalidResource(format!("unknown {} handle", what))
    })
}

/// Vulkan graphics device
///
/// Created from a window; the surface stays alive for the lifetime of the
/// device so swapchains can be rebuilt after resizes.
pub struct VulkanGraphicsDevice {
    swapchains: SlotMap<SwapchainId, Swapchain>,
    images: SlotMap<ImageId, vk::Image>,
    views: SlotMap<ImageViewId, vk::ImageView>,
    depth_attachments: SlotMap<DepthAttachmentId, DepthAttachment>,
    framebuffers: SlotMap<FramebufferId, Framebuffer>,
    fences: SlotMap<FenceId, vk::Fence>,
    semaphores: SlotMap<SemaphoreId, vk::Semaphore>,
    command_targets: SlotMap<CommandTargetId, vk::CommandBuffer>,
    render_passes: RenderPassCache,
    context: GpuContext,
}

impl VulkanGraphicsDevice {
    /// Create the instance, surface, device and allocator for `window`
    ///
    /// Validation layers are enabled when `config.enable_validation` is set
    /// and the crate was built with the `vulkan-validation` feature.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &DeviceConfig) -> Result<Self> {
        let context = GpuContext::new(window, config)?;

        Ok(Self {
            swapchains: SlotMap::with_key(),
            images: SlotMap::with_key(),
            views: SlotMap::with_key(),
            depth_attachments: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            semaphores: SlotMap::with_key(),
            command_targets: SlotMap::with_key(),
            render_passes: RenderPassCache::default(),
            context,
        })
    }

    /// Logical device, for recorders issuing their own commands
    pub fn device(&self) -> &ash::Device {
        &self.context.device
    }

    /// Native command buffer behind a command target
    pub fn command_buffer(&self, target: CommandTargetId) -> Option<vk::CommandBuffer> {
        self.command_targets.get(target).copied()
    }

    /// Validation message counters (all zero without validation)
    pub fn validation_stats(&self) -> ValidationStats {
        self.context
            .debug
            .as_ref()
            .map(|debug| debug.state().stats())
            .unwrap_or_default()
    }

    /// Print the colored validation report to stdout
    pub fn print_validation_report(&self) {
        let duplicates = self
            .context
            .debug
            .as_ref()
            .map(|debug| debug.state().duplicate_messages())
            .unwrap_or(0);
        print_validation_stats_report(&self.validation_stats(), duplicates);
    }

    /// Strict mode: raise the first validation error once the call has returned
    fn check_validation(&self) {
        if let Some(debug) = self.context.debug.as_ref() {
            if let Some(violation) = debug.state().take_strict_violation() {
                panic!("Vulkan validation error (strict mode): {}", violation);
            }
        }
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== SURFACE / SWAPCHAIN =====

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        vulkan_swapchain::query_capabilities(&self.context)
    }

    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainId> {
        let (handle, native_images) = vulkan_swapchain::create_swapchain(&self.context, desc)?;
        self.check_validation();

        let images = native_images
            .into_iter()
            .map(|image| self.images.insert(image))
            .collect::<Vec<_>>();

        engine_debug!(
            SOURCE,
            "Swapchain created: {} {:?} {:?}, {} images",
            desc.extent, desc.format, desc.present_mode, images.len()
        );

        Ok(self.swapchains.insert(Swapchain { handle, images }))
    }

    fn swapchain_images(&self, swapchain: SwapchainId) -> Result<Vec<ImageId>> {
        self.swapchains
            .get(swapchain)
            .map(|record| record.images.clone())
            .ok_or_else(|| Error::InvalidResource("unknown swapchain handle".to_string()))
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainId) {
        if let Some(record) = self.swapchains.remove(swapchain) {
            for image in record.images {
                self.images.remove(image);
            }
            unsafe {
                self.context.swapchain_loader.destroy_swapchain(record.handle, None);
            }
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainId,
        timeout: Option<Duration>,
        signal: SemaphoreId,
    ) -> Result<AcquireOutcome> {
        let handle = self
            .swapchains
            .get(swapchain)
            .map(|record| record.handle)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain handle".to_string()))?;
        let semaphore = lookup(&self.semaphores, signal, "semaphore")?;

        vulkan_swapchain::acquire(&self.context, handle, timeout, semaphore)
    }

    fn present(
        &mut self,
        swapchain: SwapchainId,
        image_index: u32,
        wait: SemaphoreId,
    ) -> Result<PresentOutcome> {
        let handle = self
            .swapchains
            .get(swapchain)
            .map(|record| record.handle)
            .ok_or_else(|| Error::InvalidResource("unknown swapchain handle".to_string()))?;
        let semaphore = lookup(&self.semaphores, wait, "semaphore")?;

        let outcome = vulkan_swapchain::present(&self.context, handle, image_index, semaphore);
        self.check_validation();
        outcome
    }

    // ===== ATTACHMENTS =====

    fn create_image_view(&mut self, image: ImageId, format: TextureFormat) -> Result<ImageViewId> {
        let image = lookup(&self.images, image, "image")?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format_to_vk(format))
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_for(format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.context.device.create_image_view(&view_info, None) }
            .map_err(|e| vk_err("Failed to create image view", e))?;

        Ok(self.views.insert(view))
    }

    fn destroy_image_view(&mut self, view: ImageViewId) {
        if let Some(view) = self.views.remove(view) {
            unsafe {
                self.context.device.destroy_image_view(view, None);
            }
        }
    }

    fn create_depth_attachment(
        &mut self,
        extent: Extent2D,
        format: TextureFormat,
    ) -> Result<DepthAttachmentId> {
        let depth = DepthAttachment::create(&mut self.context, extent, format)?;
        Ok(self.depth_attachments.insert(depth))
    }

    fn destroy_depth_attachment(&mut self, depth: DepthAttachmentId) {
        if let Some(depth) = self.depth_attachments.remove(depth) {
            depth.destroy(&mut self.context);
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let color_view = lookup(&self.views, desc.color_view, "image view")?;

        let depth = match desc.depth {
            Some((id, format)) => {
                let record = self.depth_attachments.get(id).ok_or_else(|| {
                    engine_error!(SOURCE, "Unknown depth attachment handle {:?}", id);
                    Error::InvalidResource("unknown depth attachment handle".to_string())
                })?;
                if record.format != format {
                    engine_error!(SOURCE, "Depth attachment is {:?}, framebuffer expects {:?}", record.format, format);
                    return Err(Error::InvalidResource("depth format mismatch".to_string()));
                }
                Some((record.view, format_to_vk(format)))
            }
            None => None,
        };

        let render_pass = self.render_passes.get_or_create(
            &self.context.device,
            format_to_vk(desc.color_format),
            depth.map(|(_, format)| format),
        )?;

        let mut attachments = vec![color_view];
        if let Some((view, _)) = depth {
            attachments.push(view);
        }

        let vk_extent = extent_to_vk(desc.extent);
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(vk_extent.width)
            .height(vk_extent.height)
            .layers(1);

        let handle = unsafe { self.context.device.create_framebuffer(&create_info, None) }
            .map_err(|e| vk_err("Failed to create framebuffer", e))?;
        self.check_validation();

        engine_debug!(
            SOURCE,
            "Framebuffer created: {} ({} cached render passes)",
            desc.extent, self.render_passes.len()
        );

        Ok(self.framebuffers.insert(Framebuffer {
            handle,
            render_pass,
            extent: desc.extent,
            has_depth: depth.is_some(),
        }))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(record) = self.framebuffers.remove(framebuffer) {
            unsafe {
                self.context.device.destroy_framebuffer(record.handle, None);
            }
        }
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            self.context
                .device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
        }
        .map_err(|e| vk_err("Failed to create fence", e))?;

        Ok(self.fences.insert(fence))
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        if let Some(fence) = self.fences.remove(fence) {
            unsafe {
                self.context.device.destroy_fence(fence, None);
            }
        }
    }

    fn wait_for_fence(&mut self, fence: FenceId, timeout: Option<Duration>) -> Result<bool> {
        let fence = lookup(&self.fences, fence, "fence")?;
        match unsafe {
            self.context
                .device
                .wait_for_fences(&[fence], true, timeout_to_ns(timeout))
        } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(vk_err("Failed to wait for fence", e)),
        }
    }

    fn is_fence_signaled(&self, fence: FenceId) -> Result<bool> {
        let fence = lookup(&self.fences, fence, "fence")?;
        unsafe { self.context.device.get_fence_status(fence) }
            .map_err(|e| vk_err("Failed to query fence status", e))
    }

    fn reset_fence(&mut self, fence: FenceId) -> Result<()> {
        let fence = lookup(&self.fences, fence, "fence")?;
        unsafe { self.context.device.reset_fences(&[fence]) }
            .map_err(|e| vk_err("Failed to reset fence", e))
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        let semaphore = unsafe {
            self.context
                .device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
        }
        .map_err(|e| vk_err("Failed to create semaphore", e))?;

        Ok(self.semaphores.insert(semaphore))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) {
        if let Some(semaphore) = self.semaphores.remove(semaphore) {
            unsafe {
                self.context.device.destroy_semaphore(semaphore, None);
            }
        }
    }

    // ===== COMMANDS =====

    fn create_command_target(&mut self) -> Result<CommandTargetId> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.context.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { self.context.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| vk_err("Failed to allocate command buffer", e))?
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!(SOURCE, "Driver returned no command buffer"))?;

        Ok(self.command_targets.insert(command_buffer))
    }

    fn destroy_command_target(&mut self, target: CommandTargetId) {
        if let Some(command_buffer) = self.command_targets.remove(target) {
            unsafe {
                self.context
                    .device
                    .free_command_buffers(self.context.command_pool, &[command_buffer]);
            }
        }
    }

    fn begin_commands(&mut self, target: CommandTargetId) -> Result<()> {
        let command_buffer = lookup(&self.command_targets, target, "command target")?;
        unsafe {
            self.context
                .device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_err("Failed to reset command buffer", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.context
                .device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| vk_err("Failed to begin command buffer", e))
        }
    }

    fn end_commands(&mut self, target: CommandTargetId) -> Result<()> {
        let command_buffer = lookup(&self.command_targets, target, "command target")?;
        unsafe { self.context.device.end_command_buffer(command_buffer) }
            .map_err(|e| vk_err("Failed to end command buffer", e))
    }

    fn begin_render_pass(
        &mut self,
        target: CommandTargetId,
        framebuffer: FramebufferId,
        clear_color: [f32; 4],
    ) -> Result<()> {
        let command_buffer = lookup(&self.command_targets, target, "command target")?;
        let record = self.framebuffers.get(framebuffer).ok_or_else(|| {
            engine_error!(SOURCE, "Unknown framebuffer handle {:?}", framebuffer);
            Error::InvalidResource("unknown framebuffer handle".to_string())
        })?;

        let mut clear_values = vec![vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        }];
        if record.has_depth {
            clear_values.push(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            });
        }

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(record.render_pass)
            .framebuffer(record.handle)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: extent_to_vk(record.extent),
            })
            .clear_values(&clear_values);

        unsafe {
            self.context
                .device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    fn end_render_pass(&mut self, target: CommandTargetId) -> Result<()> {
        let command_buffer = lookup(&self.command_targets, target, "command target")?;
        unsafe {
            self.context.device.cmd_end_render_pass(command_buffer);
        }
        Ok(())
    }

    fn submit(&mut self, submission: &Submission<'_>) -> Result<()> {
        let command_buffer = lookup(&self.command_targets, submission.command_target, "command target")?;

        let mut wait_semaphores = Vec::with_capacity(submission.wait.len());
        let mut wait_stages = Vec::with_capacity(submission.wait.len());
        for &(semaphore, stages) in submission.wait {
            wait_semaphores.push(lookup(&self.semaphores, semaphore, "semaphore")?);
            wait_stages.push(pipeline_stages_to_vk(stages));
        }
        let signal_semaphores = submission
            .signal
            .iter()
            .map(|&semaphore| lookup(&self.semaphores, semaphore, "semaphore"))
            .collect::<Result<Vec<_>>>()?;
        let fence = match submission.fence {
            Some(fence) => lookup(&self.fences, fence, "fence")?,
            None => vk::Fence::null(),
        };

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let result = unsafe {
            self.context
                .device
                .queue_submit(self.context.graphics_queue, &[submit_info], fence)
        };
        self.check_validation();
        result.map_err(|e| vk_err("Failed to submit command buffer", e))
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.context.device.device_wait_idle() }
            .map_err(|e| vk_err("Failed to wait for device idle", e))
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.context.device.device_wait_idle().ok();
        }

        let framebuffers: Vec<_> = self.framebuffers.keys().collect();
        for framebuffer in framebuffers {
            self.destroy_framebuffer(framebuffer);
        }
        let views: Vec<_> = self.views.keys().collect();
        for view in views {
            self.destroy_image_view(view);
        }
        let depths: Vec<_> = self.depth_attachments.keys().collect();
        for depth in depths {
            self.destroy_depth_attachment(depth);
        }
        let swapchains: Vec<_> = self.swapchains.keys().collect();
        for swapchain in swapchains {
            self.destroy_swapchain(swapchain);
        }
        let fences: Vec<_> = self.fences.keys().collect();
        for fence in fences {
            self.destroy_fence(fence);
        }
        let semaphores: Vec<_> = self.semaphores.keys().collect();
        for semaphore in semaphores {
            self.destroy_semaphore(semaphore);
        }
        // Command buffers go away with the pool
        self.command_targets.clear();

        unsafe {
            self.render_passes.destroy(&self.context.device);
        }

        let stats = self.validation_stats();
        if stats.total() > 0 {
            engine_info!(
                SOURCE,
                "Validation summary: {} errors, {} warnings",
                stats.errors, stats.warnings
            );
        }
    }
}
