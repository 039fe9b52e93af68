/// Vulkan swapchain - surface queries, swapchain creation, acquire and present
///
/// Staleness is not an error here: `ERROR_OUT_OF_DATE_KHR` becomes
/// `AcquireOutcome::Stale` / `PresentOutcome::Stale` and the frame scheduler
/// rebuilds the chain.

use ash::vk;
use frameflight_engine::{engine_err, engine_error};
use frameflight_engine::frameflight::device::{
    AcquireOutcome, ImageId, PresentOutcome, SurfaceCapabilities, SwapchainDesc,
};
use frameflight_engine::frameflight::{Error, Result};
use std::time::Duration;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    defined_extent, extent_from_vk, extent_to_vk, format_from_vk, format_to_vk,
    image_usage_to_vk, present_mode_from_vk, present_mode_to_vk, timeout_to_ns,
};

const SOURCE: &str = "frameflight::vulkan";

/// Swapchain record stored in the device arena
pub(crate) struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<ImageId>,
}

/// Query surface support right now (extent follows the window)
pub(crate) fn query_capabilities(ctx: &GpuContext) -> Result<SurfaceCapabilities> {
    unsafe {
        let capabilities = ctx
            .surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
            .map_err(|e| engine_err!(SOURCE, "Failed to query surface capabilities: {:?}", e))?;

        let formats = ctx
            .surface_loader
            .get_physical_device_surface_formats(ctx.physical_device, ctx.surface)
            .map_err(|e| engine_err!(SOURCE, "Failed to query surface formats: {:?}", e))?
            .into_iter()
            .filter(|format| format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .filter_map(|format| format_from_vk(format.format))
            .collect();

        let present_modes = ctx
            .surface_loader
            .get_physical_device_surface_present_modes(ctx.physical_device, ctx.surface)
            .map_err(|e| engine_err!(SOURCE, "Failed to query present modes: {:?}", e))?
            .into_iter()
            .filter_map(present_mode_from_vk)
            .collect();

        Ok(SurfaceCapabilities {
            current_extent: defined_extent(capabilities.current_extent),
            min_extent: extent_from_vk(capabilities.min_image_extent),
            max_extent: extent_from_vk(capabilities.max_image_extent),
            min_image_count: capabilities.min_image_count,
            max_image_count: capabilities.max_image_count,
            formats,
            present_modes,
        })
    }
}

/// Create the native swapchain and fetch its images
pub(crate) fn create_swapchain(
    ctx: &GpuContext,
    desc: &SwapchainDesc,
) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
    unsafe {
        let capabilities = ctx
            .surface_loader
            .get_physical_device_surface_capabilities(ctx.physical_device, ctx.surface)
            .map_err(|e| engine_err!(SOURCE, "Failed to query surface capabilities: {:?}", e))?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface)
            .min_image_count(desc.image_count)
            .image_format(format_to_vk(desc.format))
            .image_color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .image_extent(extent_to_vk(desc.extent))
            .image_array_layers(1)
            .image_usage(image_usage_to_vk(desc.usage))
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode_to_vk(desc.present_mode))
            .clipped(true);

        let swapchain = ctx
            .swapchain_loader
            .create_swapchain(&create_info, None)
            .map_err(|e| match e {
                vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                    engine_error!(SOURCE, "Out of memory creating swapchain: {:?}", e);
                    Error::OutOfMemory
                }
                _ => engine_err!(SOURCE, "Failed to create swapchain: {:?}", e),
            })?;

        let images = match ctx.swapchain_loader.get_swapchain_images(swapchain) {
            Ok(images) => images,
            Err(e) => {
                ctx.swapchain_loader.destroy_swapchain(swapchain, None);
                return Err(engine_err!(SOURCE, "Failed to get swapchain images: {:?}", e));
            }
        };

        Ok((swapchain, images))
    }
}

pub(crate) fn acquire(
    ctx: &GpuContext,
    swapchain: vk::SwapchainKHR,
    timeout: Option<Duration>,
    signal: vk::Semaphore,
) -> Result<AcquireOutcome> {
    let result = unsafe {
        ctx.swapchain_loader.acquire_next_image(
            swapchain,
            timeout_to_ns(timeout),
            signal,
            vk::Fence::null(),
        )
    };
    acquire_outcome(result)
}

/// Classify the result of `vkAcquireNextImageKHR`
pub(crate) fn acquire_outcome(result: ash::prelude::VkResult<(u32, bool)>) -> Result<AcquireOutcome> {
    match result {
        Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
        Ok((index, true)) => Ok(AcquireOutcome::Suboptimal(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Ok(AcquireOutcome::TimedOut),
        Err(e) => Err(engine_err!(SOURCE, "Failed to acquire swapchain image: {:?}", e)),
    }
}

pub(crate) fn present(
    ctx: &GpuContext,
    swapchain: vk::SwapchainKHR,
    image_index: u32,
    wait: vk::Semaphore,
) -> Result<PresentOutcome> {
    let wait_semaphores = [wait];
    let swapchains = [swapchain];
    let image_indices = [image_index];
    let present_info = vk::PresentInfoKHR::default()
        .wait_semaphores(&wait_semaphores)
        .swapchains(&swapchains)
        .image_indices(&image_indices);

    let result = unsafe { ctx.swapchain_loader.queue_present(ctx.present_queue, &present_info) };
    present_outcome(result)
}

/// Classify the result of `vkQueuePresentKHR`
pub(crate) fn present_outcome(result: ash::prelude::VkResult<bool>) -> Result<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
        Err(e) => Err(engine_err!(SOURCE, "Failed to present: {:?}", e)),
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
