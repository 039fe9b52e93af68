/*!
# Frameflight Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait driven by the
frameflight frame scheduler.

This crate uses the Ash library for Vulkan bindings and gpu-allocator for the
depth attachment memory. Validation layers are compiled in with the
`vulkan-validation` feature and enabled per device through `DeviceConfig`.

# Example

```ignore
use frameflight_engine::frameflight::device::{DeviceConfig, Extent2D};
use frameflight_engine::frameflight::frame::{FrameScheduler, SchedulerConfig};
use frameflight_engine_renderer_vulkan::frameflight::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> frameflight_engine::frameflight::Result<()> {
let device = VulkanGraphicsDevice::new(window, &DeviceConfig::default())?;
let size = window.inner_size();
let _scheduler = FrameScheduler::new(device, Extent2D::from(size), SchedulerConfig::default())?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_context;
mod vulkan_depth;
mod vulkan_format;
mod vulkan_graphics_device;
mod vulkan_render_pass;
mod vulkan_swapchain;

pub use vulkan_graphics_device::VulkanGraphicsDevice;
pub use debug::print_validation_stats_report;

/// Main frameflight namespace for the Vulkan backend
pub mod frameflight {
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;
    pub use crate::debug::print_validation_stats_report;
}
