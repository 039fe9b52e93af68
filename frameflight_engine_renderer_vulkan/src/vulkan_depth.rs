/// Depth attachment - image, memory from gpu-allocator and view
///
/// Sized to the swapchain extent, so it is rebuilt on every recreation.

use ash::vk;
use frameflight_engine::engine_error;
use frameflight_engine::frameflight::device::{Extent2D, TextureFormat};
use frameflight_engine::frameflight::{Error, Result};
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_for, extent_to_vk, format_to_vk};

const SOURCE: &str = "frameflight::vulkan";

pub(crate) struct DepthAttachment {
    pub image: vk::Image,
    pub view: vk::ImageView,
    allocation: Option<gpu_allocator::vulkan::Allocation>,
    pub format: TextureFormat,
}

impl DepthAttachment {
    pub fn create(ctx: &mut GpuContext, extent: Extent2D, format: TextureFormat) -> Result<Self> {
        if !format.is_depth() {
            engine_error!(SOURCE, "{:?} is not a depth format", format);
            return Err(Error::InvalidResource(format!("{:?} is not a depth format", format)));
        }

        let vk_extent = extent_to_vk(extent);
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(format))
            .extent(vk::Extent3D { width: vk_extent.width, height: vk_extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = ctx.device.create_image(&image_info, None).map_err(|e| {
                engine_error!(SOURCE, "Failed to create depth image: {:?}", e);
                Error::OutOfMemory
            })?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocator.allocate(&AllocationCreateDesc {
                name: "depth_attachment",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    engine_error!(SOURCE, "Failed to allocate depth image memory: {:?}", e);
                    return Err(Error::OutOfMemory);
                }
            };

            let (memory, offset) = (allocation.memory(), allocation.offset());
            let mut depth = Self { image, view: vk::ImageView::null(), allocation: Some(allocation), format };

            if let Err(e) = ctx.device.bind_image_memory(image, memory, offset) {
                depth.destroy(ctx);
                engine_error!(SOURCE, "Failed to bind depth image memory: {:?}", e);
                return Err(Error::OutOfMemory);
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format_to_vk(format))
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_for(format),
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match ctx.device.create_image_view(&view_info, None) {
                Ok(view) => depth.view = view,
                Err(e) => {
                    depth.destroy(ctx);
                    engine_error!(SOURCE, "Failed to create depth image view: {:?}", e);
                    return Err(Error::OutOfMemory);
                }
            }

            Ok(depth)
        }
    }

    /// Release view, image and memory
    pub fn destroy(mut self, ctx: &mut GpuContext) {
        unsafe {
            if self.view != vk::ImageView::null() {
                ctx.device.destroy_image_view(self.view, None);
            }
            ctx.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = ctx.allocator.free(allocation) {
                engine_error!(SOURCE, "Failed to free depth image memory: {:?}", e);
            }
        }
    }
}
