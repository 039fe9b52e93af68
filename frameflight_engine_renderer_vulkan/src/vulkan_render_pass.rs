/// Render passes for swapchain framebuffers, cached per attachment formats
///
/// Every framebuffer of a surface chain shares one render pass: a single
/// subpass clearing the swapchain image (presented afterwards) and the
/// optional depth attachment. Passes are kept across recreations since the
/// formats rarely change.

use ash::vk;
use frameflight_engine::engine_err;
use frameflight_engine::frameflight::Result;
use rustc_hash::FxHashMap;

/// (color format, depth format)
type RenderPassKey = (vk::Format, Option<vk::Format>);

#[derive(Default)]
pub(crate) struct RenderPassCache {
    passes: FxHashMap<RenderPassKey, vk::RenderPass>,
}

impl RenderPassCache {
    pub fn get_or_create(
        &mut self,
        device: &ash::Device,
        color: vk::Format,
        depth: Option<vk::Format>,
    ) -> Result<vk::RenderPass> {
        if let Some(&pass) = self.passes.get(&(color, depth)) {
            return Ok(pass);
        }

        let attachments = attachment_descriptions(color, depth);
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if depth.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        let subpasses = [subpass];

        // Wait for the acquire semaphore stage before writing attachments
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let pass = unsafe { device.create_render_pass(&create_info, None) }
            .map_err(|e| engine_err!("frameflight::vulkan", "Failed to create render pass: {:?}", e))?;

        self.passes.insert((color, depth), pass);
        Ok(pass)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for (_, pass) in self.passes.drain() {
            device.destroy_render_pass(pass, None);
        }
    }
}

/// Color attachment cleared then presented, depth cleared then discarded
pub(crate) fn attachment_descriptions(
    color: vk::Format,
    depth: Option<vk::Format>,
) -> Vec<vk::AttachmentDescription> {
    let mut attachments = vec![vk::AttachmentDescription::default()
        .format(color)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    if let Some(depth) = depth {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(depth)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        );
    }

    attachments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_only_attachments() {
        let attachments = attachment_descriptions(vk::Format::B8G8R8A8_SRGB, None);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_depth_attachment_is_discarded() {
        let attachments =
            attachment_descriptions(vk::Format::B8G8R8A8_SRGB, Some(vk::Format::D32_SFLOAT));
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[1].format, vk::Format::D32_SFLOAT);
        assert_eq!(attachments[1].store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(
            attachments[1].final_layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }

    #[test]
    fn test_empty_cache() {
        assert_eq!(RenderPassCache::default().len(), 0);
    }
}
