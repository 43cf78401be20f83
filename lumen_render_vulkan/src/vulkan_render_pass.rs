/// VulkanPassObject - Vulkan implementation of the PassObject trait
///
/// Built with render pass 2 so the stencil plane of a combined depth-stencil
/// attachment can carry its own layout. Every attachment starts and ends the
/// pass in the layout the encoder already transitioned it to.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use lumen_render::lumen::render::{AttachmentKind, AttachmentReference, PassDescription, PassObject};
use lumen_render::lumen::Result;
use lumen_render::{engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{format_to_vk, image_layout_to_vk, load_op_to_vk, sample_count_to_vk, store_op_to_vk};

/// Vulkan pass object implementation
pub struct VulkanPassObject {
    ctx: Arc<GpuContext>,
    description: PassDescription,
    pub(crate) render_pass: vk::RenderPass,
}

fn reference_to_vk(reference: &AttachmentReference) -> vk::AttachmentReference2<'static> {
    if reference.is_unused() {
        return vk::AttachmentReference2::default()
            .attachment(vk::ATTACHMENT_UNUSED)
            .layout(vk::ImageLayout::UNDEFINED);
    }
    vk::AttachmentReference2::default()
        .attachment(reference.attachment)
        .layout(image_layout_to_vk(reference.layout))
}

/// Stage and access masks of the external dependency into the subpass
pub(crate) fn dependency_masks(description: &PassDescription) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    let mut stages = vk::PipelineStageFlags::empty();
    let mut access = vk::AccessFlags::empty();

    if description.attachments.iter().any(|a| a.kind == AttachmentKind::Color) {
        stages |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        access |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    if description.subpass.depth_stencil_reference.is_some() {
        stages |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }
    (stages, access)
}

impl VulkanPassObject {
    pub(crate) fn create(ctx: &Arc<GpuContext>, description: PassDescription) -> Result<Self> {
        let mut stencil_layouts: Vec<Option<vk::AttachmentDescriptionStencilLayout>> = description
            .attachments
            .iter()
            .map(|attachment| {
                attachment.stencil_layout.map(|layout| {
                    let layout = image_layout_to_vk(layout);
                    vk::AttachmentDescriptionStencilLayout::default()
                        .stencil_initial_layout(layout)
                        .stencil_final_layout(layout)
                })
            })
            .collect();

        let attachments: Vec<vk::AttachmentDescription2> = description
            .attachments
            .iter()
            .zip(stencil_layouts.iter_mut())
            .map(|(attachment, stencil_layout)| {
                let layout = image_layout_to_vk(attachment.layout);
                let info = vk::AttachmentDescription2::default()
                    .format(format_to_vk(attachment.format))
                    .samples(sample_count_to_vk(attachment.samples))
                    .load_op(load_op_to_vk(attachment.load_action))
                    .store_op(store_op_to_vk(attachment.store_action))
                    .stencil_load_op(load_op_to_vk(attachment.stencil_load_action))
                    .stencil_store_op(store_op_to_vk(attachment.stencil_store_action))
                    .initial_layout(layout)
                    .final_layout(layout);
                match stencil_layout {
                    Some(stencil_layout) => info.push_next(stencil_layout),
                    None => info,
                }
            })
            .collect();

        let subpass_desc = &description.subpass;
        let color_references: Vec<vk::AttachmentReference2> =
            subpass_desc.color_references.iter().map(reference_to_vk).collect();
        let resolve_references: Vec<vk::AttachmentReference2> =
            subpass_desc.resolve_references.iter().map(reference_to_vk).collect();
        let any_resolve = subpass_desc.resolve_references.iter().any(|r| !r.is_unused());

        let mut depth_stencil_stencil_layout = subpass_desc
            .depth_stencil_reference
            .and_then(|reference| reference.stencil_layout)
            .map(|layout| vk::AttachmentReferenceStencilLayout::default().stencil_layout(image_layout_to_vk(layout)));
        let depth_stencil_reference = subpass_desc.depth_stencil_reference.map(|reference| {
            let info = reference_to_vk(&reference);
            match depth_stencil_stencil_layout.as_mut() {
                Some(stencil_layout) => info.push_next(stencil_layout),
                None => info,
            }
        });

        let mut subpass = vk::SubpassDescription2::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_references);
        if any_resolve {
            subpass = subpass.resolve_attachments(&resolve_references);
        }
        if let Some(reference) = depth_stencil_reference.as_ref() {
            subpass = subpass.depth_stencil_attachment(reference);
        }

        let (stage_mask, access_mask) = dependency_masks(&description);
        let dependency = vk::SubpassDependency2::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stage_mask)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stage_mask)
            .dst_access_mask(access_mask);

        let render_pass_info = vk::RenderPassCreateInfo2::default()
            .attachments(&attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = unsafe { ctx.device.create_render_pass2(&render_pass_info, None) }.map_err(|e| {
            engine_err!(
                InitializationFailed,
                "lumen::vulkan",
                "Failed to create render pass ({} attachments): {:?}",
                description.attachments.len(),
                e
            )
        })?;

        engine_debug!(
            "lumen::vulkan",
            "Created render pass with {} attachments ({} color slots)",
            description.attachments.len(),
            description.subpass.color_references.len()
        );

        Ok(Self {
            ctx: Arc::clone(ctx),
            description,
            render_pass,
        })
    }

    /// Vulkan render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl PassObject for VulkanPassObject {
    fn description(&self) -> &PassDescription {
        &self.description
    }

    fn is_valid(&self) -> bool {
        self.render_pass != vk::RenderPass::null()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPassObject {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_render_pass_tests.rs"]
mod tests;
