/// VulkanCommandList - Vulkan implementation of the CommandList trait
///
/// Records into the primary command buffer owned by a `VulkanCommandEncoder`.
/// The buffer is already in the recording state for the list's whole life.

use std::sync::Arc;

use ash::vk;
use lumen_render::lumen::render::{
    ClearValue, CommandList, DescriptorSet, DeviceBuffer, Framebuffer, ImageAspect, ImageBarrier,
    IndexType, PassObject, Pipeline, Rect2D, Texture, TextureCopy, Viewport,
};
use lumen_render::lumen::Result;
use lumen_render::{engine_bail, engine_trace};

use crate::vulkan_buffer::VulkanBuffer;
use crate::vulkan_context::{downcast, GpuContext};
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_format::{access_to_vk, aspect_to_vk, image_layout_to_vk, index_type_to_vk, stage_to_vk};
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipeline;
use crate::vulkan_render_pass::VulkanPassObject;
use crate::vulkan_texture::VulkanTexture;

/// Vulkan command list implementation
pub struct VulkanCommandList {
    ctx: Arc<GpuContext>,
    /// Command buffer for recording
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether we're inside a render pass
    in_render_pass: bool,
}

fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

fn rect_to_vk(rect: Rect2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: rect.x, y: rect.y },
        extent: vk::Extent2D {
            width: rect.width,
            height: rect.height,
        },
    }
}

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: aspect_to_vk(ImageAspect::COLOR),
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl VulkanCommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            ctx,
            command_buffer,
            in_render_pass: false,
        }
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub(crate) fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    fn require_outside_pass(&self, what: &str) -> Result<()> {
        if self.in_render_pass {
            engine_bail!(InvalidState, "lumen::vulkan", "{} is not allowed inside a render pass", what);
        }
        Ok(())
    }
}

impl CommandList for VulkanCommandList {
    fn pipeline_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()> {
        let texture = downcast::<VulkanTexture>(barrier.texture.as_any(), "Texture", &barrier.texture.desc().label)?;

        let image_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(access_to_vk(barrier.src_access))
            .dst_access_mask(access_to_vk(barrier.dst_access))
            .old_layout(image_layout_to_vk(barrier.old_layout))
            .new_layout(image_layout_to_vk(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(texture.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect_to_vk(barrier.aspect),
                base_mip_level: barrier.base_mip_level,
                level_count: barrier.mip_level_count,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                stage_to_vk(barrier.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE),
                stage_to_vk(barrier.dst_stage, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&image_barrier),
            );
        }
        engine_trace!(
            "lumen::vulkan",
            "Barrier '{}' {:?} -> {:?}",
            texture.desc().label,
            barrier.old_layout,
            barrier.new_layout
        );
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        pass: &dyn PassObject,
        framebuffer: &dyn Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        if self.in_render_pass {
            engine_bail!(InvalidState, "lumen::vulkan", "Already inside a render pass");
        }
        let pass = downcast::<VulkanPassObject>(pass.as_any(), "Pass object", "render pass")?;
        let framebuffer = downcast::<VulkanFramebuffer>(framebuffer.as_any(), "Frame buffer", "frame buffer")?;

        let clear_values: Vec<vk::ClearValue> = clear_values.iter().map(clear_value_to_vk).collect();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(pass.render_pass)
            .framebuffer(framebuffer.framebuffer)
            .render_area(rect_to_vk(render_area))
            .clear_values(&clear_values);
        let subpass_begin = vk::SubpassBeginInfo::default().contents(vk::SubpassContents::INLINE);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass2(self.command_buffer, &begin_info, &subpass_begin);
        }
        self.in_render_pass = true;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if !self.in_render_pass {
            engine_bail!(InvalidState, "lumen::vulkan", "Not inside a render pass");
        }
        unsafe {
            self.ctx
                .device
                .cmd_end_render_pass2(self.command_buffer, &vk::SubpassEndInfo::default());
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        let pipeline = downcast::<VulkanPipeline>(pipeline.as_any(), "Pipeline", pipeline.label())?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn bind_descriptor_set(&mut self, pipeline: &dyn Pipeline, set_index: u32, set: &dyn DescriptorSet) -> Result<()> {
        let pipeline = downcast::<VulkanPipeline>(pipeline.as_any(), "Pipeline", pipeline.label())?;
        let set = downcast::<VulkanDescriptorSet>(set.as_any(), "Descriptor set", pipeline.label())?;
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.layout.pipeline_layout,
                set_index,
                &[set.set],
                &[],
            );
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .cmd_set_scissor(self.command_buffer, 0, &[rect_to_vk(scissor)]);
        }
        Ok(())
    }

    fn set_stencil_reference(&mut self, reference: u32) -> Result<()> {
        unsafe {
            self.ctx.device.cmd_set_stencil_reference(
                self.command_buffer,
                vk::StencilFaceFlags::FRONT_AND_BACK,
                reference,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64) -> Result<()> {
        let buffer = downcast::<VulkanBuffer>(buffer.as_any(), "Buffer", buffer.label())?;
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        let buffer = downcast::<VulkanBuffer>(buffer.as_any(), "Buffer", buffer.label())?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        if !self.in_render_pass {
            engine_bail!(InvalidState, "lumen::vulkan", "draw_indexed outside a render pass");
        }
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn copy_texture_to_texture(&mut self, source: &dyn Texture, destination: &dyn Texture, copy: &TextureCopy) -> Result<()> {
        self.require_outside_pass("Texture copy")?;
        let src = downcast::<VulkanTexture>(source.as_any(), "Texture", &source.desc().label)?;
        let dst = downcast::<VulkanTexture>(destination.as_any(), "Texture", &destination.desc().label)?;

        let region = vk::ImageCopy {
            src_subresource: color_layers(0),
            src_offset: vk::Offset3D {
                x: copy.source_region.x,
                y: copy.source_region.y,
                z: 0,
            },
            dst_subresource: color_layers(0),
            dst_offset: vk::Offset3D {
                x: copy.destination_origin.x,
                y: copy.destination_origin.y,
                z: 0,
            },
            extent: vk::Extent3D {
                width: copy.source_region.width,
                height: copy.source_region.height,
                depth: 1,
            },
        };
        unsafe {
            self.ctx.device.cmd_copy_image(
                self.command_buffer,
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn copy_texture_to_buffer(
        &mut self,
        source: &dyn Texture,
        destination: &dyn DeviceBuffer,
        source_region: Rect2D,
        destination_offset: u64,
    ) -> Result<()> {
        self.require_outside_pass("Buffer copy")?;
        let src = downcast::<VulkanTexture>(source.as_any(), "Texture", &source.desc().label)?;
        let dst = downcast::<VulkanBuffer>(destination.as_any(), "Buffer", destination.label())?;

        // Tightly packed rows
        let region = vk::BufferImageCopy {
            buffer_offset: destination_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: color_layers(0),
            image_offset: vk::Offset3D {
                x: source_region.x,
                y: source_region.y,
                z: 0,
            },
            image_extent: vk::Extent3D {
                width: source_region.width,
                height: source_region.height,
                depth: 1,
            },
        };
        unsafe {
            self.ctx.device.cmd_copy_image_to_buffer(
                self.command_buffer,
                src.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst.buffer,
                &[region],
            );
        }
        Ok(())
    }

    fn blit_mip_level(&mut self, texture: &dyn Texture, level: u32) -> Result<()> {
        self.require_outside_pass("Mipmap blit")?;
        let vk_texture = downcast::<VulkanTexture>(texture.as_any(), "Texture", &texture.desc().label)?;
        let desc = texture.desc();
        if level == 0 || level >= desc.mip_count {
            engine_bail!(
                PreconditionFailed,
                "lumen::vulkan",
                "Mip level {} is not a blit target of '{}' ({} mips)",
                level,
                desc.label,
                desc.mip_count
            );
        }

        // Every level is filtered straight from the base level
        let base = desc.size;
        let target = desc.size.mip_size(level);
        let blit = vk::ImageBlit {
            src_subresource: color_layers(0),
            src_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: base.width as i32,
                    y: base.height as i32,
                    z: 1,
                },
            ],
            dst_subresource: color_layers(level),
            dst_offsets: [
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: target.width as i32,
                    y: target.height as i32,
                    z: 1,
                },
            ],
        };
        unsafe {
            self.ctx.device.cmd_blit_image(
                self.command_buffer,
                vk_texture.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk_texture.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            );
        }
        Ok(())
    }
}
