/// VulkanPipeline - Vulkan implementation of the Pipeline trait
///
/// Graphics pipelines are compiled by the application against a
/// `VulkanPipelineLayout` built here from a `BindingLayout`; the encoder only
/// needs the layout side to allocate, write and bind descriptor set 0.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use lumen_render::engine_err;
use lumen_render::lumen::render::{BindingLayout, DescriptorKind, Pipeline};
use lumen_render::lumen::Result;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{descriptor_kind_to_vk, shader_stages_to_vk};

/// Descriptor set layout bindings for one binding layout
pub(crate) fn descriptor_bindings(layout: &BindingLayout) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    layout
        .entries
        .iter()
        .map(|entry| {
            vk::DescriptorSetLayoutBinding::default()
                .binding(entry.binding)
                .descriptor_type(descriptor_kind_to_vk(entry.kind))
                .descriptor_count(1)
                .stage_flags(shader_stages_to_vk(entry.stages))
        })
        .collect()
}

/// Pool sizes able to hold `max_sets` sets of any layout with `per_set` descriptors per kind
pub(crate) fn descriptor_pool_sizes(max_sets: u32, per_set: u32) -> [vk::DescriptorPoolSize; 2] {
    let count = max_sets.saturating_mul(per_set.max(1));
    [
        vk::DescriptorPoolSize {
            ty: descriptor_kind_to_vk(DescriptorKind::UniformBuffer),
            descriptor_count: count,
        },
        vk::DescriptorPoolSize {
            ty: descriptor_kind_to_vk(DescriptorKind::CombinedImageSampler),
            descriptor_count: count,
        },
    ]
}

// ============================================================================
// VulkanPipelineLayout
// ============================================================================

/// Descriptor set layout (set 0) and pipeline layout for a binding layout
pub struct VulkanPipelineLayout {
    ctx: Arc<GpuContext>,
    binding_layout: BindingLayout,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
}

impl VulkanPipelineLayout {
    pub(crate) fn create(ctx: &Arc<GpuContext>, binding_layout: BindingLayout) -> Result<Self> {
        let bindings = descriptor_bindings(&binding_layout);
        let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        unsafe {
            let set_layout = ctx
                .device
                .create_descriptor_set_layout(&set_layout_info, None)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

            let set_layouts = [set_layout];
            let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            let pipeline_layout = match ctx.device.create_pipeline_layout(&layout_info, None) {
                Ok(layout) => layout,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(set_layout, None);
                    return Err(engine_err!("lumen::vulkan", "Failed to create pipeline layout: {:?}", e));
                }
            };

            Ok(Self {
                ctx: Arc::clone(ctx),
                binding_layout,
                set_layout,
                pipeline_layout,
            })
        }
    }

    /// Layout to compile the graphics pipeline against
    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    pub fn binding_layout(&self) -> &BindingLayout {
        &self.binding_layout
    }
}

impl Drop for VulkanPipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

// ============================================================================
// VulkanPipeline
// ============================================================================

/// Vulkan pipeline implementation
pub struct VulkanPipeline {
    label: String,
    /// Vulkan graphics pipeline (owned)
    pub(crate) pipeline: vk::Pipeline,
    /// Layout the pipeline was compiled against
    pub(crate) layout: VulkanPipelineLayout,
}

impl VulkanPipeline {
    /// Take ownership of a graphics pipeline compiled against `layout`
    pub fn new(label: impl Into<String>, pipeline: vk::Pipeline, layout: VulkanPipelineLayout) -> Self {
        Self {
            label: label.into(),
            pipeline,
            layout,
        }
    }
}

impl Pipeline for VulkanPipeline {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_valid(&self) -> bool {
        self.pipeline != vk::Pipeline::null()
    }

    fn binding_layout(&self) -> &BindingLayout {
        &self.layout.binding_layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        // The layout field is dropped after the pipeline that uses it
        unsafe {
            self.layout.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
