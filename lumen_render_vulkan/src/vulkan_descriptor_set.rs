/// VulkanDescriptorSet - Vulkan implementation of the DescriptorSet trait
///
/// Allocated from the encoder's descriptor pools. The set is freed with its
/// pool when the encoder submits, so it carries no Drop.

use std::any::Any;

use ash::vk;
use lumen_render::lumen::render::DescriptorSet;

/// Vulkan descriptor set implementation
pub struct VulkanDescriptorSet {
    pub(crate) set: vk::DescriptorSet,
}

impl VulkanDescriptorSet {
    pub(crate) fn new(set: vk::DescriptorSet) -> Self {
        Self { set }
    }
}

impl DescriptorSet for VulkanDescriptorSet {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
