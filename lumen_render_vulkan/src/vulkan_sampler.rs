/// VulkanSampler - Vulkan implementation of the Sampler trait
///
/// Samplers are immutable and shared; the device caches one per descriptor.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use lumen_render::engine_err;
use lumen_render::lumen::render::{Sampler, SamplerDesc};
use lumen_render::lumen::Result;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk, mip_filter_to_vk};

/// Vulkan sampler implementation
pub struct VulkanSampler {
    ctx: Arc<GpuContext>,
    desc: SamplerDesc,
    pub(crate) sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: SamplerDesc) -> Result<Self> {
        let (mipmap_mode, max_lod) = mip_filter_to_vk(desc.mip_filter);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address_mode_to_vk(desc.address_mode_u))
            .address_mode_v(address_mode_to_vk(desc.address_mode_v))
            .address_mode_w(address_mode_to_vk(desc.address_mode_w))
            .mip_lod_bias(0.0)
            .anisotropy_enable(false)
            .compare_enable(false)
            .min_lod(0.0)
            .max_lod(max_lod)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { ctx.device.create_sampler(&create_info, None) }.map_err(|e| {
            engine_err!(
                InitializationFailed,
                "lumen::vulkan",
                "Failed to create sampler '{}': {:?}",
                desc.label,
                e
            )
        })?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            desc,
            sampler,
        })
    }
}

impl Sampler for VulkanSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn is_valid(&self) -> bool {
        self.sampler != vk::Sampler::null()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
