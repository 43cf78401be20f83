/// VulkanFramebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer over the attachment views in pass order. The
/// attachment textures are held so their views outlive the framebuffer.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use lumen_render::lumen::render::{Framebuffer, FramebufferDesc, PassObject, Texture};
use lumen_render::lumen::Result;
use lumen_render::{engine_bail, engine_err};

use crate::vulkan_context::{downcast, GpuContext};
use crate::vulkan_render_pass::VulkanPassObject;
use crate::vulkan_texture::VulkanTexture;

/// Vulkan framebuffer implementation
pub struct VulkanFramebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    _attachments: Vec<Arc<dyn Texture>>,
}

impl VulkanFramebuffer {
    pub(crate) fn create(ctx: &Arc<GpuContext>, pass: &VulkanPassObject, desc: &FramebufferDesc) -> Result<Self> {
        let expected = pass.description().attachments.len();
        if desc.attachments.len() != expected {
            engine_bail!(
                PreconditionFailed,
                "lumen::vulkan",
                "Frame buffer has {} attachments, pass expects {}",
                desc.attachments.len(),
                expected
            );
        }

        let views = desc
            .attachments
            .iter()
            .map(|texture| {
                let label = &texture.desc().label;
                downcast::<VulkanTexture>(texture.as_any(), "Texture", label).map(|texture| texture.view)
            })
            .collect::<Result<Vec<vk::ImageView>>>()?;

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(desc.layers);

        let framebuffer = unsafe { ctx.device.create_framebuffer(&create_info, None) }.map_err(|e| {
            engine_err!(
                InitializationFailed,
                "lumen::vulkan",
                "Failed to create frame buffer {}x{}: {:?}",
                desc.width,
                desc.height,
                e
            )
        })?;

        Ok(Self {
            ctx: Arc::clone(ctx),
            framebuffer,
            width: desc.width,
            height: desc.height,
            _attachments: desc.attachments.clone(),
        })
    }
}

impl Framebuffer for VulkanFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
