/*!
# Lumen Render - Vulkan Backend

Vulkan implementation of the `lumen_render` collaborator traits.

This crate provides a headless Vulkan device, command encoder and command
list that the backend-agnostic `RenderPass` and `BlitPass` encode into,
using the Ash library for Vulkan bindings and gpu-allocator for memory
management.

```no_run
use std::sync::{Arc, Mutex, Weak};
use lumen_render::lumen::Config;
use lumen_render::lumen::render::*;
use lumen_render_vulkan::{VulkanCommandEncoder, VulkanDevice};

let device = Arc::new(VulkanDevice::new(Config::default())?);
let color: Arc<dyn Texture> = device.create_texture(TextureDesc::new(
    "color",
    TextureFormat::R8G8B8A8_UNORM,
    ISize::new(256, 256),
    TextureUsage::COLOR_ATTACHMENT,
))?;

let mut target = RenderTarget::new();
target.set_color_attachment(0, ColorAttachment {
    attachment: Attachment::new(color),
    clear_color: Color::BLACK,
});

let encoder = device.create_command_encoder()?;
let weak: Weak<Mutex<dyn CommandEncoder>> = Arc::<Mutex<VulkanCommandEncoder>>::downgrade(&encoder);
let cache = RenderPassCache::new();
let mut pass = RenderPass::new(device.clone(), &cache, target, weak);
pass.add_command(Command::default())?;
pass.encode_commands()?;
encoder.lock().unwrap().submit()?;
# Ok::<(), lumen_render::lumen::Error>(())
```
*/

// Vulkan implementation modules
mod vulkan_context;
mod vulkan_format;
mod vulkan_debug;
mod vulkan_device;
mod vulkan_texture;
mod vulkan_buffer;
mod vulkan_sampler;
mod vulkan_pipeline;
mod vulkan_render_pass;
mod vulkan_frame_buffer;
mod vulkan_descriptor_set;
mod vulkan_command_list;
mod vulkan_command_encoder;

pub use vulkan_device::VulkanDevice;
pub use vulkan_texture::VulkanTexture;
pub use vulkan_buffer::{VulkanAllocator, VulkanBuffer};
pub use vulkan_sampler::VulkanSampler;
pub use vulkan_pipeline::{VulkanPipeline, VulkanPipelineLayout};
pub use vulkan_render_pass::VulkanPassObject;
pub use vulkan_frame_buffer::VulkanFramebuffer;
pub use vulkan_descriptor_set::VulkanDescriptorSet;
pub use vulkan_command_list::VulkanCommandList;
pub use vulkan_command_encoder::VulkanCommandEncoder;

// Re-export debug utilities
pub use vulkan_debug::{reset_validation_stats, validation_stats, ValidationStats};
