/// VulkanTexture - Vulkan implementation of the Texture trait
///
/// Owns a VkImage, one view over every mip level and aspect, and the GPU
/// memory behind them. Layout state is carried by the core `LayoutTracker`.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_render::lumen::render::{LayoutTracker, Texture, TextureDesc, TextureUsage};
use lumen_render::lumen::{Error, Result};
use lumen_render::{engine_bail, engine_debug, engine_err, engine_error};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_to_vk, format_to_vk, sample_count_to_vk, texture_usage_to_vk};

/// Vulkan texture implementation
pub struct VulkanTexture {
    /// Shared GPU context
    ctx: Arc<GpuContext>,
    /// Creation descriptor
    desc: TextureDesc,
    /// Vulkan image
    pub(crate) image: vk::Image,
    /// View over all mips and aspects
    pub(crate) view: vk::ImageView,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Recorded per-plane layout
    tracker: LayoutTracker,
    valid: AtomicBool,
}

/// Number of mips in a full chain for `width` x `height`
pub(crate) fn full_mip_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

impl VulkanTexture {
    /// Create the image, bind device-local memory and build the view
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: TextureDesc) -> Result<Self> {
        if desc.size.width == 0 || desc.size.height == 0 {
            engine_bail!(
                PreconditionFailed,
                "lumen::vulkan",
                "Texture '{}' has an empty size {:?}",
                desc.label,
                desc.size
            );
        }
        let max_mips = full_mip_count(desc.size.width, desc.size.height);
        if desc.mip_count > max_mips {
            engine_bail!(
                PreconditionFailed,
                "lumen::vulkan",
                "Texture '{}' requests {} mips, size {:?} allows {}",
                desc.label,
                desc.mip_count,
                desc.size,
                max_mips
            );
        }

        let mut usage = texture_usage_to_vk(desc.usage);
        if desc.mip_count > 1 {
            // Mipmap generation blits between levels of the same image
            usage |= vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        }
        if desc.usage.is_empty() {
            usage |= texture_usage_to_vk(TextureUsage::SAMPLED);
        }
        let format = format_to_vk(desc.format);

        unsafe {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: desc.size.width,
                    height: desc.size.height,
                    depth: 1,
                })
                .mip_levels(desc.mip_count)
                .array_layers(1)
                .samples(sample_count_to_vk(desc.sample_count))
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = ctx.device.create_image(&image_info, None).map_err(|e| {
                engine_err!(
                    InitializationFailed,
                    "lumen::vulkan",
                    "Failed to create image for texture '{}': {:?}",
                    desc.label,
                    e
                )
            })?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = ctx
                .allocator()
                .and_then(|mut allocator| {
                    allocator
                        .allocate(&AllocationCreateDesc {
                            name: &desc.label,
                            requirements,
                            location: MemoryLocation::GpuOnly,
                            linear: false,
                            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                        })
                        .map_err(|e| {
                            let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                            engine_error!(
                                "lumen::vulkan",
                                "Out of GPU memory for texture '{}' ({:.2} MB): {}",
                                desc.label,
                                size_mb,
                                e
                            );
                            Error::OutOfMemory
                        })
                });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(err) => {
                    ctx.device.destroy_image(image, None);
                    return Err(err);
                }
            };

            let mut texture = Self {
                ctx: Arc::clone(ctx),
                desc,
                image,
                view: vk::ImageView::null(),
                allocation: Some(allocation),
                tracker: LayoutTracker::new(),
                valid: AtomicBool::new(true),
            };

            // From here on Drop releases whatever was created
            let allocation = texture.allocation.as_ref().map(|a| (a.memory(), a.offset()));
            if let Some((memory, offset)) = allocation {
                ctx.device.bind_image_memory(image, memory, offset).map_err(|e| {
                    engine_err!("lumen::vulkan", "Failed to bind memory of texture '{}': {:?}", texture.desc.label, e)
                })?;
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_to_vk(texture.desc.format.aspects()),
                    base_mip_level: 0,
                    level_count: texture.desc.mip_count,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            texture.view = ctx.device.create_image_view(&view_info, None).map_err(|e| {
                engine_err!(
                    InitializationFailed,
                    "lumen::vulkan",
                    "Failed to create view of texture '{}': {:?}",
                    texture.desc.label,
                    e
                )
            })?;

            engine_debug!(
                "lumen::vulkan",
                "Created texture '{}' {:?} {}x{} ({} mips)",
                texture.desc.label,
                texture.desc.format,
                texture.desc.size.width,
                texture.desc.size.height,
                texture.desc.mip_count
            );
            Ok(texture)
        }
    }

    /// Vulkan image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// View over every mip level and aspect
    pub fn view(&self) -> vk::ImageView {
        self.view
    }
}

impl Texture for VulkanTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire) && self.view != vk::ImageView::null()
    }

    fn layout_tracker(&self) -> &LayoutTracker {
        &self.tracker
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        self.valid.store(false, Ordering::Release);
        unsafe {
            if self.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.view, None);
            }

            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails; the image still has to go
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_image(self.image, None);
        }
    }
}
