/// VulkanBuffer - Vulkan implementation of the DeviceBuffer trait
///
/// Buffers live in host-visible memory so `write` and `read` go straight
/// through the persistent mapping. `VulkanAllocator` hands them out to the
/// core `Buffer` abstraction.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_render::lumen::render::{check_write_bounds, Allocator, DeviceBuffer, DeviceBufferDesc};
use lumen_render::lumen::{Error, Result};
use lumen_render::{engine_bail, engine_err, engine_error, engine_trace};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::buffer_usage_to_vk;

/// Vulkan buffer implementation
pub struct VulkanBuffer {
    /// Shared GPU context
    ctx: Arc<GpuContext>,
    label: String,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Buffer size in bytes
    size: u64,
}

impl VulkanBuffer {
    /// Create a host-visible buffer and bind its memory
    pub(crate) fn create(ctx: &Arc<GpuContext>, desc: &DeviceBufferDesc) -> Result<Self> {
        if desc.size == 0 {
            engine_bail!(PreconditionFailed, "lumen::vulkan", "Buffer '{}' has size 0", desc.label);
        }

        unsafe {
            // Every buffer can be a copy destination (readback)
            let buffer_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage) | vk::BufferUsageFlags::TRANSFER_DST)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_info, None).map_err(|e| {
                engine_err!(
                    "lumen::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}",
                    desc.label,
                    desc.size,
                    e
                )
            })?;

            let requirements = ctx.device.get_buffer_memory_requirements(buffer);
            let allocation = ctx.allocator().and_then(|mut allocator| {
                allocator
                    .allocate(&AllocationCreateDesc {
                        name: &desc.label,
                        requirements,
                        location: MemoryLocation::CpuToGpu,
                        linear: true,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|_e| {
                        let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                        engine_error!(
                            "lumen::vulkan",
                            "Out of GPU memory for buffer '{}' (required: {:.2} MB)",
                            desc.label,
                            size_mb
                        );
                        Error::OutOfMemory
                    })
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(err) => {
                    ctx.device.destroy_buffer(buffer, None);
                    return Err(err);
                }
            };

            let (memory, offset) = (allocation.memory(), allocation.offset());
            let created = Self {
                ctx: Arc::clone(ctx),
                label: desc.label.clone(),
                buffer,
                allocation: Some(allocation),
                size: desc.size,
            };
            ctx.device.bind_buffer_memory(buffer, memory, offset).map_err(|e| {
                engine_err!("lumen::vulkan", "Failed to bind memory of buffer '{}': {:?}", desc.label, e)
            })?;

            Ok(created)
        }
    }

    /// Vulkan buffer handle
    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// Copy `len` bytes starting at `offset` out of the mapping
    ///
    /// The caller is responsible for waiting on the GPU work that wrote them.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        check_write_bounds(&self.label, self.size, offset, len)?;
        let mapped = self.mapped()?;
        let start = offset as usize;
        Ok(mapped[start..start + len].to_vec())
    }

    fn mapped(&self) -> Result<&[u8]> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| engine_err!("lumen::vulkan", "Buffer '{}' is not CPU-accessible", self.label))
    }
}

impl DeviceBuffer for VulkanBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_valid(&self) -> bool {
        self.allocation.is_some()
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_write_bounds(&self.label, self.size, offset, data.len())?;
        let allocation = match &self.allocation {
            Some(allocation) => allocation,
            None => {
                engine_bail!("lumen::vulkan", "Buffer '{}' write failed: no GPU allocation", self.label);
            }
        };
        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("lumen::vulkan", "Buffer '{}' is not CPU-accessible", self.label))?
            .as_ptr() as *mut u8;

        // Bounds were checked above; the mapping covers the whole allocation
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        engine_trace!("lumen::vulkan", "Wrote {} bytes to buffer '{}' at {}", data.len(), self.label, offset);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if the lock fails; the buffer still has to go
                if let Ok(mut allocator) = self.ctx.allocator() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

// ============================================================================
// VulkanAllocator
// ============================================================================

/// Device-buffer factory handed to the core `Buffer` abstraction
pub struct VulkanAllocator {
    ctx: Arc<GpuContext>,
}

impl VulkanAllocator {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }
}

impl Allocator for VulkanAllocator {
    fn create_buffer(&self, desc: &DeviceBufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        Ok(Arc::new(VulkanBuffer::create(&self.ctx, desc)?))
    }
}
