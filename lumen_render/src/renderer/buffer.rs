/// Buffer traits, buffer views and the host-side staging buffer

use std::any::Any;
use std::sync::{Arc, Mutex};

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::{engine_bail, engine_err};

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }
}

/// Descriptor for creating a device buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBufferDesc {
    /// Debug label
    pub label: String,
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
}

/// A buffer living in device-visible memory
pub trait DeviceBuffer: Send + Sync {
    fn label(&self) -> &str;

    /// Size in bytes
    fn size(&self) -> u64;

    /// False once the backing allocation is gone
    fn is_valid(&self) -> bool;

    /// Copy `data` into the buffer at `offset` (host-visible memory only)
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Creates device buffers
pub trait Allocator: Send + Sync {
    fn create_buffer(&self, desc: &DeviceBufferDesc) -> Result<Arc<dyn DeviceBuffer>>;
}

/// Anything that can be resolved to a device buffer
///
/// Resolution must be idempotent: resolving the same buffer twice without
/// modifying it returns the same device allocation.
pub trait Buffer: Send + Sync {
    fn device_buffer(&self, allocator: &dyn Allocator) -> Result<Arc<dyn DeviceBuffer>>;
}

/// Check that `[offset, offset + len)` lies inside a buffer of `size` bytes
pub fn check_write_bounds(label: &str, size: u64, offset: u64, len: usize) -> Result<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(engine_err!(
            InvalidResource,
            "lumen::Buffer",
            "Write of {} bytes at offset {} overflows buffer '{}' ({} bytes)",
            len,
            offset,
            label,
            size
        )),
    }
}

// ============================================================================
// Buffer views
// ============================================================================

/// Byte range within a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferRange {
    pub offset: u64,
    pub length: u64,
}

impl BufferRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }
}

/// A buffer plus the range of it a binding refers to
#[derive(Clone)]
pub struct BufferView {
    pub buffer: Arc<dyn Buffer>,
    pub range: BufferRange,
}

impl BufferView {
    pub fn new(buffer: Arc<dyn Buffer>, range: BufferRange) -> Self {
        Self { buffer, range }
    }
}

impl std::fmt::Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView").field("range", &self.range).finish()
    }
}

// ============================================================================
// ResidentBuffer
// ============================================================================

/// A device buffer that already exists
pub struct ResidentBuffer {
    device_buffer: Arc<dyn DeviceBuffer>,
}

impl ResidentBuffer {
    pub fn new(device_buffer: Arc<dyn DeviceBuffer>) -> Self {
        Self { device_buffer }
    }

    /// View over the whole buffer
    pub fn view(device_buffer: Arc<dyn DeviceBuffer>) -> BufferView {
        let size = device_buffer.size();
        BufferView::new(Arc::new(Self::new(device_buffer)), BufferRange::new(0, size))
    }
}

impl Buffer for ResidentBuffer {
    fn device_buffer(&self, _allocator: &dyn Allocator) -> Result<Arc<dyn DeviceBuffer>> {
        if !self.device_buffer.is_valid() {
            engine_bail!(
                InvalidResource,
                "lumen::Buffer",
                "Device buffer '{}' is no longer valid",
                self.device_buffer.label()
            );
        }
        Ok(self.device_buffer.clone())
    }
}

// ============================================================================
// HostBuffer
// ============================================================================

struct HostBufferState {
    bytes: Vec<u8>,
    generation: u64,
    uploaded: Option<(u64, Arc<dyn DeviceBuffer>)>,
}

/// CPU-side byte arena uploaded lazily on first resolution
///
/// The uploaded device buffer is reused until new bytes are emplaced.
pub struct HostBuffer {
    label: String,
    state: Mutex<HostBufferState>,
}

impl HostBuffer {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            state: Mutex::new(HostBufferState {
                bytes: Vec::new(),
                generation: 0,
                uploaded: None,
            }),
        })
    }

    /// Append `data` at the next multiple of `alignment` and return a view of it
    pub fn emplace(self: &Arc<Self>, data: &[u8], alignment: u64) -> Result<BufferView> {
        let mut state = self.lock()?;
        let alignment = alignment.max(1);
        let offset = (state.bytes.len() as u64).div_ceil(alignment) * alignment;
        state.bytes.resize(offset as usize, 0);
        state.bytes.extend_from_slice(data);
        state.generation += 1;
        drop(state);

        let buffer: Arc<dyn Buffer> = self.clone();
        Ok(BufferView::new(buffer, BufferRange::new(offset, data.len() as u64)))
    }

    /// Bytes emplaced so far
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.bytes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HostBufferState>> {
        self.state.lock().map_err(|_| {
            Error::BackendError(format!("Host buffer '{}' lock poisoned", self.label))
        })
    }
}

impl Buffer for HostBuffer {
    fn device_buffer(&self, allocator: &dyn Allocator) -> Result<Arc<dyn DeviceBuffer>> {
        let mut state = self.lock()?;
        if let Some((generation, buffer)) = &state.uploaded {
            if *generation == state.generation && buffer.is_valid() {
                return Ok(buffer.clone());
            }
        }

        let buffer = allocator.create_buffer(&DeviceBufferDesc {
            label: self.label.clone(),
            size: (state.bytes.len() as u64).max(1),
            usage: BufferUsage::VERTEX | BufferUsage::INDEX | BufferUsage::UNIFORM,
        })?;
        buffer.write(0, &state.bytes)?;
        state.uploaded = Some((state.generation, buffer.clone()));
        Ok(buffer)
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
