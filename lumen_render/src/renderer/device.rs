/// Device trait and the device objects a render pass creates
///
/// The device is the factory side of a backend: it creates pass objects and
/// frame buffers, applies batched descriptor writes and names objects for
/// debugging tools.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::renderer::{
    Allocator, DeviceBuffer, FramebufferDesc, PassDescription, Sampler, Texture,
};

/// Device-side render pass object
pub trait PassObject: Send + Sync {
    /// Description the object was created from
    fn description(&self) -> &PassDescription;

    fn is_valid(&self) -> bool;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Device-side frame buffer
pub trait Framebuffer: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// One allocated descriptor set (set 0 of a pipeline)
pub trait DescriptorSet: Send + Sync {
    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// One write into a descriptor set
#[derive(Clone)]
pub enum DescriptorWrite {
    UniformBuffer {
        binding: u32,
        buffer: Arc<dyn DeviceBuffer>,
        offset: u64,
        range: u64,
    },
    CombinedImageSampler {
        binding: u32,
        texture: Arc<dyn Texture>,
        sampler: Arc<dyn Sampler>,
    },
}

impl DescriptorWrite {
    pub fn binding(&self) -> u32 {
        match self {
            DescriptorWrite::UniformBuffer { binding, .. } => *binding,
            DescriptorWrite::CombinedImageSampler { binding, .. } => *binding,
        }
    }
}

impl std::fmt::Debug for DescriptorWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptorWrite::UniformBuffer { binding, buffer, offset, range } => f
                .debug_struct("UniformBuffer")
                .field("binding", binding)
                .field("buffer", &buffer.label())
                .field("offset", offset)
                .field("range", range)
                .finish(),
            DescriptorWrite::CombinedImageSampler { binding, texture, .. } => f
                .debug_struct("CombinedImageSampler")
                .field("binding", binding)
                .field("texture", &texture.desc().label)
                .finish(),
        }
    }
}

/// Object passed to [`Device::set_debug_name`]
#[derive(Clone, Copy)]
pub enum DebugObject<'a> {
    Pass(&'a dyn PassObject),
    Texture(&'a dyn Texture),
    Buffer(&'a dyn DeviceBuffer),
}

/// Graphics device trait
pub trait Device: Send + Sync {
    /// Create the device pass object for `desc`
    fn create_pass_object(&self, desc: &PassDescription) -> Result<Arc<dyn PassObject>>;

    /// Bind the textures of `desc` to `pass`
    fn create_framebuffer(&self, pass: &dyn PassObject, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>>;

    /// Apply `writes` to `set` in one device call
    fn update_descriptor_set(&self, set: &dyn DescriptorSet, writes: &[DescriptorWrite]) -> Result<()>;

    /// Allocator used to resolve buffer views
    fn allocator(&self) -> &dyn Allocator;

    /// Attach a debug name (no-op without debug utilities)
    fn set_debug_name(&self, object: DebugObject<'_>, name: &str);
}
