/// Texture trait and texture descriptor

use std::any::Any;

use bitflags::bitflags;

use crate::error::Result;
use crate::renderer::{
    CommandList, ISize, ImageLayout, LayoutTracker, LayoutTransition, ResourceState, SampleCount,
    TextureFormat,
};

bitflags! {
    /// How a texture may be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const SAMPLED = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const TRANSFER_SRC = 1 << 3;
        const TRANSFER_DST = 1 << 4;
    }
}

/// Descriptor for creating a texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label
    pub label: String,
    /// Pixel format
    pub format: TextureFormat,
    /// Size of mip 0
    pub size: ISize,
    /// Multisample count
    pub sample_count: SampleCount,
    /// Number of mip levels (>= 1)
    pub mip_count: u32,
    /// Usage flags
    pub usage: TextureUsage,
}

impl TextureDesc {
    /// Single-sampled, single-mip 2D texture
    pub fn new(label: impl Into<String>, format: TextureFormat, size: ISize, usage: TextureUsage) -> Self {
        Self {
            label: label.into(),
            format,
            size,
            sample_count: SampleCount::Count1,
            mip_count: 1,
            usage,
        }
    }

    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn with_mip_count(mut self, mip_count: u32) -> Self {
        self.mip_count = mip_count.max(1);
        self
    }
}

/// Texture resource trait
///
/// Implemented by backend textures. The backend owns the device image; the
/// core only reads the descriptor and drives layout state through the
/// [`LayoutTracker`] the texture carries.
pub trait Texture: Send + Sync {
    /// Creation descriptor
    fn desc(&self) -> &TextureDesc;

    /// False once the backing device image is gone
    fn is_valid(&self) -> bool;

    /// Recorded per-plane layout state
    fn layout_tracker(&self) -> &LayoutTracker;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

impl dyn Texture {
    /// Record a barrier moving this texture into `transition.new_layout`
    ///
    /// Returns `Ok(false)` when the recorded state already satisfies the
    /// request and no barrier was needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture is invalid or the recorder rejects the
    /// barrier. Only planes whose barrier was recorded before the failure move
    /// to the new state.
    pub fn set_layout(&self, transition: &LayoutTransition, recorder: &mut dyn CommandList) -> Result<bool> {
        self.layout_tracker().transition(self, transition, recorder)
    }

    /// Overwrite the recorded state of every plane without recording a barrier
    ///
    /// Used after hand-written barrier sequences. Returns the previous layout
    /// of the primary plane.
    pub fn set_layout_without_encoding(&self, state: ResourceState) -> ImageLayout {
        self.layout_tracker().replace_all(self.desc().format, state)
    }

    /// Layout of the primary plane (color or depth, stencil for stencil-only formats)
    pub fn layout(&self) -> ImageLayout {
        self.layout_tracker().layout(self.desc().format)
    }
}
