/// CommandList trait - the recording target passes encode into
///
/// A backend command list wraps one device command buffer in the recording
/// state. Every method records exactly one device command and fails if the
/// list is not in a state where that command is legal.

use crate::error::Result;
use crate::renderer::{
    ClearValue, DescriptorSet, DeviceBuffer, Framebuffer, ImageBarrier, IndexType, Offset2D,
    PassObject, Pipeline, Rect2D, Texture, Viewport,
};

/// Copy between two textures (color aspect, mip 0, layer 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopy {
    pub source_region: Rect2D,
    pub destination_origin: Offset2D,
}

/// Command list for recording GPU commands
pub trait CommandList: Send {
    /// Record an image memory barrier
    fn pipeline_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()>;

    /// Begin a render pass with inline subpass contents
    ///
    /// # Arguments
    ///
    /// * `pass` - Pass object the frame buffer was created against
    /// * `framebuffer` - Concrete attachments
    /// * `render_area` - Area affected by load/store operations
    /// * `clear_values` - One value per attachment slot, in slot order
    fn begin_render_pass(
        &mut self,
        pass: &dyn PassObject,
        framebuffer: &dyn Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    /// Bind a descriptor set to the graphics bind point
    fn bind_descriptor_set(&mut self, pipeline: &dyn Pipeline, set_index: u32, set: &dyn DescriptorSet) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Stencil reference for both faces
    fn set_stencil_reference(&mut self, reference: u32) -> Result<()>;

    /// Bind a vertex buffer at binding 0
    fn bind_vertex_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, index_type: IndexType) -> Result<()>;

    /// Draw indexed vertices
    ///
    /// # Arguments
    ///
    /// * `index_count` - Number of indices to draw
    /// * `instance_count` - Number of instances
    /// * `first_index` - First index in the index buffer
    /// * `vertex_offset` - Value added to each index before fetching vertices
    /// * `first_instance` - First instance id
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    /// Copy texels (source in `TransferSrc`, destination in `TransferDst`)
    fn copy_texture_to_texture(&mut self, source: &dyn Texture, destination: &dyn Texture, copy: &TextureCopy) -> Result<()>;

    /// Copy texels tightly packed into a buffer (source in `TransferSrc`)
    fn copy_texture_to_buffer(
        &mut self,
        source: &dyn Texture,
        destination: &dyn DeviceBuffer,
        source_region: Rect2D,
        destination_offset: u64,
    ) -> Result<()>;

    /// Linear-filtered blit of mip 0 into mip `level`
    ///
    /// Mip 0 must be in `TransferSrc` and `level` in `TransferDst`.
    fn blit_mip_level(&mut self, texture: &dyn Texture, level: u32) -> Result<()>;
}
