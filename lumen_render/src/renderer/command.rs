/// Draw command and its binding tables

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::renderer::{BufferView, IndexType, Pipeline, Rect, Rect2D, Sampler, Texture};

/// Buffer index reserved for per-vertex data; never written to a descriptor set
pub const RESERVED_VERTEX_BUFFER_INDEX: u32 = 30;

/// A uniform block declared by a shader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderUniformSlot {
    pub name: String,
    /// Descriptor binding number
    pub binding: u32,
}

/// A sampled image declared by a shader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampledImageSlot {
    pub name: String,
    /// Descriptor binding number
    pub binding: u32,
}

/// Resources bound for one shader stage, keyed by binding index
///
/// `uniforms[i]` describes where `buffers[i]` goes. `sampled_images[i]`
/// describes where `textures[i]` + `samplers[i]` go.
#[derive(Clone, Default)]
pub struct Bindings {
    pub uniforms: BTreeMap<u32, ShaderUniformSlot>,
    pub buffers: BTreeMap<u32, BufferView>,
    pub sampled_images: BTreeMap<u32, SampledImageSlot>,
    pub textures: BTreeMap<u32, Arc<dyn Texture>>,
    pub samplers: BTreeMap<u32, Arc<dyn Sampler>>,
}

impl Bindings {
    /// Bind a uniform buffer at `index`
    pub fn bind_buffer(&mut self, index: u32, slot: ShaderUniformSlot, view: BufferView) -> &mut Self {
        self.uniforms.insert(index, slot);
        self.buffers.insert(index, view);
        self
    }

    /// Bind a texture and its sampler at `index`
    pub fn bind_texture(
        &mut self,
        index: u32,
        slot: SampledImageSlot,
        texture: Arc<dyn Texture>,
        sampler: Arc<dyn Sampler>,
    ) -> &mut Self {
        self.sampled_images.insert(index, slot);
        self.textures.insert(index, texture);
        self.samplers.insert(index, sampler);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.textures.is_empty() && self.samplers.is_empty()
    }
}

/// One draw call
#[derive(Clone)]
pub struct Command {
    /// Commands without a pipeline are skipped
    pub pipeline: Option<Arc<dyn Pipeline>>,
    pub vertex_bindings: Bindings,
    pub fragment_bindings: Bindings,
    pub index_buffer: Option<BufferView>,
    pub index_type: IndexType,
    pub index_count: u32,
    pub instance_count: u32,
    pub base_vertex: i32,
    /// Viewport rectangle in target pixels; the full target when `None`
    pub viewport: Option<Rect>,
    /// Scissor rectangle; the full target when `None`
    pub scissor: Option<Rect2D>,
    pub stencil_reference: u32,
    /// Debug group label (empty for none)
    pub label: String,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            pipeline: None,
            vertex_bindings: Bindings::default(),
            fragment_bindings: Bindings::default(),
            index_buffer: None,
            index_type: IndexType::default(),
            index_count: 0,
            instance_count: 1,
            base_vertex: 0,
            viewport: None,
            scissor: None,
            stencil_reference: 0,
            label: String::new(),
        }
    }
}

impl Command {
    pub fn new(pipeline: Arc<dyn Pipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
            ..Self::default()
        }
    }

    /// Set the per-vertex buffer (bound at the reserved index)
    pub fn bind_vertices(&mut self, view: BufferView) -> &mut Self {
        self.vertex_bindings.buffers.insert(RESERVED_VERTEX_BUFFER_INDEX, view);
        self
    }

    /// Set the index buffer and the number of indices to draw
    pub fn bind_indices(&mut self, view: BufferView, index_type: IndexType, index_count: u32) -> &mut Self {
        self.index_buffer = Some(view);
        self.index_type = index_type;
        self.index_count = index_count;
        self
    }

    /// Per-vertex buffer view, if bound
    pub fn vertex_buffer(&self) -> Option<&BufferView> {
        self.vertex_bindings.buffers.get(&RESERVED_VERTEX_BUFFER_INDEX)
    }

    /// Every bound texture, vertex bindings first
    pub fn textures(&self) -> impl Iterator<Item = &Arc<dyn Texture>> {
        self.vertex_bindings.textures.values().chain(self.fragment_bindings.textures.values())
    }
}
