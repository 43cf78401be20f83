/// Pipeline trait and the binding layout a pipeline declares
///
/// Pipelines are compiled outside this crate; the core only needs the
/// shader-visible binding layout to validate descriptor writes and the
/// backend handles to bind.

use std::any::Any;

use crate::renderer::ShaderStageFlags;

/// Kind of descriptor declared at a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    UniformBuffer,
    CombinedImageSampler,
}

/// One declared binding (`layout(binding = N)` in GLSL)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingLayoutEntry {
    pub binding: u32,
    pub kind: DescriptorKind,
    pub stages: ShaderStageFlags,
}

/// Descriptor set 0 layout of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BindingLayout {
    pub entries: Vec<BindingLayoutEntry>,
}

impl BindingLayout {
    pub fn new(entries: Vec<BindingLayoutEntry>) -> Self {
        Self { entries }
    }

    /// Declared entry at `binding`
    pub fn entry(&self, binding: u32) -> Option<&BindingLayoutEntry> {
        self.entries.iter().find(|entry| entry.binding == binding)
    }

    /// Number of descriptors of `kind`
    pub fn count(&self, kind: DescriptorKind) -> u32 {
        self.entries.iter().filter(|entry| entry.kind == kind).count() as u32
    }
}

/// Graphics pipeline trait
pub trait Pipeline: Send + Sync {
    fn label(&self) -> &str;

    fn is_valid(&self) -> bool;

    /// Layout of descriptor set 0
    fn binding_layout(&self) -> &BindingLayout;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}
