/// CommandEncoder trait - the encoder session a pass records through
///
/// The session owns the recording target, a debug-label stack and the set of
/// resources that must stay alive until the device has consumed the recorded
/// work. Passes hold it weakly and check liveness before every encode.

use std::sync::Arc;

use scopeguard::ScopeGuard;

use crate::error::Result;
use crate::renderer::{
    CommandList, DescriptorSet, DeviceBuffer, Framebuffer, PassObject, Pipeline, Sampler, Texture,
};
use crate::engine_warn;

/// A resource kept alive until GPU completion
#[derive(Clone)]
pub enum TrackedResource {
    Texture(Arc<dyn Texture>),
    Buffer(Arc<dyn DeviceBuffer>),
    Sampler(Arc<dyn Sampler>),
    Framebuffer(Arc<dyn Framebuffer>),
    PassObject(Arc<dyn PassObject>),
}

/// Command encoder trait
pub trait CommandEncoder: Send {
    /// False once the session has been submitted or torn down
    fn is_valid(&self) -> bool;

    /// Recording target
    fn command_list(&mut self) -> &mut dyn CommandList;

    /// Keep `resource` alive until the recorded work completes
    ///
    /// Returns false when the tracking table is exhausted.
    fn track(&mut self, resource: TrackedResource) -> bool;

    /// Allocate a descriptor set matching `pipeline`'s binding layout
    fn allocate_descriptor_set(&mut self, pipeline: &dyn Pipeline) -> Result<Box<dyn DescriptorSet>>;

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);

    /// Finish recording, submit, wait for completion and release tracked resources
    fn submit(&mut self) -> Result<()>;
}

/// Push `label` for the lifetime of the returned guard
///
/// An empty label pushes nothing and the guard pops nothing.
pub fn debug_group<'a>(
    encoder: &'a mut dyn CommandEncoder,
    label: &str,
) -> ScopeGuard<&'a mut dyn CommandEncoder, impl FnOnce(&'a mut dyn CommandEncoder)> {
    let pushed = !label.is_empty();
    if pushed {
        encoder.push_debug_group(label);
    }
    scopeguard::guard(encoder, move |encoder| {
        if pushed {
            encoder.pop_debug_group();
        }
    })
}

// ============================================================================
// TrackedResources
// ============================================================================

/// Bounded set of tracked resources
pub struct TrackedResources {
    resources: Vec<TrackedResource>,
    capacity: usize,
}

impl TrackedResources {
    pub fn new(capacity: usize) -> Self {
        Self { resources: Vec::new(), capacity }
    }

    /// Returns false once `capacity` resources are tracked
    pub fn track(&mut self, resource: TrackedResource) -> bool {
        if self.resources.len() >= self.capacity {
            engine_warn!(
                "lumen::TrackedResources",
                "Tracked-resource table exhausted ({} entries)",
                self.capacity
            );
            return false;
        }
        self.resources.push(resource);
        true
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedResource> {
        self.resources.iter()
    }

    /// Drop every reference (call only after the device finished)
    pub fn release(&mut self) -> usize {
        let count = self.resources.len();
        self.resources.clear();
        count
    }
}

// ============================================================================
// DebugGroupStack
// ============================================================================

/// Labels of the open debug groups
#[derive(Debug, Default)]
pub struct DebugGroupStack {
    labels: Vec<String>,
}

impl DebugGroupStack {
    pub fn push(&mut self, label: &str) {
        self.labels.push(label.to_string());
    }

    /// Pop the innermost label; warns on an unbalanced pop
    pub fn pop(&mut self) -> Option<String> {
        let label = self.labels.pop();
        if label.is_none() {
            engine_warn!("lumen::DebugGroupStack", "pop_debug_group without a matching push");
        }
        label
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
#[path = "command_encoder_tests.rs"]
mod tests;
