/// Resource binder: per-command descriptor set allocation and writes
///
/// Writes are collected first and applied in a single device update, so a
/// command that fails half way leaves nothing visible to the device.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::renderer::{
    Allocator, Bindings, BindingLayout, Command, CommandEncoder, DescriptorKind, DescriptorWrite,
    Device, Pipeline, TrackedResource, RESERVED_VERTEX_BUFFER_INDEX,
};
use crate::{engine_bail, engine_err};

struct WriteBatch<'a> {
    pipeline: &'a dyn Pipeline,
    writes: Vec<DescriptorWrite>,
    written: BTreeSet<u32>,
}

impl WriteBatch<'_> {
    fn layout(&self) -> &BindingLayout {
        self.pipeline.binding_layout()
    }

    /// Queue `write` unless its binding is already written (stages sharing a slot)
    fn push(&mut self, write: DescriptorWrite, kind: DescriptorKind) -> Result<()> {
        let binding = write.binding();
        match self.layout().entry(binding) {
            Some(entry) if entry.kind == kind => {}
            Some(entry) => engine_bail!(
                InvalidResource,
                "lumen::ResourceBinder",
                "Pipeline '{}' declares binding {} as {:?}, not {:?}",
                self.pipeline.label(),
                binding,
                entry.kind,
                kind
            ),
            None => engine_bail!(
                InvalidResource,
                "lumen::ResourceBinder",
                "Pipeline '{}' does not declare binding {}",
                self.pipeline.label(),
                binding
            ),
        }
        if self.written.insert(binding) {
            self.writes.push(write);
        }
        Ok(())
    }
}

fn track(encoder: &mut dyn CommandEncoder, resource: TrackedResource, what: &str) -> Result<()> {
    if !encoder.track(resource) {
        engine_bail!("lumen::ResourceBinder", "Could not track {}", what);
    }
    Ok(())
}

fn collect_buffers(
    bindings: &Bindings,
    allocator: &dyn Allocator,
    encoder: &mut dyn CommandEncoder,
    batch: &mut WriteBatch<'_>,
) -> Result<()> {
    for (&index, view) in &bindings.buffers {
        if index == RESERVED_VERTEX_BUFFER_INDEX {
            continue;
        }

        let device_buffer = view.buffer.device_buffer(allocator).map_err(|err| {
            engine_err!(
                InvalidResource,
                "lumen::ResourceBinder",
                "Failed to resolve device buffer for buffer index {}: {}",
                index,
                err
            )
        })?;

        let Some(uniform) = bindings.uniforms.get(&index) else {
            engine_bail!(
                PreconditionFailed,
                "lumen::ResourceBinder",
                "Buffer index {} has no uniform slot",
                index
            );
        };

        track(encoder, TrackedResource::Buffer(device_buffer.clone()), &format!("uniform '{}'", uniform.name))?;

        batch.push(
            DescriptorWrite::UniformBuffer {
                binding: uniform.binding,
                buffer: device_buffer,
                offset: view.range.offset,
                range: view.range.length,
            },
            DescriptorKind::UniformBuffer,
        )?;
    }
    Ok(())
}

fn collect_images(
    bindings: &Bindings,
    encoder: &mut dyn CommandEncoder,
    batch: &mut WriteBatch<'_>,
) -> Result<()> {
    for (&index, sampler) in &bindings.samplers {
        let Some(texture) = bindings.textures.get(&index) else {
            engine_bail!(
                PreconditionFailed,
                "lumen::ResourceBinder",
                "Sampler at index {} has no texture bound at the same index",
                index
            );
        };
        let Some(slot) = bindings.sampled_images.get(&index) else {
            engine_bail!(
                PreconditionFailed,
                "lumen::ResourceBinder",
                "Texture at index {} has no sampled image slot",
                index
            );
        };
        if !texture.is_valid() || !sampler.is_valid() {
            engine_bail!(
                InvalidResource,
                "lumen::ResourceBinder",
                "Sampled image '{}' refers to a destroyed texture or sampler",
                slot.name
            );
        }

        track(encoder, TrackedResource::Texture(texture.clone()), &format!("texture '{}'", texture.desc().label))?;
        track(encoder, TrackedResource::Sampler(sampler.clone()), &format!("sampler for '{}'", slot.name))?;

        batch.push(
            DescriptorWrite::CombinedImageSampler {
                binding: slot.binding,
                texture: texture.clone(),
                sampler: sampler.clone(),
            },
            DescriptorKind::CombinedImageSampler,
        )?;
    }
    Ok(())
}

/// Allocate, fill and bind descriptor set 0 for `command`
///
/// Buffers of both stages are written at their uniform slot, skipping the
/// reserved vertex-data index. Every sampler must have a texture at the same
/// index. Textures are expected to already be in `ShaderReadOnly`.
///
/// # Errors
///
/// Any resolution, tracking, validation or device failure aborts the whole
/// command before the batch reaches the device.
pub fn bind_resources(
    device: &dyn Device,
    encoder: &mut dyn CommandEncoder,
    command: &Command,
    pipeline: &dyn Pipeline,
) -> Result<()> {
    let set = encoder.allocate_descriptor_set(pipeline)?;

    let mut batch = WriteBatch {
        pipeline,
        writes: Vec::new(),
        written: BTreeSet::new(),
    };
    let allocator = device.allocator();
    collect_buffers(&command.vertex_bindings, allocator, encoder, &mut batch)?;
    collect_buffers(&command.fragment_bindings, allocator, encoder, &mut batch)?;
    collect_images(&command.vertex_bindings, encoder, &mut batch)?;
    collect_images(&command.fragment_bindings, encoder, &mut batch)?;

    if !batch.writes.is_empty() {
        device.update_descriptor_set(&*set, &batch.writes)?;
    }

    encoder.command_list().bind_descriptor_set(pipeline, 0, &*set)?;
    Ok(())
}

#[cfg(test)]
#[path = "resource_binder_tests.rs"]
mod tests;
