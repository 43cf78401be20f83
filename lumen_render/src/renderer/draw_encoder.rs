/// Draw encoder: per-command dynamic state and the indexed draw

use crate::error::Result;
use crate::renderer::{
    bind_resources, debug_group, Command, CommandEncoder, Device, ISize, Rect, Rect2D,
    TrackedResource, Viewport,
};
use crate::{engine_bail, engine_err};

/// Device viewport for `command` on a target of `target_size`
///
/// The rectangle (explicit or the full target) is flipped on Y: the origin
/// moves to its bottom edge and the height becomes negative. Depth range is
/// always [0, 1].
pub fn viewport_for(command: &Command, target_size: ISize) -> Viewport {
    let rect = command.viewport.unwrap_or_else(|| Rect::from_size(target_size));
    Viewport {
        x: rect.x,
        y: rect.y + rect.height,
        width: rect.width,
        height: -rect.height,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor for `command`, defaulting to the full target
pub fn scissor_for(command: &Command, target_size: ISize) -> Rect2D {
    command.scissor.unwrap_or_else(|| Rect2D::from_size(target_size))
}

/// Encode one draw command inside an active render pass
///
/// Zero indices or zero instances is a successful no-op. The command label
/// wraps everything recorded here in a debug group.
///
/// # Errors
///
/// Fails if the pipeline is invalid, binding fails, either buffer view is
/// missing or does not resolve, tracking fails or the recorder rejects a call.
pub fn encode_draw(
    device: &dyn Device,
    encoder: &mut dyn CommandEncoder,
    command: &Command,
    target_size: ISize,
) -> Result<()> {
    if command.index_count == 0 || command.instance_count == 0 {
        return Ok(());
    }
    let Some(pipeline) = command.pipeline.as_deref() else {
        return Ok(());
    };
    if !pipeline.is_valid() {
        engine_bail!(
            InvalidResource,
            "lumen::DrawEncoder",
            "Pipeline '{}' is not valid",
            pipeline.label()
        );
    }

    let mut scope = debug_group(encoder, &command.label);
    let encoder = &mut **scope;

    bind_resources(device, encoder, command, pipeline)?;

    let list = encoder.command_list();
    list.bind_pipeline(pipeline)?;
    list.set_viewport(viewport_for(command, target_size))?;
    list.set_scissor(scissor_for(command, target_size))?;
    list.set_stencil_reference(command.stencil_reference)?;

    let (Some(vertex_view), Some(index_view)) = (command.vertex_buffer(), command.index_buffer.as_ref()) else {
        engine_bail!(
            PreconditionFailed,
            "lumen::DrawEncoder",
            "Command '{}' is missing its vertex or index buffer",
            command.label
        );
    };

    let allocator = device.allocator();
    let resolved = vertex_view
        .buffer
        .device_buffer(allocator)
        .and_then(|vertex| Ok((vertex, index_view.buffer.device_buffer(allocator)?)));
    let (vertex_buffer, index_buffer) = resolved.map_err(|err| {
        engine_err!(
            InvalidResource,
            "lumen::DrawEncoder",
            "Failed to acquire device buffers for vertex and index buffer views: {}",
            err
        )
    })?;

    if !encoder.track(TrackedResource::Buffer(vertex_buffer.clone()))
        || !encoder.track(TrackedResource::Buffer(index_buffer.clone()))
    {
        engine_bail!("lumen::DrawEncoder", "Could not track vertex/index buffers");
    }

    let list = encoder.command_list();
    list.bind_vertex_buffer(&*vertex_buffer, vertex_view.range.offset)?;
    list.bind_index_buffer(&*index_buffer, index_view.range.offset, command.index_type)?;
    list.draw_indexed(
        command.index_count,
        command.instance_count,
        0,
        command.base_vertex,
        0,
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "draw_encoder_tests.rs"]
mod tests;
