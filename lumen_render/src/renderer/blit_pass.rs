/// Blit pass: texture copies and mipmap generation
///
/// Shares the encoder session, the weak encoder handle and the layout
/// tracker with [`RenderPass`](crate::renderer::RenderPass). Commands are
/// recorded outside any render pass.

use std::sync::{Arc, Mutex, Weak};

use crate::error::Result;
use crate::renderer::{
    debug_group, CommandEncoder, DeviceBuffer, ImageAspect, ImageBarrier, LayoutTransition,
    Offset2D, PassState, Rect2D, ResourceState, Texture, TextureCopy, TrackedResource,
};
use crate::{engine_bail, engine_debug, engine_err};

/// One blit operation
#[derive(Clone)]
pub enum BlitCommand {
    /// Copy a region of `source` into `destination` at `destination_origin`
    CopyTextureToTexture {
        source: Arc<dyn Texture>,
        destination: Arc<dyn Texture>,
        source_region: Rect2D,
        destination_origin: Offset2D,
        label: String,
    },
    /// Copy a region of `source` tightly packed into `destination`
    CopyTextureToBuffer {
        source: Arc<dyn Texture>,
        destination: Arc<dyn DeviceBuffer>,
        source_region: Rect2D,
        destination_offset: u64,
        label: String,
    },
    /// Fill mips 1..n of `texture` from mip 0
    GenerateMipmap {
        texture: Arc<dyn Texture>,
        label: String,
    },
}

impl BlitCommand {
    pub fn label(&self) -> &str {
        match self {
            BlitCommand::CopyTextureToTexture { label, .. }
            | BlitCommand::CopyTextureToBuffer { label, .. }
            | BlitCommand::GenerateMipmap { label, .. } => label,
        }
    }

    fn encode(&self, encoder: &mut dyn CommandEncoder) -> Result<()> {
        match self {
            BlitCommand::CopyTextureToTexture {
                source,
                destination,
                source_region,
                destination_origin,
                ..
            } => encode_texture_copy(encoder, source, destination, *source_region, *destination_origin),
            BlitCommand::CopyTextureToBuffer {
                source,
                destination,
                source_region,
                destination_offset,
                ..
            } => encode_buffer_copy(encoder, source, destination, *source_region, *destination_offset),
            BlitCommand::GenerateMipmap { texture, .. } => encode_mipmap(encoder, texture),
        }
    }
}

fn track(encoder: &mut dyn CommandEncoder, resource: TrackedResource) -> Result<()> {
    if !encoder.track(resource) {
        engine_bail!("lumen::BlitPass", "Could not track blit resource");
    }
    Ok(())
}

fn require_color(texture: &dyn Texture) -> Result<()> {
    let desc = texture.desc();
    if !desc.format.is_color() {
        engine_bail!(
            InvalidResource,
            "lumen::BlitPass",
            "Texture '{}' has non-color format {:?}",
            desc.label,
            desc.format
        );
    }
    Ok(())
}

fn encode_texture_copy(
    encoder: &mut dyn CommandEncoder,
    source: &Arc<dyn Texture>,
    destination: &Arc<dyn Texture>,
    source_region: Rect2D,
    destination_origin: Offset2D,
) -> Result<()> {
    require_color(source.as_ref())?;
    require_color(destination.as_ref())?;

    let destination_region = Rect2D {
        x: destination_origin.x,
        y: destination_origin.y,
        width: source_region.width,
        height: source_region.height,
    };
    if !source_region.fits_within(source.desc().size)
        || !destination_region.fits_within(destination.desc().size)
    {
        engine_bail!(
            PreconditionFailed,
            "lumen::BlitPass",
            "Copy region {:?} from '{}' to '{}' at {:?} is out of bounds",
            source_region,
            source.desc().label,
            destination.desc().label,
            destination_origin
        );
    }

    source
        .set_layout(&LayoutTransition::TRANSFER_SRC, encoder.command_list())
        .and_then(|_| destination.set_layout(&LayoutTransition::TRANSFER_DST, encoder.command_list()))
        .map_err(|err| engine_err!("lumen::BlitPass", "Could not complete layout transitions: {}", err))?;

    track(encoder, TrackedResource::Texture(source.clone()))?;
    track(encoder, TrackedResource::Texture(destination.clone()))?;

    encoder.command_list().copy_texture_to_texture(
        source.as_ref(),
        destination.as_ref(),
        &TextureCopy { source_region, destination_origin },
    )
}

fn encode_buffer_copy(
    encoder: &mut dyn CommandEncoder,
    source: &Arc<dyn Texture>,
    destination: &Arc<dyn DeviceBuffer>,
    source_region: Rect2D,
    destination_offset: u64,
) -> Result<()> {
    require_color(source.as_ref())?;
    let desc = source.desc();
    if !source_region.fits_within(desc.size) {
        engine_bail!(
            PreconditionFailed,
            "lumen::BlitPass",
            "Copy region {:?} is outside texture '{}'",
            source_region,
            desc.label
        );
    }
    let bytes = source_region.width as u64 * source_region.height as u64 * desc.format.bytes_per_pixel() as u64;
    if destination_offset.saturating_add(bytes) > destination.size() {
        engine_bail!(
            PreconditionFailed,
            "lumen::BlitPass",
            "Buffer '{}' ({} bytes) cannot hold {} bytes at offset {}",
            destination.label(),
            destination.size(),
            bytes,
            destination_offset
        );
    }
    if !destination.is_valid() {
        engine_bail!(InvalidResource, "lumen::BlitPass", "Buffer '{}' is not valid", destination.label());
    }

    source
        .set_layout(&LayoutTransition::TRANSFER_SRC, encoder.command_list())
        .map_err(|err| engine_err!("lumen::BlitPass", "Could not encode layout transition: {}", err))?;

    track(encoder, TrackedResource::Texture(source.clone()))?;
    track(encoder, TrackedResource::Buffer(destination.clone()))?;

    encoder.command_list().copy_texture_to_buffer(
        source.as_ref(),
        destination.as_ref(),
        source_region,
        destination_offset,
    )
}

fn mip_barrier(
    texture: &dyn Texture,
    from: ResourceState,
    to: ResourceState,
    base_mip_level: u32,
    mip_level_count: u32,
) -> ImageBarrier<'_> {
    ImageBarrier {
        texture,
        old_layout: from.layout,
        new_layout: to.layout,
        src_access: from.access,
        dst_access: to.access,
        src_stage: from.stage,
        dst_stage: to.stage,
        aspect: ImageAspect::COLOR,
        base_mip_level,
        mip_level_count,
    }
}

fn encode_mipmap(encoder: &mut dyn CommandEncoder, texture: &Arc<dyn Texture>) -> Result<()> {
    let desc = texture.desc();
    if desc.mip_count < 2 {
        return Ok(());
    }
    require_color(texture.as_ref())?;
    if !texture.is_valid() {
        engine_bail!(InvalidResource, "lumen::BlitPass", "Texture '{}' is not valid", desc.label);
    }

    let image: &dyn Texture = texture.as_ref();
    let levels = desc.mip_count - 1;
    let base = texture.layout_tracker().plane_state(ImageAspect::COLOR);
    let transfer_src = LayoutTransition::TRANSFER_SRC.target_state();
    let transfer_dst = LayoutTransition::TRANSFER_DST.target_state();
    let shader_read = LayoutTransition::SHADER_READ.target_state();

    let list = encoder.command_list();
    list.pipeline_barrier(&mip_barrier(image, base, transfer_src, 0, 1))?;
    list.pipeline_barrier(&mip_barrier(image, ResourceState::UNDEFINED, transfer_dst, 1, levels))?;

    for level in 1..desc.mip_count {
        list.blit_mip_level(image, level)?;
    }

    list.pipeline_barrier(&mip_barrier(image, transfer_src, shader_read, 0, 1))?;
    list.pipeline_barrier(&mip_barrier(image, transfer_dst, shader_read, 1, levels))?;

    texture.set_layout_without_encoding(shader_read);
    track(encoder, TrackedResource::Texture(texture.clone()))?;
    engine_debug!(
        "lumen::BlitPass",
        "Generated {} mip levels for '{}'",
        levels,
        desc.label
    );
    Ok(())
}

/// A pass of copy and mipmap commands
pub struct BlitPass {
    encoder: Weak<Mutex<dyn CommandEncoder>>,
    commands: Vec<BlitCommand>,
    label: String,
    state: PassState,
}

impl BlitPass {
    pub fn new(encoder: Weak<Mutex<dyn CommandEncoder>>) -> Self {
        Self {
            encoder,
            commands: Vec::new(),
            label: String::new(),
            state: PassState::Ready,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn commands(&self) -> &[BlitCommand] {
        &self.commands
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn add_command(&mut self, command: BlitCommand) -> Result<()> {
        if self.state != PassState::Ready {
            engine_bail!(
                InvalidState,
                "lumen::BlitPass",
                "Cannot add a command to blit pass '{}' in state {:?}",
                self.label,
                self.state
            );
        }
        self.commands.push(command);
        Ok(())
    }

    /// Record every queued command; the first failure aborts the rest
    pub fn encode_commands(&mut self) -> Result<()> {
        if self.state != PassState::Ready {
            engine_bail!(
                InvalidState,
                "lumen::BlitPass",
                "Blit pass '{}' cannot encode in state {:?}",
                self.label,
                self.state
            );
        }

        self.state = PassState::Encoding;
        let result = self.encode();
        self.state = PassState::Encoded;
        result
    }

    fn encode(&self) -> Result<()> {
        let Some(encoder) = self.encoder.upgrade() else {
            engine_bail!(
                PreconditionFailed,
                "lumen::BlitPass",
                "Command encoder died before blit commands could be encoded"
            );
        };
        let mut encoder = encoder
            .lock()
            .map_err(|_| engine_err!("lumen::BlitPass", "Command encoder lock poisoned"))?;
        if !encoder.is_valid() {
            engine_bail!(PreconditionFailed, "lumen::BlitPass", "Command encoder is no longer recording");
        }

        let mut session = debug_group(&mut *encoder, &self.label);
        for command in &self.commands {
            let mut scope = debug_group(&mut **session, command.label());
            command.encode(&mut **scope)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "blit_pass_tests.rs"]
mod tests;
