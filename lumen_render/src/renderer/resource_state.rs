/// Resource state tracking and the layout transition protocol
///
/// Every texture carries a [`LayoutTracker`] recording, per image plane, the
/// layout it will be in and the last access/stage that touched it at the point
/// the next recorded command executes. Transitions are the only way to mutate
/// that record: they emit an image barrier whose source is the recorded state
/// and whose destination is the caller's next usage, then commit the new state.
///
/// Planes are tracked separately so that the depth and stencil aspects of one
/// combined image can sit in different layouts.

use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::renderer::{
    AccessFlags, Command, CommandEncoder, CommandList, ImageAspect, ImageLayout,
    PipelineStageFlags, RenderTarget, Texture, TextureFormat, TrackedResource,
};
use crate::{engine_bail, engine_err, engine_trace};

// ============================================================================
// State records
// ============================================================================

/// Recorded state of one image plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    pub layout: ImageLayout,
    pub access: AccessFlags,
    pub stage: PipelineStageFlags,
}

impl ResourceState {
    /// Freshly created image
    pub const UNDEFINED: Self = Self {
        layout: ImageLayout::Undefined,
        access: AccessFlags::empty(),
        stage: PipelineStageFlags::TOP_OF_PIPE,
    };
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

/// A request to move a texture into a layout for its next usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    pub new_layout: ImageLayout,
    pub dst_access: AccessFlags,
    pub dst_stage: PipelineStageFlags,
}

impl LayoutTransition {
    /// Render target color output
    pub const COLOR_ATTACHMENT: Self = Self {
        new_layout: ImageLayout::ColorAttachment,
        dst_access: AccessFlags::COLOR_ATTACHMENT_READ.union(AccessFlags::COLOR_ATTACHMENT_WRITE),
        dst_stage: PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    };

    /// Depth plane written by depth testing
    pub const DEPTH_ATTACHMENT: Self = Self {
        new_layout: ImageLayout::DepthAttachment,
        dst_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            .union(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        dst_stage: PipelineStageFlags::EARLY_FRAGMENT_TESTS
            .union(PipelineStageFlags::LATE_FRAGMENT_TESTS),
    };

    /// Stencil plane written by stencil testing
    pub const STENCIL_ATTACHMENT: Self = Self {
        new_layout: ImageLayout::StencilAttachment,
        dst_access: AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
            .union(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE),
        dst_stage: PipelineStageFlags::EARLY_FRAGMENT_TESTS
            .union(PipelineStageFlags::LATE_FRAGMENT_TESTS),
    };

    /// Sampled from vertex or fragment shaders
    pub const SHADER_READ: Self = Self {
        new_layout: ImageLayout::ShaderReadOnly,
        dst_access: AccessFlags::SHADER_READ,
        dst_stage: PipelineStageFlags::VERTEX_SHADER.union(PipelineStageFlags::FRAGMENT_SHADER),
    };

    /// Copy / blit source
    pub const TRANSFER_SRC: Self = Self {
        new_layout: ImageLayout::TransferSrc,
        dst_access: AccessFlags::TRANSFER_READ,
        dst_stage: PipelineStageFlags::TRANSFER,
    };

    /// Copy / blit destination
    pub const TRANSFER_DST: Self = Self {
        new_layout: ImageLayout::TransferDst,
        dst_access: AccessFlags::TRANSFER_WRITE,
        dst_stage: PipelineStageFlags::TRANSFER,
    };

    /// State a plane is in once this transition is committed
    pub fn target_state(&self) -> ResourceState {
        ResourceState {
            layout: self.new_layout,
            access: self.dst_access,
            stage: self.dst_stage,
        }
    }
}

/// One image memory barrier handed to the recorder
#[derive(Clone, Copy)]
pub struct ImageBarrier<'a> {
    pub texture: &'a dyn Texture,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub src_stage: PipelineStageFlags,
    pub dst_stage: PipelineStageFlags,
    pub aspect: ImageAspect,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
}

// ============================================================================
// Planes
// ============================================================================

const PLANE_COUNT: usize = 2;

fn plane_index(aspect: ImageAspect) -> usize {
    if aspect == ImageAspect::STENCIL { 1 } else { 0 }
}

fn plane_aspect(plane: usize, format: TextureFormat) -> ImageAspect {
    match plane {
        1 => ImageAspect::STENCIL,
        _ if format.is_depth() => ImageAspect::DEPTH,
        _ => ImageAspect::COLOR,
    }
}

fn planes_of(aspect: ImageAspect) -> impl Iterator<Item = usize> {
    [ImageAspect::COLOR | ImageAspect::DEPTH, ImageAspect::STENCIL]
        .into_iter()
        .enumerate()
        .filter(move |(_, plane)| aspect.intersects(*plane))
        .map(|(index, _)| index)
}

/// Aspects of `format` that `layout` applies to
pub fn aspect_for_layout(format: TextureFormat, layout: ImageLayout) -> Result<ImageAspect> {
    let aspects = format.aspects();
    let wanted = match layout {
        ImageLayout::ColorAttachment if !format.is_color() => ImageAspect::empty(),
        ImageLayout::DepthAttachment => aspects & ImageAspect::DEPTH,
        ImageLayout::StencilAttachment => aspects & ImageAspect::STENCIL,
        ImageLayout::DepthStencilAttachment => aspects - ImageAspect::COLOR,
        _ => aspects,
    };
    if wanted.is_empty() {
        return Err(engine_err!(
            InvalidResource,
            "lumen::LayoutTracker",
            "Layout {:?} does not apply to format {:?}",
            layout,
            format
        ));
    }
    Ok(wanted)
}

/// A read in the same layout as an earlier read needs no barrier
fn is_redundant(current: &ResourceState, transition: &LayoutTransition) -> bool {
    current.layout == transition.new_layout
        && current.layout != ImageLayout::Undefined
        && !current.access.has_writes()
        && !transition.dst_access.has_writes()
}

// ============================================================================
// LayoutTracker
// ============================================================================

/// Per-texture recorded state, one entry per image plane
#[derive(Debug)]
pub struct LayoutTracker {
    planes: RwLock<[ResourceState; PLANE_COUNT]>,
}

impl Default for LayoutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTracker {
    pub fn new() -> Self {
        Self::with_state(ResourceState::UNDEFINED)
    }

    /// Tracker for an image that already is in `state` (e.g. an acquired swapchain image)
    pub fn with_state(state: ResourceState) -> Self {
        Self { planes: RwLock::new([state; PLANE_COUNT]) }
    }

    fn read(&self) -> [ResourceState; PLANE_COUNT] {
        *self.planes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Recorded state of the plane holding `aspect`
    pub fn plane_state(&self, aspect: ImageAspect) -> ResourceState {
        self.read()[plane_index(aspect)]
    }

    /// Layout of the primary plane of `format`
    pub fn layout(&self, format: TextureFormat) -> ImageLayout {
        self.plane_state(primary_aspect(format)).layout
    }

    /// Set every plane of `format` to `state`, returning the previous primary layout
    pub fn replace_all(&self, format: TextureFormat, state: ResourceState) -> ImageLayout {
        let mut planes = self.planes.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = planes[plane_index(primary_aspect(format))].layout;
        for plane in planes_of(format.aspects()) {
            planes[plane] = state;
        }
        previous
    }

    /// Record the barriers moving `texture` to `transition` and commit the new state
    ///
    /// Planes whose recorded layout already matches, where neither side
    /// writes, are widened instead of barriered. Planes sharing a recorded
    /// layout are covered by one barrier. Returns whether any barrier was
    /// recorded.
    pub fn transition(
        &self,
        texture: &dyn Texture,
        transition: &LayoutTransition,
        recorder: &mut dyn CommandList,
    ) -> Result<bool> {
        let desc = texture.desc();
        if !texture.is_valid() {
            engine_bail!(
                InvalidResource,
                "lumen::LayoutTracker",
                "Cannot transition texture '{}': device image is no longer valid",
                desc.label
            );
        }
        let aspect = aspect_for_layout(desc.format, transition.new_layout)?;

        let mut planes = self.planes.write().map_err(|_| {
            engine_err!("lumen::LayoutTracker", "Layout lock poisoned for '{}'", desc.label)
        })?;

        let mut pending: Vec<(ImageAspect, ResourceState)> = Vec::with_capacity(PLANE_COUNT);
        let mut widened = ImageAspect::empty();
        for plane in planes_of(aspect) {
            let current = planes[plane];
            let plane_bits = plane_aspect(plane, desc.format);
            if is_redundant(&current, transition) {
                widened |= plane_bits;
                continue;
            }
            match pending.iter_mut().find(|(_, state)| state.layout == current.layout) {
                Some((covered, state)) => {
                    *covered |= plane_bits;
                    state.access |= current.access;
                    state.stage |= current.stage;
                }
                None => pending.push((plane_bits, current)),
            }
        }

        // Each plane is committed as soon as its barrier is recorded
        for (covered, source) in &pending {
            let src_stage = if source.stage.is_empty() {
                PipelineStageFlags::TOP_OF_PIPE
            } else {
                source.stage
            };
            recorder.pipeline_barrier(&ImageBarrier {
                texture,
                old_layout: source.layout,
                new_layout: transition.new_layout,
                src_access: source.access,
                dst_access: transition.dst_access,
                src_stage,
                dst_stage: transition.dst_stage,
                aspect: *covered,
                base_mip_level: 0,
                mip_level_count: desc.mip_count,
            })?;
            for plane in planes_of(*covered) {
                planes[plane] = transition.target_state();
            }
            engine_trace!(
                "lumen::LayoutTracker",
                "'{}' {:?}: {:?} -> {:?}",
                desc.label,
                covered,
                source.layout,
                transition.new_layout
            );
        }

        for plane in planes_of(widened) {
            let state = &mut planes[plane];
            state.access |= transition.dst_access;
            state.stage |= transition.dst_stage;
        }

        Ok(!pending.is_empty())
    }
}

fn primary_aspect(format: TextureFormat) -> ImageAspect {
    if format.is_depth() {
        ImageAspect::DEPTH
    } else if format.has_stencil() {
        ImageAspect::STENCIL
    } else {
        ImageAspect::COLOR
    }
}

// ============================================================================
// Pass-level transitions
// ============================================================================

fn transition_and_track(
    texture: &Arc<dyn Texture>,
    transition: &LayoutTransition,
    encoder: &mut dyn CommandEncoder,
) -> Result<()> {
    texture.set_layout(transition, encoder.command_list())?;
    if !encoder.track(TrackedResource::Texture(texture.clone())) {
        engine_bail!(
            "lumen::LayoutTracker",
            "Could not track texture '{}'",
            texture.desc().label
        );
    }
    Ok(())
}

/// Move every attachment of `target` into its attachment-optimal layout
///
/// Color and resolve textures go to `ColorAttachment`. The depth texture's
/// depth plane goes to `DepthAttachment` and the stencil texture's stencil
/// plane to `StencilAttachment`, each with its own transition call. A combined
/// depth-stencil texture used for only one of the two slots still gets its
/// other plane moved, since the pass validates that plane.
pub fn transition_attachments(target: &RenderTarget, encoder: &mut dyn CommandEncoder) -> Result<()> {
    for color in target.color_attachments().values() {
        transition_and_track(&color.attachment.texture, &LayoutTransition::COLOR_ATTACHMENT, encoder)?;
        if let Some(resolve) = &color.attachment.resolve_texture {
            transition_and_track(resolve, &LayoutTransition::COLOR_ATTACHMENT, encoder)?;
        }
    }

    if let Some(depth) = target.depth_attachment() {
        let texture = &depth.attachment.texture;
        transition_and_track(texture, &LayoutTransition::DEPTH_ATTACHMENT, encoder)?;
        if texture.desc().format.has_stencil() && target.stencil_attachment().is_none() {
            texture.set_layout(&LayoutTransition::STENCIL_ATTACHMENT, encoder.command_list())?;
        }
    }

    if let Some(stencil) = target.stencil_attachment() {
        let texture = &stencil.attachment.texture;
        transition_and_track(texture, &LayoutTransition::STENCIL_ATTACHMENT, encoder)?;
        if texture.desc().format.is_depth() && target.depth_attachment().is_none() {
            texture.set_layout(&LayoutTransition::DEPTH_ATTACHMENT, encoder.command_list())?;
        }
    }

    Ok(())
}

/// Move every texture bound by `commands` into `ShaderReadOnly`
///
/// Each texture is tracked as soon as its barrier is recorded, whether or not
/// its command is later drawn.
pub fn transition_bindings(commands: &[Command], encoder: &mut dyn CommandEncoder) -> Result<()> {
    for texture in commands.iter().flat_map(|command| command.textures()) {
        transition_and_track(texture, &LayoutTransition::SHADER_READ, encoder)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "resource_state_tests.rs"]
mod tests;
