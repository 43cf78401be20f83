/// Pass description builder
///
/// Derives the immutable, hashable shape of a render pass from a render
/// target: one attachment description per bound texture and a single graphics
/// subpass whose color and resolve references mirror the target's bind
/// indices. The description is the pass-object cache key.

use crate::error::Result;
use crate::renderer::{
    Attachment, ImageLayout, LoadAction, RenderTarget, SampleCount, StoreAction, TextureFormat,
};
use crate::engine_bail;

/// Highest color bind index a render target may use, plus one
pub const MAX_COLOR_ATTACHMENTS: u32 = 8;

/// Role of an attachment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Color,
    Depth,
    Stencil,
}

/// Description of one attachment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDescription {
    pub format: TextureFormat,
    pub samples: SampleCount,
    pub kind: AttachmentKind,
    /// Slot receives a multisample resolve
    pub resolve: bool,
    pub load_action: LoadAction,
    pub store_action: StoreAction,
    pub stencil_load_action: LoadAction,
    pub stencil_store_action: StoreAction,
    /// Layout of the color or depth plane for the whole pass
    pub layout: ImageLayout,
    /// Layout of the stencil plane of a combined depth-stencil format
    pub stencil_layout: Option<ImageLayout>,
}

/// Reference from the subpass to an attachment slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: ImageLayout,
    pub stencil_layout: Option<ImageLayout>,
}

impl AttachmentReference {
    /// Sentinel index for an unbound slot
    pub const UNUSED_INDEX: u32 = u32::MAX;

    pub const UNUSED: Self = Self {
        attachment: Self::UNUSED_INDEX,
        layout: ImageLayout::Undefined,
        stencil_layout: None,
    };

    pub fn is_unused(&self) -> bool {
        self.attachment == Self::UNUSED_INDEX
    }
}

/// The single graphics subpass
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SubpassDescription {
    /// One slot per bind index in `[0, max bind index]`
    pub color_references: Vec<AttachmentReference>,
    /// Same length as `color_references`
    pub resolve_references: Vec<AttachmentReference>,
    pub depth_stencil_reference: Option<AttachmentReference>,
}

/// Immutable pass shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PassDescription {
    pub attachments: Vec<AttachmentDescription>,
    pub subpass: SubpassDescription,
}

fn depth_stencil_layouts(format: TextureFormat) -> (ImageLayout, Option<ImageLayout>) {
    if format.is_depth() {
        let stencil = format.has_stencil().then_some(ImageLayout::StencilAttachment);
        (ImageLayout::DepthAttachment, stencil)
    } else {
        (ImageLayout::StencilAttachment, None)
    }
}

fn color_description(attachment: &Attachment, resolve: bool) -> AttachmentDescription {
    let (texture, load_action, store_action) = match (&attachment.resolve_texture, resolve) {
        (Some(resolve_texture), true) => (resolve_texture, LoadAction::DontCare, StoreAction::Store),
        _ => (&attachment.texture, attachment.load_action, attachment.store_action),
    };
    let desc = texture.desc();
    AttachmentDescription {
        format: desc.format,
        samples: desc.sample_count,
        kind: AttachmentKind::Color,
        resolve,
        load_action,
        store_action,
        stencil_load_action: LoadAction::DontCare,
        stencil_store_action: StoreAction::DontCare,
        layout: ImageLayout::ColorAttachment,
        stencil_layout: None,
    }
}

impl PassDescription {
    /// Build the description of `target`
    ///
    /// Attachment order: each color in bind-index order followed by its
    /// resolve, then one depth-stencil slot. Depth wins over stencil when
    /// both are present; the stencil ops of a depth slot come from the
    /// stencil attachment in that case.
    ///
    /// # Errors
    ///
    /// Returns `PreconditionFailed` if the target has no attachment at all.
    pub fn from_render_target(target: &RenderTarget) -> Result<Self> {
        if target.render_target_size().is_none() {
            engine_bail!(
                PreconditionFailed,
                "lumen::PassDescription",
                "Render target has no attachments"
            );
        }

        let max_bind_index = target.max_color_attachment_bind_index();
        if max_bind_index >= MAX_COLOR_ATTACHMENTS {
            engine_bail!(
                PreconditionFailed,
                "lumen::PassDescription",
                "Color bind index {} exceeds the limit of {} color attachments",
                max_bind_index,
                MAX_COLOR_ATTACHMENTS
            );
        }

        let slot_count = max_bind_index as usize + 1;
        let mut attachments = Vec::new();
        let mut color_references = vec![AttachmentReference::UNUSED; slot_count];
        let mut resolve_references = vec![AttachmentReference::UNUSED; slot_count];

        for (&bind_index, color) in target.color_attachments() {
            color_references[bind_index as usize] = AttachmentReference {
                attachment: attachments.len() as u32,
                layout: ImageLayout::ColorAttachment,
                stencil_layout: None,
            };
            attachments.push(color_description(&color.attachment, false));

            if color.attachment.resolve_texture.is_some() {
                resolve_references[bind_index as usize] = AttachmentReference {
                    attachment: attachments.len() as u32,
                    layout: ImageLayout::ColorAttachment,
                    stencil_layout: None,
                };
                attachments.push(color_description(&color.attachment, true));
            }
        }

        let depth_stencil = match (target.depth_attachment(), target.stencil_attachment()) {
            (Some(depth), stencil) => {
                let (stencil_load_action, stencil_store_action) = stencil
                    .map(|s| (s.attachment.load_action, s.attachment.store_action))
                    .unwrap_or((LoadAction::DontCare, StoreAction::DontCare));
                Some((
                    &depth.attachment,
                    AttachmentKind::Depth,
                    (depth.attachment.load_action, depth.attachment.store_action),
                    (stencil_load_action, stencil_store_action),
                ))
            }
            (None, Some(stencil)) => Some((
                &stencil.attachment,
                AttachmentKind::Stencil,
                (LoadAction::DontCare, StoreAction::DontCare),
                (stencil.attachment.load_action, stencil.attachment.store_action),
            )),
            (None, None) => None,
        };

        let mut depth_stencil_reference = None;
        if let Some((attachment, kind, (load, store), (stencil_load, stencil_store))) = depth_stencil {
            let desc = attachment.texture.desc();
            let (layout, stencil_layout) = depth_stencil_layouts(desc.format);
            depth_stencil_reference = Some(AttachmentReference {
                attachment: attachments.len() as u32,
                layout,
                stencil_layout,
            });
            attachments.push(AttachmentDescription {
                format: desc.format,
                samples: desc.sample_count,
                kind,
                resolve: false,
                load_action: load,
                store_action: store,
                stencil_load_action: stencil_load,
                stencil_store_action: stencil_store,
                layout,
                stencil_layout,
            });
        }

        Ok(Self {
            attachments,
            subpass: SubpassDescription {
                color_references,
                resolve_references,
                depth_stencil_reference,
            },
        })
    }
}

#[cfg(test)]
#[path = "pass_description_tests.rs"]
mod tests;
