/// Render target description: color attachments by bind index plus optional
/// depth and stencil attachments

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::renderer::{Color, ISize, LoadAction, StoreAction, Texture};

/// Shared part of every attachment
#[derive(Clone)]
pub struct Attachment {
    /// Texture rendered into
    pub texture: Arc<dyn Texture>,
    /// Single-sampled texture receiving the multisample resolve
    pub resolve_texture: Option<Arc<dyn Texture>>,
    pub load_action: LoadAction,
    pub store_action: StoreAction,
}

impl Attachment {
    pub fn new(texture: Arc<dyn Texture>) -> Self {
        Self {
            texture,
            resolve_texture: None,
            load_action: LoadAction::Clear,
            store_action: StoreAction::Store,
        }
    }

    pub fn with_resolve(mut self, resolve_texture: Arc<dyn Texture>) -> Self {
        self.resolve_texture = Some(resolve_texture);
        self.store_action = StoreAction::StoreAndResolve;
        self
    }

    pub fn with_actions(mut self, load_action: LoadAction, store_action: StoreAction) -> Self {
        self.load_action = load_action;
        self.store_action = store_action;
        self
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("texture", &self.texture.desc().label)
            .field("resolve_texture", &self.resolve_texture.as_ref().map(|t| t.desc().label.clone()))
            .field("load_action", &self.load_action)
            .field("store_action", &self.store_action)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub attachment: Attachment,
    pub clear_color: Color,
}

#[derive(Debug, Clone)]
pub struct DepthAttachment {
    pub attachment: Attachment,
    pub clear_depth: f32,
}

#[derive(Debug, Clone)]
pub struct StencilAttachment {
    pub attachment: Attachment,
    pub clear_stencil: u32,
}

/// The attachments a render pass draws into
///
/// Bind indices are unique by construction. Index 0 must be populated
/// before a pass can encode.
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    colors: BTreeMap<u32, ColorAttachment>,
    depth: Option<DepthAttachment>,
    stencil: Option<StencilAttachment>,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the color attachment at `index`
    pub fn set_color_attachment(&mut self, index: u32, attachment: ColorAttachment) -> &mut Self {
        self.colors.insert(index, attachment);
        self
    }

    pub fn set_depth_attachment(&mut self, attachment: Option<DepthAttachment>) -> &mut Self {
        self.depth = attachment;
        self
    }

    pub fn set_stencil_attachment(&mut self, attachment: Option<StencilAttachment>) -> &mut Self {
        self.stencil = attachment;
        self
    }

    /// Color attachments in bind-index order
    pub fn color_attachments(&self) -> &BTreeMap<u32, ColorAttachment> {
        &self.colors
    }

    pub fn depth_attachment(&self) -> Option<&DepthAttachment> {
        self.depth.as_ref()
    }

    pub fn stencil_attachment(&self) -> Option<&StencilAttachment> {
        self.stencil.as_ref()
    }

    pub fn has_color_attachment(&self, index: u32) -> bool {
        self.colors.contains_key(&index)
    }

    /// Highest populated color bind index (0 when there are none)
    pub fn max_color_attachment_bind_index(&self) -> u32 {
        self.colors.keys().next_back().copied().unwrap_or(0)
    }

    /// Pixel size of the target: first color attachment, else depth, else stencil
    pub fn render_target_size(&self) -> Option<ISize> {
        self.colors
            .values()
            .next()
            .map(|color| &color.attachment)
            .or_else(|| self.depth.as_ref().map(|depth| &depth.attachment))
            .or_else(|| self.stencil.as_ref().map(|stencil| &stencil.attachment))
            .map(|attachment| attachment.texture.desc().size)
    }
}
