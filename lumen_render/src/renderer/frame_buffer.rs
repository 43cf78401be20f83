/// Frame buffer builder and clear values
///
/// Both lists are built by walking the render target in the same order as
/// `PassDescription::from_render_target`: colors by bind index, each followed
/// by its resolve, then the depth-stencil slot.

use std::sync::Arc;

use crate::error::Result;
use crate::renderer::{ClearValue, RenderTarget, Texture};
use crate::engine_bail;

/// Concrete attachments bound to a pass for one encode
#[derive(Clone)]
pub struct FramebufferDesc {
    /// One texture per attachment slot, in pass-description order
    pub attachments: Vec<Arc<dyn Texture>>,
    pub width: u32,
    pub height: u32,
    /// Always 1
    pub layers: u32,
}

impl FramebufferDesc {
    /// Collect the attachment textures of `target`
    ///
    /// The depth-stencil slot binds the depth texture when present, else the
    /// stencil texture, matching the single depth-stencil description.
    pub fn from_render_target(target: &RenderTarget) -> Result<Self> {
        let Some(size) = target.render_target_size() else {
            engine_bail!(
                PreconditionFailed,
                "lumen::Framebuffer",
                "Render target has no attachments"
            );
        };

        let mut attachments: Vec<Arc<dyn Texture>> = Vec::new();
        for color in target.color_attachments().values() {
            attachments.push(color.attachment.texture.clone());
            if let Some(resolve) = &color.attachment.resolve_texture {
                attachments.push(resolve.clone());
            }
        }
        if let Some(depth) = target.depth_attachment() {
            attachments.push(depth.attachment.texture.clone());
        } else if let Some(stencil) = target.stencil_attachment() {
            attachments.push(stencil.attachment.texture.clone());
        }

        Ok(Self {
            attachments,
            width: size.width,
            height: size.height,
            layers: 1,
        })
    }
}

impl std::fmt::Debug for FramebufferDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.attachments.iter().map(|t| t.desc().label.as_str()).collect();
        f.debug_struct("FramebufferDesc")
            .field("attachments", &labels)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layers", &self.layers)
            .finish()
    }
}

/// Clear values for `target`
///
/// One per color (repeated for its resolve), then depth, then stencil. The
/// depth entry also carries the stencil clear so a combined surface clears
/// both planes from the one slot it occupies.
pub fn clear_values(target: &RenderTarget) -> Vec<ClearValue> {
    let mut clears = Vec::new();
    for color in target.color_attachments().values() {
        let value = ClearValue::Color(color.clear_color.to_array());
        clears.push(value);
        if color.attachment.resolve_texture.is_some() {
            clears.push(value);
        }
    }

    let stencil_clear = target.stencil_attachment().map(|s| s.clear_stencil);
    if let Some(depth) = target.depth_attachment() {
        clears.push(ClearValue::DepthStencil {
            depth: depth.clear_depth,
            stencil: stencil_clear.unwrap_or(0),
        });
    }
    if let Some(stencil) = stencil_clear {
        clears.push(ClearValue::DepthStencil { depth: 0.0, stencil });
    }
    clears
}

#[cfg(test)]
#[path = "frame_buffer_tests.rs"]
mod tests;
