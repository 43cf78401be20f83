//! Unit tests for pass_description.rs

use std::sync::Arc;

use crate::error::Error;
use crate::renderer::mock::*;
use crate::renderer::*;

fn color(texture: Arc<dyn Texture>) -> ColorAttachment {
    ColorAttachment {
        attachment: Attachment::new(texture),
        clear_color: Color::TRANSPARENT,
    }
}

fn msaa_texture(label: &str) -> Arc<dyn Texture> {
    MockTexture::new(
        TextureDesc::new(label, TextureFormat::B8G8R8A8_UNORM, ISize::new(64, 64), TextureUsage::COLOR_ATTACHMENT)
            .with_sample_count(SampleCount::Count4),
    )
}

// ============================================================================
// COLOR REFERENCES
// ============================================================================

#[test]
fn test_bind_index_beyond_limit_is_rejected() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_color_attachment(u32::MAX, color(MockTexture::color("far", 64, 64)));

    let result = PassDescription::from_render_target(&target);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

#[test]
fn test_highest_allowed_bind_index() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_color_attachment(MAX_COLOR_ATTACHMENTS - 1, color(MockTexture::color("last", 64, 64)));

    let desc = PassDescription::from_render_target(&target).unwrap();
    assert_eq!(desc.subpass.color_references.len(), MAX_COLOR_ATTACHMENTS as usize);
}

#[test]
fn test_single_color_attachment() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));

    let desc = PassDescription::from_render_target(&target).unwrap();

    assert_eq!(desc.attachments.len(), 1);
    let attachment = &desc.attachments[0];
    assert_eq!(attachment.kind, AttachmentKind::Color);
    assert_eq!(attachment.format, TextureFormat::R8G8B8A8_UNORM);
    assert_eq!(attachment.samples, SampleCount::Count1);
    assert_eq!(attachment.load_action, LoadAction::Clear);
    assert_eq!(attachment.store_action, StoreAction::Store);
    assert_eq!(attachment.layout, ImageLayout::ColorAttachment);
    assert!(!attachment.resolve);

    assert_eq!(desc.subpass.color_references.len(), 1);
    assert_eq!(desc.subpass.color_references[0].attachment, 0);
    assert!(desc.subpass.resolve_references[0].is_unused());
    assert!(desc.subpass.depth_stencil_reference.is_none());
}

#[test]
fn test_sparse_bind_indices_fill_unused_slots() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_color_attachment(3, color(MockTexture::color("c3", 64, 64)));

    let desc = PassDescription::from_render_target(&target).unwrap();

    // max bind index 3 => 4 slots
    assert_eq!(desc.subpass.color_references.len(), 4);
    assert_eq!(desc.subpass.resolve_references.len(), 4);
    assert_eq!(desc.subpass.color_references[0].attachment, 0);
    assert!(desc.subpass.color_references[1].is_unused());
    assert!(desc.subpass.color_references[2].is_unused());
    assert_eq!(desc.subpass.color_references[3].attachment, 1);
    assert!(desc.subpass.resolve_references.iter().all(|r| r.is_unused()));
}

#[test]
fn test_resolve_follows_its_color() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(
        0,
        ColorAttachment {
            attachment: Attachment::new(msaa_texture("msaa")).with_resolve(MockTexture::color("resolve", 64, 64)),
            clear_color: Color::BLACK,
        },
    );
    target.set_color_attachment(1, color(MockTexture::color("c1", 64, 64)));

    let desc = PassDescription::from_render_target(&target).unwrap();

    assert_eq!(desc.attachments.len(), 3);
    assert_eq!(desc.attachments[0].samples, SampleCount::Count4);
    assert_eq!(desc.attachments[0].store_action, StoreAction::StoreAndResolve);
    assert!(desc.attachments[1].resolve);
    assert_eq!(desc.attachments[1].samples, SampleCount::Count1);
    assert_eq!(desc.attachments[1].load_action, LoadAction::DontCare);
    assert_eq!(desc.attachments[1].store_action, StoreAction::Store);

    assert_eq!(desc.subpass.color_references[0].attachment, 0);
    assert_eq!(desc.subpass.resolve_references[0].attachment, 1);
    assert_eq!(desc.subpass.color_references[1].attachment, 2);
    assert!(desc.subpass.resolve_references[1].is_unused());
}

// ============================================================================
// DEPTH / STENCIL
// ============================================================================

#[test]
fn test_depth_wins_over_stencil() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_depth_attachment(Some(DepthAttachment {
        attachment: Attachment::new(MockTexture::depth_stencil("depth", TextureFormat::D32_FLOAT, 64, 64)),
        clear_depth: 1.0,
    }));
    target.set_stencil_attachment(Some(StencilAttachment {
        attachment: Attachment::new(MockTexture::depth_stencil("stencil", TextureFormat::S8_UINT, 64, 64))
            .with_actions(LoadAction::Load, StoreAction::DontCare),
        clear_stencil: 0,
    }));

    let desc = PassDescription::from_render_target(&target).unwrap();

    assert_eq!(desc.attachments.len(), 2);
    let depth = &desc.attachments[1];
    assert_eq!(depth.kind, AttachmentKind::Depth);
    assert_eq!(depth.format, TextureFormat::D32_FLOAT);
    assert_eq!(depth.stencil_load_action, LoadAction::Load);
    assert_eq!(depth.stencil_store_action, StoreAction::DontCare);
    let reference = desc.subpass.depth_stencil_reference.unwrap();
    assert_eq!(reference.attachment, 1);
    assert_eq!(reference.layout, ImageLayout::DepthAttachment);
    assert_eq!(reference.stencil_layout, None);
}

#[test]
fn test_combined_depth_stencil_layouts() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_depth_attachment(Some(DepthAttachment {
        attachment: Attachment::new(MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 64, 64)),
        clear_depth: 1.0,
    }));

    let desc = PassDescription::from_render_target(&target).unwrap();

    let depth = &desc.attachments[1];
    assert_eq!(depth.layout, ImageLayout::DepthAttachment);
    assert_eq!(depth.stencil_layout, Some(ImageLayout::StencilAttachment));
    assert_eq!(depth.stencil_load_action, LoadAction::DontCare);
}

#[test]
fn test_stencil_only_target() {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, color(MockTexture::color("c0", 64, 64)));
    target.set_stencil_attachment(Some(StencilAttachment {
        attachment: Attachment::new(MockTexture::depth_stencil("stencil", TextureFormat::S8_UINT, 64, 64)),
        clear_stencil: 7,
    }));

    let desc = PassDescription::from_render_target(&target).unwrap();

    let stencil = &desc.attachments[1];
    assert_eq!(stencil.kind, AttachmentKind::Stencil);
    assert_eq!(stencil.load_action, LoadAction::DontCare);
    assert_eq!(stencil.stencil_load_action, LoadAction::Clear);
    assert_eq!(stencil.layout, ImageLayout::StencilAttachment);
}

#[test]
fn test_empty_target_is_rejected() {
    let target = RenderTarget::new();
    let result = PassDescription::from_render_target(&target);
    assert!(matches!(result, Err(Error::PreconditionFailed(_))));
}

// ============================================================================
// CACHE KEY
// ============================================================================

#[test]
fn test_same_shape_gives_equal_descriptions() {
    let mut a = RenderTarget::new();
    a.set_color_attachment(0, color(MockTexture::color("a", 64, 64)));
    let mut b = RenderTarget::new();
    b.set_color_attachment(0, color(MockTexture::color("b", 128, 128)));

    assert_eq!(
        PassDescription::from_render_target(&a).unwrap(),
        PassDescription::from_render_target(&b).unwrap()
    );
}

#[test]
fn test_load_action_changes_the_key() {
    let mut a = RenderTarget::new();
    a.set_color_attachment(0, color(MockTexture::color("a", 64, 64)));
    let mut b = RenderTarget::new();
    b.set_color_attachment(
        0,
        ColorAttachment {
            attachment: Attachment::new(MockTexture::color("b", 64, 64))
                .with_actions(LoadAction::Load, StoreAction::Store),
            clear_color: Color::TRANSPARENT,
        },
    );

    assert_ne!(
        PassDescription::from_render_target(&a).unwrap(),
        PassDescription::from_render_target(&b).unwrap()
    );
}
