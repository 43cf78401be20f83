//! Unit tests for resource_state.rs
//!
//! Layout transitions are driven against the mock command list so every
//! recorded barrier can be checked field by field.

use std::sync::Arc;

use crate::error::Error;
use crate::renderer::mock::*;
use crate::renderer::*;

/// (texture, aspect, old layout, new layout) of every recorded barrier
fn barrier_summary(list: &MockCommandList) -> Vec<(String, ImageAspect, ImageLayout, ImageLayout)> {
    list.recorded
        .iter()
        .filter_map(|command| match command {
            Recorded::Barrier { texture, aspect, old_layout, new_layout, .. } => {
                Some((texture.clone(), *aspect, *old_layout, *new_layout))
            }
            _ => None,
        })
        .collect()
}

fn color_target(texture: Arc<dyn Texture>) -> RenderTarget {
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, ColorAttachment {
        attachment: Attachment::new(texture),
        clear_color: Color::BLACK,
    });
    target
}

// ============================================================================
// SINGLE TRANSITIONS
// ============================================================================

#[test]
fn test_first_transition_starts_from_undefined() {
    let texture = MockTexture::color("albedo", 64, 64);
    let mut list = MockCommandList::new();

    let recorded = texture.set_layout(&LayoutTransition::COLOR_ATTACHMENT, &mut list).unwrap();

    assert!(recorded);
    match &list.recorded[..] {
        [Recorded::Barrier { old_layout, new_layout, src_access, src_stage, dst_stage, aspect, mip_level_count, .. }] => {
            assert_eq!(*old_layout, ImageLayout::Undefined);
            assert_eq!(*new_layout, ImageLayout::ColorAttachment);
            assert!(src_access.is_empty());
            assert_eq!(*src_stage, PipelineStageFlags::TOP_OF_PIPE);
            assert_eq!(*dst_stage, PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
            assert_eq!(*aspect, ImageAspect::COLOR);
            assert_eq!(*mip_level_count, 1);
        }
        other => panic!("unexpected recording: {:?}", other),
    }
    assert_eq!(texture.layout(), ImageLayout::ColorAttachment);
}

#[test]
fn test_barrier_source_is_recorded_state() {
    let texture = MockTexture::color("albedo", 64, 64);
    let mut list = MockCommandList::new();

    texture.set_layout(&LayoutTransition::COLOR_ATTACHMENT, &mut list).unwrap();
    texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).unwrap();

    match &list.recorded[1] {
        Recorded::Barrier { old_layout, src_access, src_stage, dst_access, .. } => {
            assert_eq!(*old_layout, ImageLayout::ColorAttachment);
            assert_eq!(*src_access, LayoutTransition::COLOR_ATTACHMENT.dst_access);
            assert_eq!(*src_stage, PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
            assert_eq!(*dst_access, AccessFlags::SHADER_READ);
        }
        other => panic!("expected barrier, got {:?}", other),
    }
}

#[test]
fn test_read_after_read_is_elided() {
    let texture = MockTexture::color("sampled", 16, 16);
    let mut list = MockCommandList::new();

    assert!(texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).unwrap());
    assert!(!texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).unwrap());

    assert_eq!(list.barriers().len(), 1);
    assert_eq!(texture.layout(), ImageLayout::ShaderReadOnly);
}

#[test]
fn test_write_in_same_layout_still_barriers() {
    let texture = MockTexture::color("target", 16, 16);
    let mut list = MockCommandList::new();

    texture.set_layout(&LayoutTransition::COLOR_ATTACHMENT, &mut list).unwrap();
    let recorded = texture.set_layout(&LayoutTransition::COLOR_ATTACHMENT, &mut list).unwrap();

    assert!(recorded);
    let summary = barrier_summary(&list);
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[1].2, ImageLayout::ColorAttachment);
    assert_eq!(summary[1].3, ImageLayout::ColorAttachment);
}

#[test]
fn test_invalid_texture_fails_without_mutation() {
    let texture = MockTexture::new(TextureDesc::new(
        "gone",
        TextureFormat::R8G8B8A8_UNORM,
        ISize::new(8, 8),
        TextureUsage::SAMPLED,
    ));
    texture.invalidate();
    let texture: Arc<dyn Texture> = texture;
    let mut list = MockCommandList::new();

    let result = texture.set_layout(&LayoutTransition::SHADER_READ, &mut list);

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(list.recorded.is_empty());
    assert_eq!(texture.layout(), ImageLayout::Undefined);
}

#[test]
fn test_recorder_failure_leaves_state_untouched() {
    let texture = MockTexture::color("albedo", 8, 8);
    let mut list = MockCommandList::new();
    list.fail_on = Some("pipeline_barrier");

    let result = texture.set_layout(&LayoutTransition::TRANSFER_DST, &mut list);

    assert!(result.is_err());
    assert_eq!(texture.layout(), ImageLayout::Undefined);
}

#[test]
fn test_layout_must_apply_to_format() {
    let depth = MockTexture::depth_stencil("depth", TextureFormat::D32_FLOAT, 8, 8);
    let mut list = MockCommandList::new();

    let result = depth.set_layout(&LayoutTransition::COLOR_ATTACHMENT, &mut list);
    assert!(matches!(result, Err(Error::InvalidResource(_))));

    let result = depth.set_layout(&LayoutTransition::STENCIL_ATTACHMENT, &mut list);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(list.recorded.is_empty());
}

#[test]
fn test_aspect_for_layout() {
    let combined = TextureFormat::D24_UNORM_S8_UINT;
    assert_eq!(aspect_for_layout(combined, ImageLayout::DepthAttachment).unwrap(), ImageAspect::DEPTH);
    assert_eq!(aspect_for_layout(combined, ImageLayout::StencilAttachment).unwrap(), ImageAspect::STENCIL);
    assert_eq!(
        aspect_for_layout(combined, ImageLayout::ShaderReadOnly).unwrap(),
        ImageAspect::DEPTH | ImageAspect::STENCIL
    );
    assert_eq!(
        aspect_for_layout(TextureFormat::B8G8R8A8_SRGB, ImageLayout::TransferSrc).unwrap(),
        ImageAspect::COLOR
    );
    assert!(aspect_for_layout(TextureFormat::R8_UNORM, ImageLayout::DepthStencilAttachment).is_err());
}

// ============================================================================
// PER-PLANE TRACKING
// ============================================================================

#[test]
fn test_depth_and_stencil_planes_tracked_independently() {
    let texture = MockTexture::depth_stencil("ds", TextureFormat::D32_FLOAT_S8_UINT, 32, 32);
    let mut list = MockCommandList::new();

    texture.set_layout(&LayoutTransition::DEPTH_ATTACHMENT, &mut list).unwrap();
    texture.set_layout(&LayoutTransition::STENCIL_ATTACHMENT, &mut list).unwrap();

    let tracker = texture.layout_tracker();
    assert_eq!(tracker.plane_state(ImageAspect::DEPTH).layout, ImageLayout::DepthAttachment);
    assert_eq!(tracker.plane_state(ImageAspect::STENCIL).layout, ImageLayout::StencilAttachment);

    let summary = barrier_summary(&list);
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].1, ImageAspect::DEPTH);
    assert_eq!(summary[1].1, ImageAspect::STENCIL);
    // The stencil barrier starts from the stencil plane's own state
    assert_eq!(summary[1].2, ImageLayout::Undefined);
}

#[test]
fn test_planes_sharing_a_layout_share_one_barrier() {
    let texture = MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 32, 32);
    let mut list = MockCommandList::new();

    texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).unwrap();

    let summary = barrier_summary(&list);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].1, ImageAspect::DEPTH | ImageAspect::STENCIL);
}

#[test]
fn test_planes_in_different_layouts_get_separate_barriers() {
    let texture = MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 32, 32);
    let mut list = MockCommandList::new();

    texture.set_layout(&LayoutTransition::DEPTH_ATTACHMENT, &mut list).unwrap();
    list.recorded.clear();
    texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).unwrap();

    let summary = barrier_summary(&list);
    assert_eq!(summary.len(), 2);
    assert!(summary.contains(&("ds".to_string(), ImageAspect::DEPTH, ImageLayout::DepthAttachment, ImageLayout::ShaderReadOnly)));
    assert!(summary.contains(&("ds".to_string(), ImageAspect::STENCIL, ImageLayout::Undefined, ImageLayout::ShaderReadOnly)));
}

#[test]
fn test_set_layout_without_encoding() {
    let texture = MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 4, 4);
    let mut list = MockCommandList::new();
    texture.set_layout(&LayoutTransition::DEPTH_ATTACHMENT, &mut list).unwrap();

    let previous = texture.set_layout_without_encoding(LayoutTransition::SHADER_READ.target_state());

    assert_eq!(previous, ImageLayout::DepthAttachment);
    let tracker = texture.layout_tracker();
    assert_eq!(tracker.plane_state(ImageAspect::DEPTH).layout, ImageLayout::ShaderReadOnly);
    assert_eq!(tracker.plane_state(ImageAspect::STENCIL).layout, ImageLayout::ShaderReadOnly);
    assert_eq!(list.barriers().len(), 1);
}

#[test]
fn test_tracker_with_initial_state() {
    let tracker = LayoutTracker::with_state(ResourceState {
        layout: ImageLayout::PresentSrc,
        access: AccessFlags::empty(),
        stage: PipelineStageFlags::BOTTOM_OF_PIPE,
    });
    assert_eq!(tracker.layout(TextureFormat::B8G8R8A8_SRGB), ImageLayout::PresentSrc);
}

// ============================================================================
// PASS-LEVEL TRANSITIONS
// ============================================================================

#[test]
fn test_transition_attachments_moves_color_and_resolve() {
    let msaa = MockTexture::new(
        TextureDesc::new("msaa", TextureFormat::R8G8B8A8_UNORM, ISize::new(16, 16), TextureUsage::COLOR_ATTACHMENT)
            .with_sample_count(SampleCount::Count4),
    );
    let resolve = MockTexture::color("resolve", 16, 16);
    let mut target = RenderTarget::new();
    target.set_color_attachment(0, ColorAttachment {
        attachment: Attachment::new(msaa).with_resolve(resolve),
        clear_color: Color::BLACK,
    });
    let mut encoder = MockCommandEncoder::new();

    transition_attachments(&target, &mut encoder).unwrap();

    let summary = barrier_summary(&encoder.list);
    assert_eq!(summary.len(), 2);
    assert!(summary.iter().all(|(_, _, _, new)| *new == ImageLayout::ColorAttachment));
    assert_eq!(encoder.tracked_textures(), vec!["msaa".to_string(), "resolve".to_string()]);
}

#[test]
fn test_separate_depth_and_stencil_get_separate_transitions() {
    let depth = MockTexture::depth_stencil("depth", TextureFormat::D32_FLOAT, 16, 16);
    let stencil = MockTexture::depth_stencil("stencil", TextureFormat::S8_UINT, 16, 16);
    let mut target = color_target(MockTexture::color("color", 16, 16));
    target.set_depth_attachment(Some(DepthAttachment {
        attachment: Attachment::new(depth),
        clear_depth: 1.0,
    }));
    target.set_stencil_attachment(Some(StencilAttachment {
        attachment: Attachment::new(stencil),
        clear_stencil: 0,
    }));
    let mut encoder = MockCommandEncoder::new();

    transition_attachments(&target, &mut encoder).unwrap();

    let summary = barrier_summary(&encoder.list);
    let depth_barrier = summary.iter().find(|(label, ..)| label == "depth").unwrap();
    let stencil_barrier = summary.iter().find(|(label, ..)| label == "stencil").unwrap();
    assert_eq!(depth_barrier.1, ImageAspect::DEPTH);
    assert_eq!(depth_barrier.3, ImageLayout::DepthAttachment);
    assert_eq!(stencil_barrier.1, ImageAspect::STENCIL);
    assert_eq!(stencil_barrier.3, ImageLayout::StencilAttachment);
    // No single barrier covers both aspects
    assert!(summary
        .iter()
        .all(|(_, aspect, ..)| !aspect.contains(ImageAspect::DEPTH | ImageAspect::STENCIL)));
}

#[test]
fn test_failed_second_barrier_keeps_first_plane_committed() {
    let texture = MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 16, 16);
    let mut list = MockCommandList::new();
    texture.set_layout(&LayoutTransition::DEPTH_ATTACHMENT, &mut list).unwrap();
    texture.set_layout(&LayoutTransition::STENCIL_ATTACHMENT, &mut list).unwrap();

    // Planes sit in different layouts, so two barriers are needed
    let mut list = MockCommandList { barrier_limit: Some(1), ..MockCommandList::default() };
    assert!(texture.set_layout(&LayoutTransition::SHADER_READ, &mut list).is_err());

    let tracker = texture.layout_tracker();
    assert_eq!(list.barriers().len(), 1);
    assert_eq!(tracker.plane_state(ImageAspect::DEPTH).layout, ImageLayout::ShaderReadOnly);
    assert_eq!(tracker.plane_state(ImageAspect::STENCIL).layout, ImageLayout::StencilAttachment);
}

#[test]
fn test_combined_depth_only_target_moves_stencil_plane_too() {
    let depth = MockTexture::depth_stencil("ds", TextureFormat::D24_UNORM_S8_UINT, 16, 16);
    let mut target = color_target(MockTexture::color("color", 16, 16));
    target.set_depth_attachment(Some(DepthAttachment {
        attachment: Attachment::new(depth.clone()),
        clear_depth: 1.0,
    }));
    let mut encoder = MockCommandEncoder::new();

    transition_attachments(&target, &mut encoder).unwrap();

    let tracker = depth.layout_tracker();
    assert_eq!(tracker.plane_state(ImageAspect::DEPTH).layout, ImageLayout::DepthAttachment);
    assert_eq!(tracker.plane_state(ImageAspect::STENCIL).layout, ImageLayout::StencilAttachment);
}

#[test]
fn test_transition_bindings_moves_sampled_textures() {
    let sampled = MockTexture::color("sampled", 8, 8);
    let pipeline = MockPipeline::with_bindings("p", &[], &[1]);
    let mut command = Command::new(pipeline);
    command.fragment_bindings.bind_texture(
        0,
        SampledImageSlot { name: "u_tex".to_string(), binding: 1 },
        sampled.clone(),
        MockSampler::new("linear"),
    );
    let mut encoder = MockCommandEncoder::new();

    transition_bindings(&[command], &mut encoder).unwrap();

    assert_eq!(sampled.layout(), ImageLayout::ShaderReadOnly);
    assert_eq!(encoder.list.barriers().len(), 1);
    assert_eq!(encoder.tracked_textures(), vec!["sampled"]);
}

#[test]
fn test_transition_bindings_fails_when_tracking_is_exhausted() {
    let sampled = MockTexture::color("sampled", 8, 8);
    let mut command = Command::default();
    command.fragment_bindings.bind_texture(
        0,
        SampledImageSlot { name: "u_tex".to_string(), binding: 1 },
        sampled,
        MockSampler::new("linear"),
    );
    let mut encoder = MockCommandEncoder::with_capacity(0);

    assert!(transition_bindings(&[command], &mut encoder).is_err());
}
