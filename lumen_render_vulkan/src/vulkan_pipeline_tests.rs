//! Unit tests for descriptor layout translation
//!
//! No GPU required.

use super::*;
use lumen_render::lumen::render::{BindingLayoutEntry, ShaderStageFlags};

fn layout() -> BindingLayout {
    BindingLayout::new(vec![
        BindingLayoutEntry {
            binding: 0,
            kind: DescriptorKind::UniformBuffer,
            stages: ShaderStageFlags::VERTEX,
        },
        BindingLayoutEntry {
            binding: 3,
            kind: DescriptorKind::CombinedImageSampler,
            stages: ShaderStageFlags::VERTEX_FRAGMENT,
        },
    ])
}

#[test]
fn test_descriptor_bindings_follow_entries() {
    let bindings = descriptor_bindings(&layout());

    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].binding, 0);
    assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
    assert_eq!(bindings[1].binding, 3);
    assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    assert_eq!(
        bindings[1].stage_flags,
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert!(bindings.iter().all(|binding| binding.descriptor_count == 1));
}

#[test]
fn test_empty_layout_has_no_bindings() {
    assert!(descriptor_bindings(&BindingLayout::default()).is_empty());
}

#[test]
fn test_pool_sizes_cover_both_kinds() {
    let sizes = descriptor_pool_sizes(1024, 4);

    assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(sizes[1].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    assert_eq!(sizes[0].descriptor_count, 4096);
    assert_eq!(descriptor_pool_sizes(8, 0)[1].descriptor_count, 8);
}
