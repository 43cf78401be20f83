/// Mock backend for unit tests (no GPU required)
///
/// Every collaborator trait has a mock here. The command list records each
/// call into a typed log so tests can assert on the exact recorded sequence.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::error::{Error, Result};
use crate::renderer::{
    AccessFlags, Allocator, BindingLayout, BindingLayoutEntry, ClearValue, CommandEncoder,
    CommandList, DebugGroupStack, DebugObject, DescriptorKind, DescriptorSet, DescriptorWrite,
    Device, DeviceBuffer, DeviceBufferDesc, Framebuffer, FramebufferDesc, ISize, ImageAspect,
    ImageBarrier, ImageLayout, IndexType, LayoutTracker, PassDescription, PassObject,
    Pipeline, PipelineStageFlags, Rect2D, Sampler, SamplerDesc, ShaderStageFlags, Texture,
    TextureCopy, TextureDesc, TextureFormat, TextureUsage, TrackedResource, TrackedResources,
    Viewport, check_write_bounds,
};
use crate::{engine_bail, engine_error};

// ============================================================================
// Mock Texture
// ============================================================================

pub struct MockTexture {
    pub desc: TextureDesc,
    pub valid: AtomicBool,
    tracker: LayoutTracker,
}

impl MockTexture {
    pub fn new(desc: TextureDesc) -> Arc<Self> {
        Arc::new(Self {
            desc,
            valid: AtomicBool::new(true),
            tracker: LayoutTracker::new(),
        })
    }

    /// Sampled color texture
    pub fn color(label: &str, width: u32, height: u32) -> Arc<dyn Texture> {
        Self::new(TextureDesc::new(
            label,
            TextureFormat::R8G8B8A8_UNORM,
            ISize::new(width, height),
            TextureUsage::SAMPLED | TextureUsage::COLOR_ATTACHMENT,
        ))
    }

    /// Depth/stencil texture of `format`
    pub fn depth_stencil(label: &str, format: TextureFormat, width: u32, height: u32) -> Arc<dyn Texture> {
        Self::new(TextureDesc::new(
            label,
            format,
            ISize::new(width, height),
            TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        ))
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl Texture for MockTexture {
    fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn layout_tracker(&self) -> &LayoutTracker {
        &self.tracker
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock DeviceBuffer / Allocator
// ============================================================================

pub struct MockDeviceBuffer {
    pub label: String,
    pub size: u64,
    pub valid: AtomicBool,
    pub bytes: Mutex<Vec<u8>>,
}

impl MockDeviceBuffer {
    pub fn new(label: &str, size: u64) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            size,
            valid: AtomicBool::new(true),
            bytes: Mutex::new(vec![0; size as usize]),
        })
    }
}

impl DeviceBuffer for MockDeviceBuffer {
    fn label(&self) -> &str {
        &self.label
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_write_bounds(&self.label, self.size, offset, data.len())?;
        let mut bytes = self.bytes.lock().unwrap();
        let start = offset as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct MockAllocator {
    pub created: AtomicUsize,
    pub fail: AtomicBool,
}

impl Allocator for MockAllocator {
    fn create_buffer(&self, desc: &DeviceBufferDesc) -> Result<Arc<dyn DeviceBuffer>> {
        if self.fail.load(Ordering::SeqCst) {
            engine_error!("lumen::MockAllocator", "Allocation of '{}' failed", desc.label);
            return Err(Error::OutOfMemory);
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockDeviceBuffer::new(&desc.label, desc.size))
    }
}

// ============================================================================
// Mock Sampler / Pipeline
// ============================================================================

pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl MockSampler {
    pub fn new(label: &str) -> Arc<dyn Sampler> {
        Arc::new(Self {
            desc: SamplerDesc {
                label: label.to_string(),
                ..SamplerDesc::default()
            },
        })
    }
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockPipeline {
    pub label: String,
    pub layout: BindingLayout,
    pub valid: AtomicBool,
}

impl MockPipeline {
    pub fn new(label: &str, layout: BindingLayout) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            layout,
            valid: AtomicBool::new(true),
        })
    }

    /// Pipeline declaring one uniform buffer and one combined image sampler per binding given
    pub fn with_bindings(label: &str, uniforms: &[u32], images: &[u32]) -> Arc<dyn Pipeline> {
        let entry = |binding: u32, kind: DescriptorKind| BindingLayoutEntry {
            binding,
            kind,
            stages: ShaderStageFlags::VERTEX_FRAGMENT,
        };
        let entries = uniforms
            .iter()
            .map(|&binding| entry(binding, DescriptorKind::UniformBuffer))
            .chain(images.iter().map(|&binding| entry(binding, DescriptorKind::CombinedImageSampler)))
            .collect();
        Self::new(label, BindingLayout::new(entries))
    }
}

impl Pipeline for MockPipeline {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn binding_layout(&self) -> &BindingLayout {
        &self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock device objects
// ============================================================================

pub struct MockPassObject {
    pub description: PassDescription,
}

impl PassObject for MockPassObject {
    fn description(&self) -> &PassDescription {
        &self.description
    }

    fn is_valid(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    /// Attachment labels in slot order
    pub attachments: Vec<String>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockDescriptorSet {
    pub id: usize,
}

impl DescriptorSet for MockDescriptorSet {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Device
// ============================================================================

#[derive(Default)]
pub struct MockDevice {
    pub allocator: MockAllocator,
    pub pass_objects_created: AtomicUsize,
    pub fail_pass_creation: AtomicBool,
    pub fail_framebuffer_creation: AtomicBool,
    pub fail_descriptor_update: AtomicBool,
    /// Attachment labels of every frame buffer created
    pub framebuffers: Mutex<Vec<Vec<String>>>,
    /// Every batch passed to `update_descriptor_set`
    pub descriptor_updates: Mutex<Vec<Vec<DescriptorWrite>>>,
    pub debug_names: Mutex<Vec<String>>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Device for MockDevice {
    fn create_pass_object(&self, desc: &PassDescription) -> Result<Arc<dyn PassObject>> {
        if self.fail_pass_creation.load(Ordering::SeqCst) {
            engine_bail!(InitializationFailed, "lumen::MockDevice", "Pass creation rejected");
        }
        self.pass_objects_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPassObject { description: desc.clone() }))
    }

    fn create_framebuffer(&self, _pass: &dyn PassObject, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        if self.fail_framebuffer_creation.load(Ordering::SeqCst) {
            engine_bail!(InitializationFailed, "lumen::MockDevice", "Frame buffer creation rejected");
        }
        let attachments: Vec<String> = desc.attachments.iter().map(|t| t.desc().label.clone()).collect();
        self.framebuffers.lock().unwrap().push(attachments.clone());
        Ok(Arc::new(MockFramebuffer {
            width: desc.width,
            height: desc.height,
            attachments,
        }))
    }

    fn update_descriptor_set(&self, _set: &dyn DescriptorSet, writes: &[DescriptorWrite]) -> Result<()> {
        if self.fail_descriptor_update.load(Ordering::SeqCst) {
            engine_bail!("lumen::MockDevice", "Descriptor update rejected");
        }
        self.descriptor_updates.lock().unwrap().push(writes.to_vec());
        Ok(())
    }

    fn allocator(&self) -> &dyn Allocator {
        &self.allocator
    }

    fn set_debug_name(&self, object: DebugObject<'_>, name: &str) {
        let kind = match object {
            DebugObject::Pass(_) => "pass",
            DebugObject::Texture(_) => "texture",
            DebugObject::Buffer(_) => "buffer",
        };
        self.debug_names.lock().unwrap().push(format!("{}:{}", kind, name));
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

/// One recorded device command
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Barrier {
        texture: String,
        old_layout: ImageLayout,
        new_layout: ImageLayout,
        src_access: AccessFlags,
        dst_access: AccessFlags,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        aspect: ImageAspect,
        base_mip_level: u32,
        mip_level_count: u32,
    },
    BeginRenderPass {
        attachments: Vec<String>,
        render_area: Rect2D,
        clear_values: Vec<ClearValue>,
    },
    EndRenderPass,
    BindPipeline(String),
    BindDescriptorSet(u32),
    SetViewport(Viewport),
    SetScissor(Rect2D),
    SetStencilReference(u32),
    BindVertexBuffer { buffer: String, offset: u64 },
    BindIndexBuffer { buffer: String, offset: u64, index_type: IndexType },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    CopyTextureToTexture { source: String, destination: String, copy: TextureCopy },
    CopyTextureToBuffer { source: String, destination: String, region: Rect2D, offset: u64 },
    BlitMipLevel { texture: String, level: u32 },
    PushDebugGroup(String),
    PopDebugGroup,
}

#[derive(Default)]
pub struct MockCommandList {
    pub recorded: Vec<Recorded>,
    /// Name of a call that fails instead of recording (e.g. `"draw_indexed"`)
    pub fail_on: Option<&'static str>,
    /// Barriers accepted before `pipeline_barrier` starts failing
    pub barrier_limit: Option<usize>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, call: &'static str, command: Recorded) -> Result<()> {
        if self.fail_on == Some(call) {
            engine_bail!("lumen::MockCommandList", "{} rejected", call);
        }
        self.recorded.push(command);
        Ok(())
    }

    /// Barriers recorded so far
    pub fn barriers(&self) -> Vec<&Recorded> {
        self.recorded
            .iter()
            .filter(|command| matches!(command, Recorded::Barrier { .. }))
            .collect()
    }

    /// Number of recorded commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Recorded) -> bool) -> usize {
        self.recorded.iter().filter(|command| predicate(command)).count()
    }

    /// Position of the first command matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Recorded) -> bool) -> Option<usize> {
        self.recorded.iter().position(predicate)
    }
}

impl CommandList for MockCommandList {
    fn pipeline_barrier(&mut self, barrier: &ImageBarrier<'_>) -> Result<()> {
        if self.barrier_limit.is_some_and(|limit| self.barriers().len() >= limit) {
            engine_bail!("lumen::MockCommandList", "pipeline_barrier limit reached");
        }
        self.record(
            "pipeline_barrier",
            Recorded::Barrier {
                texture: barrier.texture.desc().label.clone(),
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
                src_access: barrier.src_access,
                dst_access: barrier.dst_access,
                src_stage: barrier.src_stage,
                dst_stage: barrier.dst_stage,
                aspect: barrier.aspect,
                base_mip_level: barrier.base_mip_level,
                mip_level_count: barrier.mip_level_count,
            },
        )
    }

    fn begin_render_pass(
        &mut self,
        _pass: &dyn PassObject,
        framebuffer: &dyn Framebuffer,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let attachments = framebuffer
            .as_any()
            .downcast_ref::<MockFramebuffer>()
            .map(|fb| fb.attachments.clone())
            .unwrap_or_default();
        self.record(
            "begin_render_pass",
            Recorded::BeginRenderPass {
                attachments,
                render_area,
                clear_values: clear_values.to_vec(),
            },
        )
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record("end_render_pass", Recorded::EndRenderPass)
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.record("bind_pipeline", Recorded::BindPipeline(pipeline.label().to_string()))
    }

    fn bind_descriptor_set(&mut self, _pipeline: &dyn Pipeline, set_index: u32, _set: &dyn DescriptorSet) -> Result<()> {
        self.record("bind_descriptor_set", Recorded::BindDescriptorSet(set_index))
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record("set_viewport", Recorded::SetViewport(viewport))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record("set_scissor", Recorded::SetScissor(scissor))
    }

    fn set_stencil_reference(&mut self, reference: u32) -> Result<()> {
        self.record("set_stencil_reference", Recorded::SetStencilReference(reference))
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64) -> Result<()> {
        self.record(
            "bind_vertex_buffer",
            Recorded::BindVertexBuffer { buffer: buffer.label().to_string(), offset },
        )
    }

    fn bind_index_buffer(&mut self, buffer: &dyn DeviceBuffer, offset: u64, index_type: IndexType) -> Result<()> {
        self.record(
            "bind_index_buffer",
            Recorded::BindIndexBuffer { buffer: buffer.label().to_string(), offset, index_type },
        )
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(
            "draw_indexed",
            Recorded::DrawIndexed { index_count, instance_count, first_index, vertex_offset, first_instance },
        )
    }

    fn copy_texture_to_texture(&mut self, source: &dyn Texture, destination: &dyn Texture, copy: &TextureCopy) -> Result<()> {
        self.record(
            "copy_texture_to_texture",
            Recorded::CopyTextureToTexture {
                source: source.desc().label.clone(),
                destination: destination.desc().label.clone(),
                copy: *copy,
            },
        )
    }

    fn copy_texture_to_buffer(
        &mut self,
        source: &dyn Texture,
        destination: &dyn DeviceBuffer,
        source_region: Rect2D,
        destination_offset: u64,
    ) -> Result<()> {
        self.record(
            "copy_texture_to_buffer",
            Recorded::CopyTextureToBuffer {
                source: source.desc().label.clone(),
                destination: destination.label().to_string(),
                region: source_region,
                offset: destination_offset,
            },
        )
    }

    fn blit_mip_level(&mut self, texture: &dyn Texture, level: u32) -> Result<()> {
        self.record(
            "blit_mip_level",
            Recorded::BlitMipLevel { texture: texture.desc().label.clone(), level },
        )
    }
}

// ============================================================================
// Mock CommandEncoder
// ============================================================================

pub struct MockCommandEncoder {
    pub list: MockCommandList,
    pub tracked: TrackedResources,
    pub debug_groups: DebugGroupStack,
    pub valid: bool,
    pub sets_allocated: usize,
    pub fail_descriptor_allocation: bool,
    pub submitted: usize,
}

impl MockCommandEncoder {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(max_tracked_resources: usize) -> Self {
        Self {
            list: MockCommandList::new(),
            tracked: TrackedResources::new(max_tracked_resources),
            debug_groups: DebugGroupStack::default(),
            valid: true,
            sets_allocated: 0,
            fail_descriptor_allocation: false,
            submitted: 0,
        }
    }

    /// Shared encoder plus the weak handle passes hold
    pub fn shared(self) -> (Arc<Mutex<MockCommandEncoder>>, Weak<Mutex<dyn CommandEncoder>>) {
        let encoder = Arc::new(Mutex::new(self));
        let dyn_encoder: Arc<Mutex<dyn CommandEncoder>> = encoder.clone();
        let weak = Arc::downgrade(&dyn_encoder);
        (encoder, weak)
    }

    /// Labels of tracked textures, in tracking order
    pub fn tracked_textures(&self) -> Vec<String> {
        self.tracked
            .iter()
            .filter_map(|resource| match resource {
                TrackedResource::Texture(texture) => Some(texture.desc().label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Labels of tracked device buffers, in tracking order
    pub fn tracked_buffers(&self) -> Vec<String> {
        self.tracked
            .iter()
            .filter_map(|resource| match resource {
                TrackedResource::Buffer(buffer) => Some(buffer.label().to_string()),
                _ => None,
            })
            .collect()
    }
}

impl Default for MockCommandEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEncoder for MockCommandEncoder {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn command_list(&mut self) -> &mut dyn CommandList {
        &mut self.list
    }

    fn track(&mut self, resource: TrackedResource) -> bool {
        self.tracked.track(resource)
    }

    fn allocate_descriptor_set(&mut self, pipeline: &dyn Pipeline) -> Result<Box<dyn DescriptorSet>> {
        if self.fail_descriptor_allocation {
            engine_bail!(
                "lumen::MockCommandEncoder",
                "Descriptor set allocation for '{}' rejected",
                pipeline.label()
            );
        }
        self.sets_allocated += 1;
        Ok(Box::new(MockDescriptorSet { id: self.sets_allocated }))
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label);
        self.list.recorded.push(Recorded::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.debug_groups.pop();
        self.list.recorded.push(Recorded::PopDebugGroup);
    }

    fn submit(&mut self) -> Result<()> {
        if !self.valid {
            engine_bail!(InvalidState, "lumen::MockCommandEncoder", "Encoder already submitted");
        }
        self.valid = false;
        self.submitted += 1;
        self.tracked.release();
        Ok(())
    }
}
