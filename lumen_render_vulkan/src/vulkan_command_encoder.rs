/// VulkanCommandEncoder - Vulkan implementation of the CommandEncoder trait
///
/// One encoder records one primary command buffer, owns the descriptor pools
/// its sets come from and keeps every tracked resource alive until `submit`
/// has waited for the GPU. An encoder submits exactly once.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use lumen_render::lumen::render::{
    CommandEncoder, CommandList, DebugGroupStack, DescriptorSet, Pipeline, TrackedResource, TrackedResources,
};
use lumen_render::lumen::{Error, Result};
use lumen_render::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_command_list::VulkanCommandList;
use crate::vulkan_context::{downcast, GpuContext};
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_pipeline::{descriptor_pool_sizes, VulkanPipeline};

/// Descriptors of each kind reserved per set in a pool
const DESCRIPTORS_PER_SET: u32 = 8;

/// Vulkan command encoder implementation
pub struct VulkanCommandEncoder {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    list: VulkanCommandList,
    tracked: TrackedResources,
    debug_groups: DebugGroupStack,
    /// Pools grow on exhaustion, all freed on submit
    descriptor_pools: Vec<vk::DescriptorPool>,
    /// Fence of a submission whose wait failed; the GPU may still be running it
    in_flight: Option<vk::Fence>,
    valid: bool,
}

/// How far a submission got
#[derive(Debug)]
pub(crate) enum SubmitOutcome {
    /// The GPU finished the work
    Completed,
    /// Nothing reached the queue
    NotSubmitted(Error),
    /// Submitted, but completion could not be confirmed
    InFlight(vk::Fence, Error),
}

impl SubmitOutcome {
    /// Tracked resources and descriptor pools may be freed
    pub(crate) fn releases_resources(&self) -> bool {
        !matches!(self, SubmitOutcome::InFlight(..))
    }
}

fn create_descriptor_pool(ctx: &GpuContext) -> Result<vk::DescriptorPool> {
    let max_sets = ctx.config.descriptor_pool_max_sets.max(1);
    let pool_sizes = descriptor_pool_sizes(max_sets, DESCRIPTORS_PER_SET);
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(max_sets)
        .pool_sizes(&pool_sizes);

    unsafe { ctx.device.create_descriptor_pool(&create_info, None) }
        .map_err(|e| engine_err!("lumen::vulkan", "Failed to create descriptor pool: {:?}", e))
}

impl VulkanCommandEncoder {
    /// Create the command pool and begin recording a one-time-submit buffer
    pub(crate) fn new(ctx: &Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);

            let command_pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to create command pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_error!("lumen::vulkan", "Failed to allocate command buffer: {:?}", e);
                    return Err(Error::InitializationFailed(format!(
                        "Failed to allocate command buffer: {:?}",
                        e
                    )));
                }
            };

            let encoder = Self {
                ctx: Arc::clone(ctx),
                command_pool,
                list: VulkanCommandList::new(Arc::clone(ctx), command_buffer),
                tracked: TrackedResources::new(ctx.config.max_tracked_resources),
                debug_groups: DebugGroupStack::default(),
                descriptor_pools: Vec::new(),
                in_flight: None,
                valid: true,
            };

            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            ctx.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!("lumen::vulkan", "Failed to begin command buffer: {:?}", e))?;

            Ok(encoder)
        }
    }

    /// Number of resources currently kept alive by this encoder
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Get the underlying Vulkan command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.list.command_buffer
    }

    fn allocate_from_pools(&mut self, set_layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        if self.descriptor_pools.is_empty() {
            self.descriptor_pools.push(create_descriptor_pool(&self.ctx)?);
        }

        let layouts = [set_layout];
        for attempt in 0..2 {
            let pool = match self.descriptor_pools.last() {
                Some(pool) => *pool,
                None => break,
            };
            let allocate_info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);

            match unsafe { self.ctx.device.allocate_descriptor_sets(&allocate_info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) if attempt == 0 => {
                    self.descriptor_pools.push(create_descriptor_pool(&self.ctx)?);
                    engine_info!(
                        "lumen::vulkan",
                        "Descriptor pool exhausted, created new pool (total: {})",
                        self.descriptor_pools.len()
                    );
                }
                Err(e) => {
                    return Err(engine_err!("lumen::vulkan", "Failed to allocate descriptor set: {:?}", e));
                }
            }
        }
        Err(engine_err!("lumen::vulkan", "Failed to allocate descriptor set after pool growth"))
    }

    fn destroy_descriptor_pools(&mut self) {
        for pool in self.descriptor_pools.drain(..) {
            unsafe {
                self.ctx.device.destroy_descriptor_pool(pool, None);
            }
        }
    }

    fn end_and_submit(&self) -> SubmitOutcome {
        let device = &self.ctx.device;
        let command_buffer = self.list.command_buffer;
        unsafe {
            if let Err(e) = device.end_command_buffer(command_buffer) {
                return SubmitOutcome::NotSubmitted(engine_err!(
                    "lumen::vulkan",
                    "Failed to end command buffer: {:?}",
                    e
                ));
            }

            let fence = match device.create_fence(&vk::FenceCreateInfo::default(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    return SubmitOutcome::NotSubmitted(engine_err!(
                        "lumen::vulkan",
                        "Failed to create submit fence: {:?}",
                        e
                    ));
                }
            };

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            let submitted = self.ctx.queue().and_then(|queue| {
                device
                    .queue_submit(*queue, std::slice::from_ref(&submit_info), fence)
                    .map_err(|e| engine_err!("lumen::vulkan", "Failed to submit command buffer: {:?}", e))
            });
            if let Err(err) = submitted {
                device.destroy_fence(fence, None);
                return SubmitOutcome::NotSubmitted(err);
            }

            match device.wait_for_fences(&[fence], true, u64::MAX) {
                Ok(()) => {
                    device.destroy_fence(fence, None);
                    SubmitOutcome::Completed
                }
                Err(e) => SubmitOutcome::InFlight(
                    fence,
                    engine_err!("lumen::vulkan", "Failed to wait for submission: {:?}", e),
                ),
            }
        }
    }
}

impl CommandEncoder for VulkanCommandEncoder {
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
        if !self.valid {
            engine_bail!(InvalidState, "lumen::vulkan", "Encoder already submitted");
        }
        let vk_pipeline = downcast::<VulkanPipeline>(pipeline.as_any(), "Pipeline", pipeline.label())?;
        let set = self.allocate_from_pools(vk_pipeline.layout.set_layout)?;
        Ok(Box::new(VulkanDescriptorSet::new(set)))
    }

    fn push_debug_group(&mut self, label: &str) {
        self.debug_groups.push(label);
        if let (true, Some(debug_utils)) = (self.ctx.labels_enabled(), self.ctx.debug_utils.as_ref()) {
            let name = CString::new(label.replace('\0', "")).unwrap_or_default();
            let label_info = vk::DebugUtilsLabelEXT::default().label_name(&name);
            unsafe {
                debug_utils.cmd_begin_debug_utils_label(self.list.command_buffer, &label_info);
            }
        }
    }

    fn pop_debug_group(&mut self) {
        if self.debug_groups.pop().is_none() {
            return;
        }
        if let (true, Some(debug_utils)) = (self.ctx.labels_enabled(), self.ctx.debug_utils.as_ref()) {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.list.command_buffer);
            }
        }
    }

    fn submit(&mut self) -> Result<()> {
        if !self.valid {
            engine_bail!(InvalidState, "lumen::vulkan", "Encoder already submitted");
        }
        if self.list.in_render_pass() {
            engine_bail!(InvalidState, "lumen::vulkan", "Cannot submit while a render pass is open");
        }
        self.valid = false;

        if self.debug_groups.depth() > 0 {
            engine_warn!(
                "lumen::vulkan",
                "Submitting with {} unclosed debug group(s)",
                self.debug_groups.depth()
            );
            while self.debug_groups.depth() > 0 {
                self.pop_debug_group();
            }
        }

        let outcome = self.end_and_submit();
        if !outcome.releases_resources() {
            engine_error!(
                "lumen::vulkan",
                "Submission state unknown, keeping {} tracked resources until drop",
                self.tracked.len()
            );
        } else {
            let released = self.tracked.release();
            self.destroy_descriptor_pools();
            engine_debug!("lumen::vulkan", "Released {} resources after submission", released);
        }

        match outcome {
            SubmitOutcome::Completed => Ok(()),
            SubmitOutcome::NotSubmitted(err) => Err(err),
            SubmitOutcome::InFlight(fence, err) => {
                self.in_flight = Some(fence);
                Err(err)
            }
        }
    }
}

impl Drop for VulkanCommandEncoder {
    fn drop(&mut self) {
        if let Some(fence) = self.in_flight.take() {
            unsafe {
                if let Err(e) = self.ctx.device.device_wait_idle() {
                    engine_error!("lumen::vulkan", "Wait before encoder teardown failed: {:?}", e);
                }
                self.ctx.device.destroy_fence(fence, None);
            }
        }
        self.tracked.release();
        self.destroy_descriptor_pools();
        unsafe {
            // Frees the command buffer with it
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_command_encoder_tests.rs"]
mod tests;
