/// VulkanDevice - Vulkan implementation of the Device trait
///
/// Headless device: no surface or swapchain. Requires Vulkan 1.2 with
/// `separateDepthStencilLayouts`, which the pass objects rely on to give the
/// stencil plane its own layout.

use std::ffi::{CStr, CString};
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumen_render::lumen::render::{
    Allocator as BufferAllocator, BindingLayout, DebugObject, DescriptorSet, DescriptorWrite, Device, DeviceBuffer,
    DeviceBufferDesc, Framebuffer, FramebufferDesc, PassDescription, PassObject, Sampler, SamplerDesc, Texture,
    TextureDesc,
};
use lumen_render::lumen::{Config, Error, Result};
use lumen_render::{engine_debug, engine_err, engine_error, engine_info, engine_warn};
use rustc_hash::FxHashMap;
use scopeguard::ScopeGuard;

use crate::vulkan_buffer::{VulkanAllocator, VulkanBuffer};
use crate::vulkan_command_encoder::VulkanCommandEncoder;
use crate::vulkan_context::{downcast, GpuContext};
use crate::vulkan_debug::{messenger_severities, vulkan_debug_callback};
use crate::vulkan_descriptor_set::VulkanDescriptorSet;
use crate::vulkan_frame_buffer::VulkanFramebuffer;
use crate::vulkan_pipeline::VulkanPipelineLayout;
use crate::vulkan_render_pass::VulkanPassObject;
use crate::vulkan_sampler::VulkanSampler;
use crate::vulkan_texture::VulkanTexture;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan device implementation
pub struct VulkanDevice {
    ctx: Arc<GpuContext>,
    allocator: VulkanAllocator,
    /// One sampler per descriptor
    samplers: Mutex<FxHashMap<SamplerDesc, Arc<VulkanSampler>>>,
    device_name: String,
}

fn init_err(what: &str, e: impl std::fmt::Debug) -> Error {
    engine_error!("lumen::vulkan", "{}: {:?}", what, e);
    Error::InitializationFailed(format!("{}: {:?}", what, e))
}

/// Graphics queue family of `physical_device`, if it can run the encoder
unsafe fn suitable_queue_family(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Option<u32> {
    let properties = instance.get_physical_device_properties(physical_device);
    if properties.api_version < vk::API_VERSION_1_2 {
        return None;
    }

    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features = vk::PhysicalDeviceFeatures2::default().push_next(&mut features12);
    instance.get_physical_device_features2(physical_device, &mut features);
    if features12.separate_depth_stencil_layouts == vk::FALSE {
        return None;
    }

    instance
        .get_physical_device_queue_family_properties(physical_device)
        .iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|index| index as u32)
}

impl VulkanDevice {
    /// Create a headless device
    ///
    /// When `config.enable_validation` is set and the Khronos validation
    /// layer is installed, validation messages are routed into engine logging.
    pub fn new(config: Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| init_err("Failed to load Vulkan library", e))?;

            let validation = config.enable_validation && {
                let layers = entry.enumerate_instance_layer_properties().unwrap_or_default();
                let found = layers
                    .iter()
                    .any(|layer| layer.layer_name_as_c_str().ok() == Some(VALIDATION_LAYER));
                if !found {
                    engine_warn!("lumen::vulkan", "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
                }
                found
            };

            let app_name = CString::new(config.app_name.replace('\0', "")).unwrap_or_default();
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let mut extension_names = Vec::new();
            let mut layer_names = Vec::new();
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(VALIDATION_LAYER.as_ptr());
            }

            let instance_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| init_err("Failed to create Vulkan instance", e))?;

            // Torn down in reverse if anything below fails
            let instance = scopeguard::guard(instance, |instance| instance.destroy_instance(None));

            let messenger = if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(messenger_severities())
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(vulkan_debug_callback));
                let messenger = debug_utils
                    .create_debug_utils_messenger(&messenger_info, None)
                    .map_err(|e| init_err("Failed to create debug messenger", e))?;
                Some((debug_utils, messenger))
            } else {
                None
            };
            let messenger = scopeguard::guard(messenger, |messenger| {
                if let Some((debug_utils, messenger)) = messenger {
                    debug_utils.destroy_debug_utils_messenger(messenger, None);
                }
            });

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| init_err("Failed to enumerate physical devices", e))?;

            let (physical_device, graphics_queue_family) = physical_devices
                .into_iter()
                .find_map(|device| suitable_queue_family(&instance, device).map(|family| (device, family)))
                .ok_or_else(|| {
                    engine_error!(
                        "lumen::vulkan",
                        "No Vulkan 1.2 GPU with a graphics queue and separate depth/stencil layouts"
                    );
                    Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());

            let queue_priorities = [1.0];
            let queue_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_queue_family)
                .queue_priorities(&queue_priorities)];

            let mut features12 = vk::PhysicalDeviceVulkan12Features::default().separate_depth_stencil_layouts(true);
            let device_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .push_next(&mut features12);

            let device = instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| init_err("Failed to create logical device", e))?;
            let device = scopeguard::guard(device, |device| device.destroy_device(None));

            let graphics_queue = device.get_device_queue(graphics_queue_family, 0);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: (*instance).clone(),
                device: (*device).clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_err("Failed to create GPU allocator", e))?;

            // GpuContext owns teardown from here on
            let ctx = Arc::new(GpuContext::new(
                entry,
                ScopeGuard::into_inner(instance),
                physical_device,
                ScopeGuard::into_inner(device),
                allocator,
                graphics_queue,
                graphics_queue_family,
                ScopeGuard::into_inner(messenger),
                config,
            ));

            engine_info!(
                "lumen::vulkan",
                "Vulkan device '{}' ready (validation: {})",
                device_name,
                validation
            );

            Ok(Self {
                allocator: VulkanAllocator::new(Arc::clone(&ctx)),
                ctx,
                samplers: Mutex::new(FxHashMap::default()),
                device_name,
            })
        }
    }

    /// Name of the selected GPU
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Logical device, for compiling pipelines against `VulkanPipelineLayout`
    pub fn raw_device(&self) -> &ash::Device {
        &self.ctx.device
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    pub fn create_texture(&self, desc: TextureDesc) -> Result<Arc<VulkanTexture>> {
        Ok(Arc::new(VulkanTexture::create(&self.ctx, desc)?))
    }

    pub fn create_buffer(&self, desc: &DeviceBufferDesc) -> Result<Arc<VulkanBuffer>> {
        Ok(Arc::new(VulkanBuffer::create(&self.ctx, desc)?))
    }

    /// Get or create the sampler for `desc`
    pub fn create_sampler(&self, desc: SamplerDesc) -> Result<Arc<VulkanSampler>> {
        let mut samplers = self
            .samplers
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Sampler cache lock poisoned"))?;
        if let Some(sampler) = samplers.get(&desc) {
            return Ok(Arc::clone(sampler));
        }
        let sampler = Arc::new(VulkanSampler::create(&self.ctx, desc.clone())?);
        samplers.insert(desc, Arc::clone(&sampler));
        Ok(sampler)
    }

    pub fn create_pipeline_layout(&self, binding_layout: BindingLayout) -> Result<VulkanPipelineLayout> {
        VulkanPipelineLayout::create(&self.ctx, binding_layout)
    }

    /// Begin a new command encoder, shared so passes can hold a weak handle
    pub fn create_command_encoder(&self) -> Result<Arc<Mutex<VulkanCommandEncoder>>> {
        Ok(Arc::new(Mutex::new(VulkanCommandEncoder::new(&self.ctx)?)))
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.ctx.device.device_wait_idle() }
            .map_err(|e| engine_err!("lumen::vulkan", "Failed to wait for device idle: {:?}", e))
    }
}

impl Device for VulkanDevice {
    fn create_pass_object(&self, desc: &PassDescription) -> Result<Arc<dyn PassObject>> {
        Ok(Arc::new(VulkanPassObject::create(&self.ctx, desc.clone())?))
    }

    fn create_framebuffer(&self, pass: &dyn PassObject, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        let pass = downcast::<VulkanPassObject>(pass.as_any(), "Pass object", "render pass")?;
        Ok(Arc::new(VulkanFramebuffer::create(&self.ctx, pass, desc)?))
    }

    fn update_descriptor_set(&self, set: &dyn DescriptorSet, writes: &[DescriptorWrite]) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let set = downcast::<VulkanDescriptorSet>(set.as_any(), "Descriptor set", "descriptor set")?;

        // Infos first so the write structs can point into stable storage
        let mut buffer_infos = Vec::new();
        let mut image_infos = Vec::new();
        for write in writes {
            match write {
                DescriptorWrite::UniformBuffer { buffer, offset, range, .. } => {
                    let vk_buffer = downcast::<VulkanBuffer>(buffer.as_any(), "Buffer", buffer.label())?;
                    buffer_infos.push(
                        vk::DescriptorBufferInfo::default()
                            .buffer(vk_buffer.buffer)
                            .offset(*offset)
                            .range(*range),
                    );
                }
                DescriptorWrite::CombinedImageSampler { texture, sampler, .. } => {
                    let label = &texture.desc().label;
                    let vk_texture = downcast::<VulkanTexture>(texture.as_any(), "Texture", label)?;
                    let vk_sampler = downcast::<VulkanSampler>(sampler.as_any(), "Sampler", &sampler.desc().label)?;
                    image_infos.push(
                        vk::DescriptorImageInfo::default()
                            .image_view(vk_texture.view)
                            .sampler(vk_sampler.sampler)
                            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    );
                }
            }
        }

        let mut next_buffer = 0;
        let mut next_image = 0;
        let mut vk_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(set.set)
                .dst_binding(write.binding())
                .dst_array_element(0);
            let vk_write = match write {
                DescriptorWrite::UniformBuffer { .. } => {
                    next_buffer += 1;
                    base.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
                }
                DescriptorWrite::CombinedImageSampler { .. } => {
                    next_image += 1;
                    base.descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(&image_infos[next_image - 1]))
                }
            };
            vk_writes.push(vk_write);
        }

        unsafe {
            self.ctx.device.update_descriptor_sets(&vk_writes, &[]);
        }
        engine_debug!("lumen::vulkan", "Wrote {} descriptors", vk_writes.len());
        Ok(())
    }

    fn allocator(&self) -> &dyn BufferAllocator {
        &self.allocator
    }

    fn set_debug_name(&self, object: DebugObject<'_>, name: &str) {
        let Some(debug_utils) = self.ctx.debug_utils.as_ref().filter(|_| self.ctx.labels_enabled()) else {
            return;
        };
        let Ok(name) = CString::new(name.replace('\0', "")) else {
            return;
        };

        let result = match object {
            DebugObject::Pass(pass) => pass.as_any().downcast_ref::<VulkanPassObject>().map(|pass| {
                let info = vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_handle(pass.render_pass)
                    .object_name(&name);
                unsafe { debug_utils.set_debug_utils_object_name(&info) }
            }),
            DebugObject::Texture(texture) => texture.as_any().downcast_ref::<VulkanTexture>().map(|texture| {
                let info = vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_handle(texture.image)
                    .object_name(&name);
                unsafe { debug_utils.set_debug_utils_object_name(&info) }
            }),
            DebugObject::Buffer(buffer) => buffer.as_any().downcast_ref::<VulkanBuffer>().map(|buffer| {
                let info = vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_handle(buffer.buffer)
                    .object_name(&name);
                unsafe { debug_utils.set_debug_utils_object_name(&info) }
            }),
        };

        if let Some(Err(e)) = result {
            engine_warn!("lumen::vulkan", "Failed to set debug name {:?}: {:?}", name, e);
        }
    }
}
