/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Every backend object (texture, buffer, sampler, pass object, encoder)
/// holds an `Arc<GpuContext>`, so the context is dropped last and tears the
/// device down only once nothing can still reference it.

use std::any::Any;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use lumen_render::engine_err;
use lumen_render::lumen::{Config, Result};

/// Shared GPU context
pub struct GpuContext {
    /// Vulkan loader (must outlive the instance)
    _entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    /// Selected physical device
    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue (submission must be externally synchronized)
    graphics_queue: Mutex<vk::Queue>,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Object naming and command labels (validation only)
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    /// Debug messenger and the loader that created it
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    /// Settings the device was created with
    pub(crate) config: Config,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        allocator: Allocator,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
        config: Config,
    ) -> Self {
        let debug_utils = debug_messenger
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));
        Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue: Mutex::new(graphics_queue),
            graphics_queue_family,
            debug_utils,
            debug_messenger,
            config,
        }
    }

    /// Lock the memory allocator
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "GPU allocator lock poisoned"))
    }

    /// Lock the graphics queue for submission
    pub(crate) fn queue(&self) -> Result<MutexGuard<'_, vk::Queue>> {
        self.graphics_queue
            .lock()
            .map_err(|_| engine_err!("lumen::vulkan", "Graphics queue lock poisoned"))
    }

    /// Debug names and labels are emitted
    pub(crate) fn labels_enabled(&self) -> bool {
        self.config.enable_validation && self.debug_utils.is_some()
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // Free VkDeviceMemory pages before the device goes away
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            // Stop validation callbacks before the instance is destroyed
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Recover the Vulkan type behind a core trait object
///
/// Objects created by another backend fail with `InvalidResource`.
pub(crate) fn downcast<'a, T: 'static>(object: &'a dyn Any, kind: &str, label: &str) -> Result<&'a T> {
    object.downcast_ref::<T>().ok_or_else(|| {
        engine_err!(
            InvalidResource,
            "lumen::vulkan",
            "{} '{}' was not created by the Vulkan backend",
            kind,
            label
        )
    })
}
