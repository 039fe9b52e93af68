/// GpuContext - instance, surface, device and queues shared by every Vulkan object
///
/// Owns the objects whose lifetime spans the whole device: the instance, the
/// presentation surface (kept alive so the swapchain can be rebuilt), the
/// logical device, the memory allocator and the command pool. Destruction
/// order is handled in `Drop`.

use ash::vk;
use frameflight_engine::frameflight::device::DeviceConfig;
use frameflight_engine::frameflight::{Error, Result};
use frameflight_engine::{engine_error, engine_info};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;

use crate::debug::DebugMessenger;

/// Map an init failure: log it and wrap it as `InitializationFailed`
macro_rules! init_err {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        engine_error!("frameflight::vulkan", "{}", message);
        Error::InitializationFailed(message)
    }};
}

pub(crate) struct GpuContext {
    /// Vulkan entry (keeps the loader library mapped)
    _entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,

    pub surface_loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub swapchain_loader: ash::khr::swapchain::Device,

    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop to ensure it's dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Allocator>,

    /// Pool for per-slot command buffers (RESET_COMMAND_BUFFER)
    pub command_pool: vk::CommandPool,

    pub debug: Option<DebugMessenger>,
}

impl GpuContext {
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &DeviceConfig,
    ) -> Result<Self> {
        // Validation layers are only compiled in with the `vulkan-validation` feature
        let validation = config.enable_validation && cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_err!("Failed to load Vulkan library: {:?}", e))?;

            let app_name = CString::new(config.app_name.clone())
                .map_err(|e| init_err!("Invalid application name: {}", e))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Frameflight")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window
                .display_handle()
                .map_err(|e| init_err!("Failed to get display handle: {}", e))?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| init_err!("Failed to get required extensions: {}", e))?
                    .to_vec();

            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_err!("Failed to create Vulkan instance: {:?}", e))?;

            let debug = if validation {
                Some(DebugMessenger::new(&entry, &instance, config)?)
            } else {
                None
            };

            let window_handle = window
                .window_handle()
                .map_err(|e| init_err!("Failed to get window handle: {}", e))?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| init_err!("Failed to create surface: {:?}", e))?;

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_device = instance
                .enumerate_physical_devices()
                .map_err(|e| init_err!("Failed to enumerate physical devices: {:?}", e))?
                .into_iter()
                .next()
                .ok_or_else(|| init_err!("No Vulkan-capable GPU found"))?;

            let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

            let graphics_family_index = queue_families
                .iter()
                .enumerate()
                .find(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)
                .ok_or_else(|| init_err!("No graphics queue family found"))?;

            let present_family_index = (0..queue_families.len() as u32)
                .find(|&i| {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, i, surface)
                        .unwrap_or(false)
                })
                .ok_or_else(|| init_err!("No present queue family found"))?;

            let queue_priorities = [1.0];
            let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .queue_priorities(&queue_priorities)];
            if present_family_index != graphics_family_index {
                queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family_index)
                        .queue_priorities(&queue_priorities),
                );
            }

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| init_err!("Failed to create logical device: {:?}", e))?;

            let graphics_queue = device.get_device_queue(graphics_family_index, 0);
            let present_queue = device.get_device_queue(present_family_index, 0);
            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| init_err!("Failed to create GPU allocator: {:?}", e))?;

            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family_index)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = device
                .create_command_pool(&pool_create_info, None)
                .map_err(|e| init_err!("Failed to create command pool: {:?}", e))?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown".to_string());
            engine_info!(
                "frameflight::vulkan",
                "Vulkan device ready: {} (graphics family {}, present family {}, validation {})",
                device_name, graphics_family_index, present_family_index, validation
            );

            Ok(Self {
                _entry: entry,
                instance,
                physical_device,
                device,
                surface_loader,
                surface,
                swapchain_loader,
                graphics_queue,
                present_queue,
                allocator: ManuallyDrop::new(allocator),
                command_pool,
                debug,
            })
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            self.device.destroy_command_pool(self.command_pool, None);

            // Allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some(debug) = self.debug.as_mut() {
                debug.destroy();
            }

            self.instance.destroy_instance(None);
        }
    }
}
