use crate::platform::ash::{AshCreateInfo, AshExtensions};
use anyhow::anyhow;
use ash::ext::debug_utils;
use ash::prelude::VkResult;
use ash::vk::{
	ApplicationInfo, Bool32, DebugUtilsMessageSeverityFlagsEXT, DebugUtilsMessageTypeFlagsEXT,
	DebugUtilsMessengerCallbackDataEXT, DebugUtilsMessengerCreateInfoEXT, DebugUtilsMessengerEXT, DeviceCreateInfo,
	DeviceQueueCreateInfo, InstanceCreateInfo, PhysicalDevice, PhysicalDeviceFeatures, PhysicalDeviceType,
	PhysicalDeviceVulkan12Features, QueueFlags, ShaderStageFlags, API_VERSION_1_2,
};
use ash::{Device, Entry, Instance};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use gpu_allocator::{AllocationSizes, AllocatorDebugSettings};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

/// Core features the bindless descriptor set and the draw payloads require.
pub fn required_features() -> PhysicalDeviceFeatures {
	PhysicalDeviceFeatures::default()
		.shader_storage_image_array_dynamic_indexing(true)
		.shader_sampled_image_array_dynamic_indexing(true)
		.shader_int64(true)
}

/// Vulkan 1.2 features for descriptor indexing and reading vertices through buffer device addresses.
pub fn required_features_vk12() -> PhysicalDeviceVulkan12Features<'static> {
	PhysicalDeviceVulkan12Features::default()
		.runtime_descriptor_array(true)
		.descriptor_binding_update_unused_while_pending(true)
		.descriptor_binding_partially_bound(true)
		.descriptor_indexing(true)
		.descriptor_binding_storage_image_update_after_bind(true)
		.descriptor_binding_sampled_image_update_after_bind(true)
		.shader_storage_image_array_non_uniform_indexing(true)
		.shader_sampled_image_array_non_uniform_indexing(true)
		.buffer_device_address(true)
		.vulkan_memory_model(true)
}

pub const LAYER_VALIDATION: &CStr = c"VK_LAYER_KHRONOS_validation";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Debuggers {
	#[default]
	None,
	/// Enable the validation layer and forward its messages to `log`.
	Validation,
}

pub struct AppConfig<'a> {
	pub name: &'a CStr,
	pub version: u32,
}

impl Default for AppConfig<'_> {
	fn default() -> Self {
		Self {
			name: c"Unknown App",
			version: 0,
		}
	}
}

pub struct AshSingleGraphicsQueueCreateInfo<'a> {
	pub app: AppConfig<'a>,
	/// Stages the bindless descriptor set and the [`ShaderInput`](crate::payload::ShaderInput) push constant are
	/// visible to.
	pub shader_stages: ShaderStageFlags,
	pub instance_extensions: &'a [&'a CStr],
	pub extensions: &'a [&'a CStr],
	pub features: PhysicalDeviceFeatures,
	pub features_vk12: PhysicalDeviceVulkan12Features<'static>,
	pub debug: Debuggers,
}

impl Default for AshSingleGraphicsQueueCreateInfo<'_> {
	fn default() -> Self {
		Self {
			app: AppConfig::default(),
			shader_stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT,
			instance_extensions: &[],
			extensions: &[],
			features: required_features(),
			features_vk12: required_features_vk12(),
			debug: Debuggers::default(),
		}
	}
}

/// Creates an [`AshCreateInfo`] on a Vulkan 1.2 capable GPU (preferring dedicated ones) with a single graphics queue,
/// for small applications and tests. Everything created so far is destroyed again if a step fails.
pub fn ash_init_single_graphics_queue(mut create_info: AshSingleGraphicsQueueCreateInfo) -> anyhow::Result<AshCreateInfo> {
	unsafe {
		let entry = Entry::load()?;
		let instance = create_instance(&entry, &create_info)?;
		let debug_instance = debug_utils::Instance::new(&entry, &instance);
		let debug_messenger = match create_info.debug {
			Debuggers::Validation => match create_debug_messenger(&debug_instance) {
				Ok(messenger) => Some(messenger),
				Err(e) => {
					instance.destroy_instance(None);
					return Err(e.into());
				}
			},
			Debuggers::None => None,
		};

		let created = (|| -> anyhow::Result<(PhysicalDevice, u32, Device, Allocator)> {
			let (physical_device, queue_family_index) = select_physical_device(&instance)?;
			let device = create_device(&instance, physical_device, queue_family_index, &mut create_info)?;
			match Allocator::new(&AllocatorCreateDesc {
				instance: instance.clone(),
				device: device.clone(),
				physical_device,
				debug_settings: AllocatorDebugSettings::default(),
				buffer_device_address: true,
				allocation_sizes: AllocationSizes::default(),
			}) {
				Ok(allocator) => Ok((physical_device, queue_family_index, device, allocator)),
				Err(e) => {
					device.destroy_device(None);
					Err(e.into())
				}
			}
		})();
		let (physical_device, queue_family_index, device, memory_allocator) = match created {
			Ok(created) => created,
			Err(e) => {
				if let Some(messenger) = debug_messenger {
					debug_instance.destroy_debug_utils_messenger(messenger, None);
				}
				instance.destroy_instance(None);
				return Err(e);
			}
		};

		let queue = device.get_device_queue(queue_family_index, 0);
		let debug_utils = Some(debug_utils::Device::new(&instance, &device));
		Ok(AshCreateInfo {
			entry,
			instance,
			physical_device,
			device,
			queue_family_index,
			queue: Mutex::new(queue),
			memory_allocator: Some(Mutex::new(memory_allocator)),
			shader_stages: create_info.shader_stages,
			extensions: AshExtensions { debug_utils },
			destroy: Some(Box::new(move |create_info| {
				create_info.extensions = AshExtensions::default();
				drop(create_info.memory_allocator.take());
				create_info.device.destroy_device(None);
				if let Some(messenger) = debug_messenger {
					debug_instance.destroy_debug_utils_messenger(messenger, None);
				}
				create_info.instance.destroy_instance(None);
			})),
		})
	}
}

unsafe fn create_instance(entry: &Entry, create_info: &AshSingleGraphicsQueueCreateInfo) -> VkResult<Instance> {
	unsafe {
		let layers = match create_info.debug {
			Debuggers::Validation => vec![LAYER_VALIDATION.as_ptr()],
			Debuggers::None => Vec::new(),
		};
		// debug utils are always enabled for object names
		let extensions = create_info
			.instance_extensions
			.iter()
			.copied()
			.chain([debug_utils::NAME])
			.map(CStr::as_ptr)
			.collect::<Vec<_>>();
		entry.create_instance(
			&InstanceCreateInfo::default()
				.application_info(
					&ApplicationInfo::default()
						.application_name(create_info.app.name)
						.application_version(create_info.app.version)
						.engine_name(c"bindless-draw")
						.engine_version(1)
						.api_version(API_VERSION_1_2),
				)
				.enabled_extension_names(&extensions)
				.enabled_layer_names(&layers),
			None,
		)
	}
}

unsafe fn create_debug_messenger(debug_instance: &debug_utils::Instance) -> VkResult<DebugUtilsMessengerEXT> {
	unsafe {
		debug_instance.create_debug_utils_messenger(
			&DebugUtilsMessengerCreateInfoEXT::default()
				.message_severity(
					DebugUtilsMessageSeverityFlagsEXT::ERROR
						| DebugUtilsMessageSeverityFlagsEXT::WARNING
						| DebugUtilsMessageSeverityFlagsEXT::INFO,
				)
				.message_type(
					DebugUtilsMessageTypeFlagsEXT::GENERAL
						| DebugUtilsMessageTypeFlagsEXT::VALIDATION
						| DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
				)
				.pfn_user_callback(Some(log_debug_callback)),
			None,
		)
	}
}

/// The Vulkan 1.2 capable physical device with a graphics queue of the most preferred type, and the index of that
/// queue family.
unsafe fn select_physical_device(instance: &Instance) -> anyhow::Result<(PhysicalDevice, u32)> {
	unsafe {
		let (physical_device, queue_family_index) = instance
			.enumerate_physical_devices()?
			.into_iter()
			.filter(|phy| instance.get_physical_device_properties(*phy).api_version >= API_VERSION_1_2)
			.filter_map(|phy| {
				let queue_family_index = instance
					.get_physical_device_queue_family_properties(phy)
					.iter()
					.position(|family| family.queue_flags.contains(QueueFlags::GRAPHICS))?;
				Some((phy, queue_family_index as u32))
			})
			.min_by_key(|(phy, _)| match instance.get_physical_device_properties(*phy).device_type {
				PhysicalDeviceType::DISCRETE_GPU => 1,
				PhysicalDeviceType::VIRTUAL_GPU => 2,
				PhysicalDeviceType::INTEGRATED_GPU => 3,
				PhysicalDeviceType::CPU => 4,
				_ => 5,
			})
			.ok_or(anyhow!("No Vulkan 1.2 physical device with a graphics queue available"))?;

		let properties = instance.get_physical_device_properties(physical_device);
		log::info!(
			"Selected physical device {} ({:?})",
			properties
				.device_name_as_c_str()
				.map_or(Cow::Borrowed("unnamed"), CStr::to_string_lossy),
			properties.device_type
		);
		Ok((physical_device, queue_family_index))
	}
}

unsafe fn create_device(
	instance: &Instance,
	physical_device: PhysicalDevice,
	queue_family_index: u32,
	create_info: &mut AshSingleGraphicsQueueCreateInfo,
) -> VkResult<Device> {
	unsafe {
		let extensions = create_info.extensions.iter().copied().map(CStr::as_ptr).collect::<Vec<_>>();
		instance.create_device(
			physical_device,
			&DeviceCreateInfo::default()
				.enabled_features(&create_info.features)
				.enabled_extension_names(&extensions)
				.push_next(&mut create_info.features_vk12)
				.queue_create_infos(&[DeviceQueueCreateInfo::default()
					.queue_family_index(queue_family_index)
					.queue_priorities(&[1.])]),
			None,
		)
	}
}

unsafe extern "system" fn log_debug_callback(
	message_severity: DebugUtilsMessageSeverityFlagsEXT,
	message_type: DebugUtilsMessageTypeFlagsEXT,
	callback_data: *const DebugUtilsMessengerCallbackDataEXT<'_>,
	_p_user_data: *mut c_void,
) -> Bool32 {
	unsafe {
		let callback_data = *callback_data;
		let message_id_name = callback_data
			.message_id_name_as_c_str()
			.map_or(Cow::Borrowed(""), CStr::to_string_lossy);
		let message = callback_data
			.message_as_c_str()
			.map_or(Cow::Borrowed("No message"), CStr::to_string_lossy);
		let level = if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::ERROR) {
			log::Level::Error
		} else if message_severity.contains(DebugUtilsMessageSeverityFlagsEXT::WARNING) {
			log::Level::Warn
		} else {
			log::Level::Info
		};
		log::log!(
			level,
			"{message_type:?} [{message_id_name} ({:#x})]: {message}",
			callback_data.message_id_number
		);
		false.into()
	}
}
