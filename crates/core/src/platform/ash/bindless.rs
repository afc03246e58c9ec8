use crate::backing::range_set::TableIndexRangeSet;
use crate::backing::table::{Table, TableInterface};
use crate::descriptor::{
	Bindless, BindlessImageCreateInfo, BindlessSamplerCreateInfo, DescriptorCounts, ImageAllocationError,
	ImageRangeSet, SamplerAllocationError, SamplerRangeSet,
};
use crate::platform::BindlessPlatform;
use ash::ext::debug_utils;
use ash::prelude::VkResult;
use ash::vk::{
	ComponentMapping, DebugUtilsObjectNameInfoEXT, DescriptorBindingFlags, DescriptorImageInfo, DescriptorPool,
	DescriptorPoolCreateFlags, DescriptorPoolCreateInfo, DescriptorPoolSize, DescriptorSet, DescriptorSetAllocateInfo,
	DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutBindingFlagsCreateInfo,
	DescriptorSetLayoutCreateFlags, DescriptorSetLayoutCreateInfo, DescriptorType, Handle, ImageAspectFlags,
	ImageLayout, ImageSubresourceRange, ImageTiling, ImageViewCreateInfo, PhysicalDeviceProperties2,
	PhysicalDeviceVulkan12Properties, PipelineLayout, PipelineLayoutCreateInfo, PushConstantRange, SampleCountFlags,
	SamplerCreateInfo, ShaderStageFlags, SharingMode, WriteDescriptorSet, LOD_CLAMP_NONE,
};
use bindless_draw_shaders::descriptor::{BINDING_SAMPLED_IMAGE, BINDING_SAMPLER, BINDING_STORAGE_IMAGE};
use bindless_draw_shaders::payload::ShaderInput;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, Allocator};
use gpu_allocator::AllocationError;
use parking_lot::{Mutex, MutexGuard};
use static_assertions::assert_impl_all;
use std::cell::UnsafeCell;
use std::ffi::CString;
use std::mem::size_of;
use std::ops::{Deref, Range};
use thiserror::Error;

pub struct Ash {
	pub create_info: AshCreateInfo,
}
assert_impl_all!(Bindless<Ash>: Send, Sync);

impl Ash {
	pub fn new(create_info: AshCreateInfo) -> Self {
		Ash { create_info }
	}

	/// Names `handle` for debuggers, if the debug utils extension is enabled. Names containing a NUL byte are skipped.
	pub unsafe fn set_debug_object_name(&self, handle: impl Handle, name: &str) -> VkResult<()> {
		unsafe {
			if let Some(debug_marker) = self.extensions.debug_utils.as_ref() {
				let Ok(name) = CString::new(name) else {
					log::warn!("Debug name {:?} contains a NUL byte and is not set", name);
					return Ok(());
				};
				debug_marker.set_debug_utils_object_name(
					&DebugUtilsObjectNameInfoEXT::default()
						.object_handle(handle)
						.object_name(&name),
				)?;
			}
			Ok(())
		}
	}

	pub unsafe fn create_image_view(
		&self,
		image: ash::vk::Image,
		create_info: &BindlessImageCreateInfo,
	) -> VkResult<ash::vk::ImageView> {
		unsafe {
			let image_view = self.device.create_image_view(
				&ImageViewCreateInfo::default()
					.image(image)
					.view_type(create_info.extent.to_ash_image_view_type())
					.format(create_info.format)
					.components(ComponentMapping::default()) // identity
					.subresource_range(ImageSubresourceRange {
						aspect_mask: ImageAspectFlags::COLOR,
						base_mip_level: 0,
						level_count: 1,
						base_array_layer: 0,
						layer_count: 1,
					}),
				None,
			)?;
			self.set_debug_object_name(image_view, create_info.name)?;
			Ok(image_view)
		}
	}
}

impl Deref for Ash {
	type Target = AshCreateInfo;

	fn deref(&self) -> &Self::Target {
		&self.create_info
	}
}

impl Drop for Ash {
	fn drop(&mut self) {
		unsafe {
			// resources may only be destroyed once the device stopped using them
			if let Err(e) = self.device.device_wait_idle() {
				log::error!("device_wait_idle failed while dropping Ash: {}", e);
			}
		}
	}
}

pub struct AshCreateInfo {
	pub entry: ash::Entry,
	pub instance: ash::Instance,
	pub physical_device: ash::vk::PhysicalDevice,
	pub device: ash::Device,
	pub memory_allocator: Option<Mutex<Allocator>>,
	pub shader_stages: ShaderStageFlags,
	pub queue_family_index: u32,
	pub queue: Mutex<ash::vk::Queue>,
	pub extensions: AshExtensions,
	pub destroy: Option<AshDestroyFn>,
}

pub type AshDestroyFn = Box<dyn FnOnce(&mut AshCreateInfo) + Send + Sync>;

#[derive(Default)]
#[non_exhaustive]
pub struct AshExtensions {
	pub debug_utils: Option<debug_utils::Device>,
}

impl AshCreateInfo {
	/// # Panics
	/// if the memory allocator has already been taken by the destroy function
	pub fn memory_allocator(&self) -> MutexGuard<'_, Allocator> {
		match self.memory_allocator.as_ref() {
			Some(allocator) => allocator.lock(),
			None => panic!("memory allocator was already destroyed"),
		}
	}
}

impl Drop for AshCreateInfo {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy.take() {
			destroy(self);
		}
	}
}

/// Wraps gpu-allocator's Allocation to be able to [`Option::take`] it on destruction.
///
/// # Safety
/// UnsafeCell: Required to gain mutable access where it is safe to do so, see safety of interface methods.
#[derive(Debug)]
pub struct AshMemoryAllocation(UnsafeCell<Option<Allocation>>);

impl AshMemoryAllocation {
	/// # Safety
	/// You must [`Self::take`] the Allocation and deallocate manually before dropping self
	pub unsafe fn new(allocation: Allocation) -> Self {
		Self(UnsafeCell::new(Some(allocation)))
	}

	/// Get exclusive mutable access to the Allocation, None if it has been taken
	///
	/// # Safety
	/// You must ensure you have exclusive mutable access to the Allocation
	#[allow(clippy::mut_from_ref)]
	pub unsafe fn get_mut(&self) -> Option<&mut Allocation> {
		unsafe { (*self.0.get()).as_mut() }
	}

	/// Take the Allocation
	///
	/// # Safety
	/// You must ensure you have exclusive mutable access to the Allocation
	pub unsafe fn take(&self) -> Option<Allocation> {
		unsafe { (*self.0.get()).take() }
	}
}

/// Safety: Allocation is Send and Sync, it is only taken on destruction
unsafe impl Send for AshMemoryAllocation {}
unsafe impl Sync for AshMemoryAllocation {}

pub struct AshImage {
	pub image: ash::vk::Image,
	pub image_view: ash::vk::ImageView,
	pub allocation: AshMemoryAllocation,
}

#[derive(Copy, Clone, Debug)]
pub struct AshBindlessDescriptorSet {
	pub pipeline_layout: PipelineLayout,
	pub set_layout: DescriptorSetLayout,
	pub pool: DescriptorPool,
	pub set: DescriptorSet,
}

impl Deref for AshBindlessDescriptorSet {
	type Target = DescriptorSet;

	fn deref(&self) -> &Self::Target {
		&self.set
	}
}

#[derive(Error)]
pub enum AshAllocationError {
	#[error("VkResult: {0}")]
	Vk(#[from] ash::vk::Result),
	#[error("gpu-allocator Error: {0}")]
	Allocation(#[from] AllocationError),
}

impl core::fmt::Debug for AshAllocationError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		core::fmt::Display::fmt(self, f)
	}
}

impl From<AshAllocationError> for ImageAllocationError<Ash> {
	fn from(value: AshAllocationError) -> Self {
		ImageAllocationError::Platform(value)
	}
}

impl From<AshAllocationError> for SamplerAllocationError<Ash> {
	fn from(value: AshAllocationError) -> Self {
		SamplerAllocationError::Platform(value)
	}
}

/// One write per contiguous range of `indices`, with `infos` holding the descriptor of every index in order.
fn range_writes<'a>(
	set: DescriptorSet,
	binding: u32,
	descriptor_type: DescriptorType,
	indices: impl Iterator<Item = Range<u32>>,
	infos: &'a [DescriptorImageInfo],
) -> impl Iterator<Item = WriteDescriptorSet<'a>> {
	let mut info_index = 0;
	indices.map(move |range| {
		let count = range.len();
		let info_start = info_index;
		info_index += count;
		WriteDescriptorSet::default()
			.dst_set(set)
			.dst_binding(binding)
			.descriptor_type(descriptor_type)
			.dst_array_element(range.start)
			.descriptor_count(count as u32)
			.image_info(&infos[info_start..info_start + count])
	})
}

fn ranges<I: TableInterface>(indices: &TableIndexRangeSet<'_, Table<I>>) -> Vec<Range<u32>> {
	indices.iter_ranges().map(|(range, _)| range).collect()
}

unsafe impl BindlessPlatform for Ash {
	type Image = AshImage;
	type Sampler = ash::vk::Sampler;
	type AllocationError = AshAllocationError;
	type BindlessDescriptorSet = AshBindlessDescriptorSet;

	unsafe fn update_after_bind_descriptor_limits(&self) -> DescriptorCounts {
		unsafe {
			let mut vulkan12properties = PhysicalDeviceVulkan12Properties::default();
			let mut properties2 = PhysicalDeviceProperties2::default().push_next(&mut vulkan12properties);
			self.instance
				.get_physical_device_properties2(self.physical_device, &mut properties2);
			DescriptorCounts {
				sampled_images: u32::min(
					vulkan12properties.max_per_stage_descriptor_update_after_bind_sampled_images,
					vulkan12properties.max_descriptor_set_update_after_bind_sampled_images,
				),
				storage_images: u32::min(
					vulkan12properties.max_per_stage_descriptor_update_after_bind_storage_images,
					vulkan12properties.max_descriptor_set_update_after_bind_storage_images,
				),
				samplers: u32::min(
					vulkan12properties.max_per_stage_descriptor_update_after_bind_samplers,
					vulkan12properties.max_descriptor_set_update_after_bind_samplers,
				),
			}
		}
	}

	unsafe fn create_descriptor_set(
		&self,
		counts: DescriptorCounts,
	) -> Result<AshBindlessDescriptorSet, AshAllocationError> {
		unsafe {
			let bindings = [
				DescriptorSetLayoutBinding::default()
					.binding(BINDING_SAMPLED_IMAGE)
					.descriptor_type(DescriptorType::SAMPLED_IMAGE)
					.descriptor_count(counts.sampled_images)
					.stage_flags(self.shader_stages),
				DescriptorSetLayoutBinding::default()
					.binding(BINDING_STORAGE_IMAGE)
					.descriptor_type(DescriptorType::STORAGE_IMAGE)
					.descriptor_count(counts.storage_images)
					.stage_flags(self.shader_stages),
				DescriptorSetLayoutBinding::default()
					.binding(BINDING_SAMPLER)
					.descriptor_type(DescriptorType::SAMPLER)
					.descriptor_count(counts.samplers)
					.stage_flags(self.shader_stages),
			];
			let binding_flags = [DescriptorBindingFlags::UPDATE_AFTER_BIND
				| DescriptorBindingFlags::UPDATE_UNUSED_WHILE_PENDING
				| DescriptorBindingFlags::PARTIALLY_BOUND; 3];

			let set_layout = self.device.create_descriptor_set_layout(
				&DescriptorSetLayoutCreateInfo::default()
					.flags(DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
					.bindings(&bindings)
					.push_next(&mut DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags)),
				None,
			)?;

			let pipeline_layout = match self.device.create_pipeline_layout(
				&PipelineLayoutCreateInfo::default()
					.set_layouts(&[set_layout])
					.push_constant_ranges(&[PushConstantRange {
						offset: 0,
						size: size_of::<ShaderInput>() as u32,
						stage_flags: self.shader_stages,
					}]),
				None,
			) {
				Ok(pipeline_layout) => pipeline_layout,
				Err(e) => {
					self.device.destroy_descriptor_set_layout(set_layout, None);
					return Err(e.into());
				}
			};

			let destroy_layouts = || {
				self.device.destroy_pipeline_layout(pipeline_layout, None);
				self.device.destroy_descriptor_set_layout(set_layout, None);
			};

			let pool = match self.device.create_descriptor_pool(
				&DescriptorPoolCreateInfo::default()
					.flags(DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
					.pool_sizes(&bindings.map(|b| {
						DescriptorPoolSize::default()
							.ty(b.descriptor_type)
							.descriptor_count(b.descriptor_count)
					}))
					.max_sets(1),
				None,
			) {
				Ok(pool) => pool,
				Err(e) => {
					destroy_layouts();
					return Err(e.into());
				}
			};

			let set = match self.device.allocate_descriptor_sets(
				&DescriptorSetAllocateInfo::default()
					.descriptor_pool(pool)
					.set_layouts(&[set_layout]),
			) {
				Ok(sets) => sets.into_iter().next(),
				Err(e) => {
					self.device.destroy_descriptor_pool(pool, None);
					destroy_layouts();
					return Err(e.into());
				}
			};
			let Some(set) = set else {
				self.device.destroy_descriptor_pool(pool, None);
				destroy_layouts();
				return Err(ash::vk::Result::ERROR_OUT_OF_POOL_MEMORY.into());
			};

			Ok(AshBindlessDescriptorSet {
				pipeline_layout,
				set_layout,
				pool,
				set,
			})
		}
	}

	unsafe fn update_descriptor_set(
		&self,
		set: &AshBindlessDescriptorSet,
		sampled_images: &ImageRangeSet<'_, Self>,
		storage_images: &ImageRangeSet<'_, Self>,
		samplers: &SamplerRangeSet<'_, Self>,
	) {
		unsafe {
			let sampled_image_infos = sampled_images
				.iter()
				.map(|(_, image)| {
					DescriptorImageInfo::default()
						.image_view(image.image_view)
						.image_layout(ImageLayout::SHADER_READ_ONLY_OPTIMAL)
				})
				.collect::<Vec<_>>();
			let storage_image_infos = storage_images
				.iter()
				.map(|(_, image)| {
					DescriptorImageInfo::default()
						.image_view(image.image_view)
						.image_layout(ImageLayout::GENERAL)
				})
				.collect::<Vec<_>>();
			let sampler_infos = samplers
				.iter()
				.map(|(_, sampler)| DescriptorImageInfo::default().sampler(*sampler))
				.collect::<Vec<_>>();

			let writes = range_writes(
				set.set,
				BINDING_SAMPLED_IMAGE,
				DescriptorType::SAMPLED_IMAGE,
				ranges(sampled_images).into_iter(),
				&sampled_image_infos,
			)
			.chain(range_writes(
				set.set,
				BINDING_STORAGE_IMAGE,
				DescriptorType::STORAGE_IMAGE,
				ranges(storage_images).into_iter(),
				&storage_image_infos,
			))
			.chain(range_writes(
				set.set,
				BINDING_SAMPLER,
				DescriptorType::SAMPLER,
				ranges(samplers).into_iter(),
				&sampler_infos,
			))
			.collect::<Vec<_>>();
			self.device.update_descriptor_sets(&writes, &[]);
		}
	}

	unsafe fn destroy_descriptor_set(&self, set: AshBindlessDescriptorSet) {
		unsafe {
			// descriptor sets allocated from pool are freed implicitly
			self.device.destroy_descriptor_pool(set.pool, None);
			self.device.destroy_pipeline_layout(set.pipeline_layout, None);
			self.device.destroy_descriptor_set_layout(set.set_layout, None);
		}
	}

	unsafe fn alloc_image(&self, create_info: &BindlessImageCreateInfo) -> Result<AshImage, AshAllocationError> {
		unsafe {
			let image = self.device.create_image(
				&ash::vk::ImageCreateInfo::default()
					.flags(ash::vk::ImageCreateFlags::empty())
					.image_type(create_info.extent.to_ash_image_type())
					.format(create_info.format)
					.extent(create_info.extent.into())
					.mip_levels(1)
					.array_layers(1)
					.samples(SampleCountFlags::TYPE_1)
					.tiling(ImageTiling::OPTIMAL)
					.usage(create_info.usage.to_ash_image_usage_flags())
					.sharing_mode(SharingMode::EXCLUSIVE)
					.initial_layout(ImageLayout::UNDEFINED),
				None,
			)?;
			let result = (|| -> Result<_, AshAllocationError> {
				self.set_debug_object_name(image, create_info.name)?;
				let requirements = self.device.get_image_memory_requirements(image);
				let memory_allocation = self.memory_allocator().allocate(&AllocationCreateDesc {
					requirements,
					name: create_info.name,
					location: create_info.usage.to_gpu_allocator_memory_location(),
					allocation_scheme: create_info.allocation_scheme.to_gpu_allocator_image(image),
					linear: false,
				})?;
				let view = self
					.device
					.bind_image_memory(image, memory_allocation.memory(), memory_allocation.offset())
					.and_then(|_| self.create_image_view(image, create_info));
				match view {
					Ok(view) => Ok((view, memory_allocation)),
					Err(e) => {
						if let Err(free) = self.memory_allocator().free(memory_allocation) {
							log::error!("Failed to free allocation of image {}: {}", create_info.name, free);
						}
						Err(AshAllocationError::from(e))
					}
				}
			})();
			match result {
				Ok((image_view, memory_allocation)) => Ok(AshImage {
					image,
					image_view,
					allocation: AshMemoryAllocation::new(memory_allocation),
				}),
				Err(e) => {
					self.device.destroy_image(image, None);
					Err(e)
				}
			}
		}
	}

	unsafe fn alloc_sampler(
		&self,
		create_info: &BindlessSamplerCreateInfo,
	) -> Result<ash::vk::Sampler, AshAllocationError> {
		unsafe {
			Ok(self.device.create_sampler(
				&SamplerCreateInfo::default()
					.mag_filter(create_info.mag_filter.to_ash_filter())
					.min_filter(create_info.min_filter.to_ash_filter())
					.mipmap_mode(create_info.mipmap_mode.to_ash_mipmap_mode())
					.address_mode_u(create_info.address_mode_u.to_ash_address_mode())
					.address_mode_v(create_info.address_mode_v.to_ash_address_mode())
					.address_mode_w(create_info.address_mode_w.to_ash_address_mode())
					.anisotropy_enable(create_info.max_anisotropy.is_some())
					.max_anisotropy(create_info.max_anisotropy.unwrap_or(1.0))
					.min_lod(create_info.min_lod)
					.max_lod(create_info.max_lod.unwrap_or(LOD_CLAMP_NONE))
					.border_color(create_info.border_color.to_ash_border_color(false)),
				None,
			)?)
		}
	}

	unsafe fn destroy_images(&self, _global_descriptor_set: &AshBindlessDescriptorSet, images: &ImageRangeSet<'_, Self>) {
		unsafe {
			let mut allocator = self.memory_allocator();
			for (_, image) in images.iter() {
				// Safety: We have exclusive access to the ImageSlot in this method, nothing will access the
				// Allocation afterward.
				if let Some(allocation) = image.allocation.take() {
					if let Err(e) = allocator.free(allocation) {
						log::error!("Failed to free allocation of image {}: {}", image.debug_name(), e);
					}
				}
				self.device.destroy_image_view(image.image_view, None);
				self.device.destroy_image(image.image, None);
			}
		}
	}

	unsafe fn destroy_samplers(&self, _global_descriptor_set: &AshBindlessDescriptorSet, samplers: &SamplerRangeSet<'_, Self>) {
		unsafe {
			for (_, sampler) in samplers.iter() {
				self.device.destroy_sampler(*sampler, None);
			}
		}
	}
}
