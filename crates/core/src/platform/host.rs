//! A platform without a GPU: images and samplers live in host memory, and every write into or destruction from the
//! descriptor set is recorded as a [`HostEvent`], so that the registry can be driven and inspected in tests.

use crate::backing::range_set::TableIndexRangeSet;
use crate::backing::table::{Table, TableInterface};
use crate::descriptor::{
	BindlessImageCreateInfo, BindlessSamplerCreateInfo, DescriptorCounts, Extent, Format, ImageRangeSet,
	SamplerRangeSet,
};
use crate::platform::BindlessPlatform;
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use thiserror::Error;

/// Images larger than this can not be allocated on the host platform.
pub const HOST_MAX_TEXELS: u64 = 1 << 26;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HostEvent {
	/// A slot has been written into the descriptor set by a flush.
	Write { binding: u32, index: u32 },
	/// The resource of a slot has been destroyed.
	Destroy { binding: u32, index: u32 },
	DestroyDescriptorSet,
}

pub struct HostPlatform {
	limits: DescriptorCounts,
	events: Arc<Mutex<Vec<HostEvent>>>,
	live_resources: AtomicUsize,
}

impl HostPlatform {
	pub fn new() -> Self {
		Self::with_limits(DescriptorCounts::MAX)
	}

	/// A host platform reporting `limits` as its update-after-bind descriptor limits.
	pub fn with_limits(limits: DescriptorCounts) -> Self {
		Self {
			limits,
			events: Arc::new(Mutex::new(Vec::new())),
			live_resources: AtomicUsize::new(0),
		}
	}

	/// Shared handle to the recorded events, stays valid after the platform has been dropped.
	pub fn events(&self) -> Arc<Mutex<Vec<HostEvent>>> {
		self.events.clone()
	}

	/// Take all events recorded since the last call.
	pub fn take_events(&self) -> Vec<HostEvent> {
		std::mem::take(&mut *self.events.lock())
	}

	/// The amount of images and samplers created and not yet destroyed.
	pub fn live_resources(&self) -> usize {
		self.live_resources.load(Relaxed)
	}

	fn release(&self, count: usize) {
		// resources registered from outside were never counted
		let _ = self
			.live_resources
			.fetch_update(Relaxed, Relaxed, |live| Some(live.saturating_sub(count)));
	}

	fn record<I: TableInterface>(&self, indices: &TableIndexRangeSet<'_, Table<I>>, f: impl Fn(u32, u32) -> HostEvent) {
		let binding = indices.table().binding();
		self.events
			.lock()
			.extend(indices.indices().map(|index| f(binding, index.to_u32())));
	}
}

impl Default for HostPlatform {
	fn default() -> Self {
		Self::new()
	}
}

/// An image in host memory, texels are RGBA8 in row-major order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostImage {
	pub extent: Extent,
	pub format: Format,
	pub texels: Vec<[u8; 4]>,
}

impl HostImage {
	/// An image with every texel set to `color`.
	pub fn solid(extent: Extent, color: [u8; 4]) -> Self {
		Self {
			extent,
			format: Format::R8G8B8A8_UNORM,
			texels: vec![color; extent.texel_count() as usize],
		}
	}

	/// The texel at `x`, `y` of the first layer, None if out of bounds.
	pub fn texel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
		if x < self.extent.width && y < self.extent.height {
			self.texels
				.get(y as usize * self.extent.width as usize + x as usize)
				.copied()
		} else {
			None
		}
	}
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HostSampler {
	pub create_info: BindlessSamplerCreateInfo,
}

#[derive(Debug)]
pub struct HostDescriptorSet {
	pub counts: DescriptorCounts,
}

#[derive(Debug, Error)]
pub enum HostError {
	#[error("Image {name} with extent {extent:?} exceeds the maximum of {max} texels", max = HOST_MAX_TEXELS)]
	ImageTooLarge { name: String, extent: Extent },
}

unsafe impl BindlessPlatform for HostPlatform {
	type Image = HostImage;
	type Sampler = HostSampler;
	type AllocationError = HostError;
	type BindlessDescriptorSet = HostDescriptorSet;

	unsafe fn update_after_bind_descriptor_limits(&self) -> DescriptorCounts {
		self.limits
	}

	unsafe fn create_descriptor_set(&self, counts: DescriptorCounts) -> Result<HostDescriptorSet, HostError> {
		Ok(HostDescriptorSet { counts })
	}

	unsafe fn update_descriptor_set(
		&self,
		_set: &HostDescriptorSet,
		sampled_images: &ImageRangeSet<'_, Self>,
		storage_images: &ImageRangeSet<'_, Self>,
		samplers: &SamplerRangeSet<'_, Self>,
	) {
		let write = |binding, index| HostEvent::Write { binding, index };
		self.record(sampled_images, write);
		self.record(storage_images, write);
		self.record(samplers, write);
	}

	unsafe fn destroy_descriptor_set(&self, _set: HostDescriptorSet) {
		self.events.lock().push(HostEvent::DestroyDescriptorSet);
	}

	unsafe fn alloc_image(&self, create_info: &BindlessImageCreateInfo) -> Result<HostImage, HostError> {
		if create_info.extent.texel_count() > HOST_MAX_TEXELS {
			return Err(HostError::ImageTooLarge {
				name: create_info.name.to_owned(),
				extent: create_info.extent,
			});
		}
		self.live_resources.fetch_add(1, Relaxed);
		Ok(HostImage {
			format: create_info.format,
			..HostImage::solid(create_info.extent, [0; 4])
		})
	}

	unsafe fn alloc_sampler(&self, create_info: &BindlessSamplerCreateInfo) -> Result<HostSampler, HostError> {
		self.live_resources.fetch_add(1, Relaxed);
		Ok(HostSampler {
			create_info: *create_info,
		})
	}

	unsafe fn destroy_images(&self, _global_descriptor_set: &HostDescriptorSet, images: &ImageRangeSet<'_, Self>) {
		self.release(images.len());
		self.record(images, |binding, index| HostEvent::Destroy { binding, index });
	}

	unsafe fn destroy_samplers(&self, _global_descriptor_set: &HostDescriptorSet, samplers: &SamplerRangeSet<'_, Self>) {
		self.release(samplers.len());
		self.record(samplers, |binding, index| HostEvent::Destroy { binding, index });
	}
}
