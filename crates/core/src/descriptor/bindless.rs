use crate::backing::table::{FrameGuard, SlotState, SlotStatus, Table, TableInterface, TableSync, UnregisterError};
use crate::descriptor::descriptor_counts::DescriptorCounts;
use crate::descriptor::image_table::{ImageSlot, ImageTable, ImageTableAccess};
use crate::descriptor::sampler_table::{SamplerTable, SamplerTableAccess};
use crate::platform::BindlessPlatform;
use bindless_draw_shaders::descriptor::{DescriptorTables, Resource, ResourceId, ResourceKind, TableIndex};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::{Arc, Weak};
use thiserror::Error;

pub struct Bindless<P: BindlessPlatform>(Arc<BindlessInner<P>>);

impl<P: BindlessPlatform> Clone for Bindless<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: BindlessPlatform> Deref for Bindless<P> {
	type Target = Arc<BindlessInner<P>>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

pub struct WeakBindless<P: BindlessPlatform>(Weak<BindlessInner<P>>);

impl<P: BindlessPlatform> WeakBindless<P> {
	pub fn upgrade(&self) -> Option<Bindless<P>> {
		self.0.upgrade().map(Bindless)
	}
}

impl<P: BindlessPlatform> Clone for WeakBindless<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: BindlessPlatform> Deref for WeakBindless<P> {
	type Target = Weak<BindlessInner<P>>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

pub struct BindlessInner<P: BindlessPlatform> {
	pub platform: P,
	/// always Some, Option is only needed for clean drop
	descriptor_set: Option<P::BindlessDescriptorSet>,
	counts: DescriptorCounts,
	pub table_sync: Arc<TableSync>,
	pub(super) image: ImageTable<P>,
	pub(super) sampler: SamplerTable<P>,
}

impl<P: BindlessPlatform> Deref for BindlessInner<P> {
	type Target = P;

	fn deref(&self) -> &Self::Target {
		&self.platform
	}
}

#[derive(Error)]
pub enum BindlessCreateError<P: BindlessPlatform> {
	#[error("Requested descriptor counts {counts:?} exceed the platform's limits {limits:?}")]
	ExceedsLimits {
		counts: DescriptorCounts,
		limits: DescriptorCounts,
	},
	#[error("Platform Error: {0}")]
	Platform(#[source] P::AllocationError),
}

impl<P: BindlessPlatform> Debug for BindlessCreateError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self, f)
	}
}

impl<P: BindlessPlatform> Bindless<P> {
	/// Creates the bindless tables with `counts` slots each, and the global descriptor set they are written into.
	///
	/// `counts` must lie within [`DescriptorCounts::limits`] of the platform, use
	/// [`DescriptorCounts::reasonable_defaults`] if unsure.
	pub fn new(platform: P, counts: DescriptorCounts) -> Result<Self, BindlessCreateError<P>> {
		let limits = DescriptorCounts::limits(&platform);
		if !counts.is_within_limit(limits) {
			return Err(BindlessCreateError::ExceedsLimits { counts, limits });
		}
		let descriptor_set =
			unsafe { platform.create_descriptor_set(counts) }.map_err(BindlessCreateError::Platform)?;

		let table_sync = TableSync::new();
		Ok(Bindless(Arc::new_cyclic(|weak| {
			let weak = WeakBindless(weak.clone());
			// bindings are distinct and counts are within MAX_TABLE_CAPACITY, registration can not fail
			let image = match ImageTable::new(&table_sync, counts, weak.clone()) {
				Ok(image) => image,
				Err(e) => unreachable!("{}", e),
			};
			let sampler = match SamplerTable::new(&table_sync, counts, weak) {
				Ok(sampler) => sampler,
				Err(e) => unreachable!("{}", e),
			};
			BindlessInner {
				platform,
				descriptor_set: Some(descriptor_set),
				counts,
				table_sync,
				image,
				sampler,
			}
		})))
	}

	#[inline(never)]
	fn unreachable_bindless_dropped() -> ! {
		unreachable!("Bindless has most likely been dropped");
	}

	#[inline]
	pub fn global_descriptor_set(&self) -> &P::BindlessDescriptorSet {
		match self.descriptor_set.as_ref() {
			None => Self::unreachable_bindless_dropped(),
			Some(set) => set,
		}
	}

	#[inline]
	pub fn table_sync(&self) -> &Arc<TableSync> {
		&self.table_sync
	}

	/// The capacity of each table.
	#[inline]
	pub fn counts(&self) -> DescriptorCounts {
		self.counts
	}

	#[inline]
	pub fn image(&self) -> ImageTableAccess<'_, P> {
		ImageTableAccess(self)
	}

	#[inline]
	pub fn sampler(&self) -> SamplerTableAccess<'_, P> {
		SamplerTableAccess(self)
	}

	/// Retire the resource `id` refers to. It stays fetchable in frames started before this call, and is destroyed and
	/// its slot reused once all of them have been dropped.
	pub fn unregister(&self, id: ResourceId) -> Result<(), UnregisterError> {
		self.table_sync.unregister(id)
	}

	/// The current state of the slot `id` points to. The state may belong to a newer resource, see
	/// [`SlotState::matches`].
	pub fn slot_state(&self, id: ResourceId) -> Option<SlotState> {
		self.table_sync.slot_state(id)
	}

	/// Flush the bindless descriptor set. All resources registered before this call will be written and become
	/// fetchable. Resources are never fetchable before they have been flushed.
	pub fn flush(&self) {
		profiling::scope!("Bindless::flush");
		let flush_guard = self.table_sync.flush_lock();
		let sampled_images = self.image.sampled.drain_flush_queue(&flush_guard);
		let storage_images = self.image.storage.drain_flush_queue(&flush_guard);
		let samplers = self.sampler.table.drain_flush_queue(&flush_guard);
		if sampled_images.is_empty() && storage_images.is_empty() && samplers.is_empty() {
			return;
		}

		unsafe {
			self.platform.update_descriptor_set(
				self.global_descriptor_set(),
				&sampled_images,
				&storage_images,
				&samplers,
			);
		}
		self.image.sampled.publish(&sampled_images, &flush_guard);
		self.image.storage.publish(&storage_images, &flush_guard);
		self.sampler.table.publish(&samplers, &flush_guard);
	}

	/// Creating a [`BindlessFrame`] will ensure that any resource, that is unregistered after the frame has been
	/// created, will not be destroyed or removed from the bindless descriptor set until the frame is dropped. Drop the
	/// frame once the work recorded with it has completed. There may be multiple active Frames at the same time that
	/// can finish out of order.
	#[inline]
	pub fn frame(&self) -> BindlessFrame<P> {
		BindlessFrame(Arc::new(BindlessFrameInner {
			frame_guard: self.table_sync.frame(),
			bindless: self.clone(),
		}))
	}
}

impl<P: BindlessPlatform> Drop for BindlessInner<P> {
	fn drop(&mut self) {
		let Some(descriptor_set) = self.descriptor_set.take() else {
			return;
		};
		// Safety: no frames or other handles remain, so we have exclusive access to all tables
		unsafe {
			let platform = &self.platform;
			self.image
				.sampled
				.drop_all_slots(|indices| platform.destroy_images(&descriptor_set, indices));
			self.image
				.storage
				.drop_all_slots(|indices| platform.destroy_images(&descriptor_set, indices));
			self.sampler
				.table
				.drop_all_slots(|indices| platform.destroy_samplers(&descriptor_set, indices));
			platform.destroy_descriptor_set(descriptor_set);
		}
	}
}

/// A frame: a consistent view of the bindless tables. Any resource fetched through it stays valid for as long as the
/// frame is alive.
pub struct BindlessFrame<P: BindlessPlatform>(Arc<BindlessFrameInner<P>>);

impl<P: BindlessPlatform> Clone for BindlessFrame<P> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<P: BindlessPlatform> Deref for BindlessFrame<P> {
	type Target = Arc<BindlessFrameInner<P>>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

pub struct BindlessFrameInner<P: BindlessPlatform> {
	/// dropped first, so gc may still reach the platform through `bindless`
	pub frame_guard: FrameGuard,
	pub bindless: Bindless<P>,
}

impl<P: BindlessPlatform> BindlessFrameInner<P> {
	fn get_matching<'a, I: TableInterface>(&'a self, table: &'a Table<I>, id: ResourceId) -> Option<&'a I::Slot> {
		let state = table.slot_state(id.index())?;
		if state.status == SlotStatus::Live && state.matches(id) {
			// Safety: the slot is live and our frame guard keeps it from being gc-ed
			unsafe { Some(table.get_slot_unchecked(id.index())) }
		} else {
			None
		}
	}

	/// Get the image `id` refers to, if it is live and has not been replaced by a newer version.
	pub fn get_image(&self, id: ResourceId) -> Option<&ImageSlot<P>> {
		let table = self.bindless.image.table(id.kind())?;
		self.get_matching(table, id)
	}

	/// Get the sampler `id` refers to, if it is live and has not been replaced by a newer version.
	pub fn get_sampler(&self, id: ResourceId) -> Option<&P::Sampler> {
		match id.kind() {
			ResourceKind::Sampler => self.get_matching(&self.bindless.sampler.table, id),
			_ => None,
		}
	}

	pub fn get(&self, id: ResourceId) -> Option<Resource<'_, ImageSlot<P>, P::Sampler>> {
		match id.kind() {
			ResourceKind::Sampler => self.get_sampler(id).map(Resource::Sampler),
			_ => self.get_image(id).map(Resource::Image),
		}
	}

	pub fn slot_state(&self, id: ResourceId) -> Option<SlotState> {
		self.bindless.slot_state(id)
	}
}

impl<P: BindlessPlatform> DescriptorTables for BindlessFrameInner<P> {
	type Image = ImageSlot<P>;
	type Sampler = P::Sampler;

	fn fetch_image(&self, kind: ResourceKind, index: TableIndex) -> Option<&Self::Image> {
		let table = self.bindless.image.table(kind)?;
		// Safety: our frame guard keeps live slots from being gc-ed
		unsafe { table.get_live(kind, index) }
	}

	fn fetch_sampler(&self, index: TableIndex) -> Option<&Self::Sampler> {
		// Safety: our frame guard keeps live slots from being gc-ed
		unsafe { self.bindless.sampler.table.get_live(ResourceKind::Sampler, index) }
	}
}

impl<P: BindlessPlatform> DescriptorTables for BindlessFrame<P> {
	type Image = ImageSlot<P>;
	type Sampler = P::Sampler;

	fn fetch_image(&self, kind: ResourceKind, index: TableIndex) -> Option<&Self::Image> {
		self.0.fetch_image(kind, index)
	}

	fn fetch_sampler(&self, index: TableIndex) -> Option<&Self::Sampler> {
		self.0.fetch_sampler(index)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::{BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, Extent};
	use crate::platform::host::{HostEvent, HostPlatform};
	use bindless_draw_shaders::descriptor::{BINDING_SAMPLED_IMAGE, BINDING_SAMPLER};

	fn sampled_ci(name: &str) -> BindlessImageCreateInfo<'_> {
		BindlessImageCreateInfo {
			extent: Extent::new_2d(2, 2),
			usage: BindlessImageUsage::SAMPLED,
			name,
			..BindlessImageCreateInfo::default()
		}
	}

	fn bindless() -> Bindless<HostPlatform> {
		let counts = DescriptorCounts {
			sampled_images: 8,
			storage_images: 4,
			samplers: 4,
		};
		match Bindless::new(HostPlatform::new(), counts) {
			Ok(bindless) => bindless,
			Err(e) => panic!("{}", e),
		}
	}

	#[test]
	fn test_exceeds_limits() {
		let platform = HostPlatform::with_limits(DescriptorCounts {
			sampled_images: 4,
			storage_images: 4,
			samplers: 4,
		});
		let result = Bindless::new(platform, DescriptorCounts::REASONABLE_DEFAULTS);
		assert!(matches!(result, Err(BindlessCreateError::ExceedsLimits { .. })));
	}

	#[test]
	fn test_fetch_after_flush() -> anyhow::Result<()> {
		let bindless = bindless();
		let id = bindless.image().alloc(ResourceKind::SampledImage, &sampled_ci("a"))?;
		{
			let frame = bindless.frame();
			assert!(frame.fetch_image(ResourceKind::SampledImage, id.index()).is_none());
			assert!(frame.get(id).is_none());
		}

		bindless.flush();
		let frame = bindless.frame();
		let image = frame.fetch_image(ResourceKind::SampledImage, id.index()).unwrap();
		assert_eq!(image.debug_name(), "a");
		assert_eq!(image.extent, Extent::new_2d(2, 2));
		assert!(frame.get_image(id).is_some());
		assert!(frame.fetch_image(ResourceKind::UnsignedSampledImage, id.index()).is_none());
		assert!(frame.fetch_sampler(id.index()).is_none());
		assert_eq!(
			bindless.platform.take_events(),
			[HostEvent::Write {
				binding: BINDING_SAMPLED_IMAGE,
				index: id.index().to_u32()
			}]
		);
		Ok(())
	}

	#[test]
	fn test_flush_nothing() {
		let bindless = bindless();
		bindless.flush();
		assert!(bindless.platform.take_events().is_empty());
	}

	#[test]
	fn test_unregister_destroys_after_frame() -> anyhow::Result<()> {
		let bindless = bindless();
		let id = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
		bindless.flush();
		bindless.platform.take_events();

		let frame = bindless.frame();
		assert!(frame.get_sampler(id).is_some());
		bindless.unregister(id)?;
		// no longer fetchable, but not destroyed while the frame is alive
		assert!(frame.get_sampler(id).is_none());
		assert_eq!(bindless.unregister(id), Err(UnregisterError::AlreadyUnregistered(id)));
		assert!(bindless.platform.take_events().is_empty());

		drop(frame);
		drop(bindless.frame());
		assert_eq!(
			bindless.platform.take_events(),
			[HostEvent::Destroy {
				binding: BINDING_SAMPLER,
				index: id.index().to_u32()
			}]
		);
		Ok(())
	}

	#[test]
	fn test_stale_id() -> anyhow::Result<()> {
		let bindless = bindless();
		let first = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
		bindless.flush();
		bindless.unregister(first)?;
		drop(bindless.frame());
		drop(bindless.frame());

		let second = bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear())?;
		bindless.flush();
		assert_eq!(first.index(), second.index());
		assert_ne!(first.version(), second.version());

		let frame = bindless.frame();
		assert!(frame.get(first).is_none());
		assert_eq!(
			frame.get_sampler(second).map(|s| s.create_info),
			Some(BindlessSamplerCreateInfo::linear())
		);
		assert_eq!(bindless.unregister(first), Err(UnregisterError::Stale(first)));
		Ok(())
	}

	#[test]
	fn test_drop_destroys_everything() -> anyhow::Result<()> {
		let bindless = bindless();
		let platform_events = bindless.platform.events();
		bindless.image().alloc(ResourceKind::SampledImage, &sampled_ci("flushed"))?;
		bindless.flush();
		bindless.image().alloc(ResourceKind::SampledImage, &sampled_ci("pending"))?;
		bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
		drop(bindless);

		let events = platform_events.lock().clone();
		let destroyed = events
			.iter()
			.filter(|e| matches!(e, HostEvent::Destroy { .. }))
			.count();
		assert_eq!(destroyed, 3);
		assert_eq!(events.last(), Some(&HostEvent::DestroyDescriptorSet));
		Ok(())
	}
}
