use crate::backing::epoch::{Epoch, EpochArray};
use crate::backing::range_set::{table_index_to_range, TableIndexRangeSet};
use crate::backing::slot_array::SlotArray;
use bindless_draw_shaders::descriptor::{
	ResourceId, ResourceKind, TableIndex, TableVersion, BINDING_COUNT, ID_KIND_BITS, ID_VERSION_BITS,
	MAX_TABLE_CAPACITY,
};
use crossbeam_queue::SegQueue;
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard, RwLock};
use rangemap::RangeSet;
use static_assertions::const_assert;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ops::Deref;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::Arc;
use thiserror::Error;

pub trait TableInterface: Sized + Send + Sync + 'static {
	type Slot: Send + Sync;

	/// Destroy the resources held by these slots. Called right before the slots themselves are dropped.
	fn drop_slots(&self, indices: &TableIndexRangeSet<'_, Table<Self>>);
}

/// Shared state of all tables: frame tracking, the epoch retired slots are queued into and the flush lock.
pub struct TableSync {
	tables: [RwLock<Option<Arc<dyn AbstractTable>>>; BINDING_COUNT as usize],
	frame_mutex: CachePadded<Mutex<EpochArray<u32>>>,
	write_queue_epoch: CachePadded<AtomicU32>,
	/// Mutex for both flushing ang gc. Ensures multiple flushes do not race and prevents gc-ing while flushing.
	flush_and_gc_mutex: CachePadded<Mutex<()>>,
}

pub struct Table<I: TableInterface> {
	binding: u32,
	slot_states: SlotArray<AtomicU32>,
	slots: SlotArray<UnsafeCell<MaybeUninit<I::Slot>>>,
	flush_queue: SegQueue<(TableIndex, TableVersion)>,
	reaper_queue: EpochArray<SegQueue<TableIndex>>,
	dead_queue: SegQueue<TableIndex>,
	next_free: CachePadded<AtomicU32>,
	interface: I,
}

// Safety: slot contents are only mutated by the thread owning a slot's state transition
unsafe impl<I: TableInterface> Send for Table<I> {}
unsafe impl<I: TableInterface> Sync for Table<I> {}

#[inline]
fn load_epoch(atomic: &AtomicU32, order: std::sync::atomic::Ordering) -> Epoch {
	match Epoch::from_u32(atomic.load(order)) {
		Some(epoch) => epoch,
		None => unreachable!("only valid epochs are ever stored"),
	}
}

impl TableSync {
	pub fn new() -> Arc<Self> {
		Arc::new(TableSync {
			tables: core::array::from_fn(|_| RwLock::new(None)),
			frame_mutex: CachePadded::new(Mutex::new(EpochArray::new(|| 0))),
			write_queue_epoch: CachePadded::new(AtomicU32::new(Epoch::Odd.to_u32())),
			flush_and_gc_mutex: CachePadded::new(Mutex::new(())),
		})
	}

	pub fn register<I: TableInterface>(
		&self,
		binding: u32,
		slots_capacity: u32,
		interface: I,
	) -> Result<Arc<Table<I>>, TableRegisterError> {
		let lock = self
			.tables
			.get(binding as usize)
			.ok_or(TableRegisterError::InvalidBinding(binding))?;
		if slots_capacity > MAX_TABLE_CAPACITY {
			return Err(TableRegisterError::CapacityTooLarge(slots_capacity));
		}

		let mut guard = lock.write();
		if guard.is_some() {
			return Err(TableRegisterError::AlreadyRegistered(binding));
		}
		let table = Arc::new(Table {
			binding,
			interface,
			slot_states: SlotArray::new(slots_capacity),
			slots: SlotArray::new_generator(slots_capacity, |_| UnsafeCell::new(MaybeUninit::uninit())),
			flush_queue: SegQueue::new(),
			reaper_queue: EpochArray::new(SegQueue::new),
			dead_queue: SegQueue::new(),
			next_free: CachePadded::new(AtomicU32::new(0)),
		});
		*guard = Some(table.clone() as Arc<dyn AbstractTable>);
		Ok(table)
	}

	#[inline]
	fn write_queue_epoch(&self) -> Epoch {
		load_epoch(&self.write_queue_epoch, Acquire)
	}

	#[inline]
	fn frame_epoch(&self) -> Epoch {
		!self.write_queue_epoch()
	}

	/// Start a new frame. Any slot retired after this call will not be destroyed until the returned guard is dropped.
	pub fn frame(self: &Arc<Self>) -> FrameGuard {
		let frame_epoch;
		{
			let mut guard = self.frame_mutex.lock();
			frame_epoch = self.frame_epoch();
			guard[frame_epoch] += 1;

			// if we ran dry of frames (like we are at startup), switch epochs after first frame
			if guard[!frame_epoch] == 0 {
				self.gc_queue(guard, !frame_epoch);
			}
		}

		FrameGuard {
			table_sync: self.clone(),
			epoch: frame_epoch,
		}
	}

	fn frame_drop(&self, dropped_frame_epoch: Epoch) {
		let mut guard = self.frame_mutex.lock();
		let frame_cnt = &mut guard[dropped_frame_epoch];
		match *frame_cnt {
			0 => panic!("frame ref counting underflow"),
			1 => {
				*frame_cnt = 0;
				let frame_epoch = self.frame_epoch();
				if frame_epoch != dropped_frame_epoch {
					self.gc_queue(guard, dropped_frame_epoch);
				}
			}
			_ => *frame_cnt -= 1,
		}
	}

	#[cold]
	#[inline(never)]
	fn gc_queue(&self, guard: MutexGuard<EpochArray<u32>>, dropped_frame_epoch: Epoch) {
		profiling::scope!("TableSync::gc_queue");
		let _guard2 = self.flush_and_gc_mutex.lock();
		let table_gc_indices;
		{
			let gc_queue = !dropped_frame_epoch;
			table_gc_indices = self
				.tables
				.iter()
				.map(|table_lock| {
					let table = table_lock.read();
					table.as_ref().map(|table| table.gc_collect(gc_queue))
				})
				.collect::<Vec<_>>();

			// Release ensures that a FrameGuard created afterward and sent to another thread sees the new epoch, so
			// that no slot is retired into the queue that was just collected.
			self.write_queue_epoch.store(gc_queue.to_u32(), Release);
			drop(guard);
		}

		for (table, gc_indices) in self.tables.iter().zip(table_gc_indices) {
			if let Some(gc_indices) = gc_indices {
				if !gc_indices.is_empty() {
					let table = table.read();
					if let Some(table) = table.as_ref() {
						table.gc_drop(gc_indices)
					} else {
						unreachable!()
					}
				}
			}
		}
	}

	/// Retire the slot `id` refers to. It will be destroyed once all frames that may still reference it completed.
	pub fn unregister(&self, id: ResourceId) -> Result<(), UnregisterError> {
		// gc only switches the write epoch while holding the frame lock, so the slot is queued into the epoch that
		// every frame which could have fetched it still blocks
		let _frame_guard = self.frame_mutex.lock();
		let table = self.tables[id.kind().binding() as usize].read();
		match table.as_ref() {
			Some(table) => table.retire(id, self.write_queue_epoch()),
			None => Err(UnregisterError::NotRegistered(id)),
		}
	}

	/// The current state of the slot `id` points to, None if there is no such slot.
	pub fn slot_state(&self, id: ResourceId) -> Option<SlotState> {
		let table = self.tables[id.kind().binding() as usize].read();
		table.as_ref()?.slot_state(id.index())
	}

	/// Acquire the [`FlushGuard`] required to drain flush queues.
	pub fn flush_lock(&self) -> FlushGuard<'_> {
		FlushGuard {
			_guard: self.flush_and_gc_mutex.lock(),
		}
	}
}

/// Proof that the flush and gc lock is held.
pub struct FlushGuard<'a> {
	_guard: MutexGuard<'a, ()>,
}

impl<I: TableInterface> Table<I> {
	#[inline]
	pub fn slots_capacity(&self) -> u32 {
		self.slot_states.len() as u32
	}

	#[inline]
	pub fn binding(&self) -> u32 {
		self.binding
	}

	/// Allocate a slot for `slot`. It stays [`SlotStatus::Pending`] and invisible to fetches until the next flush.
	pub fn alloc_slot(&self, kind: ResourceKind, slot: I::Slot) -> Result<ResourceId, SlotAllocationError> {
		Ok(self.reserve_slot()?.fill(kind, slot))
	}

	/// Take a free slot without filling it yet, so that a resource is only created once there is room for it.
	pub fn reserve_slot(&self) -> Result<SlotReservation<'_, I>, SlotAllocationError> {
		let index = match self.dead_queue.pop() {
			Some(index) => index,
			None => {
				let capacity = self.slots_capacity();
				let index = self
					.next_free
					.fetch_update(Relaxed, Relaxed, |next| (next < capacity).then_some(next + 1))
					.map_err(|_| SlotAllocationError::NoMoreCapacity(capacity))?;
				// Safety: capacity never exceeds MAX_TABLE_CAPACITY, atomic ensures it's unique
				unsafe { TableIndex::new_unchecked(index) }
			}
		};
		Ok(SlotReservation { table: self, index })
	}

	fn fill_slot(&self, index: TableIndex, kind: ResourceKind, slot: I::Slot) -> ResourceId {
		debug_assert_eq!(kind.binding(), self.binding);
		let state = &self.slot_states[index];
		let version = SlotState::unpack(state.load(Acquire)).version;
		// Safety: index is reserved, we have exclusive access to slot, which is currently uninitialized
		unsafe { (*self.slots[index].get()).write(slot) };
		state.store(
			SlotState {
				status: SlotStatus::Pending,
				kind,
				version,
			}
			.pack(),
			Release,
		);
		self.flush_queue.push((index, version));
		ResourceId::new(kind, index, version)
	}

	/// Get the contents of a live slot of `kind`. Pending, retired or differently kinded slots yield None.
	///
	/// # Safety
	/// A [`FrameGuard`] of the [`TableSync`] this table is registered at must be held for as long as the returned
	/// reference is alive.
	pub unsafe fn get_live(&self, kind: ResourceKind, index: TableIndex) -> Option<&I::Slot> {
		let state = SlotState::unpack(self.slot_states.get(index)?.load(Acquire));
		if state.status == SlotStatus::Live && state.kind == kind {
			// Safety: live slots are initialized, caller ensures they stay alive
			unsafe { Some(self.get_slot_unchecked(index)) }
		} else {
			None
		}
	}

	/// Get the contents of the slot unchecked
	///
	/// # Safety
	/// Assumes the slot is initialized
	pub unsafe fn get_slot_unchecked(&self, index: TableIndex) -> &I::Slot {
		unsafe { (*self.slots[index].get()).assume_init_ref() }
	}

	pub fn slot_state(&self, index: TableIndex) -> Option<SlotState> {
		Some(SlotState::unpack(self.slot_states.get(index)?.load(Acquire)))
	}

	/// Drain the flush queue, returning all slots that are still pending. Slots retired before they were ever flushed
	/// are skipped.
	pub fn drain_flush_queue<'a>(&'a self, _guard: &FlushGuard) -> TableIndexRangeSet<'a, Self> {
		let pending = (0..)
			.map_while(|_| self.flush_queue.pop())
			.filter(|(index, version)| {
				let state = SlotState::unpack(self.slot_states[*index].load(Acquire));
				state.status == SlotStatus::Pending && state.version == *version
			})
			.map(|(index, _)| index);
		// Safety: pending slots are initialized, and can't be gc-ed while we hold the flush lock
		unsafe { TableIndexRangeSet::from(self, pending) }
	}

	/// Make the drained slots visible to fetches, after the platform has written them into the descriptor set.
	pub fn publish(&self, flushed: &TableIndexRangeSet<'_, Self>, _guard: &FlushGuard) {
		for index in flushed.indices() {
			let state = &self.slot_states[index];
			let current = state.load(Acquire);
			let slot = SlotState::unpack(current);
			if slot.status == SlotStatus::Pending {
				// may only fail due to a concurrent retire, which leaves the slot retired
				let _ = state.compare_exchange(current, slot.with_status(SlotStatus::Live).pack(), AcqRel, Acquire);
			}
		}
	}

	/// Destroy every initialized slot, pending, live or retired, and reset the table to be empty.
	///
	/// # Safety
	/// Must not race with any other access to this table.
	pub unsafe fn drop_all_slots(&self, destroy: impl FnOnce(&TableIndexRangeSet<'_, Self>)) {
		while self.flush_queue.pop().is_some() {}
		for epoch in Epoch::VALUES {
			while self.reaper_queue[epoch].pop().is_some() {}
		}

		let initialized = (0..self.slots_capacity())
			.map(|i| unsafe { TableIndex::new_unchecked(i) })
			.filter(|i| SlotState::unpack(self.slot_states[*i].load(Acquire)).is_initialized());
		// Safety: filtered for initialized slots
		let initialized = unsafe { TableIndexRangeSet::from(self, initialized) };
		if initialized.is_empty() {
			return;
		}

		log::debug!(
			"Destroying {} remaining slots of table at binding {}",
			initialized.len(),
			self.binding
		);
		destroy(&initialized);
		for index in initialized.indices() {
			// Safety: we have exclusive access to the previously initialized slot
			unsafe { (*self.slots[index].get()).assume_init_drop() };
			let state = &self.slot_states[index];
			let slot = SlotState::unpack(state.load(Relaxed));
			state.store(slot.with_status(SlotStatus::Exhausted).pack(), Release);
		}
	}
}

impl<I: TableInterface> Deref for Table<I> {
	type Target = I;

	fn deref(&self) -> &Self::Target {
		&self.interface
	}
}

/// Internal Trait
trait AbstractTable: Send + Sync + 'static {
	fn gc_collect(&self, gc_queue: Epoch) -> RangeSet<u32>;
	fn gc_drop(&self, gc_indices: RangeSet<u32>);
	fn retire(&self, id: ResourceId, write_queue_epoch: Epoch) -> Result<(), UnregisterError>;
	fn slot_state(&self, index: TableIndex) -> Option<SlotState>;
}

impl<I: TableInterface> AbstractTable for Table<I> {
	fn gc_collect(&self, gc_queue: Epoch) -> RangeSet<u32> {
		let reaper_queue = &self.reaper_queue[gc_queue];
		(0..)
			.map_while(|_| reaper_queue.pop())
			.map(table_index_to_range)
			.collect()
	}

	fn gc_drop(&self, gc_indices: RangeSet<u32>) {
		// Safety: retired slots are initialized and only queued once
		let gc_indices = unsafe { TableIndexRangeSet::new(self, gc_indices) };
		log::debug!(
			"Reclaiming {} slots of table at binding {}",
			gc_indices.len(),
			self.binding
		);

		self.interface.drop_slots(&gc_indices);

		for i in gc_indices.indices() {
			// Safety: we have exclusive access to the previously initialized slot
			unsafe { (*self.slots[i].get()).assume_init_drop() };
			let state = &self.slot_states[i];
			let slot = SlotState::unpack(state.load(Acquire));
			match slot.version.next() {
				Some(version) => {
					state.store(
						SlotState {
							status: SlotStatus::Free,
							kind: slot.kind,
							version,
						}
						.pack(),
						Release,
					);
					// we send / share the slot to the dead_queue
					self.dead_queue.push(i);
				}
				None => {
					log::warn!(
						"Slot {} of table at binding {} ran out of versions and will not be reused",
						i.to_u32(),
						self.binding
					);
					state.store(slot.with_status(SlotStatus::Exhausted).pack(), Release);
				}
			}
		}
	}

	fn retire(&self, id: ResourceId, write_queue_epoch: Epoch) -> Result<(), UnregisterError> {
		let state = self
			.slot_states
			.get(id.index())
			.ok_or(UnregisterError::NotRegistered(id))?;
		let mut current = state.load(Acquire);
		loop {
			let slot = SlotState::unpack(current);
			if slot.kind != id.kind() {
				return Err(UnregisterError::NotRegistered(id));
			}
			if slot.version != id.version() {
				return Err(UnregisterError::Stale(id));
			}
			match slot.status {
				SlotStatus::Pending | SlotStatus::Live => (),
				SlotStatus::Retired | SlotStatus::Exhausted => return Err(UnregisterError::AlreadyUnregistered(id)),
				SlotStatus::Free => return Err(UnregisterError::NotRegistered(id)),
			}

			match state.compare_exchange_weak(
				current,
				slot.with_status(SlotStatus::Retired).pack(),
				AcqRel,
				Acquire,
			) {
				Ok(_) => {
					self.reaper_queue[write_queue_epoch].push(id.index());
					break Ok(());
				}
				Err(actual) => current = actual,
			}
		}
	}

	fn slot_state(&self, index: TableIndex) -> Option<SlotState> {
		Table::slot_state(self, index)
	}
}

impl<I: TableInterface> Drop for Table<I> {
	fn drop(&mut self) {
		// Safety: we have exclusive access
		unsafe { self.drop_all_slots(|indices| self.interface.drop_slots(indices)) }
	}
}

/// The lifecycle of a table slot.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SlotStatus {
	/// unoccupied and available for allocation
	Free = 0,
	/// registered, but not yet written to the descriptor set
	Pending = 1,
	/// flushed and fetchable
	Live = 2,
	/// unregistered, waiting for all frames that may reference it to complete
	Retired = 3,
	/// all versions have been used up, the slot is never reused
	Exhausted = 4,
}

impl SlotStatus {
	fn from_u32(value: u32) -> Option<Self> {
		match value {
			0 => Some(SlotStatus::Free),
			1 => Some(SlotStatus::Pending),
			2 => Some(SlotStatus::Live),
			3 => Some(SlotStatus::Retired),
			4 => Some(SlotStatus::Exhausted),
			_ => None,
		}
	}
}

const STATE_STATUS_BITS: u32 = 3;
const STATE_KIND_SHIFT: u32 = STATE_STATUS_BITS;
const STATE_VERSION_SHIFT: u32 = STATE_STATUS_BITS + ID_KIND_BITS;
const_assert!(STATE_VERSION_SHIFT + ID_VERSION_BITS <= 32);

/// Status, kind and version of a slot, packed into a single atomic so that retiring a slot can not race with its
/// reuse.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SlotState {
	pub status: SlotStatus,
	pub kind: ResourceKind,
	pub version: TableVersion,
}

impl SlotState {
	fn pack(&self) -> u32 {
		self.status as u32 | self.kind.to_u32() << STATE_KIND_SHIFT | self.version.to_u32() << STATE_VERSION_SHIFT
	}

	fn unpack(raw: u32) -> Self {
		let status = SlotStatus::from_u32(raw & ((1 << STATE_STATUS_BITS) - 1));
		let kind = ResourceKind::from_u32((raw >> STATE_KIND_SHIFT) & ((1 << ID_KIND_BITS) - 1));
		let version = TableVersion::new(raw >> STATE_VERSION_SHIFT);
		match (status, kind, version) {
			(Some(status), Some(kind), Some(version)) => Self { status, kind, version },
			_ => unreachable!("corrupted slot state {:#x}", raw),
		}
	}

	fn with_status(self, status: SlotStatus) -> Self {
		Self { status, ..self }
	}

	fn is_initialized(&self) -> bool {
		matches!(
			self.status,
			SlotStatus::Pending | SlotStatus::Live | SlotStatus::Retired
		)
	}

	/// Whether this state belongs to the resource `id` refers to.
	pub fn matches(&self, id: ResourceId) -> bool {
		self.kind == id.kind() && self.version == id.version()
	}
}

/// A free slot taken by [`Table::reserve_slot`]. Returned to the table if dropped without being filled.
pub struct SlotReservation<'a, I: TableInterface> {
	table: &'a Table<I>,
	index: TableIndex,
}

impl<I: TableInterface> SlotReservation<'_, I> {
	pub fn index(&self) -> TableIndex {
		self.index
	}

	/// Move `slot` into the reserved slot, see [`Table::alloc_slot`].
	pub fn fill(self, kind: ResourceKind, slot: I::Slot) -> ResourceId {
		let (table, index) = (self.table, self.index);
		std::mem::forget(self);
		table.fill_slot(index, kind, slot)
	}
}

impl<I: TableInterface> Drop for SlotReservation<'_, I> {
	fn drop(&mut self) {
		self.table.dead_queue.push(self.index);
	}
}

pub struct FrameGuard {
	table_sync: Arc<TableSync>,
	epoch: Epoch,
}

impl FrameGuard {
	pub fn table_sync(&self) -> &Arc<TableSync> {
		&self.table_sync
	}

	pub fn epoch(&self) -> Epoch {
		self.epoch
	}
}

impl Drop for FrameGuard {
	fn drop(&mut self) {
		self.table_sync.frame_drop(self.epoch);
	}
}

#[derive(Debug, Error)]
pub enum TableRegisterError {
	#[error("Binding {0} does not exist, there are only {count} bindings", count = BINDING_COUNT)]
	InvalidBinding(u32),
	#[error("A table has already been registered for binding {0}")]
	AlreadyRegistered(u32),
	#[error("Table capacity of {0} exceeds the maximum of {max}", max = MAX_TABLE_CAPACITY)]
	CapacityTooLarge(u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum SlotAllocationError {
	#[error("Ran out of available slots with a capacity of {0}!")]
	NoMoreCapacity(u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum UnregisterError {
	#[error("{0:?} was never registered")]
	NotRegistered(ResourceId),
	#[error("{0:?} has already been unregistered")]
	AlreadyUnregistered(ResourceId),
	#[error("{0:?} is stale, its slot has since been reused")]
	Stale(ResourceId),
}
