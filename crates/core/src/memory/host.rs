use crate::memory::{AccessError, DeviceAddress, DeviceMemory, DeviceMemoryAlloc, RegionError, TypedRegion};
use bytemuck::Pod;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

/// First address handed out by [`HostMemory`].
pub const HOST_MEMORY_BASE: u64 = 0x10_0000;
/// Alignment of every [`HostMemory`] allocation.
pub const HOST_MEMORY_ALIGN: u64 = 256;

/// An emulated device address space in host memory. Allocations get distinct addresses with an unmapped gap in
/// between, so that a read running past the end of one allocation fails instead of reading its neighbour.
pub struct HostMemory {
	inner: RwLock<HostMemoryInner>,
}

struct HostMemoryInner {
	next: u64,
	allocations: BTreeMap<u64, HostAllocation>,
}

struct HostAllocation {
	name: String,
	bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum HostMemoryError {
	#[error("Allocation {name} must not be empty")]
	EmptyAllocation { name: String },
	#[error("Allocation {name} of {len} elements exceeds the maximum region size")]
	TooLarge { name: String, len: usize },
	#[error("Host address space is exhausted")]
	OutOfAddressSpace,
	#[error("There is no allocation starting at {0}")]
	NotAllocated(DeviceAddress),
	#[error("Region Error: {0}")]
	Region(#[from] RegionError),
	#[error("Access Error: {0}")]
	Access(#[from] AccessError),
}

impl HostMemoryInner {
	/// The allocation containing `address..address + len` and the offset of `address` within it.
	fn find(&self, address: DeviceAddress, len: u64) -> Option<(&HostAllocation, usize)> {
		let (base, allocation) = self.allocations.range(..=address.to_u64()).next_back()?;
		let offset = address.to_u64() - base;
		let end = offset.checked_add(len)?;
		(end <= allocation.bytes.len() as u64).then_some((allocation, offset as usize))
	}
}

impl HostMemory {
	pub fn new() -> Self {
		Self {
			inner: RwLock::new(HostMemoryInner {
				next: HOST_MEMORY_BASE,
				allocations: BTreeMap::new(),
			}),
		}
	}

	/// Allocate `bytes` at a fresh address.
	pub fn alloc_bytes(&self, name: &str, bytes: Vec<u8>) -> Result<DeviceAddress, HostMemoryError> {
		if bytes.is_empty() {
			return Err(HostMemoryError::EmptyAllocation { name: name.to_owned() });
		}
		let mut inner = self.inner.write();
		let base = inner.next;
		// leave at least one unmapped alignment block between allocations
		inner.next = (bytes.len() as u64)
			.checked_add(base + 2 * HOST_MEMORY_ALIGN - 1)
			.map(|end| end & !(HOST_MEMORY_ALIGN - 1))
			.ok_or(HostMemoryError::OutOfAddressSpace)?;
		inner.allocations.insert(
			base,
			HostAllocation {
				name: name.to_owned(),
				bytes,
			},
		);
		Ok(DeviceAddress::new(base))
	}

	/// Overwrite the bytes at `address`, which must lie within a single allocation.
	pub fn write_bytes(&self, address: DeviceAddress, src: &[u8]) -> Result<(), HostMemoryError> {
		let mut inner = self.inner.write();
		let len = src.len() as u64;
		let offset = match inner.find(address, len) {
			Some((_, offset)) => offset,
			None => return Err(AccessError::Unmapped { address, len }.into()),
		};
		let (_, allocation) = inner
			.allocations
			.range_mut(..=address.to_u64())
			.next_back()
			.ok_or(AccessError::Unmapped { address, len })?;
		allocation.bytes[offset..offset + src.len()].copy_from_slice(src);
		Ok(())
	}

	/// Overwrite element `index` of `region`.
	pub fn write<T: Pod>(&self, region: &TypedRegion<T>, index: u32, value: T) -> Result<(), HostMemoryError> {
		let address = region.element_address(index)?;
		self.write_bytes(address, bytemuck::bytes_of(&value))
	}

	/// The debug name of the allocation starting at `address`.
	pub fn name(&self, address: DeviceAddress) -> Option<String> {
		let inner = self.inner.read();
		inner.allocations.get(&address.to_u64()).map(|a| a.name.clone())
	}

	/// The amount of live allocations.
	pub fn allocation_count(&self) -> usize {
		self.inner.read().allocations.len()
	}
}

impl Default for HostMemory {
	fn default() -> Self {
		Self::new()
	}
}

impl DeviceMemory for HostMemory {
	fn read(&self, address: DeviceAddress, dst: &mut [u8]) -> Result<(), AccessError> {
		let inner = self.inner.read();
		let len = dst.len() as u64;
		let (allocation, offset) = inner.find(address, len).ok_or(AccessError::Unmapped { address, len })?;
		dst.copy_from_slice(&allocation.bytes[offset..offset + dst.len()]);
		Ok(())
	}
}

impl DeviceMemoryAlloc for HostMemory {
	type Error = HostMemoryError;

	fn alloc_region<T: Pod>(&self, name: &str, data: &[T]) -> Result<TypedRegion<T>, HostMemoryError> {
		let count = u32::try_from(data.len()).map_err(|_| HostMemoryError::TooLarge {
			name: name.to_owned(),
			len: data.len(),
		})?;
		let address = self.alloc_bytes(name, bytemuck::cast_slice(data).to_vec())?;
		Ok(TypedRegion::new(address, count)?)
	}

	unsafe fn free(&self, address: DeviceAddress) -> Result<(), HostMemoryError> {
		let mut inner = self.inner.write();
		match inner.allocations.remove(&address.to_u64()) {
			Some(_) => Ok(()),
			None => Err(HostMemoryError::NotAllocated(address)),
		}
	}
}
