use crate::descriptor::Bindless;
use crate::memory::{AccessError, DeviceAddress, DeviceMemory, DeviceMemoryAlloc, RegionError, TypedRegion};
use crate::platform::ash::{Ash, AshAllocationError};
use ash::vk::{BufferCreateInfo, BufferDeviceAddressInfo, BufferUsageFlags, SharingMode};
use bytemuck::Pod;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use thiserror::Error;

/// Host-visible storage buffers addressed by their buffer device address. Every region is a buffer of its own, which
/// is destroyed on [`DeviceMemoryAlloc::free`] or when this is dropped.
pub struct AshMemory {
	bindless: Bindless<Ash>,
	buffers: Mutex<BTreeMap<u64, AshRegionBuffer>>,
}

struct AshRegionBuffer {
	name: String,
	buffer: ash::vk::Buffer,
	allocation: Allocation,
	len: u64,
}

#[derive(Debug, Error)]
pub enum AshMemoryError {
	#[error("Allocation {name} must not be empty")]
	EmptyAllocation { name: String },
	#[error("Allocation {name} of {len} elements exceeds the maximum region size")]
	TooLarge { name: String, len: usize },
	#[error("There is no allocation starting at {0}")]
	NotAllocated(DeviceAddress),
	#[error("Copy Error: {0:?}")]
	Copy(presser::CopyError),
	#[error("Platform Error: {0}")]
	Platform(#[from] AshAllocationError),
	#[error("Region Error: {0}")]
	Region(#[from] RegionError),
}

impl From<ash::vk::Result> for AshMemoryError {
	fn from(value: ash::vk::Result) -> Self {
		AshMemoryError::Platform(value.into())
	}
}

impl From<gpu_allocator::AllocationError> for AshMemoryError {
	fn from(value: gpu_allocator::AllocationError) -> Self {
		AshMemoryError::Platform(value.into())
	}
}

impl AshMemory {
	pub fn new(bindless: &Bindless<Ash>) -> Self {
		Self {
			bindless: bindless.clone(),
			buffers: Mutex::new(BTreeMap::new()),
		}
	}

	/// The amount of live allocations.
	pub fn allocation_count(&self) -> usize {
		self.buffers.lock().len()
	}

	fn ash(&self) -> &Ash {
		&self.bindless.platform
	}

	unsafe fn alloc_bytes(&self, name: &str, bytes: &[u8]) -> Result<AshRegionBuffer, AshMemoryError> {
		unsafe {
			let ash = self.ash();
			let buffer = ash.device.create_buffer(
				&BufferCreateInfo::default()
					.usage(BufferUsageFlags::STORAGE_BUFFER | BufferUsageFlags::SHADER_DEVICE_ADDRESS)
					.size(bytes.len() as u64)
					.sharing_mode(SharingMode::EXCLUSIVE),
				None,
			)?;
			let result = (|| -> Result<Allocation, AshMemoryError> {
				ash.set_debug_object_name(buffer, name)?;
				let requirements = ash.device.get_buffer_memory_requirements(buffer);
				let mut allocation = ash.memory_allocator().allocate(&AllocationCreateDesc {
					requirements,
					name,
					location: MemoryLocation::CpuToGpu,
					allocation_scheme: AllocationScheme::GpuAllocatorManaged,
					linear: true,
				})?;
				let copied = ash
					.device
					.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
					.map_err(AshMemoryError::from)
					.and_then(|_| {
						presser::copy_from_slice_to_offset(bytes, &mut allocation, 0).map_err(AshMemoryError::Copy)
					});
				match copied {
					Ok(_) => Ok(allocation),
					Err(e) => {
						if let Err(free) = ash.memory_allocator().free(allocation) {
							log::error!("Failed to free allocation {}: {}", name, free);
						}
						Err(e)
					}
				}
			})();
			match result {
				Ok(allocation) => Ok(AshRegionBuffer {
					name: name.to_owned(),
					buffer,
					allocation,
					len: bytes.len() as u64,
				}),
				Err(e) => {
					ash.device.destroy_buffer(buffer, None);
					Err(e)
				}
			}
		}
	}

	unsafe fn destroy(&self, buffer: AshRegionBuffer) -> Result<(), AshMemoryError> {
		unsafe {
			let ash = self.ash();
			let freed = ash.memory_allocator().free(buffer.allocation);
			ash.device.destroy_buffer(buffer.buffer, None);
			Ok(freed?)
		}
	}
}

impl DeviceMemory for AshMemory {
	fn read(&self, address: DeviceAddress, dst: &mut [u8]) -> Result<(), AccessError> {
		let len = dst.len() as u64;
		let unmapped = AccessError::Unmapped { address, len };
		let buffers = self.buffers.lock();
		let (base, buffer) = buffers.range(..=address.to_u64()).next_back().ok_or(unmapped)?;
		let offset = address.to_u64() - base;
		let end = offset.checked_add(len).ok_or(unmapped)?;
		if end > buffer.len {
			return Err(unmapped);
		}
		let mapped = buffer.allocation.mapped_slice().ok_or(unmapped)?;
		dst.copy_from_slice(&mapped[offset as usize..end as usize]);
		Ok(())
	}
}

impl DeviceMemoryAlloc for AshMemory {
	type Error = AshMemoryError;

	fn alloc_region<T: Pod>(&self, name: &str, data: &[T]) -> Result<TypedRegion<T>, AshMemoryError> {
		profiling::function_scope!();
		if data.is_empty() {
			return Err(AshMemoryError::EmptyAllocation { name: name.to_owned() });
		}
		let count = u32::try_from(data.len()).map_err(|_| AshMemoryError::TooLarge {
			name: name.to_owned(),
			len: data.len(),
		})?;
		unsafe {
			let buffer = self.alloc_bytes(name, bytemuck::cast_slice(data))?;
			let address = DeviceAddress::new(
				self.ash()
					.device
					.get_buffer_device_address(&BufferDeviceAddressInfo::default().buffer(buffer.buffer)),
			);
			let region = match TypedRegion::new(address, count) {
				Ok(region) => region,
				Err(e) => {
					self.destroy(buffer)?;
					return Err(e.into());
				}
			};
			log::trace!("Allocated {} at {} with {} bytes", buffer.name, address, buffer.len);
			self.buffers.lock().insert(address.to_u64(), buffer);
			Ok(region)
		}
	}

	unsafe fn free(&self, address: DeviceAddress) -> Result<(), AshMemoryError> {
		let buffer = self.buffers.lock().remove(&address.to_u64());
		match buffer {
			Some(buffer) => unsafe { self.destroy(buffer) },
			None => Err(AshMemoryError::NotAllocated(address)),
		}
	}
}

impl Drop for AshMemory {
	fn drop(&mut self) {
		let buffers = std::mem::take(&mut *self.buffers.lock());
		for (_, buffer) in buffers {
			let name = buffer.name.clone();
			// Safety: the memory is dropped, nothing may reference its regions anymore
			if let Err(e) = unsafe { self.destroy(buffer) } {
				log::error!("Failed to destroy region buffer {}: {}", name, e);
			}
		}
	}
}
