use crate::memory::{AccessError, DeviceAddress, DeviceMemory, RegionError};
use bytemuck::Pod;
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;
use core::mem;

/// Minimum alignment of every region, matching `buffer_reference_align = 4`.
pub const REGION_MIN_ALIGN: u64 = 4;

/// A typed view of device memory: a base [`DeviceAddress`], the element stride `size_of::<T>()` and an element count.
/// Stands in for a raw address whenever the host reads or hands out device memory, so that every access has an
/// explicit bound. Validated on construction: non-null, aligned and not overflowing the address space.
#[repr(C)]
pub struct TypedRegion<T> {
	address: DeviceAddress,
	count: u32,
	_phantom: PhantomData<T>,
}

impl<T> Clone for TypedRegion<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for TypedRegion<T> {}

impl<T> PartialEq for TypedRegion<T> {
	fn eq(&self, other: &Self) -> bool {
		self.address == other.address && self.count == other.count
	}
}

impl<T> Eq for TypedRegion<T> {}

impl<T> Debug for TypedRegion<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("TypedRegion")
			.field("address", &self.address)
			.field("stride", &mem::size_of::<T>())
			.field("count", &self.count)
			.finish()
	}
}

impl<T: Pod> TypedRegion<T> {
	pub const STRIDE: u64 = mem::size_of::<T>() as u64;
	pub const ALIGN: u64 = if mem::align_of::<T>() as u64 > REGION_MIN_ALIGN {
		mem::align_of::<T>() as u64
	} else {
		REGION_MIN_ALIGN
	};

	pub fn new(address: DeviceAddress, count: u32) -> Result<Self, RegionError> {
		if address.is_null() {
			return Err(RegionError::NullAddress);
		}
		if !address.is_aligned(Self::ALIGN) {
			return Err(RegionError::Misaligned {
				address,
				align: Self::ALIGN,
			});
		}
		if address.checked_add(count as u64 * Self::STRIDE).is_none() {
			return Err(RegionError::AddressOverflow {
				address,
				count,
				stride: Self::STRIDE,
			});
		}
		Ok(Self {
			address,
			count,
			_phantom: PhantomData,
		})
	}

	#[inline]
	pub fn address(&self) -> DeviceAddress {
		self.address
	}

	#[inline]
	pub fn count(&self) -> u32 {
		self.count
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	#[inline]
	pub fn stride(&self) -> u64 {
		Self::STRIDE
	}

	#[inline]
	pub fn byte_len(&self) -> u64 {
		self.count as u64 * Self::STRIDE
	}

	/// The address of element `index`, which must be within the region.
	pub fn element_address(&self, index: u32) -> Result<DeviceAddress, AccessError> {
		if index < self.count {
			// cannot overflow, checked on construction
			Ok(DeviceAddress::new(self.address.to_u64() + index as u64 * Self::STRIDE))
		} else {
			Err(AccessError::OutOfBounds {
				index,
				count: self.count,
			})
		}
	}

	/// The sub-region of `len` elements starting at element `start`.
	pub fn slice(&self, start: u32, len: u32) -> Result<Self, RegionError> {
		match start.checked_add(len) {
			Some(end) if end <= self.count => Ok(Self {
				address: DeviceAddress::new(self.address.to_u64() + start as u64 * Self::STRIDE),
				count: len,
				_phantom: PhantomData,
			}),
			_ => Err(RegionError::SliceOutOfBounds {
				start,
				len,
				count: self.count,
			}),
		}
	}

	/// Read element `index` from `memory`.
	pub fn load(&self, memory: &impl DeviceMemory, index: u32) -> Result<T, AccessError> {
		let address = self.element_address(index)?;
		let mut value = T::zeroed();
		memory.read(address, bytemuck::bytes_of_mut(&mut value))?;
		Ok(value)
	}

	/// Read all elements in order.
	pub fn iter<'a, M: DeviceMemory>(&self, memory: &'a M) -> impl Iterator<Item = Result<T, AccessError>> + 'a
	where
		T: 'a,
	{
		let region = *self;
		(0..self.count).map(move |i| region.load(memory, i))
	}
}
