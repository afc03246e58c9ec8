use crate::memory::{AccessError, DeviceAddress, DeviceMemory};

/// [`DeviceMemory`] backed by a single byte slice mapped at `base`, like the host mapping of one device allocation.
#[derive(Copy, Clone, Debug)]
pub struct SliceMemory<'a> {
	base: DeviceAddress,
	bytes: &'a [u8],
}

impl<'a> SliceMemory<'a> {
	pub fn new(base: DeviceAddress, bytes: &'a [u8]) -> Self {
		Self { base, bytes }
	}

	pub fn base(&self) -> DeviceAddress {
		self.base
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// Whether the bytes `address..address + len` lie entirely within this slice.
	pub fn contains(&self, address: DeviceAddress, len: u64) -> bool {
		self.range(address, len).is_some()
	}

	fn range(&self, address: DeviceAddress, len: u64) -> Option<core::ops::Range<usize>> {
		let start = address.offset_from(self.base)?;
		let end = start.checked_add(len)?;
		if end <= self.bytes.len() as u64 {
			Some(start as usize..end as usize)
		} else {
			None
		}
	}
}

impl DeviceMemory for SliceMemory<'_> {
	fn read(&self, address: DeviceAddress, dst: &mut [u8]) -> Result<(), AccessError> {
		let len = dst.len() as u64;
		let range = self.range(address, len).ok_or(AccessError::Unmapped { address, len })?;
		dst.copy_from_slice(&self.bytes[range]);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_slice_memory_bounds() {
		let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
		let memory = SliceMemory::new(DeviceAddress::new(0x100), &bytes);

		let mut dst = [0u8; 4];
		memory.read(DeviceAddress::new(0x104), &mut dst).unwrap();
		assert_eq!(dst, [5, 6, 7, 8]);

		assert_eq!(
			memory.read(DeviceAddress::new(0x105), &mut dst),
			Err(AccessError::Unmapped {
				address: DeviceAddress::new(0x105),
				len: 4
			})
		);
		assert!(memory.read(DeviceAddress::new(0xfc), &mut dst).is_err());
		assert!(memory.contains(DeviceAddress::new(0x100), 8));
		assert!(!memory.contains(DeviceAddress::new(0x100), 9));
	}
}
