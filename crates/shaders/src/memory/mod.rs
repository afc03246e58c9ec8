mod address;
mod error;
mod region;
mod slice;

pub use address::*;
pub use error::*;
pub use region::*;
pub use slice::*;

/// Memory that can be read through [`DeviceAddress`]es.
pub trait DeviceMemory {
	/// Copy `dst.len()` bytes starting at `address` into `dst`. Must fail with [`AccessError::Unmapped`] if any of the
	/// bytes lie outside a single live allocation, and never read from a neighbouring allocation.
	fn read(&self, address: DeviceAddress, dst: &mut [u8]) -> Result<(), AccessError>;
}

impl<M: DeviceMemory + ?Sized> DeviceMemory for &M {
	fn read(&self, address: DeviceAddress, dst: &mut [u8]) -> Result<(), AccessError> {
		(**self).read(address, dst)
	}
}
