mod host;

pub use bindless_draw_shaders::memory::*;
pub use host::*;

use bytemuck::Pod;
use std::error::Error;

/// Memory that regions can be allocated in, like host-visible buffers with a device address.
pub trait DeviceMemoryAlloc {
	type Error: 'static + Error + Send + Sync;

	/// Allocate a new region holding a copy of `data`. The region stays valid until it is [`Self::free`]d.
	fn alloc_region<T: Pod>(&self, name: &str, data: &[T]) -> Result<TypedRegion<T>, Self::Error>;

	/// Free the allocation starting at `address`.
	///
	/// # Safety
	/// No work that may read the allocation may still be pending.
	unsafe fn free(&self, address: DeviceAddress) -> Result<(), Self::Error>;
}
