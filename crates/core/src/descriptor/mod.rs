mod bindless;
mod descriptor_counts;
mod extent;
mod image_table;
mod sampler_table;

pub use bindless::*;
pub use bindless_draw_shaders::descriptor::*;
pub use descriptor_counts::*;
pub use extent::*;
pub use image_table::*;
pub use sampler_table::*;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum BindlessAllocationScheme {
	/// Perform a dedicated, driver-managed allocation for the given buffer or image, allowing it to perform
	/// optimizations on this type of allocation.
	Dedicated,
	/// The memory for this resource will be allocated and managed by gpu-allocator.
	#[default]
	AllocatorManaged,
}
