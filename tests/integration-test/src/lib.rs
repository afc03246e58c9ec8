use bindless_draw_core::descriptor::{Bindless, DescriptorCounts};
use bindless_draw_core::platform::ash::init::Debuggers;
use bindless_draw_core::platform::host::HostPlatform;

pub mod concurrency;
pub mod gui;
pub mod lifecycle;
pub mod textured_triangle;

/// the global setting on which debugger to use for integration tests
pub fn debugger() -> Debuggers {
	Debuggers::Validation
}

/// A registry on the host platform with the default counts, none of the tests need a GPU.
pub fn host_bindless() -> anyhow::Result<Bindless<HostPlatform>> {
	Ok(Bindless::new(HostPlatform::new(), DescriptorCounts::REASONABLE_DEFAULTS)?)
}
