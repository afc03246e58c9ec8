/// The primary platform is Ash
#[cfg(all(feature = "ash", not(feature = "host")))]
pub type P = bindless_draw_core::platform::ash::Ash;
/// The primary platform is the host
#[cfg(all(feature = "host", not(feature = "ash")))]
pub type P = bindless_draw_core::platform::host::HostPlatform;
#[cfg(not(any(feature = "ash", feature = "host")))]
compile_error!("Must select a primary platform by enabling a feature like \"ash\"");
#[cfg(all(feature = "ash", feature = "host"))]
compile_error!("Must select exactly one primary platform, disable default features to use \"host\"");

pub mod backing {
	pub use bindless_draw_core::backing::*;
}

pub mod descriptor {
	pub type Bindless = bindless_draw_core::descriptor::Bindless<crate::P>;
	pub type WeakBindless = bindless_draw_core::descriptor::WeakBindless<crate::P>;
	pub type BindlessFrame = bindless_draw_core::descriptor::BindlessFrame<crate::P>;
	pub type BindlessCreateError = bindless_draw_core::descriptor::BindlessCreateError<crate::P>;
	pub type ImageTable = bindless_draw_core::descriptor::ImageTable<crate::P>;
	pub type ImageSlot = bindless_draw_core::descriptor::ImageSlot<crate::P>;
	pub type ImageTableAccess<'a> = bindless_draw_core::descriptor::ImageTableAccess<'a, crate::P>;
	pub type ImageAllocationError = bindless_draw_core::descriptor::ImageAllocationError<crate::P>;
	pub type ImageInterface = bindless_draw_core::descriptor::ImageInterface<crate::P>;
	pub type ImageRangeSet<'a> = bindless_draw_core::descriptor::ImageRangeSet<'a, crate::P>;
	pub type SamplerTable = bindless_draw_core::descriptor::SamplerTable<crate::P>;
	pub type SamplerTableAccess<'a> = bindless_draw_core::descriptor::SamplerTableAccess<'a, crate::P>;
	pub type SamplerAllocationError = bindless_draw_core::descriptor::SamplerAllocationError<crate::P>;
	pub type SamplerInterface = bindless_draw_core::descriptor::SamplerInterface<crate::P>;
	pub type SamplerRangeSet<'a> = bindless_draw_core::descriptor::SamplerRangeSet<'a, crate::P>;

	pub use bindless_draw_core::descriptor::*;
}

pub mod gui {
	pub use bindless_draw_core::gui::*;
}

pub mod memory {
	pub use bindless_draw_core::memory::*;
}

pub mod payload {
	pub use bindless_draw_core::payload::*;
}

pub mod platform {
	pub use bindless_draw_core::platform::*;
}

pub mod __private {
	pub use bindless_draw_core::__private::*;
}
