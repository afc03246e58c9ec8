pub mod backing;
pub mod descriptor;
pub mod gui;
pub mod memory;
pub mod payload;
pub mod platform;

pub mod __private {
	pub use bindless_draw_shaders::__private::*;
}
