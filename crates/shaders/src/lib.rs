#![no_std]

#[cfg(test)]
extern crate alloc;

pub mod descriptor;
pub mod memory;
pub mod payload;

pub use glam;

pub mod __private {
	pub use bytemuck;
	pub use static_assertions;
}
