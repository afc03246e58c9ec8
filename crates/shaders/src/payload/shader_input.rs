use crate::descriptor::TableIndex;
use crate::memory::DeviceAddress;
use crate::payload::VERTEX_SIZE;
use bytemuck_derive::{Pod, Zeroable};
use core::mem;
use static_assertions::const_assert_eq;

/// The bit-exact per-draw payload a shader receives, usually as a push constant. It carries no counts: shaders trust
/// the host to only reference valid vertices, indices and table entries.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Zeroable, Pod)]
pub struct ShaderInput {
	/// address of a tightly packed array of [`Vertex`](crate::payload::Vertex)
	pub vertices: u64,
	/// address of a tightly packed array of `u32` indices
	pub indices: u64,
	/// index into the [`SampledImage`](crate::descriptor::ResourceKind::SampledImage) table
	pub tex: u32,
	/// index into the [`Sampler`](crate::descriptor::ResourceKind::Sampler) table
	pub smplr: u32,
}

pub const INDEX_SIZE: u64 = mem::size_of::<u32>() as u64;
const_assert_eq!(mem::size_of::<ShaderInput>(), 24);
const_assert_eq!(mem::align_of::<ShaderInput>(), 8);
const_assert_eq!(mem::offset_of!(ShaderInput, vertices), 0);
const_assert_eq!(mem::offset_of!(ShaderInput, indices), 8);
const_assert_eq!(mem::offset_of!(ShaderInput, tex), 16);
const_assert_eq!(mem::offset_of!(ShaderInput, smplr), 20);

impl ShaderInput {
	/// The address a shader reads vertex `i` from. Unchecked, wraps like the shader's arithmetic does.
	pub fn vertex_address(&self, i: u32) -> DeviceAddress {
		DeviceAddress::new(self.vertices.wrapping_add(i as u64 * VERTEX_SIZE))
	}

	/// The address a shader reads index `j` from. Unchecked, wraps like the shader's arithmetic does.
	pub fn index_address(&self, j: u32) -> DeviceAddress {
		DeviceAddress::new(self.indices.wrapping_add(j as u64 * INDEX_SIZE))
	}

	pub fn texture(&self) -> Option<TableIndex> {
		TableIndex::new(self.tex)
	}

	pub fn sampler(&self) -> Option<TableIndex> {
		TableIndex::new(self.smplr)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_shader_input_bytes() {
		let input = ShaderInput {
			vertices: 0x1122_3344_5566_7788,
			indices: 0x0102_0304_0506_0708,
			tex: 5,
			smplr: 2,
		};
		let bytes = bytemuck::bytes_of(&input);
		assert_eq!(bytes.len(), 24);
		assert_eq!(&bytes[0..8], &0x1122_3344_5566_7788u64.to_ne_bytes());
		assert_eq!(&bytes[8..16], &0x0102_0304_0506_0708u64.to_ne_bytes());
		assert_eq!(&bytes[16..20], &5u32.to_ne_bytes());
		assert_eq!(&bytes[20..24], &2u32.to_ne_bytes());
	}

	#[test]
	fn test_address_arithmetic() {
		let input = ShaderInput {
			vertices: 0x1000,
			indices: 0x2000,
			..ShaderInput::default()
		};
		assert_eq!(input.vertex_address(0), DeviceAddress::new(0x1000));
		assert_eq!(input.vertex_address(3), DeviceAddress::new(0x1000 + 120));
		assert_eq!(input.index_address(3), DeviceAddress::new(0x2000 + 12));
	}
}
