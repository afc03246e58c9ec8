use bytemuck_derive::{Pod, Zeroable};
use core::mem;
use glam::{vec4, Vec2, Vec4};
use static_assertions::const_assert_eq;

/// A GUI vertex as read by the gui shader. Position and color are opaque pass-through values, no unit conversions
/// happen anywhere between host and shader.
///
/// Fields are plain arrays instead of [`Vec4`] so that the struct has an alignment of 4 and no padding regardless of
/// glam's SIMD feature selection.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct Vertex {
	pub pos: [f32; 4],
	pub color: [f32; 4],
	pub uv: [f32; 2],
}

pub const VERTEX_SIZE: u64 = 40;
const_assert_eq!(mem::size_of::<Vertex>() as u64, VERTEX_SIZE);
const_assert_eq!(mem::align_of::<Vertex>(), 4);
const_assert_eq!(mem::offset_of!(Vertex, pos), 0);
const_assert_eq!(mem::offset_of!(Vertex, color), 16);
const_assert_eq!(mem::offset_of!(Vertex, uv), 32);

impl Vertex {
	pub fn new(pos: Vec4, color: Vec4, uv: Vec2) -> Self {
		Self {
			pos: pos.to_array(),
			color: color.to_array(),
			uv: uv.to_array(),
		}
	}

	pub fn pos(&self) -> Vec4 {
		Vec4::from_array(self.pos)
	}

	pub fn color(&self) -> Vec4 {
		Vec4::from_array(self.color)
	}

	pub fn uv(&self) -> Vec2 {
		Vec2::from_array(self.uv)
	}
}

// SRGB u32 -> Vec4 in 0. .. 1.
pub fn unpack_color(color: u32) -> Vec4 {
	vec4(
		(color & 255) as f32,
		((color >> 8) & 255) as f32,
		((color >> 16) & 255) as f32,
		((color >> 24) & 255) as f32,
	) / 255.0
}

// [u8; 4] SRGB -> u32
pub fn pack_color(color: [u8; 4]) -> u32 {
	(color[0] as u32) | (color[1] as u32) << 8 | (color[2] as u32) << 16 | (color[3] as u32) << 24
}

#[cfg(feature = "epaint")]
mod epaint {
	use super::*;
	use ::epaint::Vertex as EVertex;

	/// egui's 2D vertices are placed on the z = 0 plane, their premultiplied sRGBA8 color is unpacked into 0. .. 1.
	impl From<EVertex> for Vertex {
		fn from(value: EVertex) -> Self {
			Vertex {
				pos: [value.pos.x, value.pos.y, 0., 1.],
				color: unpack_color(pack_color(value.color.to_array())).to_array(),
				uv: [value.uv.x, value.uv.y],
			}
		}
	}

}

#[cfg(test)]
mod tests {
	use super::*;
	use glam::vec2;

	#[test]
	fn test_color_packing() {
		for pattern in [[0; 4], [255; 4], [1, 2, 3, 4], [0x81; 4]] {
			for value in 0..255u8 {
				for i in 0..4 {
					let mut color = pattern;
					color[i] = value;

					let converted = unpack_color(pack_color(color)).to_array().map(|f| (f * 255.).round() as u8);
					assert_eq!(color, converted)
				}
			}
		}
	}

	#[test]
	fn test_vertex_bytes() {
		let vertex = Vertex::new(vec4(1., 2., 3., 4.), vec4(5., 6., 7., 8.), vec2(9., 10.));
		let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&vertex));
		assert_eq!(floats, &[1., 2., 3., 4., 5., 6., 7., 8., 9., 10.]);
		assert_eq!(vertex.uv(), vec2(9., 10.));
	}
}
