use crate::descriptor::{DescriptorTables, ResourceKind, TableIndex};
use crate::memory::{AccessError, DeviceMemory, TypedRegion};
use crate::payload::{ShaderInput, Vertex};

/// The host-side form of a [`ShaderInput`], carrying the vertex and index counts the shader never sees. All
/// resolution is bounds-checked against these counts.
///
/// Constructing a `DrawPayload` does not check that the texture and sampler are live, `DrawPayloadBuilder` in the
/// host crate does.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DrawPayload {
	pub vertices: TypedRegion<Vertex>,
	pub indices: TypedRegion<u32>,
	pub texture: TableIndex,
	pub sampler: TableIndex,
}

impl DrawPayload {
	pub fn new(
		vertices: TypedRegion<Vertex>,
		indices: TypedRegion<u32>,
		texture: TableIndex,
		sampler: TableIndex,
	) -> Self {
		Self {
			vertices,
			indices,
			texture,
			sampler,
		}
	}

	pub fn vertex_count(&self) -> u32 {
		self.vertices.count()
	}

	pub fn index_count(&self) -> u32 {
		self.indices.count()
	}

	/// The vertex at byte offset `i * 40` from the vertex address.
	pub fn resolve_vertex(&self, memory: &impl DeviceMemory, i: u32) -> Result<Vertex, AccessError> {
		self.vertices.load(memory, i)
	}

	/// The index at byte offset `j * 4` from the index address.
	pub fn resolve_index(&self, memory: &impl DeviceMemory, j: u32) -> Result<u32, AccessError> {
		self.indices.load(memory, j)
	}

	/// The vertex referenced by index `j`, what a shader invocation with `vertex_index = j` reads.
	pub fn resolve_indexed_vertex(&self, memory: &impl DeviceMemory, j: u32) -> Result<Vertex, AccessError> {
		let i = self.resolve_index(memory, j)?;
		self.resolve_vertex(memory, i)
	}

	pub fn resolve_texture<'a, D: DescriptorTables>(&self, tables: &'a D) -> Result<&'a D::Image, AccessError> {
		tables
			.fetch_image(ResourceKind::SampledImage, self.texture)
			.ok_or(AccessError::Unbound {
				kind: ResourceKind::SampledImage,
				index: self.texture,
			})
	}

	pub fn resolve_sampler<'a, D: DescriptorTables>(&self, tables: &'a D) -> Result<&'a D::Sampler, AccessError> {
		tables.fetch_sampler(self.sampler).ok_or(AccessError::Unbound {
			kind: ResourceKind::Sampler,
			index: self.sampler,
		})
	}

	pub fn to_shader_input(&self) -> ShaderInput {
		ShaderInput {
			vertices: self.vertices.address().to_u64(),
			indices: self.indices.address().to_u64(),
			tex: self.texture.to_u32(),
			smplr: self.sampler.to_u32(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::memory::{DeviceAddress, SliceMemory};
	use glam::{vec2, vec4};

	struct Tables {
		images: [Option<&'static str>; 8],
		samplers: [Option<&'static str>; 4],
	}

	impl DescriptorTables for Tables {
		type Image = str;
		type Sampler = str;

		fn fetch_image(&self, kind: ResourceKind, index: TableIndex) -> Option<&str> {
			match kind {
				ResourceKind::SampledImage => *self.images.get(index.to_usize())?,
				_ => None,
			}
		}

		fn fetch_sampler(&self, index: TableIndex) -> Option<&str> {
			*self.samplers.get(index.to_usize())?
		}
	}

	/// vertices at 0x1000, indices directly after them
	fn triangle() -> (alloc::vec::Vec<u8>, DrawPayload) {
		let vertices = [0., 1., 2.].map(|f: f32| Vertex::new(vec4(f, f, 0., 1.), vec4(1., f, 0., 1.), vec2(f, 0.)));
		let indices = [0u32, 1, 2];
		let mut bytes = alloc::vec::Vec::new();
		bytes.extend_from_slice(bytemuck::cast_slice(&vertices));
		bytes.extend_from_slice(bytemuck::cast_slice(&indices));

		let base = DeviceAddress::new(0x1000);
		let payload = DrawPayload::new(
			TypedRegion::new(base, 3).unwrap(),
			TypedRegion::new(DeviceAddress::new(0x1000 + 120), 3).unwrap(),
			TableIndex::new(5).unwrap(),
			TableIndex::new(2).unwrap(),
		);
		(bytes, payload)
	}

	#[test]
	fn test_resolve_triangle() {
		let (bytes, payload) = triangle();
		let memory = SliceMemory::new(DeviceAddress::new(0x1000), &bytes);

		for j in 0..3 {
			let vertex = payload.resolve_indexed_vertex(&memory, j).unwrap();
			assert_eq!(vertex.pos[0], j as f32);
			assert_eq!(vertex, payload.resolve_vertex(&memory, j).unwrap());
		}
		// index 3 would read adjacent memory, the region forbids it
		assert_eq!(
			payload.resolve_index(&memory, 3),
			Err(AccessError::OutOfBounds { index: 3, count: 3 })
		);
		assert_eq!(
			payload.resolve_vertex(&memory, 3),
			Err(AccessError::OutOfBounds { index: 3, count: 3 })
		);
	}

	#[test]
	fn test_resolve_descriptors() {
		let (_, payload) = triangle();
		let mut tables = Tables {
			images: [None; 8],
			samplers: [None; 4],
		};
		assert_eq!(
			payload.resolve_texture(&tables),
			Err(AccessError::Unbound {
				kind: ResourceKind::SampledImage,
				index: TableIndex::new(5).unwrap()
			})
		);

		tables.images[5] = Some("texture");
		tables.samplers[2] = Some("sampler");
		assert_eq!(payload.resolve_texture(&tables), Ok("texture"));
		assert_eq!(payload.resolve_sampler(&tables), Ok("sampler"));
	}

	#[test]
	fn test_to_shader_input() {
		let (_, payload) = triangle();
		let input = payload.to_shader_input();
		assert_eq!(input.vertices, 0x1000);
		assert_eq!(input.indices, 0x1000 + 120);
		assert_eq!(input.tex, 5);
		assert_eq!(input.smplr, 2);
		assert_eq!(input.vertex_address(2), payload.vertices.element_address(2).unwrap());
		assert_eq!(input.index_address(1), payload.indices.element_address(1).unwrap());
	}
}
