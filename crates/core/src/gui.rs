//! Immediate-mode GUI meshes turned into [`DrawPayload`]s. Each frame the GUI's meshes are pushed into a
//! [`GuiDrawList`], which uploads all of them in one vertex and one index allocation and emits a [`GuiDrawCmd`] per
//! mesh, pointing at its sub-regions.

use crate::descriptor::{BindlessFrame, ResourceId, ResourceKind};
use crate::memory::{DeviceAddress, DeviceMemoryAlloc, RegionError, TypedRegion};
use crate::payload::{DrawPayload, DrawPayloadBuilder, PayloadError, ShaderInput, Vertex};
use crate::platform::BindlessPlatform;
use glam::{IVec2, UVec2, Vec2};
use std::error::Error;
use thiserror::Error;

/// The rectangle, in points, a mesh is clipped to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipRect {
	pub min: Vec2,
	pub max: Vec2,
}

impl ClipRect {
	pub const EVERYTHING: Self = ClipRect {
		min: Vec2::splat(f32::NEG_INFINITY),
		max: Vec2::splat(f32::INFINITY),
	};

	pub fn new(min: Vec2, max: Vec2) -> Self {
		Self { min, max }
	}

	pub fn width(&self) -> f32 {
		self.max.x - self.min.x
	}

	pub fn height(&self) -> f32 {
		self.max.y - self.min.y
	}

	/// The scissor in pixels, clamped to a framebuffer of `extent` pixels.
	pub fn to_scissor(&self, pixels_per_point: f32, extent: UVec2) -> (IVec2, UVec2) {
		let max = extent.as_vec2();
		let min = (self.min * pixels_per_point).floor().clamp(Vec2::ZERO, max);
		let end = (self.max * pixels_per_point).ceil().clamp(min, max);
		(min.as_ivec2(), (end - min).as_uvec2())
	}
}

#[cfg(feature = "epaint")]
impl From<epaint::Rect> for ClipRect {
	fn from(value: epaint::Rect) -> Self {
		ClipRect::new(Vec2::new(value.min.x, value.min.y), Vec2::new(value.max.x, value.max.y))
	}
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum GuiError {
	#[error("Mesh must have at least one vertex and one index")]
	EmptyMesh,
	#[error("Index {index} at position {position} is out of range of {vertex_count} vertices")]
	IndexOutOfRange { position: u32, index: u32, vertex_count: u32 },
	#[error("Draw list exceeds the maximum of {} vertices or indices", u32::MAX)]
	TooLarge,
	#[error("{0:?} must be a sampled image")]
	NotATexture(ResourceId),
	#[error("{0:?} must be a sampler")]
	NotASampler(ResourceId),
}

#[derive(Debug, Error)]
pub enum GuiUploadError<E: 'static + Error> {
	#[error("Memory Error: {0}")]
	Memory(#[source] E),
	#[error("Payload Error: {0}")]
	Payload(#[from] PayloadError),
	#[error("Region Error: {0}")]
	Region(#[from] RegionError),
}

#[derive(Clone, Debug)]
struct GuiMesh {
	vertices: Vec<Vertex>,
	indices: Vec<u32>,
	max_index: u32,
	texture: ResourceId,
	sampler: ResourceId,
	clip_rect: ClipRect,
}

/// Collects the meshes of one GUI frame. Indices are local to their mesh.
#[derive(Clone, Debug, Default)]
pub struct GuiDrawList {
	meshes: Vec<GuiMesh>,
	vertex_count: u32,
	index_count: u32,
}

/// One draw call: `index_count` indices of `payload`, clipped to `clip_rect`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GuiDrawCmd {
	pub payload: DrawPayload,
	pub clip_rect: ClipRect,
	pub index_count: u32,
}

impl GuiDrawCmd {
	pub fn shader_input(&self) -> ShaderInput {
		self.payload.to_shader_input()
	}
}

/// The allocations and draw commands of an uploaded [`GuiDrawList`].
#[derive(Clone, Debug, Default)]
pub struct GuiUpload {
	/// must be Some if `!draw_cmds.is_empty()`
	pub vertices: Option<TypedRegion<Vertex>>,
	/// must be Some if `!draw_cmds.is_empty()`
	pub indices: Option<TypedRegion<u32>>,
	pub draw_cmds: Vec<GuiDrawCmd>,
}

impl GuiUpload {
	/// Free the vertex and index allocations. Both are freed even if one fails, the first error is returned.
	///
	/// # Safety
	/// No draw using any of the `draw_cmds` may still be pending.
	pub unsafe fn free<M: DeviceMemoryAlloc>(self, memory: &M) -> Result<(), M::Error> {
		let mut result = Ok(());
		for address in self.allocations() {
			if let Err(e) = unsafe { memory.free(address) } {
				result = result.and(Err(e));
			}
		}
		result
	}

	fn allocations(&self) -> impl Iterator<Item = DeviceAddress> {
		[
			self.vertices.map(|r| r.address()),
			self.indices.map(|r| r.address()),
		]
		.into_iter()
		.flatten()
	}
}

impl GuiDrawList {
	pub fn new() -> Self {
		Self::default()
	}

	/// The amount of meshes.
	pub fn len(&self) -> usize {
		self.meshes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.meshes.is_empty()
	}

	pub fn vertex_count(&self) -> u32 {
		self.vertex_count
	}

	pub fn index_count(&self) -> u32 {
		self.index_count
	}

	pub fn clear(&mut self) {
		self.meshes.clear();
		self.vertex_count = 0;
		self.index_count = 0;
	}

	/// Add a mesh. Every index must be smaller than `vertices.len()`.
	pub fn push(
		&mut self,
		vertices: Vec<Vertex>,
		indices: Vec<u32>,
		texture: ResourceId,
		sampler: ResourceId,
		clip_rect: ClipRect,
	) -> Result<(), GuiError> {
		if texture.kind() != ResourceKind::SampledImage {
			return Err(GuiError::NotATexture(texture));
		}
		if sampler.kind() != ResourceKind::Sampler {
			return Err(GuiError::NotASampler(sampler));
		}
		if vertices.is_empty() || indices.is_empty() {
			return Err(GuiError::EmptyMesh);
		}
		let mesh_vertex_count = u32::try_from(vertices.len()).map_err(|_| GuiError::TooLarge)?;
		let mesh_index_count = u32::try_from(indices.len()).map_err(|_| GuiError::TooLarge)?;
		let vertex_count = self
			.vertex_count
			.checked_add(mesh_vertex_count)
			.ok_or(GuiError::TooLarge)?;
		let index_count = self
			.index_count
			.checked_add(mesh_index_count)
			.ok_or(GuiError::TooLarge)?;

		let mut max_index = 0;
		for (position, &index) in (0..).zip(indices.iter()) {
			if index >= mesh_vertex_count {
				return Err(GuiError::IndexOutOfRange {
					position,
					index,
					vertex_count: mesh_vertex_count,
				});
			}
			max_index = max_index.max(index);
		}

		self.meshes.push(GuiMesh {
			vertices,
			indices,
			max_index,
			texture,
			sampler,
			clip_rect,
		});
		self.vertex_count = vertex_count;
		self.index_count = index_count;
		Ok(())
	}

	/// Add an egui mesh, converting its vertices.
	#[cfg(feature = "epaint")]
	pub fn push_epaint(
		&mut self,
		mesh: &epaint::Mesh,
		texture: ResourceId,
		sampler: ResourceId,
		clip_rect: epaint::Rect,
	) -> Result<(), GuiError> {
		self.push(
			mesh.vertices.iter().map(|v| Vertex::from(*v)).collect(),
			mesh.indices.clone(),
			texture,
			sampler,
			clip_rect.into(),
		)
	}

	/// Upload all meshes into two allocations of `memory`, and build a [`GuiDrawCmd`] for each mesh. Textures and
	/// samplers must be live within `frame`. Nothing stays allocated if this fails.
	pub fn upload<P: BindlessPlatform, M: DeviceMemoryAlloc>(
		&self,
		frame: &BindlessFrame<P>,
		memory: &M,
	) -> Result<GuiUpload, GuiUploadError<M::Error>> {
		profiling::scope!("GuiDrawList::upload");
		if self.is_empty() {
			return Ok(GuiUpload::default());
		}

		let (vertices, indices) = {
			profiling::scope!("concat meshes");
			let mut vertices = Vec::with_capacity(self.vertex_count as usize);
			let mut indices = Vec::with_capacity(self.index_count as usize);
			for mesh in &self.meshes {
				vertices.extend_from_slice(&mesh.vertices);
				indices.extend_from_slice(&mesh.indices);
			}
			(vertices, indices)
		};

		let mut upload = GuiUpload::default();
		let result = self.upload_into(&mut upload, frame, memory, &vertices, &indices);
		match result {
			Ok(()) => Ok(upload),
			Err(e) => {
				// Safety: the allocations have never been handed out
				if let Err(free) = unsafe { upload.free(memory) } {
					log::warn!("Failed to free gui allocations after failed upload: {}", free);
				}
				Err(e)
			}
		}
	}

	fn upload_into<P: BindlessPlatform, M: DeviceMemoryAlloc>(
		&self,
		upload: &mut GuiUpload,
		frame: &BindlessFrame<P>,
		memory: &M,
		vertices: &[Vertex],
		indices: &[u32],
	) -> Result<(), GuiUploadError<M::Error>> {
		let vertices = *upload.vertices.insert(
			memory
				.alloc_region("gui vertices", vertices)
				.map_err(GuiUploadError::Memory)?,
		);
		let indices = *upload.indices.insert(
			memory
				.alloc_region("gui indices", indices)
				.map_err(GuiUploadError::Memory)?,
		);

		upload.draw_cmds.reserve(self.meshes.len());
		let mut vertex_start = 0;
		let mut index_start = 0;
		for mesh in &self.meshes {
			let vertex_count = mesh.vertices.len() as u32;
			let index_count = mesh.indices.len() as u32;
			// indices have been checked on push
			let payload = DrawPayloadBuilder::new(
				vertices.slice(vertex_start, vertex_count)?,
				indices.slice(index_start, index_count)?,
			)
			.texture(mesh.texture)
			.sampler(mesh.sampler)
			.declared_max_index(mesh.max_index)
			.build(frame, None)?;
			upload.draw_cmds.push(GuiDrawCmd {
				payload,
				clip_rect: mesh.clip_rect,
				index_count,
			});
			vertex_start += vertex_count;
			index_start += index_count;
		}
		Ok(())
	}
}
