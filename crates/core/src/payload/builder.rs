use crate::backing::table::SlotStatus;
use crate::descriptor::{BindlessFrame, ResourceId, ResourceKind, TableIndex};
use crate::memory::{AccessError, DeviceMemory, TypedRegion};
use crate::payload::{DrawPayload, Vertex};
use crate::platform::BindlessPlatform;
use thiserror::Error;

/// Why a [`DrawPayload`] could not be built.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum PayloadError {
	#[error("No texture was specified")]
	MissingTexture,
	#[error("No sampler was specified")]
	MissingSampler,
	#[error("{id:?} must be a {expected}")]
	WrongKind { id: ResourceId, expected: ResourceKind },
	#[error("{0:?} has not been flushed yet")]
	NotFlushed(ResourceId),
	#[error("{0:?} is not registered")]
	Unregistered(ResourceId),
	#[error("{0:?} is stale, its slot has since been reused")]
	Stale(ResourceId),
	#[error("Index {index} at position {position} is out of range of {vertex_count} vertices")]
	IndexOutOfRange { position: u32, index: u32, vertex_count: u32 },
	#[error("Declared maximum index {max_index} is out of range of {vertex_count} vertices")]
	DeclaredMaxIndexOutOfRange { max_index: u32, vertex_count: u32 },
	#[error("Indices are not host readable and no maximum index was declared")]
	IndicesUnchecked,
	#[error("Failed to read indices: {0}")]
	UnreadableIndices(#[source] AccessError),
}

/// Builds a [`DrawPayload`], checking everything a shader consuming it would otherwise silently get wrong: that the
/// texture and sampler are live resources of the correct kind, and that every index points at an existing vertex.
#[derive(Copy, Clone, Debug)]
pub struct DrawPayloadBuilder {
	vertices: TypedRegion<Vertex>,
	indices: TypedRegion<u32>,
	texture: Option<ResourceId>,
	sampler: Option<ResourceId>,
	declared_max_index: Option<u32>,
}

impl DrawPayloadBuilder {
	pub fn new(vertices: TypedRegion<Vertex>, indices: TypedRegion<u32>) -> Self {
		Self {
			vertices,
			indices,
			texture: None,
			sampler: None,
			declared_max_index: None,
		}
	}

	/// The texture to sample, must be a [`ResourceKind::SampledImage`].
	pub fn texture(self, texture: ResourceId) -> Self {
		Self {
			texture: Some(texture),
			..self
		}
	}

	/// The sampler to sample the texture with, must be a [`ResourceKind::Sampler`].
	pub fn sampler(self, sampler: ResourceId) -> Self {
		Self {
			sampler: Some(sampler),
			..self
		}
	}

	/// Declare the largest index contained in the index region. Checked against the vertex count instead of scanning
	/// the indices when the memory is not host readable.
	pub fn declared_max_index(self, max_index: u32) -> Self {
		Self {
			declared_max_index: Some(max_index),
			..self
		}
	}

	/// Validate and build the payload. The texture and sampler are checked to be live within `frame`. If `memory` is
	/// given, all indices are read and checked, otherwise the declared maximum index must be present.
	pub fn build<P: BindlessPlatform>(
		self,
		frame: &BindlessFrame<P>,
		memory: Option<&dyn DeviceMemory>,
	) -> Result<DrawPayload, PayloadError> {
		let texture = self.texture.ok_or(PayloadError::MissingTexture)?;
		let sampler = self.sampler.ok_or(PayloadError::MissingSampler)?;
		let texture = check_live(frame, texture, ResourceKind::SampledImage)?;
		let sampler = check_live(frame, sampler, ResourceKind::Sampler)?;

		let vertex_count = self.vertices.count();
		if let Some(max_index) = self.declared_max_index {
			if !self.indices.is_empty() && max_index >= vertex_count {
				return Err(PayloadError::DeclaredMaxIndexOutOfRange { max_index, vertex_count });
			}
		}
		match memory {
			Some(memory) => self.validate_indices(memory)?,
			None if self.declared_max_index.is_some() => (),
			None => return Err(PayloadError::IndicesUnchecked),
		}

		Ok(DrawPayload::new(self.vertices, self.indices, texture, sampler))
	}

	fn validate_indices(&self, memory: &dyn DeviceMemory) -> Result<(), PayloadError> {
		profiling::scope!("DrawPayloadBuilder::validate_indices");
		let vertex_count = self.vertices.count();
		for (position, index) in (0..).zip(self.indices.iter(&memory)) {
			let index = index.map_err(PayloadError::UnreadableIndices)?;
			if index >= vertex_count {
				return Err(PayloadError::IndexOutOfRange {
					position,
					index,
					vertex_count,
				});
			}
		}
		Ok(())
	}
}

fn check_live<P: BindlessPlatform>(
	frame: &BindlessFrame<P>,
	id: ResourceId,
	expected: ResourceKind,
) -> Result<TableIndex, PayloadError> {
	if id.kind() != expected {
		return Err(PayloadError::WrongKind { id, expected });
	}
	let state = frame.slot_state(id).ok_or(PayloadError::Unregistered(id))?;
	if state.version != id.version() {
		return Err(PayloadError::Stale(id));
	}
	match state.status {
		SlotStatus::Live if state.kind == id.kind() => Ok(id.index()),
		SlotStatus::Pending if state.kind == id.kind() => Err(PayloadError::NotFlushed(id)),
		_ => Err(PayloadError::Unregistered(id)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::{
		Bindless, BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, DescriptorCounts, Extent,
		TableVersion,
	};
	use crate::memory::{DeviceMemoryAlloc, HostMemory};
	use crate::platform::host::HostPlatform;
	use glam::{vec2, vec4};

	struct Fixture {
		bindless: Bindless<HostPlatform>,
		memory: HostMemory,
		vertices: TypedRegion<Vertex>,
		indices: TypedRegion<u32>,
		texture: ResourceId,
		sampler: ResourceId,
	}

	fn fixture(indices: &[u32]) -> anyhow::Result<Fixture> {
		let bindless = Bindless::new(HostPlatform::new(), DescriptorCounts::REASONABLE_DEFAULTS)?;
		let texture = bindless.image().alloc(
			ResourceKind::SampledImage,
			&BindlessImageCreateInfo {
				extent: Extent::new_2d(2, 2),
				usage: BindlessImageUsage::SAMPLED,
				name: "texture",
				..BindlessImageCreateInfo::default()
			},
		)?;
		let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
		bindless.flush();

		let memory = HostMemory::new();
		let vertices = [0., 1., 2.].map(|f: f32| Vertex::new(vec4(f, 0., 0., 1.), vec4(1., 1., 1., 1.), vec2(f, f)));
		let vertices = memory.alloc_region("vertices", &vertices)?;
		let indices = memory.alloc_region("indices", indices)?;
		Ok(Fixture {
			bindless,
			memory,
			vertices,
			indices,
			texture,
			sampler,
		})
	}

	impl Fixture {
		fn builder(&self) -> DrawPayloadBuilder {
			DrawPayloadBuilder::new(self.vertices, self.indices)
				.texture(self.texture)
				.sampler(self.sampler)
		}
	}

	#[test]
	fn test_build() -> anyhow::Result<()> {
		let f = fixture(&[0, 1, 2])?;
		let frame = f.bindless.frame();
		let payload = f.builder().build(&frame, Some(&f.memory))?;
		assert_eq!(payload.texture, f.texture.index());
		assert_eq!(payload.sampler, f.sampler.index());
		assert_eq!(payload.index_count(), 3);
		assert_eq!(payload.resolve_indexed_vertex(&f.memory, 2)?.uv(), vec2(2., 2.));
		Ok(())
	}

	#[test]
	fn test_missing_and_wrong_kind() -> anyhow::Result<()> {
		let f = fixture(&[0, 1, 2])?;
		let frame = f.bindless.frame();
		let memory: Option<&dyn DeviceMemory> = Some(&f.memory);
		assert_eq!(
			DrawPayloadBuilder::new(f.vertices, f.indices)
				.sampler(f.sampler)
				.build(&frame, memory),
			Err(PayloadError::MissingTexture)
		);
		assert_eq!(
			DrawPayloadBuilder::new(f.vertices, f.indices)
				.texture(f.texture)
				.build(&frame, memory),
			Err(PayloadError::MissingSampler)
		);
		assert_eq!(
			f.builder().texture(f.sampler).build(&frame, memory),
			Err(PayloadError::WrongKind {
				id: f.sampler,
				expected: ResourceKind::SampledImage
			})
		);
		assert_eq!(
			f.builder().sampler(f.texture).build(&frame, memory),
			Err(PayloadError::WrongKind {
				id: f.texture,
				expected: ResourceKind::Sampler
			})
		);
		Ok(())
	}

	#[test]
	fn test_resource_lifecycle() -> anyhow::Result<()> {
		let f = fixture(&[0, 1, 2])?;
		let memory: Option<&dyn DeviceMemory> = Some(&f.memory);

		let pending = f.bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear())?;
		let frame = f.bindless.frame();
		assert_eq!(
			f.builder().sampler(pending).build(&frame, memory),
			Err(PayloadError::NotFlushed(pending))
		);

		let never = ResourceId::new(
			ResourceKind::SampledImage,
			TableIndex::new(6).unwrap(),
			TableVersion::INITIAL,
		);
		assert_eq!(
			f.builder().texture(never).build(&frame, memory),
			Err(PayloadError::Unregistered(never))
		);

		f.bindless.unregister(f.texture)?;
		assert_eq!(
			f.builder().build(&frame, memory),
			Err(PayloadError::Unregistered(f.texture))
		);
		drop(frame);
		drop(f.bindless.frame());

		let stale = ResourceId::new(
			ResourceKind::SampledImage,
			f.texture.index(),
			TableVersion::new(7).unwrap(),
		);
		let frame = f.bindless.frame();
		assert_eq!(
			f.builder().texture(stale).build(&frame, memory),
			Err(PayloadError::Stale(stale))
		);
		Ok(())
	}

	#[test]
	fn test_index_validation() -> anyhow::Result<()> {
		let f = fixture(&[0, 1, 3])?;
		let frame = f.bindless.frame();
		assert_eq!(
			f.builder().build(&frame, Some(&f.memory)),
			Err(PayloadError::IndexOutOfRange {
				position: 2,
				index: 3,
				vertex_count: 3
			})
		);
		assert_eq!(f.builder().build(&frame, None), Err(PayloadError::IndicesUnchecked));
		assert_eq!(
			f.builder().declared_max_index(3).build(&frame, None),
			Err(PayloadError::DeclaredMaxIndexOutOfRange {
				max_index: 3,
				vertex_count: 3
			})
		);
		// the declaration is trusted when the indices can not be read
		assert!(f.builder().declared_max_index(2).build(&frame, None).is_ok());
		Ok(())
	}

	#[test]
	fn test_unreadable_indices() -> anyhow::Result<()> {
		let f = fixture(&[0, 1, 2])?;
		let frame = f.bindless.frame();
		unsafe { f.memory.free(f.indices.address())? };
		assert!(matches!(
			f.builder().build(&frame, Some(&f.memory)),
			Err(PayloadError::UnreadableIndices(AccessError::Unmapped { .. }))
		));
		Ok(())
	}
}
