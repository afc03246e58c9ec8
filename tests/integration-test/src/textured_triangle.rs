#![cfg(test)]

use crate::{debugger, host_bindless};
use bindless_draw_core::descriptor::{
	Bindless, BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, DescriptorCounts, Extent, Format,
	ImageSlot, ResourceId, ResourceKind, SampleType, TableIndex, TableVersion,
};
use bindless_draw_core::memory::{AccessError, DeviceMemory, DeviceMemoryAlloc, HostMemory};
use bindless_draw_core::payload::{DrawPayload, DrawPayloadBuilder, PayloadError, Vertex};
use bindless_draw_core::platform::ash::init::{ash_init_single_graphics_queue, AshSingleGraphicsQueueCreateInfo};
use bindless_draw_core::platform::ash::{Ash, AshMemory};
use bindless_draw_core::platform::host::{HostImage, HostPlatform};
use bindless_draw_core::platform::BindlessPlatform;
use glam::{vec2, vec4};

const TEXTURE_INDEX: u32 = 5;
const SAMPLER_INDEX: u32 = 2;
const RED: [u8; 4] = [255, 0, 0, 255];

fn triangle_vertices() -> [Vertex; 3] {
	[
		Vertex::new(vec4(-1., -1., 0., 1.), vec4(1., 0., 0., 1.), vec2(0., 0.)),
		Vertex::new(vec4(1., -1., 0., 1.), vec4(0., 1., 0., 1.), vec2(1., 0.)),
		Vertex::new(vec4(0., 1., 0., 1.), vec4(0., 0., 1., 1.), vec2(0.5, 1.)),
	]
}

struct TexturedTriangle {
	texture: ResourceId,
	sampler: ResourceId,
	payload: DrawPayload,
}

/// Fills the tables with some resources first, so that the texture and sampler end up on indices other than 0.
fn textured_triangle<P: BindlessPlatform, M: DeviceMemoryAlloc + DeviceMemory>(
	bindless: &Bindless<P>,
	memory: &M,
	register_texture: impl FnOnce(&Bindless<P>) -> anyhow::Result<ResourceId>,
) -> anyhow::Result<TexturedTriangle> {
	let filler = BindlessImageCreateInfo {
		extent: Extent::new_2d(1, 1),
		usage: BindlessImageUsage::SAMPLED,
		name: "filler",
		..BindlessImageCreateInfo::default()
	};
	for _ in 0..TEXTURE_INDEX {
		bindless.image().alloc(ResourceKind::SampledImage, &filler)?;
	}
	let texture = register_texture(bindless)?;
	for _ in 0..SAMPLER_INDEX {
		bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear())?;
	}
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::point())?;
	assert_eq!(texture.index().to_u32(), TEXTURE_INDEX);
	assert_eq!(sampler.index().to_u32(), SAMPLER_INDEX);

	// not flushed yet
	let vertices = memory.alloc_region("triangle vertices", &triangle_vertices())?;
	let indices = memory.alloc_region("triangle indices", &[0u32, 1, 2])?;
	let builder = DrawPayloadBuilder::new(vertices, indices).texture(texture).sampler(sampler);
	assert_eq!(
		builder.build(&bindless.frame(), Some(memory)),
		Err(PayloadError::NotFlushed(texture))
	);

	bindless.flush();
	let frame = bindless.frame();
	let payload = builder.build(&frame, Some(memory))?;

	let input = payload.to_shader_input();
	assert_eq!(input.tex, TEXTURE_INDEX);
	assert_eq!(input.smplr, SAMPLER_INDEX);
	assert_eq!(input.vertices, vertices.address().to_u64());
	assert_eq!(input.indices, indices.address().to_u64());

	let expected = triangle_vertices();
	for j in 0..3 {
		assert_eq!(payload.resolve_indexed_vertex(memory, j)?, expected[j as usize]);
	}
	// resolving does not mutate anything
	for j in 0..3 {
		assert_eq!(payload.resolve_indexed_vertex(memory, j)?, expected[j as usize]);
	}
	assert_eq!(
		payload.resolve_index(memory, 3),
		Err(AccessError::OutOfBounds { index: 3, count: 3 })
	);
	assert_eq!(payload.resolve_texture(&frame)?.extent, Extent::new_2d(2, 2));
	payload.resolve_sampler(&frame)?;

	let unregistered = ResourceId::new(
		ResourceKind::SampledImage,
		TableIndex::new(TEXTURE_INDEX + 1).unwrap(),
		TableVersion::INITIAL,
	);
	assert_eq!(
		DrawPayloadBuilder::new(vertices, indices)
			.texture(unregistered)
			.sampler(sampler)
			.build(&frame, Some(memory)),
		Err(PayloadError::Unregistered(unregistered))
	);

	Ok(TexturedTriangle {
		texture,
		sampler,
		payload,
	})
}

#[test]
fn test_textured_triangle_host() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let memory = HostMemory::new();
	let triangle = textured_triangle(&bindless, &memory, |bindless| {
		let extent = Extent::new_2d(2, 2);
		let image = ImageSlot::<HostPlatform>::new(
			HostImage::solid(extent, RED),
			SampleType::Float,
			BindlessImageUsage::SAMPLED,
			Format::R8G8B8A8_UNORM,
			extent,
			"solid red",
		);
		// Safety: host images need no platform
		Ok(unsafe { bindless.image().register(ResourceKind::SampledImage, image)? })
	})?;

	let frame = bindless.frame();
	let texture = triangle.payload.resolve_texture(&frame)?;
	assert_eq!(texture.debug_name(), "solid red");
	for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
		assert_eq!(texture.texel(x, y), Some(RED));
	}
	assert_eq!(texture.texel(2, 0), None);
	assert_eq!(
		triangle.payload.resolve_sampler(&frame)?.create_info,
		BindlessSamplerCreateInfo::point()
	);
	assert_eq!(frame.get_image(triangle.texture).map(|i| i.debug_name()), Some("solid red"));
	assert!(frame.get_sampler(triangle.sampler).is_some());
	assert_eq!(memory.allocation_count(), 2);
	Ok(())
}

#[test]
#[ignore = "requires a Vulkan 1.2 device"]
fn test_textured_triangle_ash() -> anyhow::Result<()> {
	let ash = Ash::new(ash_init_single_graphics_queue(AshSingleGraphicsQueueCreateInfo {
		debug: debugger(),
		..AshSingleGraphicsQueueCreateInfo::default()
	})?);
	let counts = DescriptorCounts::reasonable_defaults(&ash);
	let bindless = Bindless::new(ash, counts)?;
	let memory = AshMemory::new(&bindless);
	let triangle = textured_triangle(&bindless, &memory, |bindless| {
		Ok(bindless.image().alloc(
			ResourceKind::SampledImage,
			&BindlessImageCreateInfo {
				extent: Extent::new_2d(2, 2),
				usage: BindlessImageUsage::SAMPLED,
				name: "texture",
				..BindlessImageCreateInfo::default()
			},
		)?)
	})?;

	let frame = bindless.frame();
	assert_eq!(triangle.payload.resolve_texture(&frame)?.debug_name(), "texture");
	assert!(frame.get_sampler(triangle.sampler).is_some());
	assert_eq!(memory.allocation_count(), 2);
	Ok(())
}
