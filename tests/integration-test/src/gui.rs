#![cfg(test)]

use crate::host_bindless;
use approx::assert_relative_eq;
use bindless_draw_core::descriptor::{
	BindlessImageCreateInfo, BindlessImageUsage, BindlessSamplerCreateInfo, Extent, ResourceKind,
};
use bindless_draw_core::gui::{ClipRect, GuiDrawList};
use bindless_draw_core::memory::HostMemory;
use bindless_draw_core::payload::Vertex;
use epaint::{pos2, Color32, Mesh, Rect};
use glam::{ivec2, uvec2, vec2, vec4};

fn rect_mesh(rect: Rect, color: Color32) -> Mesh {
	let mut mesh = Mesh::default();
	mesh.add_colored_rect(rect, color);
	mesh
}

#[test]
fn test_epaint_upload() -> anyhow::Result<()> {
	let bindless = host_bindless()?;
	let memory = HostMemory::new();
	let font_texture = bindless.image().alloc(
		ResourceKind::SampledImage,
		&BindlessImageCreateInfo {
			extent: Extent::new_2d(64, 64),
			usage: BindlessImageUsage::SAMPLED,
			name: "font texture",
			..BindlessImageCreateInfo::default()
		},
	)?;
	let sampler = bindless.sampler().alloc(&BindlessSamplerCreateInfo::linear())?;
	bindless.flush();

	let meshes = [
		rect_mesh(Rect::from_min_max(pos2(0., 0.), pos2(10., 10.)), Color32::from_rgb(255, 0, 51)),
		rect_mesh(Rect::from_min_max(pos2(20., 5.), pos2(40., 15.)), Color32::WHITE),
	];
	let clip_rect = Rect::from_min_max(pos2(0., 0.), pos2(50., 25.));
	let mut draw_list = GuiDrawList::new();
	for mesh in &meshes {
		draw_list.push_epaint(mesh, font_texture, sampler, clip_rect)?;
	}
	assert_eq!(draw_list.len(), 2);
	assert_eq!(draw_list.vertex_count(), 8);
	assert_eq!(draw_list.index_count(), 12);

	let frame = bindless.frame();
	let upload = draw_list.upload(&frame, &memory)?;
	assert_eq!(memory.allocation_count(), 2);
	assert_eq!(upload.draw_cmds.len(), meshes.len());

	for (cmd, mesh) in upload.draw_cmds.iter().zip(&meshes) {
		assert_eq!(cmd.index_count, 6);
		assert_eq!(cmd.clip_rect, ClipRect::new(vec2(0., 0.), vec2(50., 25.)));
		assert_eq!(cmd.payload.resolve_texture(&frame)?.debug_name(), "font texture");
		assert_eq!(
			cmd.payload.resolve_sampler(&frame)?.create_info,
			BindlessSamplerCreateInfo::linear()
		);
		// indices stay local to their mesh
		for (j, index) in mesh.indices.iter().enumerate() {
			assert_eq!(cmd.payload.resolve_index(&memory, j as u32)?, *index);
			assert_eq!(
				cmd.payload.resolve_indexed_vertex(&memory, j as u32)?,
				Vertex::from(mesh.vertices[*index as usize])
			);
		}
	}

	let first = upload.draw_cmds[0].payload.resolve_vertex(&memory, 0)?;
	assert_eq!(first.pos(), vec4(0., 0., 0., 1.));
	for (actual, expected) in first.color.into_iter().zip([1., 0., 0.2, 1.]) {
		assert_relative_eq!(actual, expected, epsilon = 1e-6);
	}
	assert_eq!(
		upload.draw_cmds[0].clip_rect.to_scissor(2., uvec2(80, 40)),
		(ivec2(0, 0), uvec2(80, 40))
	);

	// Safety: nothing was drawn
	unsafe { upload.free(&memory)? };
	assert_eq!(memory.allocation_count(), 0);
	Ok(())
}
