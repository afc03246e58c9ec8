use bindless_draw_shaders::descriptor::{
	ResourceKind, BINDING_SAMPLED_IMAGE, BINDING_SAMPLER, BINDING_STORAGE_IMAGE, BINDLESS_SET,
};
use bindless_draw_shaders::payload::{ShaderInput, Vertex, VERTEX_SIZE};
use std::fmt::Write;
use std::mem::{offset_of, size_of};

/// A GLSL header that can be generated.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GlslHeader {
	/// The descriptor tables of every [`ResourceKind`].
	Bindless,
	/// The [`Vertex`] and [`ShaderInput`] structs, with buffer references for vertices and indices.
	Gui,
}

impl GlslHeader {
	pub const VALUES: [GlslHeader; 2] = [GlslHeader::Bindless, GlslHeader::Gui];

	pub fn file_name(&self) -> &'static str {
		match self {
			GlslHeader::Bindless => "bindless.glsl",
			GlslHeader::Gui => "gui.glsl",
		}
	}

	fn include_guard(&self) -> &'static str {
		match self {
			GlslHeader::Bindless => "BINDLESS_GLSL",
			GlslHeader::Gui => "GUI_GLSL",
		}
	}

	pub fn codegen(&self) -> Result<String, std::fmt::Error> {
		let mut out = String::new();
		let guard = self.include_guard();
		writeln!(out, "// generated by bindless-draw-shader-builder, do not edit")?;
		writeln!(out, "#ifndef {guard}")?;
		writeln!(out, "#define {guard}")?;
		writeln!(out)?;
		match self {
			GlslHeader::Bindless => codegen_bindless(&mut out)?,
			GlslHeader::Gui => codegen_gui(&mut out)?,
		}
		writeln!(out)?;
		writeln!(out, "#endif // {guard}")?;
		Ok(out)
	}
}

fn binding_define(binding: u32) -> &'static str {
	match binding {
		BINDING_SAMPLED_IMAGE => "BINDLESS_SAMPLED_TEXTURES",
		BINDING_STORAGE_IMAGE => "BINDLESS_STORAGE_TEXTURES",
		BINDING_SAMPLER => "BINDLESS_SAMPLERS",
		_ => unreachable!("unknown binding {binding}"),
	}
}

fn glsl_type(kind: ResourceKind) -> &'static str {
	match kind {
		ResourceKind::SampledImage => "texture2D",
		ResourceKind::UnsignedSampledImage => "utexture2D",
		ResourceKind::StorageImage => "writeonly image2D",
		ResourceKind::UnsignedStorageImage => "writeonly uimage2D",
		ResourceKind::Sampler => "sampler",
	}
}

fn codegen_bindless(out: &mut String) -> std::fmt::Result {
	writeln!(out, "#extension GL_EXT_nonuniform_qualifier : require")?;
	writeln!(out)?;
	writeln!(out, "#define BINDLESS_SET {BINDLESS_SET}")?;
	for binding in [BINDING_SAMPLED_IMAGE, BINDING_STORAGE_IMAGE, BINDING_SAMPLER] {
		writeln!(out, "#define {} {}", binding_define(binding), binding)?;
	}

	let mut binding = None;
	for kind in ResourceKind::VALUES {
		// kinds sharing a binding are grouped
		if binding != Some(kind.binding()) {
			writeln!(out)?;
			binding = Some(kind.binding());
		}
		writeln!(
			out,
			"layout(binding = {}, set = BINDLESS_SET) uniform {} {}[];",
			binding_define(kind.binding()),
			glsl_type(kind),
			kind.table_name()
		)?;
	}
	Ok(())
}

fn codegen_gui(out: &mut String) -> std::fmt::Result {
	writeln!(out, "#extension GL_EXT_buffer_reference : require")?;
	writeln!(out, "#extension GL_EXT_scalar_block_layout : require")?;
	writeln!(out)?;

	// scalar layout, an array of Vertex has a stride of exactly VERTEX_SIZE
	writeln!(out, "struct Vertex {{")?;
	for (ty, name, offset) in [
		("vec4", "pos", offset_of!(Vertex, pos)),
		("vec4", "color", offset_of!(Vertex, color)),
		("vec2", "uv", offset_of!(Vertex, uv)),
	] {
		writeln!(out, "\t{ty} {name}; // offset {offset}")?;
	}
	writeln!(out, "}}; // size {VERTEX_SIZE}")?;
	writeln!(out)?;

	writeln!(
		out,
		"layout(buffer_reference, scalar, buffer_reference_align = 4) readonly buffer IndexBuffer {{"
	)?;
	writeln!(out, "\tuint index[];")?;
	writeln!(out, "}};")?;
	writeln!(out)?;
	writeln!(
		out,
		"layout(buffer_reference, scalar, buffer_reference_align = 4) readonly buffer VertexBuffer {{"
	)?;
	writeln!(out, "\tVertex vertex[];")?;
	writeln!(out, "}};")?;
	writeln!(out)?;

	writeln!(out, "struct ShaderInput {{")?;
	for (ty, name, offset) in [
		("VertexBuffer", "vbuf", offset_of!(ShaderInput, vertices)),
		("IndexBuffer", "ibuf", offset_of!(ShaderInput, indices)),
		("uint", "tex", offset_of!(ShaderInput, tex)),
		("uint", "smplr", offset_of!(ShaderInput, smplr)),
	] {
		writeln!(out, "\t{ty} {name}; // offset {offset}")?;
	}
	writeln!(out, "}}; // size {}", size_of::<ShaderInput>())?;
	Ok(())
}
