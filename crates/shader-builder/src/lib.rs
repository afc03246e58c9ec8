use std::env;
use std::fmt::{Debug, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codegen;

pub use codegen::GlslHeader;

/// Writes GLSL headers matching the binding and payload layout of `bindless-draw-shaders`, so that GLSL shaders can
/// `#include` them instead of restating the layout. Meant to be called from a `build.rs`.
pub struct GlslHeaderBuilder {
	out_dir: Option<PathBuf>,
	headers: Vec<GlslHeader>,
}

#[derive(Error)]
pub enum GlslHeaderError {
	#[error("No output directory was given and `OUT_DIR` is not set, are you running outside of a build script?")]
	MissingOutDir,
	#[error("Failed to format {0:?}")]
	Format(GlslHeader),
}

impl Debug for GlslHeaderError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

impl Default for GlslHeaderBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl GlslHeaderBuilder {
	/// Generate all headers into the build script's `OUT_DIR`.
	pub fn new() -> Self {
		Self {
			out_dir: None,
			headers: GlslHeader::VALUES.to_vec(),
		}
	}

	/// Generate the headers into `out_dir` instead of `OUT_DIR`.
	pub fn out_dir(self, out_dir: impl AsRef<Path>) -> Self {
		Self {
			out_dir: Some(out_dir.as_ref().to_path_buf()),
			..self
		}
	}

	/// Only generate `headers`.
	pub fn headers(self, headers: &[GlslHeader]) -> Self {
		Self {
			headers: headers.to_vec(),
			..self
		}
	}

	pub fn build(self) -> anyhow::Result<GlslHeaderResult> {
		let out_dir = match self.out_dir {
			Some(out_dir) => out_dir,
			None => PathBuf::from(env::var_os("OUT_DIR").ok_or(GlslHeaderError::MissingOutDir)?),
		};
		fs::create_dir_all(&out_dir)?;

		let mut header_paths = Vec::with_capacity(self.headers.len());
		for header in self.headers {
			let content = header.codegen().map_err(|_| GlslHeaderError::Format(header))?;
			let path = out_dir.join(header.file_name());
			fs::write(&path, content)?;
			eprintln!("GLSL header written to {}", path.display());
			header_paths.push(path);
		}
		Ok(GlslHeaderResult { out_dir, header_paths })
	}
}

pub struct GlslHeaderResult {
	/// The directory to add to the GLSL compiler's include path.
	pub out_dir: PathBuf,
	pub header_paths: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_build_writes_headers() -> anyhow::Result<()> {
		let out_dir = env::temp_dir().join(format!("bindless-draw-shader-builder-{}", std::process::id()));
		let result = GlslHeaderBuilder::new().out_dir(&out_dir).build()?;
		assert_eq!(
			result.header_paths,
			[out_dir.join("bindless.glsl"), out_dir.join("gui.glsl")]
		);
		assert_eq!(fs::read_to_string(&result.header_paths[1])?, GlslHeader::Gui.codegen()?);

		let only_gui = out_dir.join("only-gui");
		let result = GlslHeaderBuilder::new()
			.out_dir(&only_gui)
			.headers(&[GlslHeader::Gui])
			.build()?;
		assert_eq!(result.header_paths, [only_gui.join("gui.glsl")]);
		assert!(!only_gui.join("bindless.glsl").exists());

		fs::remove_dir_all(&out_dir)?;
		Ok(())
	}
}
