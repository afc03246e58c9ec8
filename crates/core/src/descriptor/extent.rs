use glam::UVec2;

/// The size of an image in texels. 2D images have a depth of 1.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[must_use]
pub struct Extent {
	pub width: u32,
	pub height: u32,
	pub depth: u32,
}

impl Extent {
	pub const fn new_2d(width: u32, height: u32) -> Self {
		Extent {
			width,
			height,
			depth: 1,
		}
	}

	pub fn texel_count(&self) -> u64 {
		self.width as u64 * self.height as u64 * self.depth as u64
	}

	pub fn is_empty(&self) -> bool {
		self.texel_count() == 0
	}
}

impl From<[u32; 3]> for Extent {
	fn from(value: [u32; 3]) -> Self {
		Extent {
			width: value[0],
			height: value[1],
			depth: value[2],
		}
	}
}

impl From<UVec2> for Extent {
	fn from(value: UVec2) -> Self {
		Extent::new_2d(value.x, value.y)
	}
}

impl Default for Extent {
	fn default() -> Self {
		Extent {
			width: 1,
			height: 1,
			depth: 1,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_texel_count() {
		assert_eq!(Extent::new_2d(3, 4).texel_count(), 12);
		assert_eq!(Extent::from([1 << 16, 1 << 16, 4]).texel_count(), 1 << 34);
		assert!(Extent::new_2d(0, 4).is_empty());
		assert_eq!(Extent::from(UVec2::new(2, 2)), Extent::new_2d(2, 2));
	}
}
