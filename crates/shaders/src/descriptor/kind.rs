use crate::descriptor::{BINDING_SAMPLED_IMAGE, BINDING_SAMPLER, BINDING_STORAGE_IMAGE, BINDLESS_SET};
use core::fmt::{Display, Formatter};

/// The kind of resource a bindless table holds. Every kind has its own index namespace: index 3 of the
/// [`ResourceKind::Sampler`] table and index 3 of the [`ResourceKind::SampledImage`] table are unrelated resources.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ResourceKind {
	/// `texture2D`, sampled with a float result
	SampledImage = 0,
	/// `utexture2D`, sampled with an unsigned integer result
	UnsignedSampledImage = 1,
	/// `image2D`, writable storage image with float texels
	StorageImage = 2,
	/// `uimage2D`, writable storage image with unsigned integer texels
	UnsignedStorageImage = 3,
	/// `sampler`
	Sampler = 4,
}

impl ResourceKind {
	pub const VALUES: [ResourceKind; 5] = [
		ResourceKind::SampledImage,
		ResourceKind::UnsignedSampledImage,
		ResourceKind::StorageImage,
		ResourceKind::UnsignedStorageImage,
		ResourceKind::Sampler,
	];

	pub const fn to_u32(&self) -> u32 {
		*self as u32
	}

	pub const fn from_u32(value: u32) -> Option<Self> {
		match value {
			0 => Some(ResourceKind::SampledImage),
			1 => Some(ResourceKind::UnsignedSampledImage),
			2 => Some(ResourceKind::StorageImage),
			3 => Some(ResourceKind::UnsignedStorageImage),
			4 => Some(ResourceKind::Sampler),
			_ => None,
		}
	}

	/// The binding slot of the table this kind is a view of.
	pub const fn binding(&self) -> u32 {
		match self {
			ResourceKind::SampledImage | ResourceKind::UnsignedSampledImage => BINDING_SAMPLED_IMAGE,
			ResourceKind::StorageImage | ResourceKind::UnsignedStorageImage => BINDING_STORAGE_IMAGE,
			ResourceKind::Sampler => BINDING_SAMPLER,
		}
	}

	pub const fn set(&self) -> u32 {
		BINDLESS_SET
	}

	pub const fn is_image(&self) -> bool {
		!matches!(self, ResourceKind::Sampler)
	}

	pub const fn is_storage(&self) -> bool {
		matches!(self, ResourceKind::StorageImage | ResourceKind::UnsignedStorageImage)
	}

	/// The texel type of images of this kind, `None` for samplers.
	pub const fn sample_type(&self) -> Option<SampleType> {
		match self {
			ResourceKind::SampledImage | ResourceKind::StorageImage => Some(SampleType::Float),
			ResourceKind::UnsignedSampledImage | ResourceKind::UnsignedStorageImage => Some(SampleType::Uint),
			ResourceKind::Sampler => None,
		}
	}

	/// The image kind sharing a binding with the given sample type.
	pub const fn image_kind(storage: bool, sample_type: SampleType) -> Self {
		match (storage, sample_type) {
			(false, SampleType::Float) => ResourceKind::SampledImage,
			(false, SampleType::Uint) => ResourceKind::UnsignedSampledImage,
			(true, SampleType::Float) => ResourceKind::StorageImage,
			(true, SampleType::Uint) => ResourceKind::UnsignedStorageImage,
		}
	}

	/// The name of the shader-visible array of this kind.
	pub const fn table_name(&self) -> &'static str {
		match self {
			ResourceKind::SampledImage => "texture2D_table",
			ResourceKind::UnsignedSampledImage => "utexture2D_table",
			ResourceKind::StorageImage => "image2D_wo_table",
			ResourceKind::UnsignedStorageImage => "uimage2D_wo_table",
			ResourceKind::Sampler => "sampler_table",
		}
	}
}

impl Display for ResourceKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		let name = match self {
			ResourceKind::SampledImage => "sampled image",
			ResourceKind::UnsignedSampledImage => "unsigned sampled image",
			ResourceKind::StorageImage => "storage image",
			ResourceKind::UnsignedStorageImage => "unsigned storage image",
			ResourceKind::Sampler => "sampler",
		};
		f.write_str(name)
	}
}

/// The texel type of an image, distinguishing the type-disjoint views sharing one binding.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum SampleType {
	#[default]
	Float,
	Uint,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kind_u32_roundtrip() {
		for kind in ResourceKind::VALUES {
			assert_eq!(ResourceKind::from_u32(kind.to_u32()), Some(kind));
		}
		assert_eq!(ResourceKind::from_u32(5), None);
	}

	#[test]
	fn test_binding_layout() {
		let layout = ResourceKind::VALUES.map(|k| (k.binding(), k.set()));
		assert_eq!(layout, [(0, 0), (0, 0), (1, 0), (1, 0), (2, 0)]);
	}

	#[test]
	fn test_image_kind() {
		for kind in ResourceKind::VALUES {
			if let Some(sample_type) = kind.sample_type() {
				assert!(kind.is_image());
				assert_eq!(ResourceKind::image_kind(kind.is_storage(), sample_type), kind);
			} else {
				assert!(!kind.is_image());
			}
		}
	}
}
