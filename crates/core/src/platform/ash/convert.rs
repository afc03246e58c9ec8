use crate::descriptor::{AddressMode, BindlessAllocationScheme, BindlessImageUsage, BorderColor, Extent, Filter};
use ash::vk::{Extent3D, ImageType, ImageUsageFlags, ImageViewType};
use gpu_allocator::vulkan::AllocationScheme;
use gpu_allocator::MemoryLocation;

impl BindlessAllocationScheme {
	pub fn to_gpu_allocator_image(&self, image: ash::vk::Image) -> AllocationScheme {
		match self {
			BindlessAllocationScheme::Dedicated => AllocationScheme::DedicatedImage(image),
			BindlessAllocationScheme::AllocatorManaged => AllocationScheme::GpuAllocatorManaged,
		}
	}
}

impl From<Extent> for Extent3D {
	fn from(value: Extent) -> Self {
		Extent3D {
			width: value.width,
			height: value.height,
			depth: value.depth,
		}
	}
}

impl Extent {
	pub fn to_ash_image_type(&self) -> ImageType {
		if self.depth > 1 {
			ImageType::TYPE_3D
		} else {
			ImageType::TYPE_2D
		}
	}

	pub fn to_ash_image_view_type(&self) -> ImageViewType {
		if self.depth > 1 {
			ImageViewType::TYPE_3D
		} else {
			ImageViewType::TYPE_2D
		}
	}
}

const IMAGE_USAGE_TO_ASH: [(BindlessImageUsage, ImageUsageFlags); 5] = [
	(BindlessImageUsage::TRANSFER_SRC, ImageUsageFlags::TRANSFER_SRC),
	(BindlessImageUsage::TRANSFER_DST, ImageUsageFlags::TRANSFER_DST),
	(BindlessImageUsage::SAMPLED, ImageUsageFlags::SAMPLED),
	(BindlessImageUsage::STORAGE, ImageUsageFlags::STORAGE),
	(BindlessImageUsage::COLOR_ATTACHMENT, ImageUsageFlags::COLOR_ATTACHMENT),
];

impl BindlessImageUsage {
	pub fn to_ash_image_usage_flags(&self) -> ImageUsageFlags {
		IMAGE_USAGE_TO_ASH
			.iter()
			.filter(|(usage, _)| self.contains(*usage))
			.fold(ImageUsageFlags::empty(), |flags, (_, ash)| flags | *ash)
	}

	/// Bindless images are only ever written by transfers or shaders.
	pub fn to_gpu_allocator_memory_location(&self) -> MemoryLocation {
		MemoryLocation::GpuOnly
	}
}

impl Filter {
	pub fn to_ash_filter(&self) -> ash::vk::Filter {
		match self {
			Filter::Nearest => ash::vk::Filter::NEAREST,
			Filter::Linear => ash::vk::Filter::LINEAR,
		}
	}

	pub fn to_ash_mipmap_mode(&self) -> ash::vk::SamplerMipmapMode {
		match self {
			Filter::Nearest => ash::vk::SamplerMipmapMode::NEAREST,
			Filter::Linear => ash::vk::SamplerMipmapMode::LINEAR,
		}
	}
}

impl AddressMode {
	pub fn to_ash_address_mode(&self) -> ash::vk::SamplerAddressMode {
		match self {
			AddressMode::ClampToEdge => ash::vk::SamplerAddressMode::CLAMP_TO_EDGE,
			AddressMode::Repeat => ash::vk::SamplerAddressMode::REPEAT,
			AddressMode::MirrorRepeat => ash::vk::SamplerAddressMode::MIRRORED_REPEAT,
			AddressMode::ClampToBorder => ash::vk::SamplerAddressMode::CLAMP_TO_BORDER,
		}
	}
}

impl BorderColor {
	pub fn to_ash_border_color(&self, is_integer: bool) -> ash::vk::BorderColor {
		match (self, is_integer) {
			(BorderColor::TransparentBlack, false) => ash::vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
			(BorderColor::TransparentBlack, true) => ash::vk::BorderColor::INT_TRANSPARENT_BLACK,
			(BorderColor::OpaqueBlack, false) => ash::vk::BorderColor::FLOAT_OPAQUE_BLACK,
			(BorderColor::OpaqueBlack, true) => ash::vk::BorderColor::INT_OPAQUE_BLACK,
			(BorderColor::OpaqueWhite, false) => ash::vk::BorderColor::FLOAT_OPAQUE_WHITE,
			(BorderColor::OpaqueWhite, true) => ash::vk::BorderColor::INT_OPAQUE_WHITE,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_image_usage_same_bits() {
		for (usage, _) in IMAGE_USAGE_TO_ASH {
			assert_eq!(
				Some(usage),
				BindlessImageUsage::from_bits(usage.to_ash_image_usage_flags().as_raw() as u64)
			)
		}
		let combined = BindlessImageUsage::SAMPLED | BindlessImageUsage::TRANSFER_DST;
		assert_eq!(
			combined.to_ash_image_usage_flags(),
			ImageUsageFlags::SAMPLED | ImageUsageFlags::TRANSFER_DST
		);
	}

	#[test]
	fn test_image_type() {
		assert_eq!(Extent::new_2d(4, 4).to_ash_image_type(), ImageType::TYPE_2D);
		assert_eq!(Extent::from([4, 4, 4]).to_ash_image_view_type(), ImageViewType::TYPE_3D);
	}
}
