use crate::platform::BindlessPlatform;
use bindless_draw_shaders::descriptor::MAX_TABLE_CAPACITY;

/// The capacity of each physical table. Kinds sharing a binding share its capacity.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DescriptorCounts {
	pub sampled_images: u32,
	pub storage_images: u32,
	pub samplers: u32,
}

impl DescriptorCounts {
	/// The largest counts representable by a [`ResourceId`](bindless_draw_shaders::descriptor::ResourceId).
	pub const MAX: Self = DescriptorCounts {
		sampled_images: MAX_TABLE_CAPACITY,
		storage_images: MAX_TABLE_CAPACITY,
		samplers: MAX_TABLE_CAPACITY,
	};

	pub const REASONABLE_DEFAULTS: Self = DescriptorCounts {
		sampled_images: 10_000,
		storage_images: 10_000,
		samplers: 400,
	};

	/// The update-after-bind limits of the platform, capped to [`Self::MAX`].
	pub fn limits<P: BindlessPlatform>(platform: &P) -> Self {
		unsafe { P::update_after_bind_descriptor_limits(platform) }.min(Self::MAX)
	}

	pub fn reasonable_defaults<P: BindlessPlatform>(platform: &P) -> Self {
		Self::REASONABLE_DEFAULTS.min(Self::limits(platform))
	}

	pub fn is_within_limit(&self, limit: Self) -> bool {
		// just to make sure this is updated as well
		let DescriptorCounts {
			sampled_images,
			storage_images,
			samplers,
		} = *self;
		sampled_images <= limit.sampled_images && storage_images <= limit.storage_images && samplers <= limit.samplers
	}

	pub fn min(self, other: Self) -> Self {
		Self {
			sampled_images: self.sampled_images.min(other.sampled_images),
			storage_images: self.storage_images.min(other.storage_images),
			samplers: self.samplers.min(other.samplers),
		}
	}
}
