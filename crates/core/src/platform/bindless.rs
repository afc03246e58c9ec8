use crate::descriptor::{
	BindlessImageCreateInfo, BindlessSamplerCreateInfo, DescriptorCounts, ImageRangeSet, SamplerRangeSet,
};
use std::error::Error;

/// Internal interface for bindless API calls, may change at any time!
///
/// # Safety
/// Implementations must keep created resources alive until they are passed to the matching destroy function.
pub unsafe trait BindlessPlatform: Sized + Send + Sync + 'static {
	type Image: 'static + Send + Sync;
	type Sampler: 'static + Send + Sync;
	type AllocationError: 'static + Error + Send + Sync;
	type BindlessDescriptorSet: 'static + Send + Sync;

	unsafe fn update_after_bind_descriptor_limits(&self) -> DescriptorCounts;

	unsafe fn create_descriptor_set(
		&self,
		counts: DescriptorCounts,
	) -> Result<Self::BindlessDescriptorSet, Self::AllocationError>;

	/// Update the [`BindlessDescriptorSet`] with these newly registered images and samplers. Sampled and storage
	/// images are passed separately, as they are written to different bindings.
	///
	/// # Safety
	/// Must be called while holding the associated [`TableSync`]'s [`FlushGuard`].
	///
	/// [`BindlessDescriptorSet`]: Self::BindlessDescriptorSet
	/// [`TableSync`]: crate::backing::table::TableSync
	/// [`FlushGuard`]: crate::backing::table::FlushGuard
	unsafe fn update_descriptor_set(
		&self,
		set: &Self::BindlessDescriptorSet,
		sampled_images: &ImageRangeSet<'_, Self>,
		storage_images: &ImageRangeSet<'_, Self>,
		samplers: &SamplerRangeSet<'_, Self>,
	);

	unsafe fn destroy_descriptor_set(&self, set: Self::BindlessDescriptorSet);

	unsafe fn alloc_image(&self, create_info: &BindlessImageCreateInfo) -> Result<Self::Image, Self::AllocationError>;

	unsafe fn alloc_sampler(
		&self,
		create_info: &BindlessSamplerCreateInfo,
	) -> Result<Self::Sampler, Self::AllocationError>;

	/// Destroy specified images. You have exclusive access to the associated [`ImageSlot`]s, even if they are just
	/// passed by standard reference. After this method call returns, the [`ImageSlot`] will be dropped and otherwise
	/// not accessed anymore.
	///
	/// [`ImageSlot`]: crate::descriptor::ImageSlot
	unsafe fn destroy_images(&self, global_descriptor_set: &Self::BindlessDescriptorSet, images: &ImageRangeSet<'_, Self>);

	/// Destroy specified Samplers. You have exclusive access to the associated Samplers, even if they are just
	/// passed by standard reference. After this method call returns, the Samplers will be dropped and otherwise
	/// not accessed anymore.
	unsafe fn destroy_samplers(
		&self,
		global_descriptor_set: &Self::BindlessDescriptorSet,
		samplers: &SamplerRangeSet<'_, Self>,
	);
}
