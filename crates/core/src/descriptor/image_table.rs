use crate::backing::range_set::TableIndexRangeSet;
use crate::backing::table::{SlotAllocationError, Table, TableInterface, TableRegisterError, TableSync};
use crate::descriptor::{Bindless, BindlessAllocationScheme, DescriptorCounts, Extent, WeakBindless};
use crate::platform::BindlessPlatform;
use bindless_draw_shaders::descriptor::{
	ResourceId, ResourceKind, SampleType, BINDING_SAMPLED_IMAGE, BINDING_STORAGE_IMAGE,
};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

pub struct ImageSlot<P: BindlessPlatform> {
	pub platform: P::Image,
	/// Whether texels are read as floats or unsigned integers, decides which [`ResourceKind`] may view this image.
	pub sample_type: SampleType,
	pub usage: BindlessImageUsage,
	/// The image format
	pub format: Format,
	pub extent: Extent,
	pub debug_name: String,
}

impl<P: BindlessPlatform> Deref for ImageSlot<P> {
	type Target = P::Image;

	fn deref(&self) -> &Self::Target {
		&self.platform
	}
}

impl<P: BindlessPlatform> ImageSlot<P> {
	pub fn new(
		platform: P::Image,
		sample_type: SampleType,
		usage: BindlessImageUsage,
		format: Format,
		extent: Extent,
		debug_name: impl Into<String>,
	) -> Self {
		Self {
			platform,
			sample_type,
			usage,
			format,
			extent,
			debug_name: debug_name.into(),
		}
	}

	pub fn debug_name(&self) -> &str {
		&self.debug_name
	}
}

impl<P: BindlessPlatform> Debug for ImageSlot<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ImageSlot")
			.field("debug_name", &self.debug_name)
			.field("sample_type", &self.sample_type)
			.field("usage", &self.usage)
			.field("format", &self.format)
			.field("extent", &self.extent)
			.finish()
	}
}

pub type ImageRangeSet<'a, P> = TableIndexRangeSet<'a, Table<ImageInterface<P>>>;

/// The sampled and the storage image table. Float and unsigned kinds share a table, see [`ImageSlot::sample_type`].
pub struct ImageTable<P: BindlessPlatform> {
	pub(crate) sampled: Arc<Table<ImageInterface<P>>>,
	pub(crate) storage: Arc<Table<ImageInterface<P>>>,
}

impl<P: BindlessPlatform> ImageTable<P> {
	pub fn new(
		table_sync: &Arc<TableSync>,
		counts: DescriptorCounts,
		bindless: WeakBindless<P>,
	) -> Result<Self, TableRegisterError> {
		Ok(Self {
			sampled: table_sync.register(
				BINDING_SAMPLED_IMAGE,
				counts.sampled_images,
				ImageInterface {
					bindless: bindless.clone(),
				},
			)?,
			storage: table_sync.register(BINDING_STORAGE_IMAGE, counts.storage_images, ImageInterface { bindless })?,
		})
	}

	/// The table holding images of `kind`, or None if `kind` is not an image kind.
	pub fn table(&self, kind: ResourceKind) -> Option<&Arc<Table<ImageInterface<P>>>> {
		match kind {
			ResourceKind::SampledImage | ResourceKind::UnsignedSampledImage => Some(&self.sampled),
			ResourceKind::StorageImage | ResourceKind::UnsignedStorageImage => Some(&self.storage),
			ResourceKind::Sampler => None,
		}
	}
}

pub struct ImageTableAccess<'a, P: BindlessPlatform>(pub &'a Bindless<P>);

impl<P: BindlessPlatform> Deref for ImageTableAccess<'_, P> {
	type Target = ImageTable<P>;

	#[inline]
	fn deref(&self) -> &Self::Target {
		&self.0.image
	}
}

bitflags::bitflags! {
	/// Image usage specify how you may use the image. Missing flags are only validated during runtime.
	#[repr(transparent)]
	#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
	pub struct BindlessImageUsage: u64 {
		/// Can be used as a source of transfer operations
		const TRANSFER_SRC = 0b1;
		/// Can be used as a destination of transfer operations
		const TRANSFER_DST = 0b10;
		/// Can be sampled from with a sampler
		const SAMPLED = 0b100;
		/// Can be used as storage image
		const STORAGE = 0b1000;
		/// Can be used as framebuffer color attachment
		const COLOR_ATTACHMENT = 0b1_0000;
	}
}

impl BindlessImageUsage {
	/// The usage an image viewed as `kind` must have.
	pub fn required_for(kind: ResourceKind) -> Self {
		match kind {
			ResourceKind::SampledImage | ResourceKind::UnsignedSampledImage => BindlessImageUsage::SAMPLED,
			ResourceKind::StorageImage | ResourceKind::UnsignedStorageImage => BindlessImageUsage::STORAGE,
			ResourceKind::Sampler => BindlessImageUsage::empty(),
		}
	}
}

pub type Format = ash::vk::Format;

#[derive(Copy, Clone, Debug)]
pub struct BindlessImageCreateInfo<'a> {
	/// The image format
	pub format: Format,
	/// The extent of the image, depth must be 1 for 2D images.
	pub extent: Extent,
	/// Image usage specify how you may use the image. Missing flags are only validated during runtime.
	pub usage: BindlessImageUsage,
	/// Determines how this allocation should be managed.
	pub allocation_scheme: BindlessAllocationScheme,
	/// Name of the image, for tracking and debugging purposes
	pub name: &'a str,
}

impl Default for BindlessImageCreateInfo<'_> {
	fn default() -> Self {
		Self {
			format: Format::R8G8B8A8_UNORM,
			extent: Extent::default(),
			usage: BindlessImageUsage::default(),
			allocation_scheme: BindlessAllocationScheme::default(),
			name: "",
		}
	}
}

impl BindlessImageCreateInfo<'_> {
	pub fn validate<P: BindlessPlatform>(&self, kind: ResourceKind) -> Result<(), ImageAllocationError<P>> {
		if !kind.is_image() {
			return Err(RegisterError::NotAnImageKind(kind).into());
		}
		if self.extent.is_empty() {
			return Err(ImageAllocationError::EmptyExtent {
				name: self.name.to_owned(),
				extent: self.extent,
			});
		}
		let required = BindlessImageUsage::required_for(kind);
		if !self.usage.contains(required) {
			return Err(ImageAllocationError::MissingUsage {
				name: self.name.to_owned(),
				kind,
				required,
			});
		}
		Ok(())
	}
}

#[derive(Debug, Error)]
pub enum RegisterError {
	#[error("{0} is not an image kind")]
	NotAnImageKind(ResourceKind),
	#[error("Image with sample type {sample_type:?} can not be registered as {kind}")]
	SampleTypeMismatch { kind: ResourceKind, sample_type: SampleType },
	#[error("Slot Allocation Error: {0}")]
	Slot(#[from] SlotAllocationError),
}

#[derive(Error)]
pub enum ImageAllocationError<P: BindlessPlatform> {
	#[error("Platform Error: {0}")]
	Platform(#[source] P::AllocationError),
	#[error("Register Error: {0}")]
	Register(#[from] RegisterError),
	#[error("Image {name} viewed as {kind} must declare usage {required:?}")]
	MissingUsage {
		name: String,
		kind: ResourceKind,
		required: BindlessImageUsage,
	},
	#[error("Image {name} must not have an empty extent {extent:?}")]
	EmptyExtent { name: String, extent: Extent },
}

impl<P: BindlessPlatform> Debug for ImageAllocationError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self, f)
	}
}

impl<P: BindlessPlatform> ImageTableAccess<'_, P> {
	/// Registers an image as a resource of `kind`. It is not fetchable until the next [`Bindless::flush`].
	///
	/// # Safety
	/// The image must have been created by this bindless' platform. Ownership of the image is transferred to this
	/// table, it is destroyed after it has been unregistered and all frames that may reference it have completed.
	pub unsafe fn register(&self, kind: ResourceKind, image: ImageSlot<P>) -> Result<ResourceId, RegisterError> {
		let table = self.table(kind).ok_or(RegisterError::NotAnImageKind(kind))?;
		if kind.sample_type() != Some(image.sample_type) {
			return Err(RegisterError::SampleTypeMismatch {
				kind,
				sample_type: image.sample_type,
			});
		}
		Ok(table.alloc_slot(kind, image)?)
	}

	/// Create a new image with the platform and register it as `kind`. A slot is reserved first, so that no image is
	/// created when the table is full.
	pub fn alloc(
		&self,
		kind: ResourceKind,
		create_info: &BindlessImageCreateInfo,
	) -> Result<ResourceId, ImageAllocationError<P>> {
		create_info.validate::<P>(kind)?;
		let table = self.table(kind).ok_or(RegisterError::NotAnImageKind(kind))?;
		let sample_type = kind.sample_type().ok_or(RegisterError::NotAnImageKind(kind))?;
		let reservation = table.reserve_slot().map_err(RegisterError::from)?;
		let image = unsafe { self.0.platform.alloc_image(create_info) }.map_err(ImageAllocationError::Platform)?;
		Ok(reservation.fill(
			kind,
			ImageSlot {
				platform: image,
				sample_type,
				usage: create_info.usage,
				format: create_info.format,
				extent: create_info.extent,
				debug_name: create_info.name.to_string(),
			},
		))
	}
}

pub struct ImageInterface<P: BindlessPlatform> {
	bindless: WeakBindless<P>,
}

impl<P: BindlessPlatform> TableInterface for ImageInterface<P> {
	type Slot = ImageSlot<P>;

	fn drop_slots(&self, indices: &TableIndexRangeSet<'_, Table<Self>>) {
		unsafe {
			if let Some(bindless) = self.bindless.upgrade() {
				bindless
					.platform
					.destroy_images(bindless.global_descriptor_set(), indices);
			}
		}
	}
}
