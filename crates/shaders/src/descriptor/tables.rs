use crate::descriptor::{ResourceKind, TableIndex};

/// The shader-side view of the bindless tables: pure read access of a `(kind, index)` pair. Population and
/// invalidation of entries happen host-side and are not part of this interface.
pub trait DescriptorTables {
	type Image: ?Sized;
	type Sampler: ?Sized;

	/// Fetch the image at `index` of the table of `kind`. Returns None if the slot is not live or holds an image of a
	/// different [`SampleType`](crate::descriptor::SampleType), and always for [`ResourceKind::Sampler`].
	fn fetch_image(&self, kind: ResourceKind, index: TableIndex) -> Option<&Self::Image>;

	/// Fetch the sampler at `index` of the sampler table. Returns None if the slot is not live.
	fn fetch_sampler(&self, index: TableIndex) -> Option<&Self::Sampler>;

	fn fetch(&self, kind: ResourceKind, index: TableIndex) -> Option<Resource<'_, Self::Image, Self::Sampler>> {
		match kind {
			ResourceKind::Sampler => self.fetch_sampler(index).map(Resource::Sampler),
			kind => self.fetch_image(kind, index).map(Resource::Image),
		}
	}
}

/// A resource fetched from one of the bindless tables.
#[derive(Debug)]
pub enum Resource<'a, I: ?Sized, S: ?Sized> {
	Image(&'a I),
	Sampler(&'a S),
}

impl<I: ?Sized, S: ?Sized> Clone for Resource<'_, I, S> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<I: ?Sized, S: ?Sized> Copy for Resource<'_, I, S> {}

impl<'a, I: ?Sized, S: ?Sized> Resource<'a, I, S> {
	pub fn image(self) -> Option<&'a I> {
		match self {
			Resource::Image(image) => Some(image),
			Resource::Sampler(_) => None,
		}
	}

	pub fn sampler(self) -> Option<&'a S> {
		match self {
			Resource::Image(_) => None,
			Resource::Sampler(sampler) => Some(sampler),
		}
	}
}
