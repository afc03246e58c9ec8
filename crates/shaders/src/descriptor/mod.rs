mod id;
mod kind;
mod tables;

pub use id::*;
pub use kind::*;
pub use tables::*;

/// The single descriptor set all bindless tables live in.
pub const BINDLESS_SET: u32 = 0;
/// Binding of the sampled image tables, shared by [`ResourceKind::SampledImage`] and
/// [`ResourceKind::UnsignedSampledImage`].
pub const BINDING_SAMPLED_IMAGE: u32 = 0;
/// Binding of the storage image tables, shared by [`ResourceKind::StorageImage`] and
/// [`ResourceKind::UnsignedStorageImage`].
pub const BINDING_STORAGE_IMAGE: u32 = 1;
pub const BINDING_SAMPLER: u32 = 2;
/// The amount of distinct bindings, and thus physical tables.
pub const BINDING_COUNT: u32 = 3;
