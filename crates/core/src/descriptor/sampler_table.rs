use crate::backing::range_set::TableIndexRangeSet;
use crate::backing::table::{SlotAllocationError, Table, TableInterface, TableRegisterError, TableSync};
use crate::descriptor::{Bindless, DescriptorCounts, WeakBindless};
use crate::platform::BindlessPlatform;
use bindless_draw_shaders::descriptor::{ResourceId, ResourceKind, BINDING_SAMPLER};
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

pub type SamplerRangeSet<'a, P> = TableIndexRangeSet<'a, Table<SamplerInterface<P>>>;

pub struct SamplerTable<P: BindlessPlatform> {
	pub(crate) table: Arc<Table<SamplerInterface<P>>>,
}

impl<P: BindlessPlatform> SamplerTable<P> {
	pub fn new(
		table_sync: &Arc<TableSync>,
		counts: DescriptorCounts,
		bindless: WeakBindless<P>,
	) -> Result<Self, TableRegisterError> {
		Ok(Self {
			table: table_sync.register(BINDING_SAMPLER, counts.samplers, SamplerInterface { bindless })?,
		})
	}

	pub fn table(&self) -> &Arc<Table<SamplerInterface<P>>> {
		&self.table
	}
}

pub struct SamplerTableAccess<'a, P: BindlessPlatform>(pub &'a Bindless<P>);

impl<P: BindlessPlatform> Deref for SamplerTableAccess<'_, P> {
	type Target = SamplerTable<P>;

	#[inline]
	fn deref(&self) -> &Self::Target {
		&self.0.sampler
	}
}

/// How texels are combined when a sample falls between them, and between mip levels for
/// [`BindlessSamplerCreateInfo::mipmap_mode`].
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub enum Filter {
	/// The closest texel, keeps font atlases and pixel art crisp.
	#[default]
	Nearest = 0,
	Linear = 1,
}

/// What a texture coordinate outside of `0..=1` reads.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Hash)]
pub enum AddressMode {
	/// The nearest edge texel.
	#[default]
	ClampToEdge = 0,
	/// Wraps around, `1.25` reads `0.25`.
	Repeat = 1,
	/// Wraps around mirrored every other repetition, `1.25` reads `0.75`.
	MirrorRepeat = 2,
	/// The sampler's [`BorderColor`].
	ClampToBorder = 3,
}

/// Read for coordinates outside the image with [`AddressMode::ClampToBorder`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum BorderColor {
	#[default]
	TransparentBlack,
	OpaqueBlack,
	OpaqueWhite,
}

#[derive(Copy, Clone, Default, Debug, PartialEq)]
pub struct BindlessSamplerCreateInfo {
	pub mag_filter: Filter,
	pub min_filter: Filter,
	pub mipmap_mode: Filter,
	pub address_mode_u: AddressMode,
	pub address_mode_v: AddressMode,
	pub address_mode_w: AddressMode,
	pub max_anisotropy: Option<f32>,
	pub min_lod: f32,
	pub max_lod: Option<f32>,
	pub border_color: BorderColor,
}

impl BindlessSamplerCreateInfo {
	/// Nearest filtering, clamped to edge. Texels are read exactly as stored, e.g. for pixel art or font atlases.
	pub fn point() -> Self {
		Self::default()
	}

	/// Linear filtering in all dimensions, clamped to edge.
	pub fn linear() -> Self {
		Self {
			mag_filter: Filter::Linear,
			min_filter: Filter::Linear,
			mipmap_mode: Filter::Linear,
			..Self::default()
		}
	}

	pub fn with_address_mode(self, address_mode: AddressMode) -> Self {
		Self {
			address_mode_u: address_mode,
			address_mode_v: address_mode,
			address_mode_w: address_mode,
			..self
		}
	}
}

#[derive(Error)]
pub enum SamplerAllocationError<P: BindlessPlatform> {
	#[error("Platform Error: {0}")]
	Platform(#[source] P::AllocationError),
	#[error("Slot Allocation Error: {0}")]
	Slot(#[from] SlotAllocationError),
}

impl<P: BindlessPlatform> Debug for SamplerAllocationError<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&self, f)
	}
}

impl<P: BindlessPlatform> SamplerTableAccess<'_, P> {
	/// Registers a sampler. It is not fetchable until the next [`Bindless::flush`].
	///
	/// # Safety
	/// Sampler's device must be the same as the bindless device. Ownership of the sampler is transferred to this table,
	/// it is destroyed after it has been unregistered and all frames that may reference it have completed.
	#[inline]
	pub unsafe fn register(&self, sampler: P::Sampler) -> Result<ResourceId, SlotAllocationError> {
		self.table.alloc_slot(ResourceKind::Sampler, sampler)
	}

	/// Create a new sampler with the platform and register it. No sampler is created when the table is full.
	pub fn alloc(&self, create_info: &BindlessSamplerCreateInfo) -> Result<ResourceId, SamplerAllocationError<P>> {
		let reservation = self.table.reserve_slot()?;
		let sampler = unsafe { self.0.platform.alloc_sampler(create_info) }.map_err(SamplerAllocationError::Platform)?;
		Ok(reservation.fill(ResourceKind::Sampler, sampler))
	}
}

pub struct SamplerInterface<P: BindlessPlatform> {
	bindless: WeakBindless<P>,
}

impl<P: BindlessPlatform> TableInterface for SamplerInterface<P> {
	type Slot = P::Sampler;

	fn drop_slots(&self, indices: &TableIndexRangeSet<'_, Table<Self>>) {
		unsafe {
			if let Some(bindless) = self.bindless.upgrade() {
				bindless
					.platform
					.destroy_samplers(bindless.global_descriptor_set(), indices);
			}
		}
	}
}
