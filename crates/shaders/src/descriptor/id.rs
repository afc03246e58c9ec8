use crate::descriptor::ResourceKind;
use bytemuck_derive::{Pod, Zeroable};
use core::fmt::{Debug, Formatter};
use core::mem;
use static_assertions::const_assert_eq;

pub const ID_INDEX_BITS: u32 = 17;
pub const ID_KIND_BITS: u32 = 3;
pub const ID_VERSION_BITS: u32 = 12;

const ID_INDEX_MASK: u32 = (1 << ID_INDEX_BITS) - 1;
const ID_KIND_MASK: u32 = (1 << ID_KIND_BITS) - 1;
const ID_VERSION_MASK: u32 = (1 << ID_VERSION_BITS) - 1;

const ID_INDEX_SHIFT: u32 = 0;
const ID_KIND_SHIFT: u32 = ID_INDEX_BITS;
const ID_VERSION_SHIFT: u32 = ID_INDEX_BITS + ID_KIND_BITS;

/// The maximum amount of slots a single table may have.
pub const MAX_TABLE_CAPACITY: u32 = 1 << ID_INDEX_BITS;

// uses all 32 bits
const_assert_eq!(ID_INDEX_BITS + ID_KIND_BITS + ID_VERSION_BITS, 32);
// masks use entire 32 bit range
const_assert_eq!(
	ID_INDEX_MASK << ID_INDEX_SHIFT | ID_KIND_MASK << ID_KIND_SHIFT | ID_VERSION_MASK << ID_VERSION_SHIFT,
	!0
);
// masks do not overlap
const_assert_eq!(ID_INDEX_MASK << ID_INDEX_SHIFT & ID_KIND_MASK << ID_KIND_SHIFT, 0);
const_assert_eq!(ID_INDEX_MASK << ID_INDEX_SHIFT & ID_VERSION_MASK << ID_VERSION_SHIFT, 0);
const_assert_eq!(ID_KIND_MASK << ID_KIND_SHIFT & ID_VERSION_MASK << ID_VERSION_SHIFT, 0);
// all kinds fit
const_assert_eq!(ResourceKind::Sampler as u32 & !ID_KIND_MASK, 0);

/// The host-side handle of a registered resource. Internally it's a bit packed u32 containing the [`ResourceKind`],
/// [`TableIndex`] and [`TableVersion`]. Shaders never see this id, only the [`TableIndex`] it contains.
#[repr(transparent)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, Zeroable, Pod)]
pub struct ResourceId(u32);
const_assert_eq!(mem::size_of::<ResourceId>(), 4);

impl ResourceId {
	/// Packs an id. Creating an id is always safe, whether it refers to a live resource is checked by the registry
	/// whenever it is used.
	pub const fn new(kind: ResourceKind, index: TableIndex, version: TableVersion) -> Self {
		let mut value = 0;
		value |= (kind as u32 & ID_KIND_MASK) << ID_KIND_SHIFT;
		value |= (index.0 & ID_INDEX_MASK) << ID_INDEX_SHIFT;
		value |= (version.0 & ID_VERSION_MASK) << ID_VERSION_SHIFT;
		Self(value)
	}

	/// Unpacks an id from its raw representation, or None if the kind bits are invalid.
	pub const fn from_raw(raw: u32) -> Option<Self> {
		match ResourceKind::from_u32((raw >> ID_KIND_SHIFT) & ID_KIND_MASK) {
			Some(_) => Some(Self(raw)),
			None => None,
		}
	}

	pub const fn to_raw(&self) -> u32 {
		self.0
	}

	pub const fn kind(&self) -> ResourceKind {
		match ResourceKind::from_u32((self.0 >> ID_KIND_SHIFT) & ID_KIND_MASK) {
			Some(kind) => kind,
			// all constructors validate the kind bits
			None => unreachable!(),
		}
	}

	pub const fn index(&self) -> TableIndex {
		TableIndex((self.0 >> ID_INDEX_SHIFT) & ID_INDEX_MASK)
	}

	pub const fn version(&self) -> TableVersion {
		TableVersion((self.0 >> ID_VERSION_SHIFT) & ID_VERSION_MASK)
	}
}

impl Debug for ResourceId {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("ResourceId")
			.field("kind", &self.kind())
			.field("index", &self.index())
			.field("version", &self.version())
			.finish()
	}
}

/// The index of a resource within the table of its [`ResourceKind`]. This is the value written into a
/// [`ShaderInput`](crate::payload::ShaderInput).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Zeroable, Pod)]
pub struct TableIndex(u32);
const_assert_eq!(mem::size_of::<TableIndex>(), 4);

impl TableIndex {
	/// Creates a new `TableIndex` or None if the index is too large to be represented by [`ID_INDEX_BITS`] bits.
	pub const fn new(index: u32) -> Option<Self> {
		if index == index & ID_INDEX_MASK {
			Some(Self(index))
		} else {
			None
		}
	}

	/// # Safety
	/// `index` must be less than [`MAX_TABLE_CAPACITY`]
	pub const unsafe fn new_unchecked(index: u32) -> Self {
		Self(index)
	}

	pub const fn to_u32(&self) -> u32 {
		self.0
	}

	pub const fn to_usize(&self) -> usize {
		self.0 as usize
	}
}

/// The version of a table slot, incremented every time the slot is reused.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TableVersion(u32);
const_assert_eq!(mem::size_of::<TableVersion>(), 4);

impl TableVersion {
	pub const INITIAL: Self = TableVersion(0);

	/// Creates a new `TableVersion` or None if the version is too large to be represented by [`ID_VERSION_BITS`]
	/// bits.
	pub const fn new(version: u32) -> Option<Self> {
		if version == version & ID_VERSION_MASK {
			Some(Self(version))
		} else {
			None
		}
	}

	/// The version after this one, or None if the version space is exhausted.
	pub const fn next(&self) -> Option<Self> {
		Self::new(self.0 + 1)
	}

	pub const fn to_u32(&self) -> u32 {
		self.0
	}
}
