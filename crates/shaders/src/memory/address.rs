use bytemuck_derive::{Pod, Zeroable};
use core::fmt::{Debug, Display, Formatter};
use core::mem;
use static_assertions::const_assert_eq;

/// A raw GPU memory address, as returned by `vkGetBufferDeviceAddress`. Address 0 is never a valid allocation.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Zeroable, Pod)]
pub struct DeviceAddress(u64);
const_assert_eq!(mem::size_of::<DeviceAddress>(), 8);

impl DeviceAddress {
	pub const NULL: Self = DeviceAddress(0);

	pub const fn new(address: u64) -> Self {
		Self(address)
	}

	pub const fn to_u64(&self) -> u64 {
		self.0
	}

	pub const fn is_null(&self) -> bool {
		self.0 == 0
	}

	/// `align` must be a power of two
	pub const fn is_aligned(&self, align: u64) -> bool {
		self.0 & (align - 1) == 0
	}

	pub const fn checked_add(&self, bytes: u64) -> Option<Self> {
		match self.0.checked_add(bytes) {
			Some(address) => Some(Self(address)),
			None => None,
		}
	}

	/// The byte distance from `base` to self, or None if self lies before `base`.
	pub const fn offset_from(&self, base: DeviceAddress) -> Option<u64> {
		self.0.checked_sub(base.0)
	}
}

impl Debug for DeviceAddress {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		write!(f, "DeviceAddress({:#x})", self.0)
	}
}

impl Display for DeviceAddress {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		write!(f, "{:#x}", self.0)
	}
}
