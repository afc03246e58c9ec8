use crate::descriptor::{ResourceKind, TableIndex};
use crate::memory::DeviceAddress;
use core::error::Error;
use core::fmt::{Display, Formatter};

/// Constructing a [`TypedRegion`](crate::memory::TypedRegion) failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegionError {
	NullAddress,
	Misaligned { address: DeviceAddress, align: u64 },
	AddressOverflow { address: DeviceAddress, count: u32, stride: u64 },
	SliceOutOfBounds { start: u32, len: u32, count: u32 },
}

impl Error for RegionError {}

impl Display for RegionError {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		match self {
			RegionError::NullAddress => write!(f, "Region must not start at the null address"),
			RegionError::Misaligned { address, align } => {
				write!(f, "Region address {} is not aligned to {} bytes", address, align)
			}
			RegionError::AddressOverflow { address, count, stride } => write!(
				f,
				"Region of {} elements with stride {} starting at {} overflows the address space",
				count, stride, address
			),
			RegionError::SliceOutOfBounds { start, len, count } => write!(
				f,
				"Slice {}..{} is out of bounds of region with {} elements",
				start,
				*start as u64 + *len as u64,
				count
			),
		}
	}
}

/// Reading through a draw payload failed. These are the errors the shader-side contract leaves undefined, reported
/// explicitly by the host-side resolution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessError {
	/// Element `index` was requested from a region holding only `count` elements.
	OutOfBounds { index: u32, count: u32 },
	/// The bytes `address..address + len` are not backed by a single live allocation.
	Unmapped { address: DeviceAddress, len: u64 },
	/// The table of `kind` has no live entry at `index`.
	Unbound { kind: ResourceKind, index: TableIndex },
}

impl Error for AccessError {}

impl Display for AccessError {
	fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
		match self {
			AccessError::OutOfBounds { index, count } => {
				write!(f, "Element {} is out of bounds of region with {} elements", index, count)
			}
			AccessError::Unmapped { address, len } => {
				write!(f, "{} bytes at {} are not backed by a live allocation", len, address)
			}
			AccessError::Unbound { kind, index } => {
				write!(f, "The {} table has no live entry at index {}", kind, index.to_u32())
			}
		}
	}
}
