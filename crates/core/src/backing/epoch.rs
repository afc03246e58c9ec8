use std::ops::{Index, IndexMut, Not};

/// Frames alternate between two epochs. Slots retired while writing into one epoch's queue are only destroyed once all
/// frames of the other epoch have completed.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Epoch {
	Even,
	Odd,
}

impl Epoch {
	pub const VALUES: [Epoch; 2] = [Epoch::Even, Epoch::Odd];

	pub fn to_u32(&self) -> u32 {
		*self as u32
	}

	pub fn from_u32(value: u32) -> Option<Self> {
		match value {
			0 => Some(Epoch::Even),
			1 => Some(Epoch::Odd),
			_ => None,
		}
	}
}

impl Not for Epoch {
	type Output = Epoch;

	#[inline]
	fn not(self) -> Self::Output {
		match self {
			Epoch::Even => Epoch::Odd,
			Epoch::Odd => Epoch::Even,
		}
	}
}

/// An `[T; 2]` that can be indexed by [`Epoch`].
#[derive(Copy, Clone, Debug)]
pub struct EpochArray<T>([T; 2]);

impl<T> EpochArray<T> {
	#[inline]
	pub fn new(mut f: impl FnMut() -> T) -> Self {
		Self([f(), f()])
	}
}

impl<T> Index<Epoch> for EpochArray<T> {
	type Output = T;

	#[inline]
	fn index(&self, index: Epoch) -> &Self::Output {
		self.0.index(index as usize)
	}
}

impl<T> IndexMut<Epoch> for EpochArray<T> {
	#[inline]
	fn index_mut(&mut self, index: Epoch) -> &mut Self::Output {
		self.0.index_mut(index as usize)
	}
}

#[cfg(test)]
mod tests {
	use super::Epoch::*;
	use super::*;

	#[test]
	fn test_epoch() {
		assert_eq!(!Even, Odd);
		assert_eq!(!Odd, Even);
		assert_eq!(Some(Even), Epoch::from_u32(Even.to_u32()));
		assert_eq!(Some(Odd), Epoch::from_u32(Odd.to_u32()));
		assert_eq!(None, Epoch::from_u32(2));

		let mut array = EpochArray::new(|| 0);
		assert_eq!(array[Even], 0);
		assert_eq!(array[Odd], 0);

		array[Even] = 42;
		array[Odd] = 69;
		assert_eq!(array[Even], 42);
		assert_eq!(array[Odd], 69);
	}
}
