use bindless_draw_shaders::descriptor::TableIndex;
use std::ops::Index;

/// A fixed size array of slots, indexed by [`TableIndex`].
pub struct SlotArray<T>(Box<[T]>);

impl<T: Default> SlotArray<T> {
	pub fn new(count: u32) -> Self {
		Self::new_generator(count, |_| T::default())
	}
}

impl<T> SlotArray<T> {
	pub fn new_generator(count: u32, f: impl FnMut(u32) -> T) -> Self {
		Self((0..count).map(f).collect::<Vec<_>>().into_boxed_slice())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn get(&self, index: TableIndex) -> Option<&T> {
		self.0.get(index.to_usize())
	}
}

impl<T> Index<TableIndex> for SlotArray<T> {
	type Output = T;

	fn index(&self, index: TableIndex) -> &Self::Output {
		self.0.index(index.to_usize())
	}
}
