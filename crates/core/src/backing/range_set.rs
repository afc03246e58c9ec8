use crate::backing::table::{Table, TableInterface};
use bindless_draw_shaders::descriptor::TableIndex;
use rangemap::RangeSet;
use std::ops::Range;

/// # Safety
/// all indices within `range` must be less than [`MAX_TABLE_CAPACITY`]
///
/// [`MAX_TABLE_CAPACITY`]: bindless_draw_shaders::descriptor::MAX_TABLE_CAPACITY
pub(crate) unsafe fn range_to_table_index(range: Range<u32>) -> impl Iterator<Item = TableIndex> {
	range.map(|i| unsafe { TableIndex::new_unchecked(i) })
}

pub(crate) fn table_index_to_range(index: TableIndex) -> Range<u32> {
	index.to_u32()..index.to_u32() + 1
}

/// A set of initialized slots of a table, stored as contiguous ranges so that platforms may write or destroy
/// descriptors in bulk.
#[derive(Debug)]
pub struct TableIndexRangeSet<'a, T> {
	range_set: RangeSet<u32>,
	table: &'a T,
}

impl<T> Clone for TableIndexRangeSet<'_, T> {
	fn clone(&self) -> Self {
		Self {
			table: self.table,
			range_set: self.range_set.clone(),
		}
	}
}

impl<'a, T> TableIndexRangeSet<'a, T> {
	/// # Safety
	/// indices must be initialized slots of the table
	pub unsafe fn from(table: &'a T, iter: impl Iterator<Item = TableIndex>) -> Self {
		Self {
			range_set: iter.map(table_index_to_range).collect(),
			table,
		}
	}

	/// # Safety
	/// indices must be initialized slots of the table
	pub unsafe fn new(table: &'a T, range_set: RangeSet<u32>) -> Self {
		Self { table, range_set }
	}

	pub fn is_empty(&self) -> bool {
		self.range_set.is_empty()
	}

	/// The amount of indices contained.
	pub fn len(&self) -> usize {
		self.range_set.iter().map(|r| r.len()).sum()
	}

	pub fn table(&self) -> &'a T {
		self.table
	}

	pub fn into_range_set(self) -> RangeSet<u32> {
		self.range_set
	}

	pub fn indices(&self) -> impl Iterator<Item = TableIndex> + '_ {
		// Safety: only valid indices are ever inserted
		self.range_set
			.iter()
			.cloned()
			.flat_map(|range| unsafe { range_to_table_index(range) })
	}
}

impl<I: TableInterface> TableIndexRangeSet<'_, Table<I>> {
	/// Iterate over all contiguous ranges, each with an iterator over the slots it contains.
	pub fn iter_ranges(
		&self,
	) -> impl Iterator<Item = (Range<u32>, impl Iterator<Item = (TableIndex, &I::Slot)>)> + '_ {
		// Safety: indices are guaranteed to be initialized by constructor
		self.range_set.iter().map(move |range| unsafe {
			(
				range.clone(),
				range_to_table_index(range.clone()).map(move |i| (i, self.table.get_slot_unchecked(i))),
			)
		})
	}

	pub fn iter(&self) -> impl Iterator<Item = (TableIndex, &I::Slot)> + '_ {
		// Safety: indices are guaranteed to be initialized by constructor
		self.indices().map(move |i| unsafe { (i, self.table.get_slot_unchecked(i)) })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merges_ranges() {
		let indices = [0, 1, 2, 7, 5, 6, 10].map(|i| TableIndex::new(i).unwrap());
		let set = unsafe { TableIndexRangeSet::from(&(), indices.into_iter()) };
		assert_eq!(set.len(), 7);
		assert_eq!(set.clone().into_range_set().iter().cloned().collect::<Vec<_>>(), [0..3, 5..8, 10..11]);
		assert_eq!(
			set.indices().map(|i| i.to_u32()).collect::<Vec<_>>(),
			[0, 1, 2, 5, 6, 7, 10]
		);
	}
}
