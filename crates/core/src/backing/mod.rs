//! Backing data structures for managing slots in the global descriptor set and their delayed destruction.

pub mod epoch;
pub mod range_set;
pub mod slot_array;
pub mod table;
