#[cfg(feature = "ash")]
pub mod ash;
mod bindless;
pub mod host;

pub use bindless::*;
