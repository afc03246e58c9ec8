mod bindless;
mod convert;
pub mod init;
mod memory;

pub use bindless::*;
pub use memory::*;
