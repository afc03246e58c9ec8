mod builder;

pub use bindless_draw_shaders::payload::*;
pub use builder::*;
