mod draw_payload;
mod shader_input;
mod vertex;

pub use draw_payload::*;
pub use shader_input::*;
pub use vertex::*;
