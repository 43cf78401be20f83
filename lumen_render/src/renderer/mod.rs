/// Renderer module - render pass encoding types and traits

// Data model
pub mod formats;
pub mod texture;
pub mod buffer;
pub mod sampler;
pub mod pipeline;
pub mod render_target;
pub mod command;

// Collaborator traits
pub mod device;
pub mod command_list;
pub mod command_encoder;

// Encoding
pub mod resource_state;
pub mod pass_description;
pub mod frame_buffer;
pub mod resource_binder;
pub mod draw_encoder;
pub mod render_pass;
pub mod blit_pass;

pub use formats::*;
pub use texture::*;
pub use buffer::*;
pub use sampler::*;
pub use pipeline::*;
pub use render_target::*;
pub use command::*;

pub use device::*;
pub use command_list::*;
pub use command_encoder::*;

pub use resource_state::*;
pub use pass_description::*;
pub use frame_buffer::*;
pub use resource_binder::*;
pub use draw_encoder::*;
pub use render_pass::*;
pub use blit_pass::*;

// Mock backend for tests (no GPU required)
#[cfg(test)]
pub mod mock;
