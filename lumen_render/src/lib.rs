/*!
# Lumen Render

Backend-agnostic render pass encoder.

Given a render target and a list of draw commands, this crate produces a
correctly ordered, correctly synchronized sequence of device commands:
attachment and sampled-texture layout transitions, the pass object and frame
buffer, per-draw descriptor writes and the indexed draws, with every touched
resource kept alive until the device is done with it.

## Architecture

- **RenderPass**: orchestrates one encode (transitions, begin/end, per-command loop)
- **BlitPass**: texture copies and mipmap generation on the same session
- **LayoutTracker**: per-texture recorded layout state and the barrier protocol
- **PassDescription** / **FramebufferDesc**: derived attachment layouts
- **Device**, **CommandEncoder**, **CommandList**: collaborator traits a backend implements

Backends (e.g. `lumen_render_vulkan`) provide concrete types that implement
these traits.
*/

// Internal modules
mod config;
mod engine;
mod error;
pub mod log;
pub mod renderer;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging router
    pub use crate::engine::Engine;

    // Encoder configuration
    pub use crate::config::Config;

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all encoding types
    pub mod render {
        pub use crate::renderer::*;
    }
}
