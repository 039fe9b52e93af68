/*!
# Frameflight Engine

Backend-agnostic frame scheduling for explicit graphics APIs.

The crate drives a GPU through the `GraphicsDevice` trait: it keeps a bounded
number of frames in flight, tracks which submission last used each swapchain
image, and rebuilds the swapchain when the window is resized or the chain goes
stale. Backends (e.g. `frameflight_engine_renderer_vulkan`) implement the trait.

## Architecture

- **GraphicsDevice**: GPU context interface (swapchain, sync objects, commands)
- **SurfaceChain**: swapchain images with their views, framebuffers and depth attachment
- **FrameResources**: per-slot semaphores, fence and command target
- **FrameScheduler**: the acquire / record / submit / present cycle and swapchain recreation
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod frame;

// Main frameflight namespace module
pub mod frameflight {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine logging hub
    pub use crate::engine::Engine;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // GPU interface and shared types
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Frame scheduling
    pub mod frame {
        pub use crate::frame::*;
    }
}
