/// Graphics device module - GPU collaborator interface and the types it speaks

// Module declarations
pub mod graphics_device;
pub mod handles;
pub mod format;
pub mod swapchain;
pub mod frame_buffer;
pub mod command;

// Re-export everything from graphics_device.rs
pub use graphics_device::*;

// Re-export from other modules
pub use handles::*;
pub use format::*;
pub use swapchain::*;
pub use frame_buffer::*;
pub use command::*;

// Mock graphics device for tests (no GPU required)
#[cfg(any(test, feature = "mock-device"))]
pub mod mock_graphics_device;

#[cfg(any(test, feature = "mock-device"))]
pub use mock_graphics_device::{MockGraphicsDevice, MockState, MockStateHandle};
