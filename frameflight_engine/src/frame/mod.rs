/// Frame module - surface chain, per-slot resources and the scheduler that drives them

pub mod surface_chain;
pub mod frame_resources;
pub mod image_ownership;
pub mod frame_counter;
pub mod resize;
pub mod frame_scheduler;

pub use surface_chain::*;
pub use frame_resources::*;
pub use image_ownership::*;
pub use frame_counter::*;
pub use resize::*;
pub use frame_scheduler::*;
