//! Error types for the Frameflight engine
//!
//! This module defines the error taxonomy used by the frame scheduler, the
//! surface chain and the graphics device backends.
//!
//! Staleness of the swapchain is not an error: it is reported through
//! `AcquireOutcome::Stale` / `PresentOutcome::Stale` and recovered internally.

use std::fmt;

/// Result type for Frameflight engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Frameflight engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan, mock device, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown handle, resource still in use, bad count)
    InvalidResource(String),

    /// Initialization failed (device, surface, frame resources)
    InitializationFailed(String),

    /// Capabilities query or allocation failed while building the surface chain
    ChainCreation(String),

    /// Image acquisition failed for a reason other than staleness
    Acquire(String),

    /// Recording, submission or presentation failed for a reason other than staleness
    Frame(String),

    /// Rebuilding the surface chain failed; rendering cannot continue
    Recreation(String),
}

impl Error {
    /// Whether the render loop has to stop (or the host must recreate the
    /// swapchain explicitly) after this error.
    ///
    /// Only `InvalidResource` is treated as a usage error that leaves the
    /// scheduler state untouched.
    pub fn is_fatal_for_rendering(&self) -> bool {
        !matches!(self, Error::InvalidResource(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ChainCreation(msg) => write!(f, "Surface chain creation failed: {}", msg),
            Error::Acquire(msg) => write!(f, "Image acquisition failed: {}", msg),
            Error::Frame(msg) => write!(f, "Frame failed: {}", msg),
            Error::Recreation(msg) => write!(f, "Swapchain recreation failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
