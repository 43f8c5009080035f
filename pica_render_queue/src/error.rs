//! Error types for the PICA render queue
//!
//! This module defines the error types used throughout the crate,
//! including target allocation, scheduler state and initialization.

use std::fmt;

/// Result type for render queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Render queue errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// VRAM, linear memory, target arena or command buffer exhausted
    OutOfMemory,

    /// Stale or unknown target handle
    InvalidResource(String),

    /// Operation not allowed in the current scheduler state
    InvalidState(String),

    /// Scheduler construction failed (bad config, command buffer allocation)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
