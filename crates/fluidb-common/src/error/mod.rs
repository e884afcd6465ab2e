//! Error handling for fluidb.
//!
//! This module provides a unified error type and result alias used
//! across all fluidb components.

mod store;

pub use store::{ErrorCode, FluidError};

/// Result type alias for fluidb operations.
pub type FluidResult<T> = std::result::Result<T, FluidError>;
