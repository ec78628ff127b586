//! Filter operations
//!
//! This module provides the iterative box blur and the pieces it is built from:
//! the per pixel kernel, the recursive span task and the buffer pair driver.

/// Per pixel filter kernels
pub mod kernels;

/// Recursive span splitting
pub mod span;

/// Filter operations
mod ops;
pub use ops::*;
