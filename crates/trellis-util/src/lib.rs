#![forbid(unsafe_code)]
//! Coordinates, path normalization, hashing, and filesystem helpers for Trellis.

pub mod archive;
pub mod coordinate;
pub mod error;
pub mod fs;
pub mod hash;

pub use coordinate::ModuleCoordinate;
pub use error::UtilError;
