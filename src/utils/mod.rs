// Utility functions
pub mod encoding;
pub mod error;

pub use error::*;
