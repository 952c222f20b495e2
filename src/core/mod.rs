//! Core betting logic

pub mod axis;

// Re-export commonly used types
pub use axis::{format_pair, select_axis};
