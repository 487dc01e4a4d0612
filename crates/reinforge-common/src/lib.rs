//! reinforge-common — Shared errors and helpers used across all reinforge crates.

pub mod error;
pub mod fs;
pub mod text;

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use fs::write_atomic;
pub use text::tail_chars;
