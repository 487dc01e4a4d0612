//! reinforge-dockstream — DockStream side of the pipeline.
//!
//! 1. Building the docking configuration consumed by `docker.py`
//! 2. Parsing the score DockStream prints for a single ligand

pub mod document;
pub mod score;

pub use document::{build_docking_config, DockingDocument, DockingSettings};
pub use score::{parse_docking_score, ScoreParseError};
