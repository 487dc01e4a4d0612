//! reinforge-pipeline — Orchestrator for docking-guided staged learning.
//!
//! This crate drives the external toolchain in a fixed order:
//! 1. Creating the workspace layout (targets/, results/, poses/)
//! 2. Preparing receptors with Open Babel (PDB → PDBQT)
//! 3. Writing the DockStream and REINVENT4 configurations
//! 4. Smoke-testing DockStream on a reference ligand
//! 5. Launching REINVENT4 staged learning

pub mod discovery;
pub mod launcher;
pub mod pipeline;
pub mod process;
pub mod receptor;
pub mod smoke;
pub mod structure;
pub mod workspace;

pub use launcher::{LaunchMode, LaunchOutcome, Launcher};
pub use pipeline::{Pipeline, PipelineStage, WrittenConfigs};
pub use process::{ProcessRunner, ToolCommand, ToolOutput, ToolRunner};
pub use receptor::{ReceptorOutcome, ReceptorPreparer};
pub use smoke::SmokeTest;
pub use workspace::WorkspaceLayout;

pub type Result<T> = reinforge_common::Result<T>;
