//! reinforge-reinvent — REINVENT4 side of the pipeline.
//!
//! 1. Building the staged-learning TOML, whose scoring function combines one
//!    DockStream endpoint per target with drug-likeness, molecular weight and
//!    structural alerts
//! 2. Ranking the molecules REINVENT reports in its summary CSV

pub mod document;
pub mod results;

pub use document::{
    build_learning_config, max_steps_for, Component, Endpoint, LearningDocument, LearningInputs,
    Transform, PRODUCTION_MAX_STEPS, TEST_MAX_STEPS,
};
pub use results::{analyze_results, TopMolecules};
