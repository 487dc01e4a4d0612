//! reinforge-config — Pipeline configuration for docking-guided staged learning.
//!
//! The whole run is described by one `reinforge.toml`: the workspace root,
//! the conda environments hosting DockStream and REINVENT4, and a table of
//! receptor targets with their search boxes and score windows.

pub mod config;
pub mod paths;
pub mod target;

pub use config::{
    CondaConfig, DiversityFilterOptions, DockingOptions, FilesConfig, LearningOptions,
    PipelineConfig, SmokeOptions, TimeoutConfig,
};
pub use paths::expand_home;
pub use target::{ScoreWindow, SearchBox, TargetRole, TargetSpec};
