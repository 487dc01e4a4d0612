//! Configuration loading for reinforge.
//! Reads reinforge.toml from an explicit path, the REINFORGE_CONFIG env var,
//! or the current directory, in that order.

use reinforge_common::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::paths::{expand_home, resolve_against};
use crate::target::TargetSpec;

pub const CONFIG_ENV_VAR: &str = "REINFORGE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "reinforge.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workspace root; relative paths elsewhere resolve against it
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// DockStream checkout containing docker.py; auto-discovered when absent
    pub dockstream_path: Option<PathBuf>,

    /// REINVENT prior model, used as both prior and agent
    #[serde(default = "default_prior_file")]
    pub prior_file: PathBuf,

    /// REINVENT4 entry point; run inside `conda.reinvent_env` when conda is enabled
    #[serde(default = "default_reinvent_executable")]
    pub reinvent_executable: String,

    #[serde(default)]
    pub conda: CondaConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub docking: DockingOptions,
    #[serde(default)]
    pub learning: LearningOptions,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub smoke: SmokeOptions,

    #[serde(default)]
    pub targets: Vec<TargetSpec>,
}

fn default_workspace()  -> PathBuf { PathBuf::from(".") }
fn default_prior_file() -> PathBuf { PathBuf::from("reinvent.prior") }
fn default_reinvent_executable() -> String { "reinvent".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CondaConfig {
    /// Run external tools through `conda run -n <env>`
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Conda installation root; `conda info --base` when absent
    pub base: Option<PathBuf>,
    #[serde(default = "default_dockstream_env")]
    pub dockstream_env: String,
    #[serde(default = "default_reinvent_env")]
    pub reinvent_env: String,
}

fn bool_true()              -> bool   { true }
fn default_dockstream_env() -> String { "DockStream".to_string() }
fn default_reinvent_env()   -> String { "reinvent4".to_string() }

impl Default for CondaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base: None,
            dockstream_env: default_dockstream_env(),
            reinvent_env: default_reinvent_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_docking_config")]
    pub docking_config: PathBuf,
    #[serde(default = "default_learning_config")]
    pub learning_config: PathBuf,
    #[serde(default = "default_launch_log")]
    pub launch_log: PathBuf,
    #[serde(default = "default_launch_stdout")]
    pub launch_stdout: PathBuf,
    #[serde(default = "default_pid_file")]
    pub pid_file: PathBuf,
    #[serde(default = "default_top_molecules")]
    pub top_molecules: PathBuf,
}

fn default_docking_config()  -> PathBuf { PathBuf::from("dockstream_config.json") }
fn default_learning_config() -> PathBuf { PathBuf::from("rl_config.toml") }
fn default_launch_log()      -> PathBuf { PathBuf::from("results/rl_run.log") }
fn default_launch_stdout()   -> PathBuf { PathBuf::from("results/reinvent.out") }
fn default_pid_file()        -> PathBuf { PathBuf::from("results/reinvent.pid") }
fn default_top_molecules()   -> PathBuf { PathBuf::from("results/top10_selective.csv") }

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            docking_config: default_docking_config(),
            learning_config: default_learning_config(),
            launch_log: default_launch_log(),
            launch_stdout: default_launch_stdout(),
            pid_file: default_pid_file(),
            top_molecules: default_top_molecules(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingOptions {
    #[serde(default = "default_pool_id")]
    pub pool_id: String,
    #[serde(default = "default_cores")]
    pub number_cores: u32,
    #[serde(default = "default_poses")]
    pub number_poses: u32,
}

fn default_pool_id() -> String { "RDkit".to_string() }
fn default_cores()   -> u32    { 4 }
fn default_poses()   -> u32    { 1 }

impl Default for DockingOptions {
    fn default() -> Self {
        Self {
            pool_id: default_pool_id(),
            number_cores: default_cores(),
            number_poses: default_poses(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningOptions {
    /// Short run (5 steps) instead of the production budget (100 steps)
    #[serde(default = "bool_true")]
    pub test_mode: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_tb_logdir")]
    pub tb_logdir: String,
    #[serde(default = "default_summary_prefix")]
    pub summary_csv_prefix: String,
    #[serde(default)]
    pub diversity_filter: DiversityFilterOptions,
}

fn default_batch_size()     -> u32    { 20 }
fn default_sigma()          -> f64    { 128.0 }
fn default_rate()           -> f64    { 0.0001 }
fn default_device()         -> String { "cpu".to_string() }
fn default_tb_logdir()      -> String { "tb_logs".to_string() }
fn default_summary_prefix() -> String { "results/rl".to_string() }

impl Default for LearningOptions {
    fn default() -> Self {
        Self {
            test_mode: true,
            batch_size: default_batch_size(),
            sigma: default_sigma(),
            rate: default_rate(),
            device: default_device(),
            tb_logdir: default_tb_logdir(),
            summary_csv_prefix: default_summary_prefix(),
            diversity_filter: DiversityFilterOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityFilterOptions {
    #[serde(default = "default_filter_type")]
    pub kind: String,
    #[serde(default = "default_minscore")]
    pub minscore: f64,
    #[serde(default = "default_bucket_size")]
    pub bucket_size: u32,
    pub minsimilarity: Option<f64>,
    pub penalty_multiplier: Option<f64>,
}

fn default_filter_type() -> String { "IdenticalMurckoScaffold".to_string() }
fn default_minscore()    -> f64    { 0.4 }
fn default_bucket_size() -> u32    { 25 }

impl Default for DiversityFilterOptions {
    fn default() -> Self {
        Self {
            kind: default_filter_type(),
            minscore: default_minscore(),
            bucket_size: default_bucket_size(),
            minsimilarity: None,
            penalty_multiplier: None,
        }
    }
}

/// Wall-clock limits for external calls, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_env_check_secs")]
    pub env_check: u64,
    #[serde(default = "default_fetch_secs")]
    pub fetch: u64,
    #[serde(default = "default_receptor_secs")]
    pub receptor: u64,
    #[serde(default = "default_smoke_secs")]
    pub smoke_test: u64,
    /// Foreground training run; unbounded when absent
    pub launch: Option<u64>,
}

fn default_env_check_secs() -> u64 { 60 }
fn default_fetch_secs()     -> u64 { 120 }
fn default_receptor_secs()  -> u64 { 600 }
fn default_smoke_secs()     -> u64 { 900 }

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            env_check: default_env_check_secs(),
            fetch: default_fetch_secs(),
            receptor: default_receptor_secs(),
            smoke_test: default_smoke_secs(),
            launch: None,
        }
    }
}

impl TimeoutConfig {
    pub fn env_check(&self) -> Duration { Duration::from_secs(self.env_check) }
    pub fn fetch(&self)     -> Duration { Duration::from_secs(self.fetch) }
    pub fn receptor(&self)  -> Duration { Duration::from_secs(self.receptor) }
    pub fn smoke_test(&self) -> Duration { Duration::from_secs(self.smoke_test) }
    pub fn launch(&self)    -> Option<Duration> { self.launch.map(Duration::from_secs) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeOptions {
    /// Characters of stderr surfaced when the smoke test fails
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail: usize,
}

fn default_stderr_tail() -> usize { 800 }

impl Default for SmokeOptions {
    fn default() -> Self {
        Self { stderr_tail: default_stderr_tail() }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            dockstream_path: None,
            prior_file: default_prior_file(),
            reinvent_executable: default_reinvent_executable(),
            conda: CondaConfig::default(),
            files: FilesConfig::default(),
            docking: DockingOptions::default(),
            learning: LearningOptions::default(),
            timeouts: TimeoutConfig::default(),
            smoke: SmokeOptions::default(),
            targets: vec![],
        }
    }
}

#[cfg(test)]
mod tests;

impl PipelineConfig {
    /// Load configuration from reinforge.toml.
    /// An explicit path wins, then REINFORGE_CONFIG, then the current directory.
    /// A relative `workspace` is anchored at the config file's directory.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        if !path.exists() {
            return Err(PipelineError::missing(
                "configuration file",
                &path,
                "Copy reinforge.example.toml to reinforge.toml and edit the [[targets]] table.",
            ));
        }

        debug!("Loading configuration from {:?}", path);
        let content = std::fs::read_to_string(&path)?;
        let mut config: PipelineConfig = toml::from_str(&content)?;

        let config_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.workspace = resolve_against(config_dir, &config.workspace);

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without touching the filesystem.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not depend on the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.learning.batch_size == 0 {
            return Err(PipelineError::Config("learning.batch_size must be positive".to_string()));
        }
        if self.docking.number_poses == 0 {
            return Err(PipelineError::Config("docking.number_poses must be positive".to_string()));
        }
        if self.docking.pool_id.trim().is_empty() {
            return Err(PipelineError::Config("docking.pool_id must not be empty".to_string()));
        }
        if self.reinvent_executable.trim().is_empty() {
            return Err(PipelineError::Config("reinvent_executable must not be empty".to_string()));
        }

        if self.targets.is_empty() {
            warn!("No [[targets]] configured; the docking config will contain zero runs");
        }

        let mut names = HashSet::new();
        let mut run_ids = HashSet::new();
        for t in &self.targets {
            if t.name.trim().is_empty() || t.run_id.trim().is_empty() {
                return Err(PipelineError::Config(
                    "every target needs a non-empty name and run_id".to_string(),
                ));
            }
            if !names.insert(t.name.as_str()) {
                return Err(PipelineError::Config(format!("duplicate target name '{}'", t.name)));
            }
            if !run_ids.insert(t.run_id.as_str()) {
                return Err(PipelineError::Config(format!("duplicate run_id '{}'", t.run_id)));
            }
            let pool = t.pool_ref(&self.docking.pool_id);
            if pool != self.docking.pool_id {
                return Err(PipelineError::Config(format!(
                    "target '{}' references unknown embedding pool '{}' (configured: '{}')",
                    t.name, pool, self.docking.pool_id
                )));
            }
            if !t.search_box.is_valid() {
                return Err(PipelineError::Config(format!(
                    "target '{}' has a non-finite or empty search box",
                    t.name
                )));
            }
            let window = t.score_window();
            if !window.is_valid() {
                return Err(PipelineError::Config(format!(
                    "target '{}' score window needs high > low and k > 0 (high={}, low={}, k={})",
                    t.name, window.high, window.low, window.k
                )));
            }
            if !t.weight.is_finite() || t.weight < 0.0 {
                return Err(PipelineError::Config(format!(
                    "target '{}' weight must be a non-negative number",
                    t.name
                )));
            }
        }

        Ok(())
    }

    /// Workspace root with `~` expanded.
    pub fn root(&self) -> PathBuf {
        expand_home(&self.workspace)
    }

    /// Anchor a configured path at the workspace root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_against(&self.root(), path)
    }

    pub fn docking_config_path(&self)  -> PathBuf { self.resolve(&self.files.docking_config) }
    pub fn learning_config_path(&self) -> PathBuf { self.resolve(&self.files.learning_config) }
    pub fn launch_log_path(&self)      -> PathBuf { self.resolve(&self.files.launch_log) }
    pub fn launch_stdout_path(&self)   -> PathBuf { self.resolve(&self.files.launch_stdout) }
    pub fn pid_file_path(&self)        -> PathBuf { self.resolve(&self.files.pid_file) }
    pub fn top_molecules_path(&self)   -> PathBuf { self.resolve(&self.files.top_molecules) }
    pub fn prior_path(&self)           -> PathBuf { self.resolve(&self.prior_file) }

    /// Summary CSV written by REINVENT for the single stage.
    pub fn summary_csv_path(&self) -> PathBuf {
        self.resolve(Path::new(&format!("{}_1.csv", self.learning.summary_csv_prefix)))
    }
}
