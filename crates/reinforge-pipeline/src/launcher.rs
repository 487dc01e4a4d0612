//! REINVENT4 staged-learning launch.

use reinforge_common::{write_atomic, PipelineError, Result};
use reinforge_config::{paths::display_relative, PipelineConfig};
use std::path::PathBuf;
use tracing::info;

use crate::discovery::env_for;
use crate::process::{run_checked, spawn_detached, ToolCommand, ToolRunner};

pub const PRIOR_DOWNLOAD_URL: &str = "https://zenodo.org/records/10930189/files/reinvent.prior";
pub const REINVENT_RELEASES_URL: &str = "https://github.com/MolecularAI/REINVENT4/releases";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Wait for the trainer to exit
    Foreground,
    /// Start the trainer in its own process group and return
    Detached,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    Completed,
    Detached { pid: u32, pid_file: PathBuf },
}

pub struct Launcher<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn ToolRunner,
}

impl<'a> Launcher<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    pub fn command(&self) -> ToolCommand {
        let root = self.config.root();
        ToolCommand::new(self.config.reinvent_executable.as_str())
            .arg("-l")
            .arg(display_relative(&root, &self.config.launch_log_path()))
            .arg(display_relative(&root, &self.config.learning_config_path()))
            .in_env(env_for(self.config, &self.config.conda.reinvent_env))
            .current_dir(&root)
    }

    pub fn check_prerequisites(&self) -> Result<()> {
        let prior = self.config.prior_path();
        if !prior.exists() {
            return Err(PipelineError::missing(
                "REINVENT prior model",
                prior,
                format!(
                    "Download it with `wget {PRIOR_DOWNLOAD_URL}` or from {REINVENT_RELEASES_URL} and place it in the workspace."
                ),
            ));
        }
        let learning = self.config.learning_config_path();
        if !learning.exists() {
            return Err(PipelineError::missing(
                "learning configuration",
                learning,
                "Run `reinforge configs` first.",
            ));
        }
        Ok(())
    }

    pub async fn launch(&self, mode: LaunchMode) -> Result<LaunchOutcome> {
        self.check_prerequisites()?;
        let cmd = self.command();

        if let Some(parent) = self.config.launch_log_path().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stdout = self.config.launch_stdout_path();
        match mode {
            LaunchMode::Foreground => {
                info!("🚀 Launching REINVENT4 staged learning");
                info!("   Monitor with: tail -f {}", stdout.display());
                let cmd = cmd.timeout(self.config.timeouts.launch()).log_to(&stdout);
                run_checked(self.runner, &cmd).await?;
                info!("✅ REINVENT4 run finished, log at {}", self.config.launch_log_path().display());
                Ok(LaunchOutcome::Completed)
            }
            LaunchMode::Detached => {
                let pid = spawn_detached(&cmd, &stdout)?;
                let pid_file = self.config.pid_file_path();
                write_atomic(&pid_file, format!("{pid}\n").as_bytes())?;
                info!("🚀 REINVENT4 running in background (PID {})", pid);
                info!("   Monitor with: tail -f {}", stdout.display());
                Ok(LaunchOutcome::Detached { pid, pid_file })
            }
        }
    }
}
