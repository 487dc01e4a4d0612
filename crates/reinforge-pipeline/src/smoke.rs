//! One-ligand docking run that proves the DockStream setup works before a
//! long training run depends on it.

use reinforge_common::{tail_chars, PipelineError, Result};
use reinforge_config::PipelineConfig;
use reinforge_dockstream::parse_docking_score;
use tracing::{debug, info};

use crate::discovery::{env_for, ToolPaths};
use crate::process::{run_checked, ToolCommand, ToolRunner};

/// Aspirin.
pub const REFERENCE_SMILES: &str = "CC(=O)Oc1ccccc1C(=O)O";
pub const OUTPUT_PREFIX: &str = "test";

pub struct SmokeTest<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn ToolRunner,
    tools: &'a ToolPaths,
}

impl<'a> SmokeTest<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn ToolRunner, tools: &'a ToolPaths) -> Self {
        Self { config, runner, tools }
    }

    pub fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.tools.python)
            .path_arg(&self.tools.docker_script)
            .arg("-conf")
            .path_arg(&self.config.docking_config_path())
            .arg("-output_prefix")
            .arg(OUTPUT_PREFIX)
            .arg("-smiles")
            .arg(REFERENCE_SMILES)
            .arg("-print_scores")
            .in_env(env_for(self.config, &self.config.conda.dockstream_env))
            .current_dir(&self.config.root())
            .timeout(Some(self.config.timeouts.smoke_test()))
    }

    /// Dock the reference ligand and return its score.
    pub async fn run(&self) -> Result<f64> {
        let docking_config = self.config.docking_config_path();
        if !docking_config.exists() {
            return Err(PipelineError::missing(
                "docking configuration",
                docking_config,
                "Run `reinforge configs` first.",
            ));
        }

        info!("🔬 Smoke test: docking {} with DockStream", REFERENCE_SMILES);
        let output = run_checked(self.runner, &self.command()).await?;
        debug!("docker.py stdout:\n{}", output.stdout);

        match parse_docking_score(&output.stdout) {
            Ok(score) => {
                info!("✅ Smoke test docking score: {:.2}", score);
                Ok(score)
            }
            Err(e) => Err(PipelineError::SmokeTest {
                reason: e.to_string(),
                stderr_tail: tail_chars(&output.stderr, self.config.smoke.stderr_tail).to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::FakeRunner;
    use crate::process::ToolOutput;
    use std::path::PathBuf;

    fn setup() -> (tempfile::TempDir, PipelineConfig, ToolPaths) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dockstream_config.json"), "{}").unwrap();
        let mut config = PipelineConfig::default();
        config.workspace = dir.path().to_path_buf();
        config.smoke.stderr_tail = 10;
        let tools = ToolPaths {
            binary_location: "/opt/conda/envs/DockStream/bin".to_string(),
            python: "/opt/conda/envs/DockStream/bin/python".to_string(),
            docker_script: PathBuf::from("/opt/DockStream/docker.py"),
        };
        (dir, config, tools)
    }

    #[tokio::test]
    async fn test_score_from_last_line() {
        let (dir, config, tools) = setup();
        let runner = FakeRunner::new(|_| ToolOutput::ok("RDKit WARNING: something\n-6.3\n"));

        let score = SmokeTest::new(&config, &runner, &tools).run().await.unwrap();
        assert_eq!(score, -6.3);

        let cmd = &runner.calls()[0];
        let conf = dir.path().join("dockstream_config.json").display().to_string();
        assert_eq!(
            cmd.argv(),
            vec![
                "conda",
                "run",
                "-n",
                "DockStream",
                "/opt/conda/envs/DockStream/bin/python",
                "/opt/DockStream/docker.py",
                "-conf",
                conf.as_str(),
                "-output_prefix",
                "test",
                "-smiles",
                REFERENCE_SMILES,
                "-print_scores",
            ]
        );
        assert_eq!(cmd.cwd.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_unparseable_output_carries_stderr_tail() {
        let (_dir, config, tools) = setup();
        let runner = FakeRunner::new(|_| ToolOutput {
            stderr: "long prefix ... rdkit failed".to_string(),
            ..ToolOutput::ok("WARNING: ligand 0 failed\n")
        });

        let err = SmokeTest::new(&config, &runner, &tools).run().await.unwrap_err();
        match err {
            PipelineError::SmokeTest { reason, stderr_tail } => {
                assert!(reason.contains("WARNING: ligand 0 failed"));
                assert_eq!(stderr_tail, "kit failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_stdout_fails() {
        let (_dir, config, tools) = setup();
        let runner = FakeRunner::new(|_| ToolOutput::ok(""));
        let err = SmokeTest::new(&config, &runner, &tools).run().await.unwrap_err();
        assert!(matches!(err, PipelineError::SmokeTest { .. }));
    }

    #[tokio::test]
    async fn test_tool_failure_propagates() {
        let (_dir, config, tools) = setup();
        let runner = FakeRunner::new(|_| ToolOutput::failed(1, "Traceback"));
        let err = SmokeTest::new(&config, &runner, &tools).run().await.unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_config_is_prerequisite() {
        let (dir, config, tools) = setup();
        std::fs::remove_file(dir.path().join("dockstream_config.json")).unwrap();
        let runner = FakeRunner::new(|_| ToolOutput::ok("-6.3"));
        let err = SmokeTest::new(&config, &runner, &tools).run().await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingPrerequisite { .. }));
        assert!(runner.calls().is_empty());
    }
}
