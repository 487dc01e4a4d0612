//! Linear stage machine tying the pipeline steps together.

use reinforge_common::{PipelineError, Result};
use reinforge_config::{paths::display_relative, PipelineConfig};
use reinforge_dockstream::{build_docking_config, DockingDocument, DockingSettings};
use reinforge_reinvent::{analyze_results, build_learning_config, LearningDocument, LearningInputs, TopMolecules};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::discovery::{check_environments, resolve_tool_paths, ToolPaths};
use crate::launcher::{LaunchMode, LaunchOutcome, Launcher};
use crate::process::ToolRunner;
use crate::receptor::{ReceptorOutcome, ReceptorPreparer};
use crate::smoke::SmokeTest;
use crate::workspace::WorkspaceLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Init,
    DirsReady,
    ReceptorsReady,
    ConfigsWritten,
    SmokeTested,
    Launched,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::DirsReady => "dirs-ready",
            PipelineStage::ReceptorsReady => "receptors-ready",
            PipelineStage::ConfigsWritten => "configs-written",
            PipelineStage::SmokeTested => "smoke-tested",
            PipelineStage::Launched => "launched",
        };
        f.write_str(name)
    }
}

/// Documents produced by the config step.
#[derive(Debug, Clone)]
pub struct WrittenConfigs {
    pub docking: DockingDocument,
    pub docking_path: PathBuf,
    pub learning: LearningDocument,
    pub learning_path: PathBuf,
}

pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn ToolRunner>,
    stage: PipelineStage,
    tools: Option<ToolPaths>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            stage: PipelineStage::Init,
            tools: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn advance(&mut self, to: PipelineStage) {
        if to > self.stage {
            info!("Stage: {} → {}", self.stage, to);
            self.stage = to;
        }
    }

    async fn tool_paths(&mut self) -> Result<ToolPaths> {
        if let Some(tools) = &self.tools {
            return Ok(tools.clone());
        }
        let tools = resolve_tool_paths(&self.config, self.runner.as_ref()).await?;
        self.tools = Some(tools.clone());
        Ok(tools)
    }

    pub async fn check_environments(&self) -> Result<()> {
        check_environments(&self.config, self.runner.as_ref()).await
    }

    pub fn init_workspace(&mut self) -> Result<WorkspaceLayout> {
        let layout = WorkspaceLayout::ensure(&self.config.root())?;
        self.advance(PipelineStage::DirsReady);
        Ok(layout)
    }

    pub async fn prepare_receptors(&mut self) -> Result<Vec<ReceptorOutcome>> {
        let outcomes = ReceptorPreparer::new(&self.config, self.runner.as_ref())
            .prepare_all(&self.config.targets)
            .await?;
        self.advance(PipelineStage::ReceptorsReady);
        Ok(outcomes)
    }

    /// Build both documents, cross-check them, then write them.
    pub async fn write_configs(&mut self) -> Result<WrittenConfigs> {
        let tools = self.tool_paths().await?;
        let config = &self.config;
        let root = config.root();

        let settings = DockingSettings {
            pool_id: config.docking.pool_id.clone(),
            number_cores: config.docking.number_cores,
            number_poses: config.docking.number_poses,
            binary_location: tools.binary_location.clone(),
            root: root.clone(),
        };
        let docking = build_docking_config(&config.targets, &settings);
        docking.validate()?;

        let docking_path = config.docking_config_path();
        let inputs = LearningInputs {
            options: config.learning.clone(),
            prior_file: display_relative(&root, &config.prior_path()),
            configuration_path: display_relative(&root, &docking_path),
            docker_script_path: tools.docker_script.display().to_string(),
            docker_python_path: tools.python.clone(),
        };
        let learning = build_learning_config(&inputs, &config.targets);
        learning.check_run_references(&docking.run_ids())?;

        let learning_path = config.learning_config_path();
        docking.write_json(&docking_path)?;
        learning.write_toml(&learning_path)?;

        self.advance(PipelineStage::ConfigsWritten);
        Ok(WrittenConfigs {
            docking,
            docking_path,
            learning,
            learning_path,
        })
    }

    pub async fn smoke_test(&mut self) -> Result<f64> {
        let tools = self.tool_paths().await?;
        let score = SmokeTest::new(&self.config, self.runner.as_ref(), &tools).run().await?;
        self.advance(PipelineStage::SmokeTested);
        Ok(score)
    }

    pub async fn launch(&mut self, mode: LaunchMode) -> Result<LaunchOutcome> {
        let outcome = Launcher::new(&self.config, self.runner.as_ref()).launch(mode).await?;
        self.advance(PipelineStage::Launched);
        Ok(outcome)
    }

    /// Rank the trainer's summary and write the top molecules.
    pub fn analyze(&self, top_n: usize) -> Result<TopMolecules> {
        let top = analyze_results(&self.config.summary_csv_path(), &self.config.targets, top_n)?;
        top.write_csv(&self.config.top_molecules_path())?;
        Ok(top)
    }

    /// Every step in order; `launch = None` stops after the smoke test.
    pub async fn run(&mut self, launch: Option<LaunchMode>) -> Result<Option<LaunchOutcome>> {
        self.check_environments()
            .await
            .map_err(|e| e.in_step("environment check"))?;

        self.init_workspace().map_err(|e| e.in_step("workspace"))?;

        let outcomes = self
            .prepare_receptors()
            .await
            .map_err(|e| e.in_step("receptor preparation"))?;
        let converted = outcomes
            .iter()
            .filter(|o| matches!(o, ReceptorOutcome::Converted { .. }))
            .count();
        info!("{} receptors converted, {} already present", converted, outcomes.len() - converted);

        self.write_configs()
            .await
            .map_err(|e| e.in_step("config generation"))?;

        self.smoke_test().await.map_err(|e| e.in_step("smoke test"))?;

        let Some(mode) = launch else {
            let cmd = Launcher::new(&self.config, self.runner.as_ref()).command();
            info!("🏁 Setup complete. Launch manually with:");
            info!("   cd {} && {}", self.config.root().display(), cmd.display());
            return Ok(None);
        };

        let outcome = self.launch(mode).await.map_err(|e| e.in_step("launch"))?;
        Ok(Some(outcome))
    }
}

/// Log a reminder when a run is about to use the short step budget.
pub fn warn_if_test_mode(config: &PipelineConfig) {
    if config.learning.test_mode {
        warn!(
            "Test mode: {} learning steps. Pass --production for {}",
            reinforge_reinvent::TEST_MAX_STEPS,
            reinforge_reinvent::PRODUCTION_MAX_STEPS
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::FakeRunner;
    use crate::process::ToolOutput;

    const CONFIG: &str = r#"
[conda]
enabled = false

[[targets]]
name = "alpha"
role = "primary"
structure = "targets/alpha.pdb"
receptor = "targets/alpha.pdbqt"
run_id = "ALPHA"
box = { center_x = 1.0, center_y = 2.0, center_z = 3.0, size_x = 10.0, size_y = 10.0, size_z = 10.0 }

[[targets]]
name = "gamma"
role = "anti_target"
structure = "targets/gamma.pdb"
receptor = "targets/gamma.pdbqt"
run_id = "GAMMA"
box = { center_x = 4.0, center_y = 5.0, center_z = 6.0, size_x = 12.0, size_y = 12.0, size_z = 12.0 }
"#;

    fn pipeline(runner: Arc<FakeRunner>) -> (tempfile::TempDir, Pipeline) {
        let dir = tempfile::tempdir().unwrap();
        let dockstream = dir.path().join("DockStream");
        std::fs::create_dir_all(&dockstream).unwrap();
        std::fs::write(dockstream.join("docker.py"), "").unwrap();

        let mut config = PipelineConfig::from_toml_str(CONFIG).unwrap();
        config.workspace = dir.path().to_path_buf();
        (dir, Pipeline::new(config, runner))
    }

    #[test]
    fn test_stage_order() {
        assert!(PipelineStage::Init < PipelineStage::DirsReady);
        assert!(PipelineStage::SmokeTested < PipelineStage::Launched);
        assert_eq!(PipelineStage::ConfigsWritten.to_string(), "configs-written");
    }

    #[test]
    fn test_stage_never_moves_backwards() {
        let (_dir, mut p) = pipeline(Arc::new(FakeRunner::new(|_| ToolOutput::ok(""))));
        p.advance(PipelineStage::SmokeTested);
        p.init_workspace().unwrap();
        assert_eq!(p.stage(), PipelineStage::SmokeTested);
    }

    #[tokio::test]
    async fn test_write_configs_cross_references_runs() {
        let (dir, mut p) = pipeline(Arc::new(FakeRunner::new(|_| ToolOutput::ok(""))));
        let written = p.write_configs().await.unwrap();

        assert_eq!(written.docking.run_ids(), vec!["ALPHA", "GAMMA"]);
        assert_eq!(written.learning.dockstream_endpoints().count(), 2);
        assert!(dir.path().join("dockstream_config.json").exists());
        assert!(dir.path().join("rl_config.toml").exists());
        assert_eq!(p.stage(), PipelineStage::ConfigsWritten);
    }

    #[tokio::test]
    async fn test_missing_structure_reports_step() {
        let (_dir, mut p) = pipeline(Arc::new(FakeRunner::new(|_| ToolOutput::ok(""))));
        let err = p.run(None).await.unwrap_err();
        match &err {
            PipelineError::StepFailed { step, source } => {
                assert_eq!(step, "receptor preparation");
                assert!(matches!(**source, PipelineError::MissingPrerequisite { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(p.stage(), PipelineStage::DirsReady);
    }
}
