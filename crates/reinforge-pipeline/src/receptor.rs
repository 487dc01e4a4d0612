//! Receptor preparation: PDB → PDBQT with Open Babel.

use reinforge_common::{PipelineError, Result};
use reinforge_config::{PipelineConfig, TargetSpec};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::discovery::env_for;
use crate::process::{run_checked, ToolCommand, ToolRunner};
use crate::structure::{clean_copy_path, write_clean_copy, StructureFetcher};

#[derive(Debug, Clone, PartialEq)]
pub enum ReceptorOutcome {
    /// Output already present; nothing was run
    Skipped { target: String, receptor: PathBuf },
    Converted { target: String, receptor: PathBuf },
}

impl ReceptorOutcome {
    pub fn receptor(&self) -> &Path {
        match self {
            ReceptorOutcome::Skipped { receptor, .. } | ReceptorOutcome::Converted { receptor, .. } => receptor,
        }
    }
}

/// Temp output next to the receptor, keeping the `.pdbqt` extension obabel
/// uses to pick the output format.
pub fn partial_receptor_path(receptor: &Path) -> PathBuf {
    let stem = receptor
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = receptor
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pdbqt".to_string());
    receptor.with_file_name(format!("{stem}.partial.{ext}"))
}

pub fn obabel_command(input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new("obabel")
        .path_arg(input)
        .arg("-O")
        .path_arg(output)
        .arg("-xr")
        .arg("--partialcharge")
        .arg("gasteiger")
}

pub struct ReceptorPreparer<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn ToolRunner,
}

impl<'a> ReceptorPreparer<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn ToolRunner) -> Self {
        Self { config, runner }
    }

    pub async fn prepare_all(&self, targets: &[TargetSpec]) -> Result<Vec<ReceptorOutcome>> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.prepare(target).await?);
        }
        Ok(outcomes)
    }

    pub async fn prepare(&self, target: &TargetSpec) -> Result<ReceptorOutcome> {
        let receptor = self.config.resolve(&target.receptor);
        if receptor.exists() {
            info!("⏭️  {} receptor already prepared: {}", target.display_label(), receptor.display());
            return Ok(ReceptorOutcome::Skipped {
                target: target.name.clone(),
                receptor,
            });
        }

        let structure = self.ensure_structure(target).await?;
        let input = match target.chain.as_deref().map(str::trim) {
            Some(chain) => {
                let mut chars = chain.chars();
                let (Some(id), None) = (chars.next(), chars.next()) else {
                    return Err(PipelineError::Config(format!(
                        "target '{}' chain must be a single character, got '{}'",
                        target.name, chain
                    )));
                };
                let clean = clean_copy_path(&receptor);
                if write_clean_copy(&structure, id, &clean)? == 0 {
                    let _ = std::fs::remove_file(&clean);
                    return Err(PipelineError::Config(format!(
                        "target '{}': chain '{}' has no ATOM records in {}",
                        target.name,
                        id,
                        structure.display()
                    )));
                }
                clean
            }
            None => structure,
        };

        info!("🧪 Preparing {} receptor with Open Babel", target.display_label());
        let tmp = partial_receptor_path(&receptor);
        if let Some(parent) = receptor.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let cmd = obabel_command(&input, &tmp)
            .in_env(env_for(self.config, &self.config.conda.dockstream_env))
            .current_dir(&self.config.root())
            .timeout(Some(self.config.timeouts.receptor()));

        if let Err(e) = run_checked(self.runner, &cmd).await {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        if !tmp.exists() {
            return Err(PipelineError::ToolFailed {
                tool: "obabel".to_string(),
                status: "exit status: 0".to_string(),
                stderr_tail: format!("no output written to {}", tmp.display()),
            });
        }
        std::fs::rename(&tmp, &receptor)?;
        info!("✅ {} ready", receptor.display());

        Ok(ReceptorOutcome::Converted {
            target: target.name.clone(),
            receptor,
        })
    }

    /// Structure path, downloading it from RCSB when a PDB id is configured.
    async fn ensure_structure(&self, target: &TargetSpec) -> Result<PathBuf> {
        let structure = self.config.resolve(&target.structure);
        if structure.exists() {
            return Ok(structure);
        }
        match &target.pdb_id {
            Some(pdb_id) => {
                let fetcher = StructureFetcher::new(self.config.timeouts.fetch())?;
                fetcher.fetch_pdb(pdb_id, &structure).await
            }
            None => Err(PipelineError::missing(
                format!("{} structure", target.display_label()),
                structure,
                "Download the PDB file into targets/ or set pdb_id so it can be fetched from RCSB.",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::FakeRunner;
    use crate::process::ToolOutput;
    use reinforge_config::{SearchBox, TargetRole};

    const STRUCTURE: &str = "\
ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  N   GLY B   1      12.104   7.134  -6.504  1.00  0.00           N
HETATM    3  O   HOH A 101      10.000  10.000  10.000  1.00  0.00           O
END
";

    fn target(name: &str) -> TargetSpec {
        TargetSpec {
            name: name.to_string(),
            label: None,
            role: TargetRole::Primary,
            structure: PathBuf::from(format!("targets/{name}.pdb")),
            receptor: PathBuf::from(format!("targets/{name}.pdbqt")),
            run_id: name.to_uppercase(),
            pool: None,
            search_box: SearchBox {
                center_x: 0.0,
                center_y: 0.0,
                center_z: 0.0,
                size_x: 10.0,
                size_y: 10.0,
                size_z: 10.0,
            },
            score: None,
            weight: 1.0,
            pdb_id: None,
            chain: None,
        }
    }

    fn workspace() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("targets")).unwrap();
        let mut config = PipelineConfig::default();
        config.workspace = dir.path().to_path_buf();
        (dir, config)
    }

    /// Writes whatever file obabel was asked to produce.
    fn obabel_ok() -> FakeRunner {
        FakeRunner::new(|cmd| {
            if let Some(out) = cmd.flag_value("-O") {
                std::fs::write(out, "REMARK pdbqt\n").unwrap();
            }
            ToolOutput::ok("1 molecule converted")
        })
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_receptor_path(Path::new("targets/ppar_alpha.pdbqt")),
            PathBuf::from("targets/ppar_alpha.partial.pdbqt")
        );
    }

    #[test]
    fn test_obabel_arguments() {
        let cmd = obabel_command(Path::new("in.pdb"), Path::new("out.pdbqt"));
        assert_eq!(
            cmd.argv(),
            vec!["obabel", "in.pdb", "-O", "out.pdbqt", "-xr", "--partialcharge", "gasteiger"]
        );
    }

    #[tokio::test]
    async fn test_existing_receptor_is_skipped() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdbqt"), "done").unwrap();
        let runner = obabel_ok();

        let outcomes = ReceptorPreparer::new(&config, &runner)
            .prepare_all(&[target("alpha")])
            .await
            .unwrap();
        assert!(matches!(outcomes[0], ReceptorOutcome::Skipped { .. }));
        assert!(runner.calls().is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("targets/alpha.pdbqt")).unwrap(), "done");
    }

    #[tokio::test]
    async fn test_converts_in_dockstream_env() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdb"), STRUCTURE).unwrap();
        let runner = obabel_ok();

        let outcomes = ReceptorPreparer::new(&config, &runner)
            .prepare_all(&[target("alpha")])
            .await
            .unwrap();
        assert!(matches!(outcomes[0], ReceptorOutcome::Converted { .. }));
        assert!(dir.path().join("targets/alpha.pdbqt").exists());
        assert!(!dir.path().join("targets/alpha.partial.pdbqt").exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].conda_env.as_deref(), Some("DockStream"));
        assert_eq!(calls[0].cwd.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_chain_is_cleaned_before_conversion() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdb"), STRUCTURE).unwrap();
        let mut t = target("alpha");
        t.chain = Some("A".to_string());
        let runner = obabel_ok();

        ReceptorPreparer::new(&config, &runner).prepare(&t).await.unwrap();

        let clean = dir.path().join("targets/alpha_clean.pdb");
        let text = std::fs::read_to_string(&clean).unwrap();
        assert!(text.contains("MET A"));
        assert!(!text.contains("GLY B"));
        assert!(!text.contains("HETATM"));
        assert_eq!(runner.calls()[0].args[0], clean.display().to_string());
    }

    #[tokio::test]
    async fn test_unknown_chain_rejected_before_obabel() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdb"), STRUCTURE).unwrap();
        let mut t = target("alpha");
        t.chain = Some("Z".to_string());
        let runner = obabel_ok();

        let err = ReceptorPreparer::new(&config, &runner).prepare(&t).await.unwrap_err();
        match err {
            PipelineError::Config(msg) => {
                assert!(msg.contains("alpha"));
                assert!(msg.contains("'Z'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.calls().is_empty());
        assert!(!dir.path().join("targets/alpha_clean.pdb").exists());
        assert!(!dir.path().join("targets/alpha.pdbqt").exists());
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_no_output() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdb"), STRUCTURE).unwrap();
        let runner = FakeRunner::new(|cmd| {
            if let Some(out) = cmd.flag_value("-O") {
                std::fs::write(out, "half").unwrap();
            }
            ToolOutput::failed(1, "0 molecules converted")
        });

        let err = ReceptorPreparer::new(&config, &runner)
            .prepare(&target("alpha"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
        assert!(!dir.path().join("targets/alpha.pdbqt").exists());
        assert!(!dir.path().join("targets/alpha.partial.pdbqt").exists());
    }

    #[tokio::test]
    async fn test_missing_structure_without_pdb_id() {
        let (_dir, config) = workspace();
        let runner = obabel_ok();
        let err = ReceptorPreparer::new(&config, &runner)
            .prepare(&target("alpha"))
            .await
            .unwrap_err();
        match err {
            PipelineError::MissingPrerequisite { remedy, .. } => assert!(remedy.contains("pdb_id")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_output_is_failure() {
        let (dir, config) = workspace();
        std::fs::write(dir.path().join("targets/alpha.pdb"), STRUCTURE).unwrap();
        let runner = FakeRunner::new(|_| ToolOutput::ok(""));

        let err = ReceptorPreparer::new(&config, &runner)
            .prepare(&target("alpha"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailed { .. }));
    }
}
