//! DockStream docking configuration (`dockstream_config.json`).
//!
//! One embedding pool turns console SMILES into RDKit conformers; every
//! target then gets its own AutoDock Vina run reading from that pool.

use reinforge_common::{write_atomic, PipelineError, Result};
use reinforge_config::paths::display_relative;
use reinforge_config::{SearchBox, TargetSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const VINA_BACKEND: &str = "AutoDockVina";
pub const DOCKSTREAM_LOGFILE: &str = "results/dockstream.log";
pub const CONFORMER_PATH: &str = "poses/conformers.sdf";

/// Inputs to the builder that do not come from the target table.
#[derive(Debug, Clone)]
pub struct DockingSettings {
    pub pool_id: String,
    pub number_cores: u32,
    pub number_poses: u32,
    /// Directory holding the `vina` binary
    pub binary_location: String,
    /// Workspace root; DockStream runs with this as its working directory
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingDocument {
    pub docking: Docking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Docking {
    pub header: Header,
    pub ligand_preparation: LigandPreparation,
    pub docking_runs: Vec<DockingRun>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logging {
    pub logfile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LigandPreparation {
    pub embedding_pools: Vec<EmbeddingPool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPool {
    pub pool_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parameters: PoolParameters,
    pub input: PoolInput,
    pub output: PoolOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolParameters {
    pub prefix_execution: String,
    pub parallelization: Parallelization,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parallelization {
    pub number_cores: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInput {
    pub standardize_smiles: bool,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOutput {
    pub conformer_path: String,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockingRun {
    pub backend: String,
    pub run_id: String,
    pub input_pools: Vec<String>,
    pub parameters: RunParameters,
    pub output: RunOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub binary_location: String,
    pub parallelization: Parallelization,
    /// DockStream expects a list here, even for a single receptor
    pub receptor_pdbqt_path: Vec<String>,
    pub number_poses: u32,
    pub search_space: SearchSpace,
}

/// Vina box keyed by the command-line flags DockStream forwards verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    #[serde(rename = "--center_x")]
    pub center_x: f64,
    #[serde(rename = "--center_y")]
    pub center_y: f64,
    #[serde(rename = "--center_z")]
    pub center_z: f64,
    #[serde(rename = "--size_x")]
    pub size_x: f64,
    #[serde(rename = "--size_y")]
    pub size_y: f64,
    #[serde(rename = "--size_z")]
    pub size_z: f64,
}

impl From<SearchBox> for SearchSpace {
    fn from(b: SearchBox) -> Self {
        Self {
            center_x: b.center_x,
            center_y: b.center_y,
            center_z: b.center_z,
            size_x: b.size_x,
            size_y: b.size_y,
            size_z: b.size_z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub poses: PosesOutput,
    pub scores: ScoresOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosesOutput {
    pub poses_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoresOutput {
    pub scores_path: String,
    pub overwrite: bool,
}

/// Build the docking configuration, one Vina run per target in input order.
pub fn build_docking_config(targets: &[TargetSpec], settings: &DockingSettings) -> DockingDocument {
    let parallelization = Parallelization {
        number_cores: settings.number_cores,
    };

    let docking_runs = targets
        .iter()
        .map(|t| {
            let receptor = reinforge_config::paths::resolve_against(&settings.root, &t.receptor);
            let tag = t.run_id.to_lowercase();
            DockingRun {
                backend: VINA_BACKEND.to_string(),
                run_id: t.run_id.clone(),
                input_pools: vec![t.pool_ref(&settings.pool_id).to_string()],
                parameters: RunParameters {
                    binary_location: settings.binary_location.clone(),
                    parallelization,
                    receptor_pdbqt_path: vec![display_relative(&settings.root, &receptor)],
                    number_poses: settings.number_poses,
                    search_space: t.search_box.into(),
                },
                output: RunOutput {
                    poses: PosesOutput {
                        poses_path: format!("poses/docked_{tag}.sdf"),
                    },
                    scores: ScoresOutput {
                        scores_path: format!("results/scores_{tag}.csv"),
                        overwrite: true,
                    },
                },
            }
        })
        .collect::<Vec<_>>();

    debug!("Built {} docking runs", docking_runs.len());

    DockingDocument {
        docking: Docking {
            header: Header {
                logging: Logging {
                    logfile: DOCKSTREAM_LOGFILE.to_string(),
                },
            },
            ligand_preparation: LigandPreparation {
                embedding_pools: vec![EmbeddingPool {
                    pool_id: settings.pool_id.clone(),
                    kind: "RDkit".to_string(),
                    parameters: PoolParameters {
                        prefix_execution: String::new(),
                        parallelization,
                    },
                    input: PoolInput {
                        standardize_smiles: false,
                        kind: "console".to_string(),
                    },
                    output: PoolOutput {
                        conformer_path: CONFORMER_PATH.to_string(),
                        format: "sdf".to_string(),
                    },
                }],
            },
            docking_runs,
        },
    }
}

impl DockingDocument {
    pub fn run_ids(&self) -> Vec<&str> {
        self.docking.docking_runs.iter().map(|r| r.run_id.as_str()).collect()
    }

    /// Check run ids are unique and every run reads from a declared pool.
    pub fn validate(&self) -> Result<()> {
        let pools: HashSet<&str> = self
            .docking
            .ligand_preparation
            .embedding_pools
            .iter()
            .map(|p| p.pool_id.as_str())
            .collect();

        let mut seen = HashSet::new();
        for run in &self.docking.docking_runs {
            if !seen.insert(run.run_id.as_str()) {
                return Err(PipelineError::Config(format!(
                    "docking run id '{}' appears more than once",
                    run.run_id
                )));
            }
            if let Some(missing) = run.input_pools.iter().find(|p| !pools.contains(p.as_str())) {
                return Err(PipelineError::Config(format!(
                    "docking run '{}' reads from undeclared pool '{}'",
                    run.run_id, missing
                )));
            }
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        write_atomic(path, json.as_bytes())?;
        info!(
            "✅ {} written with {} docking runs",
            path.display(),
            self.docking.docking_runs.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reinforge_config::TargetRole;

    fn target(name: &str, run_id: &str, role: TargetRole) -> TargetSpec {
        TargetSpec {
            name: name.to_string(),
            label: None,
            role,
            structure: PathBuf::from(format!("targets/{name}.pdb")),
            receptor: PathBuf::from(format!("targets/{name}.pdbqt")),
            run_id: run_id.to_string(),
            pool: None,
            search_box: SearchBox {
                center_x: 13.861,
                center_y: -12.946,
                center_z: -31.915,
                size_x: 16.842,
                size_y: 9.62,
                size_z: 22.206,
            },
            score: None,
            weight: 1.0,
            pdb_id: None,
            chain: None,
        }
    }

    fn settings() -> DockingSettings {
        DockingSettings {
            pool_id: "RDkit".to_string(),
            number_cores: 4,
            number_poses: 1,
            binary_location: "/opt/conda/envs/DockStream/bin".to_string(),
            root: PathBuf::from("/work"),
        }
    }

    fn two_targets() -> Vec<TargetSpec> {
        vec![
            target("ppar_alpha", "PPARa", TargetRole::Primary),
            target("ppar_gamma", "PPARg", TargetRole::AntiTarget),
        ]
    }

    #[test]
    fn test_one_run_per_target_in_order() {
        let doc = build_docking_config(&two_targets(), &settings());
        assert_eq!(doc.run_ids(), vec!["PPARa", "PPARg"]);
        doc.validate().unwrap();
    }

    #[test]
    fn test_run_fields() {
        let doc = build_docking_config(&two_targets(), &settings());
        let run = &doc.docking.docking_runs[1];
        assert_eq!(run.backend, "AutoDockVina");
        assert_eq!(run.input_pools, vec!["RDkit".to_string()]);
        assert_eq!(run.parameters.receptor_pdbqt_path, vec!["targets/ppar_gamma.pdbqt".to_string()]);
        assert_eq!(run.output.poses.poses_path, "poses/docked_pparg.sdf");
        assert_eq!(run.output.scores.scores_path, "results/scores_pparg.csv");
        assert!(run.output.scores.overwrite);
    }

    #[test]
    fn test_receptor_outside_root_stays_absolute() {
        let mut t = target("ppar_alpha", "PPARa", TargetRole::Primary);
        t.receptor = PathBuf::from("/mnt/tank/targets/ppar_alpha.pdbqt");
        let doc = build_docking_config(&[t], &settings());
        assert_eq!(
            doc.docking.docking_runs[0].parameters.receptor_pdbqt_path,
            vec!["/mnt/tank/targets/ppar_alpha.pdbqt".to_string()]
        );
    }

    #[test]
    fn test_empty_table_yields_zero_runs() {
        let doc = build_docking_config(&[], &settings());
        assert!(doc.docking.docking_runs.is_empty());
        assert_eq!(doc.docking.ligand_preparation.embedding_pools.len(), 1);
        doc.validate().unwrap();
    }

    #[test]
    fn test_search_space_uses_flag_keys() {
        let doc = build_docking_config(&two_targets(), &settings());
        let value: serde_json::Value = serde_json::from_str(&doc.to_json_string().unwrap()).unwrap();
        let space = &value["docking"]["docking_runs"][0]["parameters"]["search_space"];
        assert_eq!(space["--center_x"], serde_json::json!(13.861));
        assert_eq!(space["--size_y"], serde_json::json!(9.62));
        assert_eq!(
            value["docking"]["ligand_preparation"]["embedding_pools"][0]["type"],
            serde_json::json!("RDkit")
        );
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let a = build_docking_config(&two_targets(), &settings()).to_json_string().unwrap();
        let b = build_docking_config(&two_targets(), &settings()).to_json_string().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_validate_catches_duplicates_and_dangling_pools() {
        let mut doc = build_docking_config(&two_targets(), &settings());
        doc.docking.docking_runs[1].run_id = "PPARa".to_string();
        assert!(doc.validate().is_err());

        let mut doc = build_docking_config(&two_targets(), &settings());
        doc.docking.docking_runs[0].input_pools = vec!["Corina".to_string()];
        let err = doc.validate().unwrap_err();
        assert!(err.to_string().contains("Corina"));
    }

    #[test]
    fn test_write_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockstream_config.json");
        let doc = build_docking_config(&two_targets(), &settings());
        doc.write_json(&path).unwrap();

        let parsed: DockingDocument = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, doc);
    }
}
