//! Per-target docking parameters.
//!
//! One `[[targets]]` entry describes one receptor: where its structure lives,
//! where the prepared PDBQT goes, the Vina search box, and how its docking
//! score should be shaped into a [0, 1] desirability.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether binding to a target is rewarded or penalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// Binding is maximised.
    Primary,
    /// Binding is penalised (selectivity).
    AntiTarget,
}

impl TargetRole {
    /// Score window used when the target does not carry its own.
    pub fn default_window(self) -> ScoreWindow {
        ScoreWindow {
            high: -5.0,
            low: -10.0,
            k: 0.5,
        }
    }

    /// Suffix of the scoring endpoint (and summary CSV column) for this role.
    pub fn endpoint_suffix(self) -> &'static str {
        match self {
            TargetRole::Primary => "affinity",
            TargetRole::AntiTarget => "penalty",
        }
    }
}

/// Vina search cuboid, in angstroms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBox {
    pub center_x: f64,
    pub center_y: f64,
    pub center_z: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
}

impl SearchBox {
    pub fn is_valid(&self) -> bool {
        let all_finite = [
            self.center_x,
            self.center_y,
            self.center_z,
            self.size_x,
            self.size_y,
            self.size_z,
        ]
        .iter()
        .all(|v| v.is_finite());
        all_finite && self.size_x > 0.0 && self.size_y > 0.0 && self.size_z > 0.0
    }
}

/// Affinity window for the sigmoid transforms (raw Vina scores, kcal/mol).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWindow {
    pub high: f64,
    pub low: f64,
    #[serde(default = "default_k")]
    pub k: f64,
}

fn default_k() -> f64 { 0.5 }

impl ScoreWindow {
    pub fn is_valid(&self) -> bool {
        self.high.is_finite() && self.low.is_finite() && self.high > self.low && self.k > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Technical name, used in file names and endpoint names (e.g. "ppar_alpha")
    pub name: String,

    /// Human-readable label for logs (e.g. "PPARα")
    pub label: Option<String>,

    pub role: TargetRole,

    /// Source structure (PDB)
    pub structure: PathBuf,

    /// Prepared receptor (PDBQT)
    pub receptor: PathBuf,

    /// DockStream docking run identifier
    pub run_id: String,

    /// Embedding pool the run reads from; the configured pool when absent
    pub pool: Option<String>,

    #[serde(rename = "box")]
    pub search_box: SearchBox,

    /// Score window; the role default when absent
    pub score: Option<ScoreWindow>,

    #[serde(default = "default_weight")]
    pub weight: f64,

    /// RCSB entry downloaded when `structure` is missing
    pub pdb_id: Option<String>,

    /// Chain kept when cleaning the structure before conversion
    pub chain: Option<String>,
}

fn default_weight() -> f64 { 1.0 }

impl TargetSpec {
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn score_window(&self) -> ScoreWindow {
        self.score.unwrap_or_else(|| self.role.default_window())
    }

    pub fn pool_ref<'a>(&'a self, default_pool: &'a str) -> &'a str {
        self.pool.as_deref().unwrap_or(default_pool)
    }

    /// Name of the scoring endpoint, which is also its summary CSV column.
    pub fn endpoint_name(&self) -> String {
        format!("{}_{}", self.name, self.role.endpoint_suffix())
    }
}
