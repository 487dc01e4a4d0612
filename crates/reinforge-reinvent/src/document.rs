//! REINVENT4 staged-learning configuration (`rl_config.toml`).

use reinforge_common::{write_atomic, PipelineError, Result};
use reinforge_config::{LearningOptions, ScoreWindow, TargetRole, TargetSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

pub const TEST_MAX_STEPS: u32 = 5;
pub const PRODUCTION_MAX_STEPS: u32 = 100;

pub const QED_WEIGHT: f64 = 0.5;
pub const MW_WEIGHT: f64 = 0.5;
pub const ALERTS_WEIGHT: f64 = 1.0;

/// Substructures rejected outright: macrocycles, bis-alkylamines, coumarins.
pub const ALERT_SMARTS: [&str; 5] = [
    "[*;r8]",
    "[*;r9]",
    "[*;r10]",
    "[CH2;X4][N;X3][CH2;X4]",
    "c1ccc2c(c1)ccc(=O)o2",
];

/// Step budget for the single stage.
pub fn max_steps_for(test_mode: bool) -> u32 {
    if test_mode {
        TEST_MAX_STEPS
    } else {
        PRODUCTION_MAX_STEPS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningDocument {
    pub run_type: String,
    pub device: String,
    pub tb_logdir: String,
    pub json_out_config: String,
    pub parameters: Parameters,
    pub learning_strategy: LearningStrategy,
    pub diversity_filter: DiversityFilter,
    pub stage: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub prior_file: String,
    pub agent_file: String,
    pub summary_csv_prefix: String,
    pub batch_size: u32,
    pub use_checkpoint: bool,
    pub purge_memories: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStrategy {
    #[serde(rename = "type")]
    pub kind: String,
    pub sigma: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityFilter {
    #[serde(rename = "type")]
    pub kind: String,
    pub minscore: f64,
    pub bucket_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minsimilarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_multiplier: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub max_score: f64,
    pub max_steps: u32,
    pub chkpt_file: String,
    pub termination: String,
    pub scoring: Scoring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    #[serde(rename = "type")]
    pub kind: String,
    pub component: Vec<Component>,
}

/// Scoring component, keyed by the REINVENT component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    DockStream(ComponentBody),
    #[serde(rename = "QED")]
    Qed(ComponentBody),
    MolecularWeight(ComponentBody),
    #[serde(rename = "custom_alerts")]
    CustomAlerts(ComponentBody),
}

impl Component {
    pub fn body(&self) -> &ComponentBody {
        match self {
            Component::DockStream(b)
            | Component::Qed(b)
            | Component::MolecularWeight(b)
            | Component::CustomAlerts(b) => b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentBody {
    pub endpoint: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<EndpointParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_script_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_python_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docking_run_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smarts: Option<Vec<String>>,
}

/// Monotone map from a raw score onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    /// Rises towards 1 above `high`.
    Sigmoid { high: f64, low: f64, k: f64 },
    /// Rises towards 1 below `low`; more negative affinities score higher.
    ReverseSigmoid { high: f64, low: f64, k: f64 },
    /// Plateau of 1 between `low` and `high`.
    DoubleSigmoid {
        high: f64,
        low: f64,
        coef_div: f64,
        coef_si: f64,
        coef_se: f64,
    },
}

impl Transform {
    /// Affinity transform for a docking target.
    pub fn for_role(role: TargetRole, window: ScoreWindow) -> Self {
        let ScoreWindow { high, low, k } = window;
        match role {
            TargetRole::Primary => Transform::ReverseSigmoid { high, low, k },
            TargetRole::AntiTarget => Transform::Sigmoid { high, low, k },
        }
    }

    pub fn high(&self) -> f64 {
        match *self {
            Transform::Sigmoid { high, .. }
            | Transform::ReverseSigmoid { high, .. }
            | Transform::DoubleSigmoid { high, .. } => high,
        }
    }

    pub fn low(&self) -> f64 {
        match *self {
            Transform::Sigmoid { low, .. }
            | Transform::ReverseSigmoid { low, .. }
            | Transform::DoubleSigmoid { low, .. } => low,
        }
    }
}

/// Everything the builder needs besides the target table.
#[derive(Debug, Clone)]
pub struct LearningInputs {
    pub options: LearningOptions,
    pub prior_file: String,
    /// DockStream config as REINVENT should see it (relative to its cwd)
    pub configuration_path: String,
    pub docker_script_path: String,
    pub docker_python_path: String,
}

fn dockstream_component(target: &TargetSpec, inputs: &LearningInputs) -> Component {
    Component::DockStream(ComponentBody {
        endpoint: vec![Endpoint {
            name: target.endpoint_name(),
            weight: target.weight,
            params: Some(EndpointParams {
                configuration_path: Some(inputs.configuration_path.clone()),
                docker_script_path: Some(inputs.docker_script_path.clone()),
                docker_python_path: Some(inputs.docker_python_path.clone()),
                docking_run_name: Some(target.run_id.clone()),
                smarts: None,
            }),
            transform: Some(Transform::for_role(target.role, target.score_window())),
        }],
    })
}

fn fixed_components() -> [Component; 3] {
    [
        Component::Qed(ComponentBody {
            endpoint: vec![Endpoint {
                name: "QED".to_string(),
                weight: QED_WEIGHT,
                params: None,
                transform: None,
            }],
        }),
        Component::MolecularWeight(ComponentBody {
            endpoint: vec![Endpoint {
                name: "MolecularWeight".to_string(),
                weight: MW_WEIGHT,
                params: None,
                transform: Some(Transform::DoubleSigmoid {
                    high: 500.0,
                    low: 200.0,
                    coef_div: 500.0,
                    coef_si: 20.0,
                    coef_se: 20.0,
                }),
            }],
        }),
        Component::CustomAlerts(ComponentBody {
            endpoint: vec![Endpoint {
                name: "custom_alerts".to_string(),
                weight: ALERTS_WEIGHT,
                params: Some(EndpointParams {
                    smarts: Some(ALERT_SMARTS.iter().map(|s| s.to_string()).collect()),
                    ..Default::default()
                }),
                transform: None,
            }],
        }),
    ]
}

/// Build the staged-learning document: one DockStream component per target,
/// followed by the fixed QED, molecular weight and alert components.
pub fn build_learning_config(inputs: &LearningInputs, targets: &[TargetSpec]) -> LearningDocument {
    let opts = &inputs.options;

    let mut component: Vec<Component> = targets
        .iter()
        .map(|t| dockstream_component(t, inputs))
        .collect();
    component.extend(fixed_components());

    LearningDocument {
        run_type: "staged_learning".to_string(),
        device: opts.device.clone(),
        tb_logdir: opts.tb_logdir.clone(),
        json_out_config: "run_config.json".to_string(),
        parameters: Parameters {
            prior_file: inputs.prior_file.clone(),
            agent_file: inputs.prior_file.clone(),
            summary_csv_prefix: opts.summary_csv_prefix.clone(),
            batch_size: opts.batch_size,
            use_checkpoint: false,
            purge_memories: false,
        },
        learning_strategy: LearningStrategy {
            kind: "dap".to_string(),
            sigma: opts.sigma,
            rate: opts.rate,
        },
        diversity_filter: DiversityFilter {
            kind: opts.diversity_filter.kind.clone(),
            minscore: opts.diversity_filter.minscore,
            bucket_size: opts.diversity_filter.bucket_size,
            minsimilarity: opts.diversity_filter.minsimilarity,
            penalty_multiplier: opts.diversity_filter.penalty_multiplier,
        },
        stage: vec![Stage {
            max_score: 1.0,
            max_steps: max_steps_for(opts.test_mode),
            chkpt_file: "results/stage1.chkpt".to_string(),
            termination: "simple".to_string(),
            scoring: Scoring {
                kind: "geometric_mean".to_string(),
                component,
            },
        }],
    }
}

impl LearningDocument {
    /// DockStream endpoints across all stages.
    pub fn dockstream_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.stage
            .iter()
            .flat_map(|s| s.scoring.component.iter())
            .filter(|c| matches!(c, Component::DockStream(_)))
            .flat_map(|c| c.body().endpoint.iter())
    }

    /// Every DockStream endpoint must name a run present in the docking config.
    pub fn check_run_references(&self, run_ids: &[&str]) -> Result<()> {
        let known: HashSet<&str> = run_ids.iter().copied().collect();
        for endpoint in self.dockstream_endpoints() {
            let run = endpoint
                .params
                .as_ref()
                .and_then(|p| p.docking_run_name.as_deref())
                .unwrap_or_default();
            if !known.contains(run) {
                return Err(PipelineError::Config(format!(
                    "scoring endpoint '{}' references docking run '{}' missing from the docking config",
                    endpoint.name, run
                )));
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn write_toml(&self, path: &Path) -> Result<()> {
        let text = self.to_toml_string()?;
        write_atomic(path, text.as_bytes())?;
        match self.stage.first() {
            Some(stage) => info!(
                "✅ {} written ({} steps × {} molecules)",
                path.display(),
                stage.max_steps,
                self.parameters.batch_size
            ),
            None => warn!("{} written with no learning stages", path.display()),
        }
        Ok(())
    }
}
