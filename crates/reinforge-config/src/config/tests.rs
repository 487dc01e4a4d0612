use super::*;
use crate::target::TargetRole;

const TWO_TARGETS: &str = r#"
workspace = "/scratch/reinvent_docking"
prior_file = "/scratch/reinvent.prior"

[learning]
test_mode = false
batch_size = 32

[[targets]]
name = "ppar_alpha"
label = "PPARα"
role = "primary"
structure = "targets/ppar_alpha.pdb"
receptor = "targets/ppar_alpha.pdbqt"
run_id = "PPARa"
box = { center_x = 13.861, center_y = -12.946, center_z = -31.915, size_x = 16.842, size_y = 9.62, size_z = 22.206 }

[[targets]]
name = "ppar_gamma"
role = "anti_target"
structure = "targets/ppar_gamma.pdb"
receptor = "targets/ppar_gamma.pdbqt"
run_id = "PPARg"
box = { center_x = 22.553, center_y = -7.676, center_z = 26.095, size_x = 64.72, size_y = 77.892, size_z = 75.448 }
score = { high = -4.0, low = -11.0 }
"#;

#[test]
fn test_defaults_match_reference_run() {
    let config = PipelineConfig::default();
    assert_eq!(config.conda.dockstream_env, "DockStream");
    assert_eq!(config.conda.reinvent_env, "reinvent4");
    assert_eq!(config.docking.pool_id, "RDkit");
    assert_eq!(config.learning.batch_size, 20);
    assert!(config.learning.test_mode);
    assert_eq!(config.files.docking_config, PathBuf::from("dockstream_config.json"));
    assert_eq!(config.smoke.stderr_tail, 800);
    assert!(config.timeouts.launch().is_none());
    assert_eq!(config.reinvent_executable, "reinvent");
}

#[test]
fn test_parse_two_targets() {
    let config = PipelineConfig::from_toml_str(TWO_TARGETS).unwrap();
    assert_eq!(config.targets.len(), 2);
    assert!(!config.learning.test_mode);
    assert_eq!(config.learning.batch_size, 32);

    let alpha = &config.targets[0];
    assert_eq!(alpha.role, TargetRole::Primary);
    assert_eq!(alpha.display_label(), "PPARα");
    assert_eq!(alpha.weight, 1.0);
    assert_eq!(alpha.score_window(), TargetRole::Primary.default_window());

    let gamma = &config.targets[1];
    assert_eq!(gamma.role, TargetRole::AntiTarget);
    assert_eq!(gamma.score_window().high, -4.0);
    assert_eq!(gamma.score_window().k, 0.5);
}

#[test]
fn test_paths_resolve_against_workspace() {
    let config = PipelineConfig::from_toml_str(TWO_TARGETS).unwrap();
    assert_eq!(
        config.docking_config_path(),
        PathBuf::from("/scratch/reinvent_docking/dockstream_config.json")
    );
    assert_eq!(config.prior_path(), PathBuf::from("/scratch/reinvent.prior"));
    assert_eq!(
        config.summary_csv_path(),
        PathBuf::from("/scratch/reinvent_docking/results/rl_1.csv")
    );
}

#[test]
fn test_duplicate_run_id_rejected() {
    let doc = TWO_TARGETS.replace("run_id = \"PPARg\"", "run_id = \"PPARa\"");
    let err = PipelineConfig::from_toml_str(&doc).unwrap_err();
    assert!(err.to_string().contains("duplicate run_id"), "{err}");
}

#[test]
fn test_inverted_window_rejected() {
    let doc = TWO_TARGETS.replace("score = { high = -4.0, low = -11.0 }", "score = { high = -11.0, low = -4.0 }");
    let err = PipelineConfig::from_toml_str(&doc).unwrap_err();
    assert!(err.to_string().contains("high > low"), "{err}");
}

#[test]
fn test_unknown_pool_rejected() {
    let doc = TWO_TARGETS.replace("run_id = \"PPARg\"", "run_id = \"PPARg\"\npool = \"Corina\"");
    let err = PipelineConfig::from_toml_str(&doc).unwrap_err();
    assert!(err.to_string().contains("Corina"), "{err}");
}

#[test]
fn test_empty_target_table_is_accepted() {
    let config = PipelineConfig::from_toml_str("").unwrap();
    assert!(config.targets.is_empty());
}

#[test]
fn test_zero_batch_size_rejected() {
    let err = PipelineConfig::from_toml_str("[learning]\nbatch_size = 0\n").unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn test_load_anchors_workspace_at_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reinforge.toml");
    std::fs::write(&path, "workspace = \"run\"\n").unwrap();

    let config = PipelineConfig::load(Some(&path)).unwrap();
    assert_eq!(config.root(), dir.path().join("run"));
}

#[test]
fn test_load_missing_file_is_prerequisite_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, PipelineError::MissingPrerequisite { .. }));
}

#[test]
fn test_example_config_is_valid() {
    let example = include_str!("../../../../reinforge.example.toml");
    let config = PipelineConfig::from_toml_str(example).unwrap();
    assert_eq!(config.targets.len(), 2);
    assert_eq!(config.targets[0].chain.as_deref(), Some("A"));
    assert_eq!(config.targets[1].role, TargetRole::AntiTarget);
}
