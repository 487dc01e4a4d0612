//! Locating conda, its environments and the DockStream checkout.

use reinforge_common::{PipelineError, Result};
use reinforge_config::{expand_home, PipelineConfig};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::process::{ToolCommand, ToolRunner};

pub const DOCKER_SCRIPT: &str = "docker.py";

/// Absolute locations handed to the docking and learning documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    /// Directory holding the docking backend binaries (`vina`)
    pub binary_location: String,
    /// Interpreter that runs docker.py
    pub python: String,
    pub docker_script: PathBuf,
}

/// Conda installation root.
pub async fn conda_base(config: &PipelineConfig, runner: &dyn ToolRunner) -> PathBuf {
    if let Some(base) = &config.conda.base {
        return expand_home(base);
    }

    let cmd = ToolCommand::new("conda")
        .arg("info")
        .arg("--base")
        .timeout(Some(config.timeouts.env_check()));
    match runner.run(&cmd).await {
        Ok(out) if out.success && !out.stdout.trim().is_empty() => PathBuf::from(out.stdout.trim()),
        Ok(out) => {
            warn!("conda info --base failed ({}), assuming ~/anaconda3", out.status);
            default_conda_base()
        }
        Err(e) => {
            warn!("conda info --base failed ({}), assuming ~/anaconda3", e);
            default_conda_base()
        }
    }
}

fn default_conda_base() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("anaconda3")
}

/// Environment names from `conda env list` output.
pub fn parse_env_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_whitespace().next())
        // Unnamed environments show up as bare prefixes
        .filter(|name| !name.starts_with('/'))
        .map(str::to_string)
        .collect()
}

pub async fn conda_env_exists(name: &str, config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<bool> {
    let cmd = ToolCommand::new("conda")
        .arg("env")
        .arg("list")
        .timeout(Some(config.timeouts.env_check()));
    let out = crate::process::run_checked(runner, &cmd).await?;
    let envs = parse_env_list(&out.stdout);
    debug!("conda environments: {:?}", envs);
    Ok(envs.iter().any(|e| e == name))
}

/// Fail with a `conda env create` hint unless both environments exist.
pub async fn check_environments(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<()> {
    if !config.conda.enabled {
        debug!("conda disabled, skipping environment check");
        return Ok(());
    }

    let base = conda_base(config, runner).await;
    for env in [&config.conda.dockstream_env, &config.conda.reinvent_env] {
        if !conda_env_exists(env, config, runner).await? {
            return Err(PipelineError::missing(
                format!("conda environment '{env}'"),
                base.join("envs").join(env),
                format!("Create it with `conda env create -n {env} -f environment.yml` from the tool's checkout."),
            ));
        }
    }
    Ok(())
}

/// Directory containing docker.py.
pub fn find_dockstream(config: &PipelineConfig) -> Result<PathBuf> {
    if let Some(configured) = &config.dockstream_path {
        let path = expand_home(configured);
        if path.join(DOCKER_SCRIPT).is_file() {
            return Ok(path);
        }
        return Err(PipelineError::missing(
            "DockStream checkout",
            path.join(DOCKER_SCRIPT),
            "Point dockstream_path at a clone of https://github.com/MolecularAI/DockStream.",
        ));
    }

    let root = config.root();
    let mut candidates = vec![root.join("DockStream"), root.join("..").join("DockStream")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("DockStream"));
    }

    candidates
        .into_iter()
        .find(|c| c.join(DOCKER_SCRIPT).is_file())
        .ok_or_else(|| {
            PipelineError::missing(
                "DockStream checkout",
                root.join("DockStream"),
                "Clone https://github.com/MolecularAI/DockStream next to the workspace or set dockstream_path.",
            )
        })
}

/// First directory on `PATH` that contains `program`.
pub fn which_dir(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find(|dir| dir.join(program).is_file())
}

pub async fn resolve_tool_paths(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<ToolPaths> {
    let dockstream = find_dockstream(config)?;
    let docker_script = dockstream.join(DOCKER_SCRIPT);

    if !config.conda.enabled {
        let binary_location = match which_dir("vina") {
            Some(dir) => dir.display().to_string(),
            None => {
                warn!("vina not found on PATH, binary_location left empty");
                String::new()
            }
        };
        return Ok(ToolPaths {
            binary_location,
            python: "python".to_string(),
            docker_script,
        });
    }

    let bin = conda_base(config, runner)
        .await
        .join("envs")
        .join(&config.conda.dockstream_env)
        .join("bin");
    Ok(ToolPaths {
        binary_location: bin.display().to_string(),
        python: bin.join("python").display().to_string(),
        docker_script,
    })
}

/// `Some(env)` when tools should run through conda.
pub fn env_for<'a>(config: &'a PipelineConfig, env: &'a str) -> Option<&'a str> {
    config.conda.enabled.then_some(env)
}
