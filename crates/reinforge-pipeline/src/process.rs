//! External tool invocation.
//!
//! Every tool is run from an argument list (no shell), with an explicit
//! working directory and timeout, optionally inside a conda environment via
//! `conda run -n <env>`. A command with a timeout gets its own process group
//! so expiry can kill `conda run` together with the tool it started.

use async_trait::async_trait;
use reinforge_common::{tail_chars, PipelineError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Characters of stderr kept in `ToolFailed` errors.
pub const ERROR_TAIL_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub conda_env: Option<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Send stdout and stderr here instead of capturing them
    pub log_file: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            conda_env: None,
            cwd: None,
            timeout: None,
            log_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn in_env(mut self, env: Option<&str>) -> Self {
        self.conda_env = env.map(str::to_string);
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn log_to(mut self, path: &Path) -> Self {
        self.log_file = Some(path.to_path_buf());
        self
    }

    /// Full argument vector, including the `conda run` prefix.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 5);
        if let Some(env) = &self.conda_env {
            argv.extend(["conda", "run", "-n", env.as_str()].map(str::to_string));
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Value following `flag`, e.g. the `-O` output path of obabel.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn display(&self) -> String {
        self.argv().join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    /// Human-readable exit status ("exit status: 1")
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            status: format!("exit status: {code}"),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Seam between the pipeline and the operating system.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion and capture output. A non-zero exit is not an error here.
    /// With `log_file` set, stdout is left empty and stderr holds the log's tail.
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Run and turn a non-zero exit into `ToolFailed`.
pub async fn run_checked(runner: &dyn ToolRunner, command: &ToolCommand) -> Result<ToolOutput> {
    let output = runner.run(command).await?;
    if !output.success {
        return Err(PipelineError::ToolFailed {
            tool: command.program.clone(),
            status: output.status,
            stderr_tail: tail_chars(&output.stderr, ERROR_TAIL_CHARS).to_string(),
        });
    }
    Ok(output)
}

/// Runs tools as child processes on the tokio runtime.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_error(command: &ToolCommand, err: std::io::Error) -> PipelineError {
    if err.kind() == std::io::ErrorKind::NotFound {
        let program = command.argv().into_iter().next().unwrap_or_default();
        PipelineError::missing(
            "executable",
            program,
            "Install it, put it on PATH, or enable [conda] so it runs inside its environment.",
        )
    } else {
        PipelineError::Io(err)
    }
}

/// Create `path` (and its directory) for a child's stdout and stderr.
fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Last `max_bytes` of a log file, lossily decoded.
fn read_log_tail(path: &Path, max_bytes: u64) -> String {
    let read = || -> std::io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(max_bytes)))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    };
    match read() {
        Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
        Err(e) => format!("could not read {}: {}", path.display(), e),
    }
}

/// SIGKILL every process in group `pgid`.
#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    let status = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(s) if s.success() => debug!("Killed process group {}", pgid),
        Ok(s) => debug!("kill -{} exited with {}", pgid, s),
        Err(e) => warn!("Could not kill process group {}: {}", pgid, e),
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let argv = command.argv();
        match &command.log_file {
            Some(log) => info!("  $ {} > {} 2>&1", command.display(), log.display()),
            None => info!("  $ {}", command.display()),
        }

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        match &command.log_file {
            Some(path) => {
                let log = open_log(path)?;
                cmd.stdout(Stdio::from(log.try_clone()?)).stderr(Stdio::from(log));
            }
            None => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }
        // Untimed runs stay in our group so Ctrl+C still reaches them.
        #[cfg(unix)]
        {
            if command.timeout.is_some() {
                cmd.process_group(0);
            }
        }

        let child = cmd.spawn().map_err(|e| spawn_error(command, e))?;
        let pid = child.id();
        let waiting = child.wait_with_output();
        let output = match command.timeout {
            Some(limit) => match tokio::time::timeout(limit, waiting).await {
                Ok(done) => done?,
                Err(_) => {
                    // The dropped child is killed by kill_on_drop; its own children are not.
                    #[cfg(unix)]
                    {
                        if let Some(pgid) = pid {
                            kill_process_group(pgid).await;
                        }
                    }
                    #[cfg(not(unix))]
                    let _ = pid;
                    return Err(PipelineError::ToolTimeout {
                        tool: command.program.clone(),
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => waiting.await?,
        };

        debug!("{} finished with {}", command.program, output.status);

        let stderr = match &command.log_file {
            Some(path) if !output.status.success() => read_log_tail(path, ERROR_TAIL_CHARS as u64 * 4),
            Some(_) => String::new(),
            None => String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
    }
}

/// Start `command` detached from this process, with stdout and stderr sent
/// to `log_path`. Returns the child PID. The child is never waited on.
pub fn spawn_detached(command: &ToolCommand, log_path: &Path) -> Result<u32> {
    let argv = command.argv();
    info!("  $ nohup {} > {} 2>&1 &", command.display(), log_path.display());

    let log = open_log(log_path)?;
    let log_err = log.try_clone()?;

    let mut cmd = std::process::Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    if let Some(dir) = &command.cwd {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so a Ctrl+C on the parent's terminal does not reach it.
        cmd.process_group(0);
    }

    let child = cmd.spawn().map_err(|e| spawn_error(command, e))?;
    Ok(child.id())
}
