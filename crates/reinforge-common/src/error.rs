use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input is absent. `remedy` tells the operator how to fix it.
    #[error("Missing {what}: {}\n{remedy}", path.display())]
    MissingPrerequisite {
        what: String,
        path: PathBuf,
        remedy: String,
    },

    #[error("{tool} exited with {status}\n{stderr_tail}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr_tail: String,
    },

    #[error("{tool} did not finish within {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("Smoke test failed: {reason}\n{stderr_tail}")]
    SmokeTest { reason: String, stderr_tail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn missing(what: impl Into<String>, path: impl Into<PathBuf>, remedy: impl Into<String>) -> Self {
        PipelineError::MissingPrerequisite {
            what: what.into(),
            path: path.into(),
            remedy: remedy.into(),
        }
    }

    /// Wrap this error with the name of the pipeline step it interrupted.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        PipelineError::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_prerequisite_mentions_remedy() {
        let err = PipelineError::missing("prior model", "/tmp/reinvent.prior", "Download it first.");
        let msg = err.to_string();
        assert!(msg.contains("prior model"));
        assert!(msg.contains("/tmp/reinvent.prior"));
        assert!(msg.contains("Download it first."));
    }

    #[test]
    fn test_step_failed_keeps_source() {
        let err = PipelineError::Config("bad".to_string()).in_step("ConfigsWritten");
        match &err {
            PipelineError::StepFailed { step, source } => {
                assert_eq!(step, "ConfigsWritten");
                assert!(matches!(**source, PipelineError::Config(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("Step ConfigsWritten failed"));
    }
}
