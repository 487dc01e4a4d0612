//! Score extraction from `docker.py -print_scores` output.
//!
//! DockStream prints one score per ligand as the final stdout line, but RDKit
//! and Open Babel warnings often land on stdout before it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreParseError {
    /// Nothing but whitespace on stdout.
    #[error("docking tool printed nothing on stdout")]
    Empty,
    /// The last line is not a finite number.
    #[error("last stdout line is not a docking score: {0:?}")]
    NotNumeric(String),
}

/// Parse the last non-empty stdout line as a docking score.
pub fn parse_docking_score(stdout: &str) -> Result<f64, ScoreParseError> {
    let last = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or(ScoreParseError::Empty)?;

    match last.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        _ => Err(ScoreParseError::NotNumeric(last.to_string())),
    }
}
