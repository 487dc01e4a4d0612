//! Top molecules from the REINVENT summary CSV.

use reinforge_common::{PipelineError, Result};
use reinforge_config::TargetSpec;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{info, warn};

pub const TOTAL_SCORE_COLUMN: &str = "total_score";

/// Best-scoring rows, restricted to the columns worth reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TopMolecules {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows in the summary before ranking
    pub total_rows: usize,
}

/// Rank the summary by `total_score` and keep the best `top_n` rows.
pub fn analyze_results(summary: &Path, targets: &[TargetSpec], top_n: usize) -> Result<TopMolecules> {
    if !summary.exists() {
        return Err(PipelineError::missing(
            "REINVENT summary CSV",
            summary,
            "Launch the run first and wait for the stage to write its summary.",
        ));
    }

    let mut reader = csv::Reader::from_path(summary)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let score_idx = position(TOTAL_SCORE_COLUMN).ok_or_else(|| {
        PipelineError::Config(format!(
            "{} has no '{}' column",
            summary.display(),
            TOTAL_SCORE_COLUMN
        ))
    })?;

    let mut wanted: Vec<String> = Vec::new();
    match ["SMILES", "smiles"].into_iter().find(|c| position(*c).is_some()) {
        Some(col) => wanted.push(col.to_string()),
        None => warn!("No SMILES column in {}", summary.display()),
    }
    wanted.push(TOTAL_SCORE_COLUMN.to_string());
    for t in targets {
        let col = t.endpoint_name();
        if position(col.as_str()).is_some() {
            wanted.push(col.clone());
        } else {
            warn!("Column '{}' not found in {}, skipping", col, summary.display());
        }
        let raw = format!("{col} (raw)");
        if position(raw.as_str()).is_some() {
            wanted.push(raw);
        }
    }
    let indices: Vec<usize> = wanted.iter().filter_map(|c| position(c.as_str())).collect();

    let mut scored: Vec<(f64, Vec<String>)> = Vec::new();
    let mut total_rows = 0;
    for record in reader.records() {
        let record = record?;
        total_rows += 1;
        let Some(score) = record.get(score_idx).and_then(|s| s.trim().parse::<f64>().ok()) else {
            continue;
        };
        if !score.is_finite() {
            continue;
        }
        let row = indices
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect();
        scored.push((score, row));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(top_n);

    Ok(TopMolecules {
        columns: wanted,
        rows: scored.into_iter().map(|(_, row)| row).collect(),
        total_rows,
    })
}

impl TopMolecules {
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!("💾 Top {} molecules saved to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Fixed-width table for terminal output.
    pub fn render_table(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                self.rows
                    .iter()
                    .map(|r| r.get(i).map_or(0, |v| v.chars().count()))
                    .max()
                    .unwrap_or(0)
                    .max(c.chars().count())
            })
            .collect();

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, &w)| format!("{c:<w$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![line(self.columns.as_slice())];
        out.extend(self.rows.iter().map(|r| line(r.as_slice())));
        out.join("\n")
    }
}
