//! PDB structure download and single-chain cleanup.

use reinforge_common::{write_atomic, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const RCSB_DOWNLOAD_URL: &str = "https://files.rcsb.org/download";

/// Client for fetching experimental structures from RCSB.
pub struct StructureFetcher {
    client: Client,
    base_url: String,
}

impl StructureFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(RCSB_DOWNLOAD_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, pdb_id: &str) -> String {
        format!("{}/{}.pdb", self.base_url, pdb_id.to_uppercase())
    }

    /// Download `pdb_id` to `dest` unless it is already there.
    pub async fn fetch_pdb(&self, pdb_id: &str, dest: &Path) -> Result<PathBuf> {
        if dest.exists() {
            debug!("PDB {} already at {}", pdb_id, dest.display());
            return Ok(dest.to_path_buf());
        }

        let url = self.url_for(pdb_id);
        info!("🌐 Fetching PDB {} from {}", pdb_id, url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let content = response.bytes().await?;

        write_atomic(dest, &content)?;
        Ok(dest.to_path_buf())
    }
}

fn record_name(line: &str) -> &str {
    line.get(..6).unwrap_or(line).trim_end()
}

fn chain_id(line: &str) -> Option<char> {
    line.chars().nth(21)
}

/// Keep only the `ATOM` records of `chain` from the first model, closed by
/// `TER` and `END`. Waters, ligands and other chains are dropped.
pub fn clean_structure(pdb: &str, chain: char) -> String {
    let mut out = String::new();
    for line in pdb.lines() {
        match record_name(line) {
            "ENDMDL" => break,
            "ATOM" if chain_id(line) == Some(chain) => {
                out.push_str(line);
                out.push('\n');
            }
            _ => {}
        }
    }
    out.push_str("TER\nEND\n");
    out
}

/// `<receptor stem>_clean.pdb` next to the receptor.
pub fn clean_copy_path(receptor: &Path) -> PathBuf {
    let stem = receptor
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    receptor.with_file_name(format!("{stem}_clean.pdb"))
}

pub fn write_clean_copy(structure: &Path, chain: char, dest: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(structure)?;
    let cleaned = clean_structure(&raw, chain);
    let atoms = cleaned.lines().filter(|l| record_name(l) == "ATOM").count();
    write_atomic(dest, cleaned.as_bytes())?;
    debug!("Kept {} atoms of chain {} in {}", atoms, chain, dest.display());
    Ok(atoms)
}
