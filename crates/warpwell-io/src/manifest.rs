use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warpwell_core::{NoiseIntensity, SimParams, TimeGrid};

/// Span and resolution of the time grid a run used.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub t0: f64,
    pub t_end: f64,
    pub samples: usize,
}

impl From<&TimeGrid> for GridSummary {
    fn from(grid: &TimeGrid) -> Self {
        Self {
            t0: grid.first(),
            t_end: grid.last(),
            samples: grid.len(),
        }
    }
}

/// Run manifest for reproducibility, written next to every output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub timestamp: String,
    /// Subcommand that produced the output.
    pub command: String,
    pub seed: Option<u64>,
    pub alpha: f64,
    pub noise: Option<NoiseIntensity>,
    pub grid: Option<GridSummary>,
    pub realizations: usize,
    pub commit_hash: Option<String>,
    pub rust_version: String,
}

impl RunManifest {
    pub fn new(command: &str, alpha: f64) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: command.to_string(),
            seed: None,
            alpha,
            noise: None,
            grid: None,
            realizations: 0,
            commit_hash: get_git_commit(),
            rust_version: get_rust_version(),
        }
    }

    pub fn for_params(command: &str, params: &SimParams) -> Self {
        let mut manifest = Self::new(command, params.alpha);
        manifest.noise = Some(params.noise);
        manifest
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_grid(mut self, grid: &TimeGrid) -> Self {
        self.grid = Some(GridSummary::from(grid));
        self
    }

    pub fn with_realizations(mut self, n: usize) -> Self {
        self.realizations = n;
        self
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&json)?;
        Ok(manifest)
    }
}

fn get_git_commit() -> Option<String> {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
}

fn get_rust_version() -> String {
    std::process::Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.manifest.json");
        let grid = TimeGrid::uniform(0.0, 0.1, 11).unwrap();
        let manifest = RunManifest::for_params("simulate", &SimParams::new(0.5, NoiseIntensity::Epsilon(0.1)))
            .with_seed(9)
            .with_grid(&grid)
            .with_realizations(4);
        manifest.save_to_file(&path).unwrap();

        let loaded = RunManifest::load_from_file(&path).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.seed, Some(9));
        assert_eq!(loaded.noise, Some(NoiseIntensity::Epsilon(0.1)));
        assert_eq!(loaded.grid.unwrap().samples, 11);
        assert_eq!(loaded.realizations, 4);
    }
}
