use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use warpwell_core::{SolverTolerance, WellError, WellResult};
use warpwell_detect::DEFAULT_BALL_SIZE;
use warpwell_mam::LbfgsSettings;

/// Where the run executes; selects the data root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Cluster,
}

/// Settings shared by every subcommand, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Data root on a workstation.
    pub base_dir: PathBuf,

    /// Data root on the cluster. Required when `environment` is `cluster`.
    pub cluster_dir: Option<PathBuf>,

    pub environment: Environment,

    /// Radius of the well neighbourhoods used by transition detection.
    /// Default: 0.1.
    pub ball_size: f64,

    /// Global seed for ensemble noise streams.
    pub seed: u64,

    /// Adaptive solver tolerances for relaxation runs.
    pub solver: SolverTolerance,

    /// Minimiser settings for instanton refinement.
    pub lbfgs: LbfgsSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("warpwell-data"),
            cluster_dir: None,
            environment: Environment::Local,
            ball_size: DEFAULT_BALL_SIZE,
            seed: 42,
            solver: SolverTolerance::default(),
            lbfgs: LbfgsSettings::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> WellResult<()> {
        if !self.ball_size.is_finite() || self.ball_size <= 0.0 {
            return Err(WellError::Config(format!(
                "ball_size must be finite and > 0, got {}",
                self.ball_size
            )));
        }
        if self.environment == Environment::Cluster && self.cluster_dir.is_none() {
            return Err(WellError::config("environment is `cluster` but cluster_dir is not set"));
        }
        self.solver.validate()?;
        self.lbfgs.validate()?;
        Ok(())
    }

    pub fn from_json(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Data root for the selected environment.
    pub fn root(&self) -> &Path {
        match (self.environment, &self.cluster_dir) {
            (Environment::Cluster, Some(dir)) => dir,
            _ => &self.base_dir,
        }
    }
}
