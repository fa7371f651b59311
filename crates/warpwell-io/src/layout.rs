use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use warpwell_core::NoiseIntensity;
use warpwell_detect::Direction;

/// Which well an ensemble was started from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum StartWell {
    Cold,
    Hot,
}

impl StartWell {
    pub fn dir_name(self) -> &'static str {
        match self {
            StartWell::Cold => "cold-ensemble",
            StartWell::Hot => "hot-ensemble",
        }
    }
}

/// `0.5` -> `0_5`, `1.0` -> `1_0`.
fn number_label(v: f64) -> String {
    format!("{v:?}").replace('.', "_")
}

fn noise_label(noise: &NoiseIntensity) -> String {
    let prefix = match noise {
        NoiseIntensity::Sigma(_) => "sigma",
        NoiseIntensity::Epsilon(_) => "eps",
    };
    format!("{prefix}_{}", number_label(noise.raw()))
}

/// Directory naming for integrations, transitions and instantons under one
/// data root.
///
/// ```text
/// <root>/integrations/alpha_0_5/sigma_0_2/{cold,hot}-ensemble/
/// <root>/transitions/alpha_0_5/sigma_0_2/{cold-to-hot,hot-to-cold}/
/// <root>/instantons/alpha_0_5/
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn parameter_dir(&self, top: &str, alpha: f64, noise: &NoiseIntensity) -> PathBuf {
        self.root
            .join(top)
            .join(format!("alpha_{}", number_label(alpha)))
            .join(noise_label(noise))
    }

    pub fn integration_dir(&self, alpha: f64, noise: &NoiseIntensity, start: StartWell) -> PathBuf {
        self.parameter_dir("integrations", alpha, noise).join(start.dir_name())
    }

    /// Cold-start directory first, then hot-start.
    pub fn integration_dirs(&self, alpha: f64, noise: &NoiseIntensity) -> [PathBuf; 2] {
        [
            self.integration_dir(alpha, noise, StartWell::Cold),
            self.integration_dir(alpha, noise, StartWell::Hot),
        ]
    }

    pub fn transition_dir(&self, alpha: f64, noise: &NoiseIntensity, direction: Direction) -> PathBuf {
        let leaf = match direction {
            Direction::ColdToHot => "cold-to-hot",
            Direction::HotToCold => "hot-to-cold",
        };
        self.parameter_dir("transitions", alpha, noise).join(leaf)
    }

    pub fn instanton_dir(&self, alpha: f64) -> PathBuf {
        self.root
            .join("instantons")
            .join(format!("alpha_{}", number_label(alpha)))
    }
}

/// Create `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        log::info!("made directory at {}", dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_names_follow_the_sweep_convention() {
        let layout = DataLayout::new("/data");
        let noise = NoiseIntensity::Sigma(0.2);
        assert_eq!(
            layout.integration_dir(0.5, &noise, StartWell::Cold),
            PathBuf::from("/data/integrations/alpha_0_5/sigma_0_2/cold-ensemble")
        );
        assert_eq!(
            layout.transition_dir(1.0, &NoiseIntensity::Epsilon(0.01), Direction::HotToCold),
            PathBuf::from("/data/transitions/alpha_1_0/eps_0_01/hot-to-cold")
        );
        assert_eq!(layout.instanton_dir(0.0), PathBuf::from("/data/instantons/alpha_0_0"));
        let [cold, hot] = layout.integration_dirs(0.25, &noise);
        assert!(cold.ends_with("cold-ensemble") && hot.ends_with("hot-ensemble"));
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a/b/c");
        ensure_dir(&dir).unwrap();
        ensure_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
