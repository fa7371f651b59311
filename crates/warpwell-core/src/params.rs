use serde::{Serialize, Deserialize};

use crate::error::{WellError, WellResult};

/// Noise strength in one of the two conventions used by the sweeps.
///
/// `Epsilon(e)` is the variance convention and maps to `sigma = sqrt(e)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseIntensity {
    Sigma(f64),
    Epsilon(f64),
}

impl NoiseIntensity {
    /// Amplitude multiplying the Wiener increment.
    pub fn sigma(&self) -> f64 {
        match *self {
            NoiseIntensity::Sigma(s) => s,
            NoiseIntensity::Epsilon(e) => e.sqrt(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        match *self {
            NoiseIntensity::Sigma(s) => s * s,
            NoiseIntensity::Epsilon(e) => e,
        }
    }

    /// Attribute name under which the raw value is stored.
    pub fn attr_name(&self) -> &'static str {
        match self {
            NoiseIntensity::Sigma(_) => "sigma",
            NoiseIntensity::Epsilon(_) => "epsilon",
        }
    }

    /// Value in its own convention.
    pub fn raw(&self) -> f64 {
        match *self {
            NoiseIntensity::Sigma(v) | NoiseIntensity::Epsilon(v) => v,
        }
    }

    pub fn from_attr(name: &str, value: f64) -> Option<Self> {
        match name {
            "sigma" => Some(NoiseIntensity::Sigma(value)),
            "epsilon" | "eps" => Some(NoiseIntensity::Epsilon(value)),
            _ => None,
        }
    }
}

/// Parameters fixed for the lifetime of one integration run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    /// Rotation strength of the gradient flow; zero gives the symmetric well.
    pub alpha: f64,
    pub noise: NoiseIntensity,
}

impl SimParams {
    pub fn new(alpha: f64, noise: NoiseIntensity) -> Self {
        Self { alpha, noise }
    }

    pub fn deterministic(alpha: f64) -> Self {
        Self::new(alpha, NoiseIntensity::Sigma(0.0))
    }

    pub fn sigma(&self) -> f64 {
        self.noise.sigma()
    }

    pub fn validate(&self) -> WellResult<()> {
        if !self.alpha.is_finite() {
            return Err(WellError::Config(format!(
                "alpha must be finite, got {}",
                self.alpha
            )));
        }
        let raw = self.noise.raw();
        if !raw.is_finite() || raw < 0.0 {
            return Err(WellError::Config(format!(
                "{} must be finite and >= 0, got {}",
                self.noise.attr_name(),
                raw
            )));
        }
        Ok(())
    }
}
