pub mod euler_maruyama;
pub mod dormand_prince;

use crate::{State, Time};
use crate::drift::Drift;
use crate::diffusion::Diffusion;

pub use euler_maruyama::EulerMaruyama;
pub use dormand_prince::{DormandPrince, SolverTolerance};

/// Fixed-step stochastic stepper.
pub trait SdeIntegrator: Send + Sync {
    fn step(
        &self,
        t: Time,
        x: &State,
        dt: f64,
        dw: &State,
        drift: &impl Drift,
        diffusion: &impl Diffusion,
    ) -> State;
}
