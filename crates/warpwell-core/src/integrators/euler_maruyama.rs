use super::SdeIntegrator;
use crate::{State, Time};
use crate::drift::Drift;
use crate::diffusion::Diffusion;

#[derive(Clone, Copy, Debug, Default)]
pub struct EulerMaruyama;

impl SdeIntegrator for EulerMaruyama {
    fn step(
        &self,
        t: Time,
        x: &State,
        dt: f64,
        dw: &State,
        drift: &impl Drift,
        diffusion: &impl Diffusion,
    ) -> State {
        let mu = drift.mu(t, x);
        let sigma = diffusion.sigma(t, x);

        // X_{t+dt} = X_t + μ*dt + σ*dW
        State(x.0 + mu.0 * dt + sigma * dw.0)
    }
}
