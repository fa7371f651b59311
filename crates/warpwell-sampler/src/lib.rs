use rayon::prelude::*;
use warpwell_core::{
    Ensemble, EulerMaruyama, NoiseGenerator, Realization, SdeIntegrator, SimParams, State,
    TimeGrid, Trajectory, WellError, WellResult,
};
use warpwell_models::WarpedWell;

pub mod deterministic;
pub mod observer;
pub mod waiting;

pub use deterministic::{relax, DeterministicIntegrator};
pub use observer::{make_observations, ObservationSink, TrajectoryObserver};
pub use waiting::{WaitingTimeExperiment, WaitingTimes};

/// Fixed-grid sampler for the warped double well.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sampler<I>
where
    I: SdeIntegrator,
{
    pub integrator: I,
}

impl<I> Sampler<I>
where
    I: SdeIntegrator,
{
    pub fn new(integrator: I) -> Self {
        Self { integrator }
    }

    /// Integrate one realization over `grid`, drawing increments from `noise`.
    ///
    /// Each step uses its own `dt_i = t[i+1] - t[i]`, so non-uniform grids
    /// are integrated as given.
    pub fn integrate(
        &self,
        x0: State,
        grid: &TimeGrid,
        params: &SimParams,
        noise: &mut NoiseGenerator,
    ) -> WellResult<Trajectory> {
        params.validate()?;
        if !x0.is_finite() {
            return Err(WellError::Config(format!("initial state {x0:?} is not finite")));
        }

        let model = WarpedWell::from_params(params);
        let times = grid.as_slice();
        let mut path = Trajectory::with_capacity(times.len());
        let mut x = x0;
        path.push(times[0], x);

        for i in 0..times.len() - 1 {
            let t = times[i];
            let dt = times[i + 1] - t;
            let dw = noise.generate_dw(dt.sqrt());
            x = self.integrator.step(t, &x, dt, &dw, &model, &model);
            if !x.is_finite() {
                return Err(WellError::NumericalDivergence { time: times[i + 1], index: i + 1 });
            }
            path.push(times[i + 1], x);
        }

        Ok(path)
    }

    /// Run one realization per initial state in parallel.
    ///
    /// Realization `k` (1-based) draws from the stream
    /// `NoiseGenerator::from_path_id(global_seed, k)`, so the result does not
    /// depend on thread count or scheduling.
    pub fn ensemble_integrate(
        &self,
        x0s: &[State],
        grid: &TimeGrid,
        params: &SimParams,
        global_seed: u64,
    ) -> WellResult<Ensemble> {
        params.validate()?;
        if x0s.is_empty() {
            return Err(WellError::config("ensemble needs at least one initial state"));
        }

        log::debug!(
            "integrating {} realizations over {} samples (alpha = {}, sigma = {})",
            x0s.len(),
            grid.len(),
            params.alpha,
            params.sigma()
        );

        let realizations: Vec<Realization> = x0s
            .par_iter()
            .enumerate()
            .map(|(index, x0)| {
                let id = index as u64 + 1;
                let mut noise = NoiseGenerator::from_path_id(global_seed, id);
                self.integrate(*x0, grid, params, &mut noise)
                    .map(|path| Realization { id, states: path.states })
            })
            .collect::<WellResult<Vec<_>>>()?;

        Ok(Ensemble {
            times: grid.as_slice().to_vec(),
            params: *params,
            realizations,
        })
    }
}

/// Euler–Maruyama integration of a single realization.
pub fn integrate(
    x0: State,
    grid: &TimeGrid,
    params: &SimParams,
    noise: &mut NoiseGenerator,
) -> WellResult<Trajectory> {
    Sampler::new(EulerMaruyama).integrate(x0, grid, params, noise)
}

/// Euler–Maruyama ensemble, realizations indexed `1..=x0s.len()`.
pub fn ensemble_integrate(
    x0s: &[State],
    grid: &TimeGrid,
    params: &SimParams,
    global_seed: u64,
) -> WellResult<Ensemble> {
    Sampler::new(EulerMaruyama).ensemble_integrate(x0s, grid, params, global_seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpwell_core::NoiseIntensity;
    use warpwell_models::{COLD_POINT, HOT_POINT};

    #[test]
    fn single_path_follows_grid() {
        let grid = TimeGrid::uniform(0.0, 0.01, 100).unwrap();
        let params = SimParams::new(0.5, NoiseIntensity::Sigma(0.2));
        let mut noise = NoiseGenerator::new(42);
        let path = integrate(COLD_POINT, &grid, &params, &mut noise).unwrap();

        assert_eq!(path.len(), 100);
        assert_eq!(path.states[0], COLD_POINT);
        for i in 1..path.times.len() {
            assert!((path.times[i] - path.times[i - 1] - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn single_point_grid_returns_initial_state() {
        let grid = TimeGrid::new(vec![3.0]).unwrap();
        let params = SimParams::new(0.0, NoiseIntensity::Epsilon(1.0));
        let path = integrate(HOT_POINT, &grid, &params, &mut NoiseGenerator::new(1)).unwrap();
        assert_eq!(path.times, vec![3.0]);
        assert_eq!(path.states, vec![HOT_POINT]);
    }

    #[test]
    fn negative_noise_fails_before_integrating() {
        let grid = TimeGrid::uniform(0.0, 0.1, 10).unwrap();
        let params = SimParams::new(0.0, NoiseIntensity::Sigma(-1.0));
        let err = integrate(COLD_POINT, &grid, &params, &mut NoiseGenerator::new(1)).unwrap_err();
        assert!(matches!(err, WellError::Config(_)));
        assert!(ensemble_integrate(&[], &grid, &SimParams::deterministic(0.0), 1).is_err());
    }

    #[test]
    fn blow_up_is_reported_as_divergence() {
        // dt far too coarse for the cubic drift started far from the wells
        let grid = TimeGrid::uniform(0.0, 1.0, 50).unwrap();
        let params = SimParams::deterministic(0.0);
        let err = integrate(State::new(50.0, 0.0), &grid, &params, &mut NoiseGenerator::new(1))
            .unwrap_err();
        assert!(matches!(err, WellError::NumericalDivergence { .. }));
    }
}
