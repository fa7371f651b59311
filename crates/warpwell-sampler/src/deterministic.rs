use warpwell_core::{
    DormandPrince, SimParams, SolverTolerance, State, Time, Trajectory, WellError, WellResult,
};
use warpwell_models::WarpedWell;

/// Noise-free integrator whose state carries over between calls.
///
/// Every `advance` resumes from where the previous one stopped, so a
/// trajectory can be built incrementally and sampled by an observer.
#[derive(Clone, Debug)]
pub struct DeterministicIntegrator {
    time: Time,
    state: State,
    model: WarpedWell,
    solver: DormandPrince,
}

impl DeterministicIntegrator {
    pub fn new(alpha: f64, x0: State, tolerance: SolverTolerance) -> WellResult<Self> {
        SimParams::deterministic(alpha).validate()?;
        tolerance.validate()?;
        if !x0.is_finite() {
            return Err(WellError::Config(format!("initial state {x0:?} is not finite")));
        }
        Ok(Self {
            time: 0.0,
            state: x0,
            model: WarpedWell::deterministic(alpha),
            solver: DormandPrince::new(tolerance),
        })
    }

    /// Integrate for `duration` adimensional time units from the current point.
    pub fn advance(&mut self, duration: f64) -> WellResult<()> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(WellError::Config(format!(
                "advance duration must be finite and >= 0, got {duration}"
            )));
        }
        if duration == 0.0 {
            return Ok(());
        }

        let t_end = self.time + duration;
        let (state, stats) = self.solver.integrate(&self.model, self.time, self.state, t_end)?;
        log::trace!(
            "advanced to t = {t_end} in {} steps ({} rejected)",
            stats.accepted,
            stats.rejected
        );
        self.time = t_end;
        self.state = state;
        Ok(())
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn set_state(&mut self, x: State) {
        self.state = x;
    }

    pub fn alpha(&self) -> f64 {
        self.model.alpha
    }

    pub fn params(&self) -> SimParams {
        SimParams::deterministic(self.model.alpha)
    }
}

/// Relaxation trajectory from `x0`, sampled every `obs_freq` up to `duration`.
pub fn relax(
    x0: State,
    alpha: f64,
    duration: f64,
    obs_freq: f64,
    tolerance: SolverTolerance,
) -> WellResult<Trajectory> {
    if !(obs_freq > 0.0) || !obs_freq.is_finite() {
        return Err(WellError::Config(format!("obs_freq must be > 0, got {obs_freq}")));
    }
    if !(duration >= 0.0) || !duration.is_finite() {
        return Err(WellError::Config(format!("duration must be finite and >= 0, got {duration}")));
    }
    let mut integrator = DeterministicIntegrator::new(alpha, x0, tolerance)?;
    let obs_num = (duration / obs_freq).round() as usize;

    let mut path = Trajectory::with_capacity(obs_num + 1);
    path.push(integrator.time(), integrator.state());
    for _ in 0..obs_num {
        integrator.advance(obs_freq)?;
        path.push(integrator.time(), integrator.state());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use warpwell_models::{COLD_POINT, HOT_POINT, SADDLE_POINT};

    #[test]
    fn relaxes_into_nearest_well() {
        for &alpha in &[0.0, 0.5, 1.0] {
            let mut right = DeterministicIntegrator::new(alpha, State::new(0.3, 0.2), SolverTolerance::default()).unwrap();
            right.advance(40.0).unwrap();
            assert!(right.state().distance(&HOT_POINT) < 1e-3, "alpha = {alpha}: {:?}", right.state());

            let mut left = DeterministicIntegrator::new(alpha, State::new(-0.3, -0.2), SolverTolerance::default()).unwrap();
            left.advance(40.0).unwrap();
            assert!(left.state().distance(&COLD_POINT) < 1e-3, "alpha = {alpha}: {:?}", left.state());
        }
    }

    #[test]
    fn continuation_matches_single_advance() {
        let tol = SolverTolerance { rtol: 1e-10, atol: 1e-12, max_steps: 100_000 };
        let x0 = State::new(0.2, 0.5);

        let mut once = DeterministicIntegrator::new(0.5, x0, tol).unwrap();
        once.advance(2.0).unwrap();

        let mut twice = DeterministicIntegrator::new(0.5, x0, tol).unwrap();
        twice.advance(1.0).unwrap();
        twice.advance(1.0).unwrap();

        assert_eq!(twice.time(), 2.0);
        assert_abs_diff_eq!(once.state().x(), twice.state().x(), epsilon = 1e-8);
        assert_abs_diff_eq!(once.state().y(), twice.state().y(), epsilon = 1e-8);
    }

    #[test]
    fn fixed_point_is_not_moved() {
        let mut integrator = DeterministicIntegrator::new(0.8, SADDLE_POINT, SolverTolerance::default()).unwrap();
        integrator.advance(10.0).unwrap();
        assert_eq!(integrator.state(), SADDLE_POINT);
        assert_eq!(integrator.time(), 10.0);
    }

    #[test]
    fn rejects_negative_duration() {
        let mut integrator = DeterministicIntegrator::new(0.0, HOT_POINT, SolverTolerance::default()).unwrap();
        assert!(matches!(integrator.advance(-1.0), Err(WellError::Config(_))));
        integrator.advance(0.0).unwrap();
        assert_eq!(integrator.time(), 0.0);
    }

    #[test]
    fn relax_samples_at_fixed_interval() {
        let path = relax(State::new(0.1, 0.1), 0.5, 5.0, 0.5, SolverTolerance::default()).unwrap();
        assert_eq!(path.len(), 11);
        assert_abs_diff_eq!(path.times[10], 5.0, epsilon = 1e-12);
        assert!(path.final_state().unwrap().distance(&HOT_POINT) < 0.5);
    }

    #[test]
    fn relax_rejects_bad_durations() {
        for duration in [-1.0, f64::NAN, f64::INFINITY] {
            let err = relax(State::new(0.3, 0.1), 0.5, duration, 0.1, SolverTolerance::default());
            assert!(matches!(err, Err(WellError::Config(_))), "duration {duration}");
        }
    }
}
