use warpwell_core::{State, Time, TimeGrid, Trajectory, WellError, WellResult};

/// Starting path for the action minimisation; its first and last states
/// stay fixed during refinement.
#[derive(Clone, Debug, PartialEq)]
pub struct PathGuess {
    path: Trajectory,
}

impl PathGuess {
    pub fn new(path: Trajectory) -> WellResult<Self> {
        if path.len() < 2 {
            return Err(WellError::config("a path guess needs at least two points"));
        }
        TimeGrid::new(path.times.clone())?;
        if let Some(i) = path.states.iter().position(|s| !s.is_finite()) {
            return Err(WellError::Config(format!("path guess state {i} is not finite")));
        }
        Ok(Self { path })
    }

    /// Points evenly spaced in index between `start` and `end`.
    pub fn linear(start: State, end: State, grid: &TimeGrid) -> WellResult<Self> {
        let n = grid.len();
        if n < 2 {
            return Err(WellError::config("a path guess needs at least two points"));
        }
        let states = (0..n)
            .map(|k| {
                let s = k as f64 / (n - 1) as f64;
                State(start.0 + (end.0 - start.0) * s)
            })
            .collect();
        Self::new(Trajectory::from_parts(grid.as_slice().to_vec(), states)?)
    }

    /// Stretch `path` onto the span of `grid` and interpolate linearly at
    /// every grid time. Useful for seeding from a detected transition.
    pub fn resampled(path: &Trajectory, grid: &TimeGrid) -> WellResult<Self> {
        if path.len() < 2 || grid.len() < 2 {
            return Err(WellError::config("resampling needs at least two points on both sides"));
        }
        let source = TimeGrid::new(path.times.clone())?;
        let (s0, s1) = (source.first(), source.last());
        let (g0, g1) = (grid.first(), grid.last());
        let stretch = |t: Time| s0 + (t - g0) / (g1 - g0) * (s1 - s0);

        let states = grid
            .iter()
            .map(|&t| interpolate(&path.times, &path.states, stretch(t)))
            .collect();
        Self::new(Trajectory::from_parts(grid.as_slice().to_vec(), states)?)
    }

    /// A relaxation run backwards in time, stretched onto `grid`.
    ///
    /// Relaxing from near the saddle into a well and reversing gives a
    /// well-to-saddle path that is a reasonable first guess for the
    /// uphill half of a transition.
    pub fn reversed_relaxation(relaxation: &Trajectory, grid: &TimeGrid) -> WellResult<Self> {
        if relaxation.len() < 2 {
            return Err(WellError::config("relaxation needs at least two samples"));
        }
        let t_end = relaxation.times[relaxation.len() - 1];
        let times: Vec<Time> = relaxation.times.iter().rev().map(|t| t_end - t).collect();
        let states: Vec<State> = relaxation.states.iter().rev().copied().collect();
        Self::resampled(&Trajectory::from_parts(times, states)?, grid)
    }

    pub fn start(&self) -> State {
        self.path.states[0]
    }

    pub fn end(&self) -> State {
        self.path.states[self.path.len() - 1]
    }

    pub fn grid(&self) -> WellResult<TimeGrid> {
        TimeGrid::new(self.path.times.clone())
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.path
    }

    pub fn into_trajectory(self) -> Trajectory {
        self.path
    }
}

// `times` strictly increasing; `t` is clamped into its span.
fn interpolate(times: &[Time], states: &[State], t: Time) -> State {
    let last = times.len() - 1;
    if t <= times[0] {
        return states[0];
    }
    if t >= times[last] {
        return states[last];
    }
    let hi = times.partition_point(|&s| s <= t).min(last);
    let lo = hi - 1;
    let w = (t - times[lo]) / (times[hi] - times[lo]);
    State(states[lo].0 * (1.0 - w) + states[hi].0 * w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use warpwell_models::{HOT_POINT, SADDLE_POINT};

    #[test]
    fn linear_guess_is_evenly_spaced() {
        let grid = TimeGrid::uniform(0.0, 0.1, 5).unwrap();
        let guess = PathGuess::linear(HOT_POINT, SADDLE_POINT, &grid).unwrap();
        let xs = guess.trajectory().xs();
        assert_eq!(xs, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
        assert_eq!(guess.start(), HOT_POINT);
        assert_eq!(guess.end(), SADDLE_POINT);
        assert_eq!(guess.trajectory().times, grid.as_slice());
    }

    #[test]
    fn reversal_swaps_ends_and_stretches_time() {
        let times = vec![0.0, 1.0, 2.0, 4.0];
        let states = vec![
            State::new(0.1, 0.0),
            State::new(0.5, 0.0),
            State::new(0.9, 0.0),
            State::new(1.0, 0.0),
        ];
        let relaxation = Trajectory::from_parts(times, states).unwrap();
        let grid = TimeGrid::uniform(0.0, 2.0, 5).unwrap();

        let guess = PathGuess::reversed_relaxation(&relaxation, &grid).unwrap();
        let xs = guess.trajectory().xs();
        // reversed times are [0, 2, 3, 4] and map one to one onto [0, 8]
        assert_abs_diff_eq!(xs[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(xs[1], 0.95, epsilon = 1e-12);
        assert_abs_diff_eq!(xs[2], 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(xs[3], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(xs[4], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        let one = TimeGrid::new(vec![0.0]).unwrap();
        assert!(PathGuess::linear(HOT_POINT, SADDLE_POINT, &one).is_err());
        let mut bad = Trajectory::new();
        bad.push(0.0, HOT_POINT);
        bad.push(1.0, State::new(f64::NAN, 0.0));
        assert!(PathGuess::new(bad).is_err());
    }
}
