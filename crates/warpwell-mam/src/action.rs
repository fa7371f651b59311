use nalgebra::Vector2;
use warpwell_core::{State, Time, TimeGrid, WellError, WellResult};
use warpwell_models::WarpedWell;

/// Scalar function of a flat parameter vector with an analytic gradient.
pub trait Objective {
    fn dim(&self) -> usize;

    /// Value at `x`; the gradient is written into `grad` (same length as `x`).
    fn evaluate(&self, x: &[f64], grad: &mut [f64]) -> f64;
}

fn midpoint(a: &State, b: &State) -> State {
    State((a.0 + b.0) * 0.5)
}

// (x_{i+1} - x_i) / dt - b(m_i)
fn residual(a: &State, b: &State, dt: f64, alpha: f64) -> Vector2<f64> {
    (b.0 - a.0) / dt - WarpedWell::drift(&midpoint(a, b), alpha).0
}

/// Discrete Freidlin–Wentzell action of `path` with identity diffusion:
///
/// `S = 1/2 sum_i |(x_{i+1} - x_i) / dt_i - b(m_i)|^2 dt_i`, `m_i` the
/// segment midpoint.
pub fn action(path: &[State], times: &[Time], alpha: f64) -> f64 {
    path.windows(2)
        .zip(times.windows(2))
        .map(|(p, t)| {
            let dt = t[1] - t[0];
            0.5 * residual(&p[0], &p[1], dt, alpha).norm_squared() * dt
        })
        .sum()
}

/// Gradient of [`action`] with respect to every point of `path`, endpoints
/// included.
pub fn action_gradient(path: &[State], times: &[Time], alpha: f64) -> Vec<State> {
    let mut grad = vec![State::zeros(); path.len()];
    for i in 0..path.len().saturating_sub(1) {
        let dt = times[i + 1] - times[i];
        let r = residual(&path[i], &path[i + 1], dt, alpha);
        let jac = WarpedWell::drift_jacobian(&midpoint(&path[i], &path[i + 1]), alpha);
        let half = jac.transpose() * r * (0.5 * dt);
        grad[i].0 -= r + half;
        grad[i + 1].0 += r - half;
    }
    grad
}

/// Action over the interior points of a path whose endpoints are pinned.
///
/// The decision vector is `[x_1, y_1, x_2, y_2, ..., x_{n-2}, y_{n-2}]`.
#[derive(Clone, Debug)]
pub struct FreidlinWentzell {
    alpha: f64,
    times: Vec<Time>,
    start: State,
    end: State,
}

impl FreidlinWentzell {
    pub fn new(grid: &TimeGrid, start: State, end: State, alpha: f64) -> WellResult<Self> {
        if grid.len() < 2 {
            return Err(WellError::config("an action path needs at least two grid points"));
        }
        if !alpha.is_finite() {
            return Err(WellError::Config(format!("alpha must be finite, got {alpha}")));
        }
        if !start.is_finite() || !end.is_finite() {
            return Err(WellError::config("path endpoints must be finite"));
        }
        Ok(Self {
            alpha,
            times: grid.as_slice().to_vec(),
            start,
            end,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn interior_len(&self) -> usize {
        self.times.len() - 2
    }

    /// Flatten the interior of a full path.
    pub fn pack(&self, path: &[State]) -> Vec<f64> {
        let n = path.len();
        path[1..n - 1].iter().flat_map(|s| [s.x(), s.y()]).collect()
    }

    /// Full path with the pinned endpoints around the interior `x`.
    pub fn unpack(&self, x: &[f64]) -> Vec<State> {
        let mut path = Vec::with_capacity(self.times.len());
        path.push(self.start);
        path.extend(x.chunks_exact(2).map(|c| State::new(c[0], c[1])));
        path.push(self.end);
        path
    }
}

impl Objective for FreidlinWentzell {
    fn dim(&self) -> usize {
        2 * self.interior_len()
    }

    fn evaluate(&self, x: &[f64], grad: &mut [f64]) -> f64 {
        let path = self.unpack(x);
        let full = action_gradient(&path, &self.times, self.alpha);
        for (k, g) in full[1..path.len() - 1].iter().enumerate() {
            grad[2 * k] = g.x();
            grad[2 * k + 1] = g.y();
        }
        action(&path, &self.times, self.alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use warpwell_models::{COLD_POINT, HOT_POINT, SADDLE_POINT};

    fn wiggly_path(n: usize) -> Vec<State> {
        (0..n)
            .map(|k| {
                let s = k as f64 / (n - 1) as f64;
                State::new(-1.0 + 2.0 * s, 0.3 * (3.0 * s).sin())
            })
            .collect()
    }

    #[test]
    fn fixed_point_path_costs_nothing() {
        let times: Vec<f64> = (0..10).map(|k| 0.1 * k as f64).collect();
        for point in [COLD_POINT, HOT_POINT, SADDLE_POINT] {
            let path = vec![point; 10];
            assert_eq!(action(&path, &times, 0.7), 0.0);
        }
    }

    #[test]
    fn single_segment_by_hand() {
        let times = [0.0, 0.5];
        let path = [State::new(0.0, 0.0), State::new(0.0, 1.0)];
        // r = (0, 2) - b(0, 0.5) = (0, 2) - (0, -1) = (0, 3)
        assert_relative_eq!(action(&path, &times, 0.0), 0.5 * 9.0 * 0.5, epsilon = 1e-14);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let n = 12;
        let path = wiggly_path(n);
        let times: Vec<f64> = (0..n).map(|k| 0.25 * k as f64 + 0.01 * (k * k) as f64).collect();
        let alpha = 0.6;
        let grad = action_gradient(&path, &times, alpha);

        let h = 1e-6;
        for i in 0..n {
            for c in 0..2 {
                let mut plus = path.clone();
                let mut minus = path.clone();
                plus[i].0[c] += h;
                minus[i].0[c] -= h;
                let fd = (action(&plus, &times, alpha) - action(&minus, &times, alpha)) / (2.0 * h);
                assert_relative_eq!(grad[i].0[c], fd, epsilon = 1e-6, max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn objective_packs_interior_only() {
        let n = 8;
        let grid = TimeGrid::uniform(0.0, 0.2, n).unwrap();
        let path = wiggly_path(n);
        let fw = FreidlinWentzell::new(&grid, path[0], path[n - 1], 0.3).unwrap();

        let x = fw.pack(&path);
        assert_eq!(x.len(), fw.dim());
        assert_eq!(fw.unpack(&x), path);

        let mut grad = vec![0.0; fw.dim()];
        let value = fw.evaluate(&x, &mut grad);
        assert_relative_eq!(value, action(&path, grid.as_slice(), 0.3), epsilon = 1e-14);
        let full = action_gradient(&path, grid.as_slice(), 0.3);
        assert_eq!(grad[0], full[1].x());
        assert_eq!(grad[fw.dim() - 1], full[n - 2].y());
    }

    #[test]
    fn two_point_grid_has_no_free_variables() {
        let grid = TimeGrid::new(vec![0.0, 1.0]).unwrap();
        let fw = FreidlinWentzell::new(&grid, COLD_POINT, HOT_POINT, 0.0).unwrap();
        assert_eq!(fw.dim(), 0);
        assert!(FreidlinWentzell::new(&TimeGrid::new(vec![0.0]).unwrap(), COLD_POINT, HOT_POINT, 0.0).is_err());
    }
}
