//! Adaptive Dormand–Prince 5(4) stepper for the noise-free flow.
//!
//! Step acceptance uses the RMS error norm scaled by `atol + rtol * |y|`,
//! with the usual safety factor and growth limits.

use serde::{Serialize, Deserialize};

use crate::drift::Drift;
use crate::error::{WellError, WellResult};
use crate::{State, Time};

const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0],
    [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];

// Fifth-order weights minus embedded fourth-order weights.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Error tolerances and step budget for the adaptive solver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverTolerance {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on attempted steps per `integrate` call.
    pub max_steps: usize,
}

impl Default for SolverTolerance {
    fn default() -> Self {
        Self { rtol: 1e-3, atol: 1e-6, max_steps: 1_000_000 }
    }
}

impl SolverTolerance {
    pub fn validate(&self) -> WellResult<()> {
        if !(self.rtol > 0.0) || !(self.atol > 0.0) {
            return Err(WellError::Config(format!(
                "solver tolerances must be > 0, got rtol={} atol={}",
                self.rtol, self.atol
            )));
        }
        if self.max_steps == 0 {
            return Err(WellError::config("solver max_steps must be > 0"));
        }
        Ok(())
    }
}

/// Summary of one `integrate` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveStats {
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DormandPrince {
    pub tolerance: SolverTolerance,
}

impl DormandPrince {
    pub fn new(tolerance: SolverTolerance) -> Self {
        Self { tolerance }
    }

    /// Integrate `dx/dt = drift(t, x)` from `(t0, x0)` to `t1 >= t0`.
    pub fn integrate(
        &self,
        drift: &impl Drift,
        t0: Time,
        x0: State,
        t1: Time,
    ) -> WellResult<(State, SolveStats)> {
        let mut stats = SolveStats { accepted: 0, rejected: 0 };
        if t1 == t0 {
            return Ok((x0, stats));
        }
        if !(t1 > t0) {
            return Err(WellError::Config(format!(
                "integration end {t1} precedes start {t0}"
            )));
        }
        if !x0.is_finite() {
            return Err(WellError::NumericalDivergence { time: t0, index: 0 });
        }

        let tol = self.tolerance;
        let mut t = t0;
        let mut x = x0;
        let mut f = drift.mu(t, &x);
        let mut h = self.initial_step(drift, t, &x, &f, t1 - t0);

        while t < t1 {
            if stats.accepted + stats.rejected >= tol.max_steps {
                return Err(WellError::SolverFailure(format!(
                    "exceeded {} steps before reaching t = {t1} (stopped at t = {t})",
                    tol.max_steps
                )));
            }
            let min_step = 10.0 * f64::EPSILON * t.abs().max(1.0);
            if h < min_step {
                return Err(WellError::SolverFailure(format!(
                    "step size underflow at t = {t} (h = {h:e})"
                )));
            }
            h = h.min(t1 - t);

            let (x_new, f_new, err) = self.attempt(drift, t, &x, &f, h);
            if !x_new.is_finite() || !err.is_finite() {
                // Too large a step can overflow the cubic drift; shrink and retry.
                stats.rejected += 1;
                h *= MIN_FACTOR;
                continue;
            }

            if err <= 1.0 {
                let t_new = if t1 - t <= h { t1 } else { t + h };
                t = t_new;
                x = x_new;
                f = f_new;
                stats.accepted += 1;
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(-0.2)).min(MAX_FACTOR)
                };
                h *= factor;
            } else {
                stats.rejected += 1;
                h *= (SAFETY * err.powf(-0.2)).max(MIN_FACTOR);
            }
        }

        if !x.is_finite() {
            return Err(WellError::NumericalDivergence { time: t, index: stats.accepted });
        }
        log::trace!(
            "rk45 reached t = {t1}: {} accepted, {} rejected steps",
            stats.accepted,
            stats.rejected
        );
        Ok((x, stats))
    }

    /// One trial step; returns the fifth-order solution, its derivative
    /// (FSAL) and the scaled error norm.
    fn attempt(
        &self,
        drift: &impl Drift,
        t: Time,
        x: &State,
        f0: &State,
        h: f64,
    ) -> (State, State, f64) {
        let mut k = [f0.0; 7];
        for stage in 1..7 {
            let mut increment = nalgebra::Vector2::zeros();
            for (j, kj) in k.iter().enumerate().take(stage) {
                increment += kj * A[stage][j];
            }
            let y = State(x.0 + increment * h);
            k[stage] = drift.mu(t + C[stage] * h, &y).0;
        }

        // Row 7 of A is the fifth-order solution; k[6] is evaluated there.
        let mut increment = nalgebra::Vector2::zeros();
        for (j, kj) in k.iter().enumerate().take(6) {
            increment += kj * A[6][j];
        }
        let x_new = State(x.0 + increment * h);

        let mut err_vec = nalgebra::Vector2::zeros();
        for (kj, ej) in k.iter().zip(E.iter()) {
            err_vec += kj * *ej;
        }
        err_vec *= h;

        let err = self.error_norm(&err_vec, x, &x_new);
        (x_new, State(k[6]), err)
    }

    fn error_norm(&self, err: &nalgebra::Vector2<f64>, x: &State, x_new: &State) -> f64 {
        let tol = self.tolerance;
        let mut acc = 0.0;
        for i in 0..2 {
            let scale = tol.atol + tol.rtol * x.0[i].abs().max(x_new.0[i].abs());
            let r = err[i] / scale;
            acc += r * r;
        }
        (acc / 2.0).sqrt()
    }

    fn initial_step(&self, drift: &impl Drift, t: Time, x: &State, f0: &State, span: f64) -> f64 {
        let tol = self.tolerance;
        let scaled_norm = |v: &nalgebra::Vector2<f64>| {
            let mut acc = 0.0;
            for i in 0..2 {
                let r = v[i] / (tol.atol + tol.rtol * x.0[i].abs());
                acc += r * r;
            }
            (acc / 2.0).sqrt()
        };

        let d0 = scaled_norm(&x.0);
        let d1 = scaled_norm(&f0.0);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(span);

        let x1 = State(x.0 + f0.0 * h0);
        let f1 = drift.mu(t + h0, &x1);
        let d2 = scaled_norm(&(f1.0 - f0.0)) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(0.2)
        };
        let h = (100.0 * h0).min(h1).min(span);
        if h.is_finite() && h > 0.0 { h } else { span.min(1e-6) }
    }
}
