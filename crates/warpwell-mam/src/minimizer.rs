use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use warpwell_core::{State, WellError, WellResult};

use crate::action::Objective;

/// Budget for one call to [`Minimizer::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimizeOptions {
    pub maxiter: usize,
    pub maxfun: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinimizeResult {
    pub success: bool,
    pub message: String,
    /// Objective value at the current solution.
    pub fun: f64,
    /// Iterations taken by this call only.
    pub nit: usize,
    pub nfev: usize,
}

/// Iterative minimiser that keeps its current solution between calls, so a
/// long minimisation can be split into budgeted chunks.
pub trait Minimizer {
    fn run(&mut self, options: MinimizeOptions) -> WellResult<MinimizeResult>;

    fn solution(&self) -> &[f64];
}

/// Box constraint applied to every free point, coordinate by coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: State,
    pub upper: State,
}

impl Bounds {
    pub fn new(lower: State, upper: State) -> WellResult<Self> {
        for c in 0..2 {
            let (lo, hi) = (lower.0[c], upper.0[c]);
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(WellError::Config(format!(
                    "invalid bounds on coordinate {c}: [{lo}, {hi}]"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    fn limits(&self, k: usize) -> (f64, f64) {
        let c = k % 2;
        (self.lower.0[c], self.upper.0[c])
    }

    /// Clamp an interleaved `[x, y, x, y, ...]` vector into the box.
    pub fn project(&self, x: &mut [f64]) {
        for (k, v) in x.iter_mut().enumerate() {
            let (lo, hi) = self.limits(k);
            *v = v.clamp(lo, hi);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LbfgsSettings {
    /// Number of correction pairs kept.
    pub memory: usize,
    /// Stop when the infinity norm of the projected gradient is below this.
    pub gtol: f64,
    /// Stop when `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1)` is below this.
    pub ftol: f64,
    pub armijo: f64,
    pub max_backtracks: usize,
}

impl Default for LbfgsSettings {
    fn default() -> Self {
        Self {
            memory: 10,
            gtol: 1e-5,
            ftol: 2.220446049250313e-9,
            armijo: 1e-4,
            max_backtracks: 40,
        }
    }
}

impl LbfgsSettings {
    pub fn validate(&self) -> WellResult<()> {
        if self.memory == 0 {
            return Err(WellError::config("L-BFGS memory must be > 0"));
        }
        if !(self.gtol >= 0.0) || !(self.ftol >= 0.0) {
            return Err(WellError::config("gtol and ftol must be >= 0"));
        }
        if !(self.armijo > 0.0 && self.armijo < 1.0) {
            return Err(WellError::Config(format!(
                "armijo constant must lie in (0, 1), got {}",
                self.armijo
            )));
        }
        Ok(())
    }
}

const MSG_PGTOL: &str = "CONVERGENCE: NORM_OF_PROJECTED_GRADIENT_<=_PGTOL";
const MSG_FTOL: &str = "CONVERGENCE: REL_REDUCTION_OF_F_<=_FTOL";
const MSG_MAXITER: &str = "STOP: TOTAL NO. OF ITERATIONS REACHED LIMIT";
const MSG_MAXFUN: &str = "STOP: TOTAL NO. OF f AND g EVALUATIONS EXCEEDS LIMIT";
const MSG_LINESEARCH: &str = "ABNORMAL_TERMINATION_IN_LNSRCH";

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Limited-memory BFGS with projection onto optional box bounds and an
/// Armijo backtracking line search.
#[derive(Clone, Debug)]
pub struct Lbfgs<O: Objective> {
    objective: O,
    settings: LbfgsSettings,
    bounds: Option<Bounds>,
    x: Vec<f64>,
    fx: f64,
    grad: Vec<f64>,
    pairs: VecDeque<(Vec<f64>, Vec<f64>)>,
}

impl<O: Objective> Lbfgs<O> {
    pub fn new(
        objective: O,
        x0: Vec<f64>,
        settings: LbfgsSettings,
        bounds: Option<Bounds>,
    ) -> WellResult<Self> {
        settings.validate()?;
        if x0.len() != objective.dim() {
            return Err(WellError::Config(format!(
                "starting point has {} entries, objective expects {}",
                x0.len(),
                objective.dim()
            )));
        }
        let mut x = x0;
        if let Some(b) = &bounds {
            b.project(&mut x);
        }
        let mut grad = vec![0.0; x.len()];
        let fx = objective.evaluate(&x, &mut grad);
        if !fx.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(WellError::SolverFailure(
                "objective is not finite at the starting point".into(),
            ));
        }
        Ok(Self {
            objective,
            settings,
            bounds,
            x,
            fx,
            grad,
            pairs: VecDeque::new(),
        })
    }

    pub fn fun(&self) -> f64 {
        self.fx
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    // Free variables are those not pinned at a bound by the gradient sign.
    fn is_active(&self, k: usize) -> bool {
        match &self.bounds {
            None => false,
            Some(b) => {
                let (lo, hi) = b.limits(k);
                (self.x[k] <= lo && self.grad[k] > 0.0) || (self.x[k] >= hi && self.grad[k] < 0.0)
            }
        }
    }

    fn projected_gradient_norm(&self) -> f64 {
        (0..self.x.len())
            .filter(|&k| !self.is_active(k))
            .map(|k| self.grad[k].abs())
            .fold(0.0, f64::max)
    }

    // Two-loop recursion on the free variables.
    fn search_direction(&self) -> Vec<f64> {
        let free: Vec<bool> = (0..self.x.len()).map(|k| !self.is_active(k)).collect();
        let mut q: Vec<f64> = self
            .grad
            .iter()
            .zip(&free)
            .map(|(g, &f)| if f { *g } else { 0.0 })
            .collect();

        let mut coeffs = Vec::with_capacity(self.pairs.len());
        for (s, y) in self.pairs.iter().rev() {
            let rho = 1.0 / dot(y, s);
            let a = rho * dot(s, &q);
            q.iter_mut().zip(y).for_each(|(qi, yi)| *qi -= a * yi);
            coeffs.push(a);
        }

        let gamma = match self.pairs.back() {
            Some((s, y)) => dot(s, y) / dot(y, y),
            None => 1.0,
        };
        let mut r: Vec<f64> = q.iter().map(|v| gamma * v).collect();

        for ((s, y), a) in self.pairs.iter().zip(coeffs.iter().rev()) {
            let rho = 1.0 / dot(y, s);
            let b = rho * dot(y, &r);
            r.iter_mut().zip(s).for_each(|(ri, si)| *ri += (a - b) * si);
        }

        r.iter()
            .zip(&free)
            .map(|(v, &f)| if f { -v } else { 0.0 })
            .collect()
    }

    fn steepest_descent(&self) -> Vec<f64> {
        (0..self.x.len())
            .map(|k| if self.is_active(k) { 0.0 } else { -self.grad[k] })
            .collect()
    }

    fn result(&self, success: bool, message: &str, nit: usize, nfev: usize) -> MinimizeResult {
        MinimizeResult {
            success,
            message: message.to_string(),
            fun: self.fx,
            nit,
            nfev,
        }
    }
}

impl<O: Objective> Minimizer for Lbfgs<O> {
    fn run(&mut self, options: MinimizeOptions) -> WellResult<MinimizeResult> {
        let mut nit = 0;
        let mut nfev = 0;

        loop {
            if self.projected_gradient_norm() <= self.settings.gtol {
                return Ok(self.result(true, MSG_PGTOL, nit, nfev));
            }
            if nit >= options.maxiter {
                return Ok(self.result(false, MSG_MAXITER, nit, nfev));
            }
            if nfev >= options.maxfun {
                return Ok(self.result(false, MSG_MAXFUN, nit, nfev));
            }

            let mut direction = self.search_direction();
            if !(dot(&self.grad, &direction) < 0.0) {
                log::debug!("L-BFGS direction is not descending, dropping curvature memory");
                self.pairs.clear();
                direction = self.steepest_descent();
            }

            let mut step = if self.pairs.is_empty() {
                let largest = direction.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
                (1.0 / largest).min(1.0)
            } else {
                1.0
            };

            let mut trial = vec![0.0; self.x.len()];
            let mut trial_grad = vec![0.0; self.x.len()];
            let mut accepted = None;
            for _ in 0..=self.settings.max_backtracks {
                if nfev >= options.maxfun {
                    return Ok(self.result(false, MSG_MAXFUN, nit, nfev));
                }
                for k in 0..trial.len() {
                    trial[k] = self.x[k] + step * direction[k];
                }
                if let Some(b) = &self.bounds {
                    b.project(&mut trial);
                }
                let f_trial = self.objective.evaluate(&trial, &mut trial_grad);
                nfev += 1;

                let moved: Vec<f64> = trial.iter().zip(&self.x).map(|(t, x)| t - x).collect();
                let decrease = self.settings.armijo * dot(&self.grad, &moved);
                if f_trial.is_finite() && decrease < 0.0 && f_trial <= self.fx + decrease {
                    accepted = Some((f_trial, moved));
                    break;
                }
                step *= 0.5;
            }

            let Some((f_new, s)) = accepted else {
                return Ok(self.result(false, MSG_LINESEARCH, nit, nfev));
            };

            let y: Vec<f64> = trial_grad.iter().zip(&self.grad).map(|(a, b)| a - b).collect();
            let sy = dot(&s, &y);
            if sy > f64::EPSILON * dot(&y, &y) {
                self.pairs.push_back((s, y));
                if self.pairs.len() > self.settings.memory {
                    self.pairs.pop_front();
                }
            }

            let f_old = self.fx;
            std::mem::swap(&mut self.x, &mut trial);
            std::mem::swap(&mut self.grad, &mut trial_grad);
            self.fx = f_new;
            nit += 1;

            let scale = f_old.abs().max(f_new.abs()).max(1.0);
            if (f_old - f_new) / scale <= self.settings.ftol {
                return Ok(self.result(true, MSG_FTOL, nit, nfev));
            }
        }
    }

    fn solution(&self) -> &[f64] {
        &self.x
    }
}
