use nalgebra::Matrix2;
use warpwell_core::{Diffusion, Drift, NoiseIntensity, SimParams, State, Time};

/// Stable point on the left, `(-1, 0)`.
pub const COLD_POINT: State = State(nalgebra::Vector2::new(-1.0, 0.0));
/// Stable point on the right, `(1, 0)`.
pub const HOT_POINT: State = State(nalgebra::Vector2::new(1.0, 0.0));
/// Saddle separating the two wells.
pub const SADDLE_POINT: State = State(nalgebra::Vector2::new(0.0, 0.0));

/// Warped double well: dX = -(I + αR)∇V(X) dt + σ dW
/// with V(x, y) = (x² - 1)²/4 + y² and R the 90° rotation.
///
/// The rotation leaves the fixed points of ∇V in place but makes the
/// cold→hot and hot→cold transition routes differ.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WarpedWell {
    pub alpha: f64,
    pub sigma: f64,
}

impl WarpedWell {
    pub fn new(alpha: f64, noise: NoiseIntensity) -> Self {
        Self { alpha, sigma: noise.sigma() }
    }

    pub fn from_params(params: &SimParams) -> Self {
        Self { alpha: params.alpha, sigma: params.sigma() }
    }

    /// Noise-free flow.
    pub fn deterministic(alpha: f64) -> Self {
        Self { alpha, sigma: 0.0 }
    }

    /// V(x, y) = (x² - 1)²/4 + y²
    pub fn potential(x: &State) -> f64 {
        let a = x.x() * x.x() - 1.0;
        0.25 * a * a + x.y() * x.y()
    }

    /// ∇V = (x(x² - 1), 2y)
    pub fn grad_potential(x: &State) -> State {
        State::new(x.x() * (x.x() * x.x() - 1.0), 2.0 * x.y())
    }

    /// Hessian of V, diag(3x² - 1, 2).
    pub fn hessian_potential(x: &State) -> Matrix2<f64> {
        Matrix2::new(3.0 * x.x() * x.x() - 1.0, 0.0, 0.0, 2.0)
    }

    /// I + αR with R = [[0, -1], [1, 0]].
    pub fn warp_matrix(alpha: f64) -> Matrix2<f64> {
        Matrix2::new(1.0, -alpha, alpha, 1.0)
    }

    /// b(x) = -(I + αR)∇V(x)
    pub fn drift(x: &State, alpha: f64) -> State {
        State(-(Self::warp_matrix(alpha) * Self::grad_potential(x).0))
    }

    /// ∂b/∂x = -(I + αR) Hess V
    pub fn drift_jacobian(x: &State, alpha: f64) -> Matrix2<f64> {
        -(Self::warp_matrix(alpha) * Self::hessian_potential(x))
    }

    pub fn fixed_points() -> [State; 3] {
        [COLD_POINT, SADDLE_POINT, HOT_POINT]
    }

    /// Barrier height V(saddle) - V(well).
    pub fn barrier_height() -> f64 {
        Self::potential(&SADDLE_POINT) - Self::potential(&COLD_POINT)
    }
}

impl Drift for WarpedWell {
    fn mu(&self, _t: Time, x: &State) -> State {
        Self::drift(x, self.alpha)
    }
}

impl Diffusion for WarpedWell {
    fn sigma(&self, _t: Time, _x: &State) -> Matrix2<f64> {
        // Additive isotropic noise
        Matrix2::from_diagonal_element(self.sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fixed_points_are_stationary_for_any_alpha() {
        for &alpha in &[0.0, 0.25, 0.5, 1.0, -3.0, 10.0] {
            for p in WarpedWell::fixed_points() {
                let b = WarpedWell::drift(&p, alpha);
                assert_eq!(b.x(), 0.0, "alpha = {alpha}, point = {p:?}");
                assert_eq!(b.y(), 0.0, "alpha = {alpha}, point = {p:?}");
            }
        }
    }

    #[test]
    fn zero_alpha_is_pure_gradient_flow() {
        let x = State::new(0.4, -0.7);
        let b = WarpedWell::drift(&x, 0.0);
        let g = WarpedWell::grad_potential(&x);
        assert_eq!(b.x(), -g.x());
        assert_eq!(b.y(), -g.y());
    }

    #[test]
    fn rotation_term_matches_expanded_form() {
        let (x, y, alpha) = (0.3, 0.2, 0.5);
        let b = WarpedWell::drift(&State::new(x, y), alpha);
        let gx = x * (x * x - 1.0);
        let gy = 2.0 * y;
        assert_abs_diff_eq!(b.x(), -(gx - alpha * gy), epsilon = 1e-15);
        assert_abs_diff_eq!(b.y(), -(alpha * gx + gy), epsilon = 1e-15);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let alpha = 0.7;
        let x = State::new(0.6, -0.3);
        let jac = WarpedWell::drift_jacobian(&x, alpha);
        let h = 1e-6;
        for j in 0..2 {
            let mut plus = x;
            let mut minus = x;
            plus.0[j] += h;
            minus.0[j] -= h;
            let fd = (WarpedWell::drift(&plus, alpha).0 - WarpedWell::drift(&minus, alpha).0) / (2.0 * h);
            for i in 0..2 {
                assert_abs_diff_eq!(jac[(i, j)], fd[i], epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn potential_landscape() {
        assert_eq!(WarpedWell::potential(&COLD_POINT), 0.0);
        assert_eq!(WarpedWell::potential(&HOT_POINT), 0.0);
        assert_eq!(WarpedWell::barrier_height(), 0.25);
    }

    #[test]
    fn epsilon_noise_uses_square_root() {
        let model = WarpedWell::new(0.0, NoiseIntensity::Epsilon(0.01));
        let s = model.sigma(0.0, &SADDLE_POINT);
        assert_abs_diff_eq!(s[(0, 0)], 0.1, epsilon = 1e-15);
        assert_eq!(s[(0, 1)], 0.0);
    }
}
