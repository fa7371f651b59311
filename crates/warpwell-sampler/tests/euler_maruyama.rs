use approx::assert_abs_diff_eq;
use warpwell_core::{NoiseGenerator, NoiseIntensity, SimParams, State, TimeGrid};
use warpwell_models::{WarpedWell, COLD_POINT, HOT_POINT};
use warpwell_sampler::integrate;

#[test]
fn zero_noise_reduces_to_explicit_euler() {
    let grid = TimeGrid::uniform(0.0, 0.05, 400).unwrap();
    let alpha = 0.75;
    let params = SimParams::new(alpha, NoiseIntensity::Sigma(0.0));
    let x0 = State::new(0.05, 0.4);

    let path = integrate(x0, &grid, &params, &mut NoiseGenerator::new(99)).unwrap();

    let mut x = x0;
    for (i, state) in path.states.iter().enumerate() {
        assert_eq!(*state, x, "sample {i} differs from the Euler step");
        if i + 1 < grid.len() {
            let dt = grid[i + 1] - grid[i];
            x = State(x.0 + WarpedWell::drift(&x, alpha).0 * dt);
        }
    }
}

#[test]
fn non_uniform_grid_uses_local_step() {
    let times = vec![0.0, 0.01, 0.05, 0.06, 0.2, 0.5];
    let grid = TimeGrid::new(times.clone()).unwrap();
    let alpha = 0.3;
    let params = SimParams::deterministic(alpha);
    let x0 = State::new(-0.2, 0.3);

    let path = integrate(x0, &grid, &params, &mut NoiseGenerator::new(1)).unwrap();

    let mut x = x0;
    for i in 0..times.len() - 1 {
        let dt = times[i + 1] - times[i];
        x = State(x.0 + WarpedWell::drift(&x, alpha).0 * dt);
        assert_eq!(path.states[i + 1], x);
    }
    assert_eq!(path.times, times);
}

#[test]
fn weak_noise_stays_in_starting_well() {
    let grid = TimeGrid::uniform(0.0, 0.01, 5_000).unwrap();
    let params = SimParams::new(0.5, NoiseIntensity::Sigma(0.05));

    let path = integrate(HOT_POINT, &grid, &params, &mut NoiseGenerator::new(3)).unwrap();

    assert!(path.states.iter().all(|s| s.x() > 0.0));
    let mean_x = path.xs().iter().sum::<f64>() / path.len() as f64;
    assert_abs_diff_eq!(mean_x, 1.0, epsilon = 0.05);
}

#[test]
fn epsilon_and_sigma_conventions_agree() {
    let grid = TimeGrid::uniform(0.0, 0.01, 300).unwrap();
    let by_sigma = SimParams::new(0.2, NoiseIntensity::Sigma(0.3));
    let by_epsilon = SimParams::new(0.2, NoiseIntensity::Epsilon(0.09));

    let a = integrate(COLD_POINT, &grid, &by_sigma, &mut NoiseGenerator::new(8)).unwrap();
    let b = integrate(COLD_POINT, &grid, &by_epsilon, &mut NoiseGenerator::new(8)).unwrap();

    for (sa, sb) in a.states.iter().zip(&b.states) {
        assert_abs_diff_eq!(sa.x(), sb.x(), epsilon = 1e-9);
        assert_abs_diff_eq!(sa.y(), sb.y(), epsilon = 1e-9);
    }
}
