use rand::Rng;
use warpwell_core::State;

use crate::{COLD_POINT, HOT_POINT};

const SPREAD_HALF_WIDTH: f64 = 0.1;

/// `n` points drawn uniformly from the square `center ± 0.1`.
pub fn ic_spread<R: Rng>(center: &State, n: usize, rng: &mut R) -> Vec<State> {
    (0..n)
        .map(|_| {
            State::new(
                rng.gen_range(center.x() - SPREAD_HALF_WIDTH..center.x() + SPREAD_HALF_WIDTH),
                rng.gen_range(center.y() - SPREAD_HALF_WIDTH..center.y() + SPREAD_HALF_WIDTH),
            )
        })
        .collect()
}

pub fn cold_ic_spread<R: Rng>(n: usize, rng: &mut R) -> Vec<State> {
    ic_spread(&COLD_POINT, n, rng)
}

pub fn hot_ic_spread<R: Rng>(n: usize, rng: &mut R) -> Vec<State> {
    ic_spread(&HOT_POINT, n, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn spread_stays_in_box() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let points = hot_ic_spread(200, &mut rng);
        assert_eq!(points.len(), 200);
        for p in &points {
            assert!((p.x() - 1.0).abs() <= SPREAD_HALF_WIDTH);
            assert!(p.y().abs() <= SPREAD_HALF_WIDTH);
        }
        assert!(cold_ic_spread(5, &mut rng).iter().all(|p| p.x() < -0.8));
    }
}
