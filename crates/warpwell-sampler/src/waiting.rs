use serde::{Serialize, Deserialize};
use warpwell_core::{NoiseGenerator, SimParams, State, TimeGrid, WellError, WellResult};

use crate::integrate;

/// How long does the particle wait in its starting well before crossing
/// the saddle line `x = 0`?
///
/// The search integrates blocks of `block_length` time units, each block
/// continuing from the end of the previous one. When a block visits the
/// opposite half-plane the waited time is recorded and the particle is put
/// back at `start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WaitingTimeExperiment {
    pub start: State,
    pub block_length: f64,
    pub dt: f64,
    pub target_transitions: usize,
    /// Hard cap on integrated blocks.
    pub max_blocks: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitingTimes {
    pub waiting_times: Vec<f64>,
    pub blocks_run: usize,
    /// `true` when `target_transitions` were observed before the cap.
    pub completed: bool,
}

impl WaitingTimeExperiment {
    pub fn validate(&self) -> WellResult<()> {
        if !(self.dt > 0.0) || !(self.block_length > self.dt) {
            return Err(WellError::Config(format!(
                "need 0 < dt < block_length, got dt={} block_length={}",
                self.dt, self.block_length
            )));
        }
        if self.max_blocks == 0 {
            return Err(WellError::config("max_blocks must be > 0"));
        }
        if self.target_transitions == 0 {
            return Err(WellError::config("target_transitions must be > 0"));
        }
        if !self.start.is_finite() || self.start.x() == 0.0 {
            return Err(WellError::config("start must be a finite point off the line x = 0"));
        }
        Ok(())
    }

    fn crossed(&self, x: &State) -> bool {
        if self.start.x() < 0.0 {
            x.x() > 0.0
        } else {
            x.x() < 0.0
        }
    }

    pub fn run(&self, params: &SimParams, seed: u64) -> WellResult<WaitingTimes> {
        self.validate()?;
        let grid = TimeGrid::arange(0.0, self.block_length, self.dt)?;
        let block_span = grid.last() - grid.first();
        let mut noise = NoiseGenerator::new(seed);

        let mut result = WaitingTimes::default();
        let mut x = self.start;
        let mut blocks_since_event = 0usize;

        while result.blocks_run < self.max_blocks {
            let block = integrate(x, &grid, params, &mut noise)?;
            result.blocks_run += 1;
            blocks_since_event += 1;

            if block.states.iter().any(|s| self.crossed(s)) {
                let waited = blocks_since_event as f64 * block_span;
                log::info!(
                    "transition {} after {waited:.1} time units",
                    result.waiting_times.len() + 1
                );
                result.waiting_times.push(waited);
                if result.waiting_times.len() >= self.target_transitions {
                    result.completed = true;
                    break;
                }
                x = self.start;
                blocks_since_event = 0;
            } else if let Some(last) = block.final_state() {
                x = *last;
            }
        }

        if !result.completed {
            log::warn!(
                "stopped after {} blocks with {}/{} transitions",
                result.blocks_run,
                result.waiting_times.len(),
                self.target_transitions
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpwell_core::NoiseIntensity;
    use warpwell_models::COLD_POINT;

    fn experiment(max_blocks: usize) -> WaitingTimeExperiment {
        WaitingTimeExperiment {
            start: COLD_POINT,
            block_length: 10.0,
            dt: 0.01,
            target_transitions: 3,
            max_blocks,
        }
    }

    #[test]
    fn strong_noise_finds_transitions() {
        let params = SimParams::new(0.1, NoiseIntensity::Sigma(1.0));
        let result = experiment(1_000).run(&params, 5).unwrap();
        assert!(result.completed);
        assert_eq!(result.waiting_times.len(), 3);
        assert!(result.waiting_times.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn cap_bounds_a_noise_free_search() {
        let params = SimParams::deterministic(0.1);
        let result = experiment(4).run(&params, 5).unwrap();
        assert!(!result.completed);
        assert_eq!(result.blocks_run, 4);
        assert!(result.waiting_times.is_empty());
    }

    #[test]
    fn invalid_setup_is_rejected() {
        let mut bad = experiment(0);
        assert!(bad.validate().is_err());
        bad.max_blocks = 1;
        bad.start = State::new(0.0, 0.3);
        assert!(bad.validate().is_err());
    }
}
