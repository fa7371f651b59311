use serde::{Serialize, Deserialize};
use warpwell_core::{Ensemble, State, Trajectory, WellError, WellResult};

use crate::label::{symbolic_sequence, SymbolicLabel};
use crate::segment::{Direction, TransitionSegment};

/// Radius of the balls around the wells used by the sweeps.
pub const DEFAULT_BALL_SIZE: f64 = 0.1;

/// Index ranges of the transitions found in one time series.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transitions {
    pub cold_to_hot: Vec<TransitionSegment>,
    pub hot_to_cold: Vec<TransitionSegment>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.cold_to_hot.is_empty() && self.hot_to_cold.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cold_to_hot.len() + self.hot_to_cold.len()
    }
}

/// Transition sub-paths, already sliced out of their source trajectories.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedTransitions {
    pub cold_to_hot: Vec<Trajectory>,
    pub hot_to_cold: Vec<Trajectory>,
}

impl ExtractedTransitions {
    pub fn is_empty(&self) -> bool {
        self.cold_to_hot.is_empty() && self.hot_to_cold.is_empty()
    }

    pub fn extend(&mut self, other: ExtractedTransitions) {
        self.cold_to_hot.extend(other.cold_to_hot);
        self.hot_to_cold.extend(other.hot_to_cold);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionDetector {
    ball_size: f64,
}

impl Default for TransitionDetector {
    fn default() -> Self {
        Self { ball_size: DEFAULT_BALL_SIZE }
    }
}

impl TransitionDetector {
    pub fn new(ball_size: f64) -> WellResult<Self> {
        if !ball_size.is_finite() || ball_size <= 0.0 {
            return Err(WellError::Config(format!(
                "ball_size must be finite and > 0, got {ball_size}"
            )));
        }
        Ok(Self { ball_size })
    }

    pub fn ball_size(&self) -> f64 {
        self.ball_size
    }

    pub fn labels(&self, states: &[State]) -> Vec<SymbolicLabel> {
        symbolic_sequence(states, self.ball_size)
    }

    pub fn detect(&self, states: &[State]) -> Transitions {
        let labels = self.labels(states);
        Transitions {
            cold_to_hot: cold_to_hot_segments(&labels),
            hot_to_cold: hot_to_cold_segments(&labels),
        }
    }

    pub fn extract(&self, path: &Trajectory) -> ExtractedTransitions {
        let found = self.detect(&path.states);
        ExtractedTransitions {
            cold_to_hot: found.cold_to_hot.iter().map(|s| s.extract(path)).collect(),
            hot_to_cold: found.hot_to_cold.iter().map(|s| s.extract(path)).collect(),
        }
    }

    /// Scan every realization and pool the results; which realization a
    /// transition came from is not kept.
    pub fn extract_ensemble(&self, ensemble: &Ensemble) -> ExtractedTransitions {
        let mut pooled = ExtractedTransitions::default();
        for (id, path) in ensemble.trajectories() {
            let found = self.extract(&path);
            log::debug!(
                "realization {id}: {} cold->hot, {} hot->cold",
                found.cold_to_hot.len(),
                found.hot_to_cold.len()
            );
            pooled.extend(found);
        }
        log::info!(
            "{} realizations: {} cold->hot and {} hot->cold transitions",
            ensemble.len(),
            pooled.cold_to_hot.len(),
            pooled.hot_to_cold.len()
        );
        pooled
    }
}

/// `[-1, 0, ..., 0, +1]` runs, one candidate per cold sample.
pub fn cold_to_hot_segments(labels: &[SymbolicLabel]) -> Vec<TransitionSegment> {
    clean_crossings(labels, SymbolicLabel::ColdNear, SymbolicLabel::HotNear, Direction::ColdToHot)
}

/// `[+1, 0, ..., 0, -1]` runs, one candidate per hot sample.
pub fn hot_to_cold_segments(labels: &[SymbolicLabel]) -> Vec<TransitionSegment> {
    clean_crossings(labels, SymbolicLabel::HotNear, SymbolicLabel::ColdNear, Direction::HotToCold)
}

// For a seed `i`, the first extremum of `labels[i..]` in the target direction
// is the nearest later target sample, if one exists; otherwise the window
// sum can never reach zero and the seed is dropped. With a target at `j`,
// the sum over `[i, j]` is zero exactly when no other seed-well sample lies
// in `(i, j)`. Both facts are tracked right-to-left in one pass.
fn clean_crossings(
    labels: &[SymbolicLabel],
    seed: SymbolicLabel,
    target: SymbolicLabel,
    direction: Direction,
) -> Vec<TransitionSegment> {
    let mut segments = Vec::new();
    let mut next_target: Option<usize> = None;
    let mut next_seed: Option<usize> = None;

    for (i, &l) in labels.iter().enumerate().rev() {
        if l == seed {
            if let Some(j) = next_target {
                if next_seed.map_or(true, |k| k > j) {
                    segments.push(TransitionSegment { start: i, end: j, direction });
                }
            }
            next_seed = Some(i);
        } else if l == target {
            next_target = Some(i);
        }
    }

    segments.reverse();
    segments
}
