use serde::{Serialize, Deserialize};
use warpwell_core::{Time, Trajectory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    ColdToHot,
    HotToCold,
}

impl Direction {
    /// Cold→hot when the path ends to the right of where it started.
    pub fn of_trajectory(path: &Trajectory) -> Option<Direction> {
        let first = path.initial_state()?;
        let last = path.final_state()?;
        if first.x() < last.x() {
            Some(Direction::ColdToHot)
        } else {
            Some(Direction::HotToCold)
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Direction::ColdToHot => "c2h",
            Direction::HotToCold => "h2c",
        }
    }
}

/// Inclusive index range `[start, end]` of a clean crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionSegment {
    pub start: usize,
    pub end: usize,
    pub direction: Direction,
}

impl TransitionSegment {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Time spent crossing, `t[end] - t[start]`.
    pub fn duration(&self, times: &[Time]) -> Time {
        times[self.end] - times[self.start]
    }

    pub fn extract(&self, path: &Trajectory) -> Trajectory {
        path.slice(self.start, self.end)
    }
}

/// Crossing time of each extracted transition.
pub fn transition_durations(transitions: &[Trajectory]) -> Vec<Time> {
    transitions.iter().map(Trajectory::duration).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpwell_core::State;

    #[test]
    fn duration_and_extraction() {
        let mut path = Trajectory::new();
        for k in 0..5 {
            path.push(0.1 * k as f64, State::new(-1.0 + 0.5 * k as f64, 0.0));
        }
        let seg = TransitionSegment { start: 1, end: 3, direction: Direction::ColdToHot };
        assert_eq!(seg.len(), 3);
        assert!((seg.duration(&path.times) - 0.2).abs() < 1e-12);

        let sub = seg.extract(&path);
        assert_eq!(sub.len(), 3);
        assert_eq!(Direction::of_trajectory(&sub), Some(Direction::ColdToHot));
        assert!((transition_durations(&[sub])[0] - 0.2).abs() < 1e-12);
        assert_eq!(Direction::of_trajectory(&Trajectory::new()), None);
    }
}
