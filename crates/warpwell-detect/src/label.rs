use serde::{Serialize, Deserialize};
use warpwell_core::State;
use warpwell_models::{COLD_POINT, HOT_POINT};

/// Which well, if any, a sample sits next to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum SymbolicLabel {
    ColdNear = -1,
    Neutral = 0,
    HotNear = 1,
}

impl SymbolicLabel {
    pub fn value(self) -> i8 {
        self as i8
    }
}

impl TryFrom<i8> for SymbolicLabel {
    type Error = i8;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(SymbolicLabel::ColdNear),
            0 => Ok(SymbolicLabel::Neutral),
            1 => Ok(SymbolicLabel::HotNear),
            other => Err(other),
        }
    }
}

/// Cold takes precedence when the two balls overlap.
pub fn label(state: &State, ball_size: f64) -> SymbolicLabel {
    if state.distance(&COLD_POINT) < ball_size {
        SymbolicLabel::ColdNear
    } else if state.distance(&HOT_POINT) < ball_size {
        SymbolicLabel::HotNear
    } else {
        SymbolicLabel::Neutral
    }
}

pub fn symbolic_sequence(states: &[State], ball_size: f64) -> Vec<SymbolicLabel> {
    states.iter().map(|s| label(s, ball_size)).collect()
}
