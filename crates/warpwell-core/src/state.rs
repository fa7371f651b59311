use nalgebra::Vector2;
use serde::{Serialize, Deserialize};

pub type Time = f64;

/// Position of the particle in the plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct State(pub Vector2<f64>);

impl State {
    pub fn new(x: f64, y: f64) -> Self {
        State(Vector2::new(x, y))
    }

    pub fn zeros() -> Self {
        State(Vector2::zeros())
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &State) -> f64 {
        (self.0 - other.0).norm()
    }
}

impl std::ops::Deref for State {
    type Target = Vector2<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for State {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vector2<f64>> for State {
    fn from(v: Vector2<f64>) -> Self {
        State(v)
    }
}

impl From<[f64; 2]> for State {
    fn from(v: [f64; 2]) -> Self {
        State::new(v[0], v[1])
    }
}

impl From<(f64, f64)> for State {
    fn from((x, y): (f64, f64)) -> Self {
        State::new(x, y)
    }
}
