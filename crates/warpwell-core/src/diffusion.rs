use crate::{State, Time};
use nalgebra::Matrix2;

pub trait Diffusion: Send + Sync {
    /// σ(t,x) mapping the planar Wiener increment dW onto the state
    fn sigma(&self, t: Time, x: &State) -> Matrix2<f64>;
}
