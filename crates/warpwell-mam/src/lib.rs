//! Minimum action method for the warped double well.
//!
//! A path guess between two points is discretised on a fixed time grid and
//! the Freidlin–Wentzell action is minimised over the interior points in
//! blocks of iterations, with a checkpoint after every block.

pub mod action;
pub mod guess;
pub mod minimizer;
pub mod refiner;
pub mod sink;

pub use action::{action, action_gradient, FreidlinWentzell, Objective};
pub use guess::PathGuess;
pub use minimizer::{Bounds, Lbfgs, LbfgsSettings, MinimizeOptions, MinimizeResult, Minimizer};
pub use refiner::{
    BlockCheckpoint, BlockSchedule, InstantonRefiner, RefinementOutcome, RefinementStatus,
    RefinerParameters,
};
pub use sink::{CheckpointSink, MemorySink};
