use thiserror::Error;

use crate::Time;

/// Root error type for simulation, detection and refinement failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WellError {
    /// A computed state became NaN or infinite.
    #[error("numerical divergence at step {index} (t = {time})")]
    NumericalDivergence { time: Time, index: usize },

    /// Invalid parameters, grids or schedules; raised before any work starts.
    #[error("config error: {0}")]
    Config(String),

    /// The adaptive ODE solver could not complete the requested interval.
    #[error("solver failure: {0}")]
    SolverFailure(String),

    /// Checkpoint or observation sink failed to persist data.
    #[error("sink error: {0}")]
    Io(String),
}

pub type WellResult<T> = Result<T, WellError>;

impl WellError {
    pub fn config(msg: impl Into<String>) -> Self {
        WellError::Config(msg.into())
    }
}
