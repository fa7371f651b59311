use warpwell_core::{Trajectory, WellResult};

use crate::refiner::{BlockCheckpoint, RefinerParameters};

/// Persistence for refinement progress.
///
/// `checkpoint` receives one block's diagnostics as a unit and must have
/// stored them before it returns; the refiner does not start the next block
/// until it has. Action values are an append-only series, while the latest
/// path and status replace the previous ones.
pub trait CheckpointSink {
    fn record_parameters(&mut self, parameters: &RefinerParameters) -> WellResult<()>;

    fn record_initial(&mut self, guess: &Trajectory, parameters: &RefinerParameters) -> WellResult<()>;

    fn checkpoint(&mut self, block: &BlockCheckpoint) -> WellResult<()>;
}

/// Keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    pub parameters: Option<RefinerParameters>,
    pub initial: Option<Trajectory>,
    /// `(cumulative iterations, action)` after each block.
    pub action_values: Vec<(usize, f64)>,
    pub latest: Option<BlockCheckpoint>,
    pub snapshots: Vec<(usize, Trajectory)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> usize {
        self.action_values.len()
    }
}

impl CheckpointSink for MemorySink {
    fn record_parameters(&mut self, parameters: &RefinerParameters) -> WellResult<()> {
        self.parameters = Some(parameters.clone());
        Ok(())
    }

    fn record_initial(&mut self, guess: &Trajectory, _parameters: &RefinerParameters) -> WellResult<()> {
        self.initial = Some(guess.clone());
        Ok(())
    }

    fn checkpoint(&mut self, block: &BlockCheckpoint) -> WellResult<()> {
        self.action_values.push((block.nit, block.action));
        if block.snapshot {
            self.snapshots.push((block.nit, block.instanton.clone()));
        }
        self.latest = Some(block.clone());
        Ok(())
    }
}
