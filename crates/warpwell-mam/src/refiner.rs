use std::time::Instant;

use serde::{Deserialize, Serialize};
use warpwell_core::{State, TimeGrid, Trajectory, WellError, WellResult};

use crate::action::FreidlinWentzell;
use crate::guess::PathGuess;
use crate::minimizer::{Bounds, Lbfgs, LbfgsSettings, MinimizeOptions, MinimizeResult, Minimizer};
use crate::sink::CheckpointSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementStatus {
    Running,
    Converged,
    BudgetExhausted,
}

impl RefinementStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RefinementStatus::Running)
    }
}

/// How many minimiser iterations per block and how many blocks at most.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchedule {
    pub block_len: usize,
    pub number_of_blocks: usize,
    /// 1-based block numbers after which the path is also kept as a snapshot.
    #[serde(default)]
    pub snapshot_blocks: Vec<usize>,
}

impl BlockSchedule {
    pub fn new(block_len: usize, number_of_blocks: usize) -> Self {
        Self {
            block_len,
            number_of_blocks,
            snapshot_blocks: Vec::new(),
        }
    }

    pub fn with_snapshots(mut self, blocks: impl IntoIterator<Item = usize>) -> Self {
        self.snapshot_blocks = blocks.into_iter().collect();
        self
    }

    pub fn validate(&self) -> WellResult<()> {
        if self.number_of_blocks == 0 {
            return Err(WellError::config("number_of_blocks must be > 0"));
        }
        Ok(())
    }

    pub fn options(&self) -> MinimizeOptions {
        MinimizeOptions {
            maxiter: self.block_len,
            maxfun: 10 * self.block_len,
        }
    }
}

/// Run attributes stored next to every saved path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinerParameters {
    pub alpha: f64,
    /// Cumulative minimiser iterations.
    pub iteration: usize,
}

/// Everything persisted after one block.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockCheckpoint {
    /// 1-based block number within the current `run`.
    pub block: usize,
    /// Cumulative minimiser iterations, across runs.
    pub nit: usize,
    pub action: f64,
    pub instanton: Trajectory,
    pub status: RefinementStatus,
    pub success: bool,
    pub message: String,
    pub elapsed_secs: f64,
    pub snapshot: bool,
}

impl BlockCheckpoint {
    pub fn parameters(&self, alpha: f64) -> RefinerParameters {
        RefinerParameters { alpha, iteration: self.nit }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RefinementOutcome {
    pub status: RefinementStatus,
    pub nit: usize,
    pub blocks_run: usize,
    pub action: f64,
    pub message: String,
    pub instanton: Trajectory,
}

impl RefinementOutcome {
    pub fn converged(&self) -> bool {
        self.status == RefinementStatus::Converged
    }
}

/// Block-wise minimisation of the action over a path with fixed endpoints.
///
/// The path estimate lives inside the minimiser and is updated in place
/// from one block to the next. Restarting from a perturbed guess after a
/// `BudgetExhausted` outcome is left to the caller.
pub struct InstantonRefiner<M: Minimizer = Lbfgs<FreidlinWentzell>> {
    minimizer: M,
    grid: TimeGrid,
    start: State,
    end: State,
    alpha: f64,
    nit: usize,
    initial_recorded: bool,
    last: Option<MinimizeResult>,
}

impl InstantonRefiner {
    pub fn new(
        guess: PathGuess,
        alpha: f64,
        bounds: Option<Bounds>,
        settings: LbfgsSettings,
    ) -> WellResult<Self> {
        let grid = guess.grid()?;
        let functional = FreidlinWentzell::new(&grid, guess.start(), guess.end(), alpha)?;
        let x0 = functional.pack(&guess.trajectory().states);
        let minimizer = Lbfgs::new(functional, x0, settings, bounds)?;
        Ok(Self::with_minimizer(guess, alpha, minimizer, grid))
    }
}

impl<M: Minimizer> InstantonRefiner<M> {
    /// Wrap any minimiser whose decision vector is the interleaved interior
    /// of `guess`.
    pub fn with_minimizer(guess: PathGuess, alpha: f64, minimizer: M, grid: TimeGrid) -> Self {
        let (start, end) = (guess.start(), guess.end());
        Self {
            minimizer,
            grid,
            start,
            end,
            alpha,
            nit: 0,
            initial_recorded: false,
            last: None,
        }
    }

    /// Continue a refinement whose checkpoint reached `nit` iterations.
    ///
    /// The iteration count carries on from `nit` and the initial path is not
    /// recorded again, so the sink keeps the guess of the first session.
    pub fn resume_at(mut self, nit: usize) -> Self {
        self.nit = nit;
        self.initial_recorded = true;
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn nit(&self) -> usize {
        self.nit
    }

    pub fn last_result(&self) -> Option<&MinimizeResult> {
        self.last.as_ref()
    }

    pub fn parameters(&self) -> RefinerParameters {
        RefinerParameters {
            alpha: self.alpha,
            iteration: self.nit,
        }
    }

    /// Current path estimate.
    pub fn instanton(&self) -> Trajectory {
        let mut states = Vec::with_capacity(self.grid.len());
        states.push(self.start);
        states.extend(
            self.minimizer
                .solution()
                .chunks_exact(2)
                .map(|c| State::new(c[0], c[1])),
        );
        states.push(self.end);
        Trajectory {
            times: self.grid.as_slice().to_vec(),
            states,
        }
    }

    /// Minimise in blocks of `schedule.block_len` iterations, handing a
    /// checkpoint to `sink` after every block.
    ///
    /// Stops after the first block whose minimiser call reports success.
    /// Running out of blocks is a normal outcome (`BudgetExhausted`), not
    /// an error.
    pub fn run(
        &mut self,
        schedule: &BlockSchedule,
        sink: &mut impl CheckpointSink,
    ) -> WellResult<RefinementOutcome> {
        schedule.validate()?;
        sink.record_parameters(&self.parameters())?;
        if !self.initial_recorded {
            // The minimiser has not stepped yet, so this is the start point
            // after projection onto the bounds.
            sink.record_initial(&self.instanton(), &self.parameters())?;
            self.initial_recorded = true;
        }

        let options = schedule.options();
        let started = Instant::now();
        let mut status = RefinementStatus::Running;
        let mut blocks_run = 0;

        for block in 1..=schedule.number_of_blocks {
            log::debug!("block {block}/{}", schedule.number_of_blocks);
            let result = self.minimizer.run(options)?;
            self.nit += result.nit;
            blocks_run = block;

            status = if result.success {
                RefinementStatus::Converged
            } else if block == schedule.number_of_blocks {
                RefinementStatus::BudgetExhausted
            } else {
                RefinementStatus::Running
            };

            let checkpoint = BlockCheckpoint {
                block,
                nit: self.nit,
                action: result.fun,
                instanton: self.instanton(),
                status,
                success: result.success,
                message: result.message.clone(),
                elapsed_secs: started.elapsed().as_secs_f64(),
                snapshot: schedule.snapshot_blocks.contains(&block),
            };
            sink.checkpoint(&checkpoint)?;
            log::info!(
                "block {block}: {} iterations, action {:.6e} ({})",
                self.nit,
                result.fun,
                result.message
            );
            self.last = Some(result);

            if status.is_terminal() {
                break;
            }
        }

        let last = self.last.as_ref();
        let outcome = RefinementOutcome {
            status,
            nit: self.nit,
            blocks_run,
            action: last.map_or(f64::NAN, |r| r.fun),
            message: last.map_or_else(String::new, |r| r.message.clone()),
            instanton: self.instanton(),
        };
        match outcome.status {
            RefinementStatus::Converged => log::info!("converged after {} iterations", outcome.nit),
            _ => log::warn!(
                "no convergence after {blocks_run} blocks ({} iterations)",
                outcome.nit
            ),
        }
        Ok(outcome)
    }
}
