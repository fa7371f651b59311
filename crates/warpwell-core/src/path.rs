use crate::error::{WellError, WellResult};
use crate::params::SimParams;
use crate::{State, Time};

/// Non-empty, finite, strictly increasing sequence of sample times.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeGrid {
    times: Vec<Time>,
}

impl TimeGrid {
    pub fn new(times: Vec<Time>) -> WellResult<Self> {
        if times.is_empty() {
            return Err(WellError::config("time grid is empty"));
        }
        if let Some(bad) = times.iter().position(|t| !t.is_finite()) {
            return Err(WellError::Config(format!(
                "time grid has a non-finite entry at index {bad}"
            )));
        }
        if let Some(i) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(WellError::Config(format!(
                "time grid is not strictly increasing at index {}",
                i + 1
            )));
        }
        Ok(Self { times })
    }

    /// `n` points `t0, t0 + dt, ...`.
    pub fn uniform(t0: Time, dt: f64, n: usize) -> WellResult<Self> {
        if !(dt > 0.0) {
            return Err(WellError::Config(format!("dt must be > 0, got {dt}")));
        }
        Self::new((0..n).map(|i| t0 + dt * i as f64).collect())
    }

    /// Half-open `[t0, t_end)` with spacing `dt`.
    pub fn arange(t0: Time, t_end: Time, dt: f64) -> WellResult<Self> {
        if !(dt > 0.0) {
            return Err(WellError::Config(format!("dt must be > 0, got {dt}")));
        }
        let n = ((t_end - t0) / dt).ceil().max(0.0) as usize;
        Self::uniform(t0, dt, n)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn as_slice(&self) -> &[Time] {
        &self.times
    }

    pub fn first(&self) -> Time {
        self.times[0]
    }

    pub fn last(&self) -> Time {
        self.times[self.times.len() - 1]
    }

    pub fn into_vec(self) -> Vec<Time> {
        self.times
    }
}

impl std::ops::Deref for TimeGrid {
    type Target = [Time];

    fn deref(&self) -> &Self::Target {
        &self.times
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub times: Vec<Time>,
    pub states: Vec<State>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self {
            times: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    pub fn from_parts(times: Vec<Time>, states: Vec<State>) -> WellResult<Self> {
        if times.len() != states.len() {
            return Err(WellError::Config(format!(
                "{} times but {} states",
                times.len(),
                states.len()
            )));
        }
        Ok(Self { times, states })
    }

    pub fn push(&mut self, t: Time, state: State) {
        self.times.push(t);
        self.states.push(state);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }

    pub fn initial_state(&self) -> Option<&State> {
        self.states.first()
    }

    /// Elapsed time between the first and last sample.
    pub fn duration(&self) -> Time {
        match (self.times.first(), self.times.last()) {
            (Some(a), Some(b)) => b - a,
            _ => 0.0,
        }
    }

    /// Copy of samples `start..=end`.
    pub fn slice(&self, start: usize, end: usize) -> Trajectory {
        Trajectory {
            times: self.times[start..=end].to_vec(),
            states: self.states[start..=end].to_vec(),
        }
    }

    /// Keep samples `i..j` (half-open); optionally restart time at zero
    /// with the original spacing of the first two samples.
    pub fn clip(&self, i: usize, j: usize, normalise_time: bool) -> Trajectory {
        let j = j.min(self.len());
        let i = i.min(j);
        let mut clipped = Trajectory {
            times: self.times[i..j].to_vec(),
            states: self.states[i..j].to_vec(),
        };
        if normalise_time && self.times.len() > 1 {
            let dt = self.times[1] - self.times[0];
            for (k, t) in clipped.times.iter_mut().enumerate() {
                *t = dt * k as f64;
            }
        }
        clipped
    }

    pub fn xs(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.x()).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.y()).collect()
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new()
    }
}

/// One member of an ensemble, identified by its realization id.
#[derive(Clone, Debug, PartialEq)]
pub struct Realization {
    pub id: u64,
    pub states: Vec<State>,
}

/// Independent trajectories sharing a time grid and parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Ensemble {
    pub times: Vec<Time>,
    pub params: SimParams,
    pub realizations: Vec<Realization>,
}

impl Ensemble {
    pub fn new(times: Vec<Time>, params: SimParams) -> Self {
        Self { times, params, realizations: Vec::new() }
    }

    /// Appends a member; its length must match the shared grid and its id
    /// must be unused.
    pub fn push(&mut self, realization: Realization) -> WellResult<()> {
        if realization.states.len() != self.times.len() {
            return Err(WellError::Config(format!(
                "realization {} has {} samples, grid has {}",
                realization.id,
                realization.states.len(),
                self.times.len()
            )));
        }
        if self.realizations.iter().any(|r| r.id == realization.id) {
            return Err(WellError::Config(format!(
                "duplicate realization id {}",
                realization.id
            )));
        }
        self.realizations.push(realization);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.realizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.realizations.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Realization> {
        self.realizations.iter().find(|r| r.id == id)
    }

    /// Materialise one member as a stand-alone trajectory.
    pub fn trajectory(&self, index: usize) -> Option<Trajectory> {
        self.realizations.get(index).map(|r| Trajectory {
            times: self.times.clone(),
            states: r.states.clone(),
        })
    }

    pub fn trajectories(&self) -> impl Iterator<Item = (u64, Trajectory)> + '_ {
        self.realizations.iter().map(move |r| {
            (
                r.id,
                Trajectory {
                    times: self.times.clone(),
                    states: r.states.clone(),
                },
            )
        })
    }
}
