use warpwell_core::{SimParams, Trajectory, WellError, WellResult};

use crate::deterministic::DeterministicIntegrator;

/// Destination for flushed observation batches.
pub trait ObservationSink {
    fn write(&mut self, observations: &Trajectory, params: &SimParams) -> WellResult<()>;
}

impl ObservationSink for Vec<Trajectory> {
    fn write(&mut self, observations: &Trajectory, _params: &SimParams) -> WellResult<()> {
        self.push(observations.clone());
        Ok(())
    }
}

/// Bounded buffer of `(time, state)` samples taken from an integrator.
#[derive(Clone, Debug)]
pub struct TrajectoryObserver {
    capacity: usize,
    params: SimParams,
    buffer: Trajectory,
    flush_count: usize,
}

impl TrajectoryObserver {
    pub fn new(params: SimParams, capacity: usize) -> WellResult<Self> {
        if capacity == 0 {
            return Err(WellError::config("observer capacity must be > 0"));
        }
        Ok(Self {
            capacity,
            params,
            buffer: Trajectory::with_capacity(capacity),
            flush_count: 0,
        })
    }

    pub fn for_integrator(integrator: &DeterministicIntegrator, capacity: usize) -> WellResult<Self> {
        Self::new(integrator.params(), capacity)
    }

    /// Sample the integrator's current time and position.
    pub fn record(&mut self, integrator: &DeterministicIntegrator) -> WellResult<()> {
        if self.buffer.len() >= self.capacity {
            return Err(WellError::Config(format!(
                "observer buffer full ({} samples); flush before recording more",
                self.capacity
            )));
        }
        self.buffer.push(integrator.time(), integrator.state());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn flush_count(&self) -> usize {
        self.flush_count
    }

    /// Copy of everything recorded since the last flush, `None` when empty.
    pub fn observations(&self) -> Option<Trajectory> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.clone())
        }
    }

    /// Hand the whole buffer to `sink`, then clear it.
    ///
    /// The buffer is only cleared once the sink accepted the batch; a failed
    /// write leaves every sample in place. Returns `false` when there was
    /// nothing to flush.
    pub fn flush(&mut self, sink: &mut impl ObservationSink) -> WellResult<bool> {
        if self.buffer.is_empty() {
            log::debug!("observer has no samples to flush");
            return Ok(false);
        }
        sink.write(&self.buffer, &self.params)?;
        log::debug!("flushed {} samples (batch {})", self.buffer.len(), self.flush_count + 1);
        self.clear();
        self.flush_count += 1;
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.buffer = Trajectory::with_capacity(self.capacity);
    }
}

/// Alternate `advance(obs_freq)` and `record`, `obs_num` times.
pub fn make_observations(
    integrator: &mut DeterministicIntegrator,
    observer: &mut TrajectoryObserver,
    obs_num: usize,
    obs_freq: f64,
) -> WellResult<()> {
    for _ in 0..obs_num {
        integrator.advance(obs_freq)?;
        observer.record(integrator)?;
    }
    Ok(())
}
