use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use warpwell_core::{SimParams, Trajectory, WellError, WellResult};
use warpwell_mam::{BlockCheckpoint, CheckpointSink, RefinementStatus, RefinerParameters};
use warpwell_sampler::ObservationSink;

use crate::dataset::{read_trajectory, temp_path, write_trajectory, DatasetAttrs};
use crate::layout::ensure_dir;

pub const PARAMETERS_FILE: &str = "parameters.json";
pub const INITIAL_FILE: &str = "instanton_ic.parquet";
pub const ACTION_FILE: &str = "action_values.jsonl";
pub const INSTANTON_FILE: &str = "instanton.parquet";
pub const STATUS_FILE: &str = "status.json";
pub const SNAPSHOT_DIR: &str = "instanton_snapshots";
pub const OBSERVATION_DIR: &str = "observations";

/// Contents of `status.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub block: usize,
    pub nit: usize,
    pub action: f64,
    pub status: RefinementStatus,
    pub success: bool,
    pub message: String,
    pub elapsed_secs: f64,
}

impl From<&BlockCheckpoint> for StatusRecord {
    fn from(block: &BlockCheckpoint) -> Self {
        Self {
            block: block.block,
            nit: block.nit,
            action: block.action,
            status: block.status,
            success: block.success,
            message: block.message.clone(),
            elapsed_secs: block.elapsed_secs,
        }
    }
}

/// One line of `action_values.jsonl`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub nit: usize,
    pub action: f64,
}

/// Most recent checkpoint found on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct LatestCheckpoint {
    pub status: StatusRecord,
    pub instanton: Trajectory,
    pub alpha: f64,
}

fn io_error(err: anyhow::Error) -> WellError {
    WellError::Io(format!("{err:#}"))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let tmp = temp_path(path);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("moving {} into place", path.display()))?;
    Ok(())
}

/// Persists refinement progress and observation batches under one directory.
///
/// Per block the latest path is replaced first, then `status.json`, and
/// finally the action value is appended, so `status.json` never refers to a
/// block whose path is missing. `status.json` is the commit record: an
/// action line lost to an interrupted append is restored from it when the
/// directory is reopened.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    alpha: f64,
    observation_batches: usize,
}

impl DirectorySink {
    pub fn create(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        repair_action_values(&dir)?;
        Ok(Self {
            dir,
            alpha: f64::NAN,
            observation_batches: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append_action(&self, value: ActionValue) -> anyhow::Result<()> {
        let path = self.dir.join(ACTION_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        writeln!(file, "{}", serde_json::to_string(&value)?)?;
        file.sync_data()?;
        Ok(())
    }

    fn write_checkpoint(&mut self, block: &BlockCheckpoint) -> anyhow::Result<()> {
        let attrs = DatasetAttrs::instanton(self.alpha, block.nit);
        write_trajectory(&self.dir.join(INSTANTON_FILE), &block.instanton, &attrs)?;
        write_json_atomic(&self.dir.join(STATUS_FILE), &StatusRecord::from(block))?;
        self.append_action(ActionValue {
            nit: block.nit,
            action: block.action,
        })?;

        if block.snapshot {
            let snap_dir = self.dir.join(SNAPSHOT_DIR);
            ensure_dir(&snap_dir)?;
            let path = snap_dir.join(format!("iteration_{}.parquet", block.nit));
            write_trajectory(&path, &block.instanton, &attrs)?;
            log::info!("instanton snapshot saved at {}", path.display());
        }
        Ok(())
    }

    fn write_observations(&mut self, observations: &Trajectory, params: &SimParams) -> anyhow::Result<()> {
        let obs_dir = self.dir.join(OBSERVATION_DIR);
        ensure_dir(&obs_dir)?;
        let path = obs_dir.join(format!("batch_{}.parquet", self.observation_batches + 1));
        write_trajectory(&path, observations, &DatasetAttrs::from(params))?;
        self.observation_batches += 1;
        Ok(())
    }
}

impl CheckpointSink for DirectorySink {
    fn record_parameters(&mut self, parameters: &RefinerParameters) -> WellResult<()> {
        self.alpha = parameters.alpha;
        write_json_atomic(&self.dir.join(PARAMETERS_FILE), parameters).map_err(io_error)?;
        log::debug!("parameters saved at {}", self.dir.join(PARAMETERS_FILE).display());
        Ok(())
    }

    fn record_initial(&mut self, guess: &Trajectory, parameters: &RefinerParameters) -> WellResult<()> {
        let attrs = DatasetAttrs::instanton(parameters.alpha, parameters.iteration);
        write_trajectory(&self.dir.join(INITIAL_FILE), guess, &attrs).map_err(io_error)
    }

    fn checkpoint(&mut self, block: &BlockCheckpoint) -> WellResult<()> {
        self.write_checkpoint(block).map_err(io_error)
    }
}

impl ObservationSink for DirectorySink {
    fn write(&mut self, observations: &Trajectory, params: &SimParams) -> WellResult<()> {
        self.write_observations(observations, params).map_err(io_error)
    }
}

fn load_status(dir: &Path) -> anyhow::Result<Option<StatusRecord>> {
    let path = dir.join(STATUS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let status = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(status))
}

/// Reload the latest path and status written by a [`DirectorySink`], or
/// `None` if no block has completed in `dir`.
pub fn load_checkpoint(dir: &Path) -> anyhow::Result<Option<LatestCheckpoint>> {
    let Some(status) = load_status(dir)? else {
        return Ok(None);
    };
    let (instanton, attrs) = read_trajectory(&dir.join(INSTANTON_FILE))?;
    if attrs.iteration != Some(status.nit) {
        log::warn!(
            "instanton in {} is at iteration {:?} but status reports {}",
            dir.display(),
            attrs.iteration,
            status.nit
        );
    }
    Ok(Some(LatestCheckpoint {
        status,
        instanton,
        alpha: attrs.alpha,
    }))
}

/// Lines of `action_values.jsonl` as written. A malformed final line is an
/// interrupted append and is skipped.
fn read_action_lines(dir: &Path) -> anyhow::Result<Vec<ActionValue>> {
    let path = dir.join(ACTION_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let mut values = Vec::with_capacity(lines.len());
    for (k, line) in lines.iter().enumerate() {
        match serde_json::from_str(line) {
            Ok(v) => values.push(v),
            Err(err) if k + 1 == lines.len() => {
                log::warn!("ignoring truncated last line of {}: {err}", path.display());
            }
            Err(err) => return Err(anyhow::anyhow!("bad line in {}: {line}: {err}", path.display())),
        }
    }
    Ok(values)
}

/// The `(nit, action)` series appended after every block, completed with
/// the block recorded in `status.json` if its line never made it to disk.
pub fn load_action_values(dir: &Path) -> anyhow::Result<Vec<ActionValue>> {
    let mut values = read_action_lines(dir)?;
    if let Some(status) = load_status(dir)? {
        let committed = ActionValue {
            nit: status.nit,
            action: status.action,
        };
        if values.last() != Some(&committed) {
            log::warn!(
                "action series in {} ends before the committed block at iteration {}",
                dir.display(),
                status.nit
            );
            values.push(committed);
        }
    }
    Ok(values)
}

/// Rewrite `action_values.jsonl` when it disagrees with `status.json`, so
/// later appends continue a consistent series.
fn repair_action_values(dir: &Path) -> anyhow::Result<()> {
    let raw = read_action_lines(dir)?;
    let reconciled = load_action_values(dir)?;
    let path = dir.join(ACTION_FILE);
    let on_disk = if path.exists() { fs::read_to_string(&path)? } else { String::new() };
    let clean = on_disk.lines().filter(|l| !l.trim().is_empty()).count() == raw.len();
    if clean && raw.len() == reconciled.len() {
        return Ok(());
    }

    let tmp = temp_path(&path);
    let mut text = String::new();
    for value in &reconciled {
        text.push_str(&serde_json::to_string(value)?);
        text.push('\n');
    }
    fs::write(&tmp, text).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("moving {} into place", path.display()))?;
    log::info!("repaired {} to {} entries", path.display(), reconciled.len());
    Ok(())
}
