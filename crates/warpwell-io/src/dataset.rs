//! Parquet storage for trajectories and ensembles.
//!
//! Every file is a long table `(realization, time, x, y)`; run attributes
//! (`alpha`, `sigma` or `epsilon`, optionally `iteration`) and the kind of
//! object stored travel as Arrow schema metadata.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use arrow::array::{Array, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use warpwell_core::{Ensemble, NoiseIntensity, Realization, SimParams, State, Trajectory};

const KIND_KEY: &str = "kind";
const KIND_TRAJECTORY: &str = "trajectory";
const KIND_ENSEMBLE: &str = "ensemble";

/// Attributes stored alongside a dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DatasetAttrs {
    pub alpha: f64,
    /// Absent for noise-free objects such as instantons.
    pub noise: Option<NoiseIntensity>,
    /// Cumulative minimiser iterations, for refined paths.
    pub iteration: Option<usize>,
}

impl DatasetAttrs {
    pub fn instanton(alpha: f64, iteration: usize) -> Self {
        Self {
            alpha,
            noise: None,
            iteration: Some(iteration),
        }
    }

    pub fn params(&self) -> anyhow::Result<SimParams> {
        let noise = self
            .noise
            .ok_or_else(|| anyhow!("dataset has no sigma or epsilon attribute"))?;
        Ok(SimParams::new(self.alpha, noise))
    }

    fn to_metadata(self, kind: &str) -> HashMap<String, String> {
        let mut meta = HashMap::new();
        meta.insert(KIND_KEY.to_string(), kind.to_string());
        meta.insert("alpha".to_string(), self.alpha.to_string());
        if let Some(noise) = self.noise {
            meta.insert(noise.attr_name().to_string(), noise.raw().to_string());
        }
        if let Some(nit) = self.iteration {
            meta.insert("iteration".to_string(), nit.to_string());
        }
        meta
    }

    fn from_metadata(meta: &HashMap<String, String>) -> anyhow::Result<Self> {
        let number = |key: &str| -> anyhow::Result<Option<f64>> {
            meta.get(key)
                .map(|v| v.parse::<f64>().with_context(|| format!("bad `{key}` attribute: {v}")))
                .transpose()
        };
        let alpha = number("alpha")?.ok_or_else(|| anyhow!("dataset has no alpha attribute"))?;
        let noise = match (number("sigma")?, number("epsilon")?) {
            (Some(_), Some(_)) => bail!("dataset carries both sigma and epsilon"),
            (Some(s), None) => Some(NoiseIntensity::Sigma(s)),
            (None, Some(e)) => Some(NoiseIntensity::Epsilon(e)),
            (None, None) => None,
        };
        let iteration = meta
            .get("iteration")
            .map(|v| v.parse::<usize>().with_context(|| format!("bad `iteration` attribute: {v}")))
            .transpose()?;
        Ok(Self {
            alpha,
            noise,
            iteration,
        })
    }
}

impl From<&SimParams> for DatasetAttrs {
    fn from(params: &SimParams) -> Self {
        Self {
            alpha: params.alpha,
            noise: Some(params.noise),
            iteration: None,
        }
    }
}

fn schema(meta: HashMap<String, String>) -> Arc<Schema> {
    let fields = vec![
        Field::new("realization", DataType::UInt64, false),
        Field::new("time", DataType::Float64, false),
        Field::new("x", DataType::Float64, false),
        Field::new("y", DataType::Float64, false),
    ];
    Arc::new(Schema::new_with_metadata(fields, meta))
}

/// Columns of one table, row-aligned.
#[derive(Default)]
struct Columns {
    realization: Vec<u64>,
    time: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Columns {
    fn push_path(&mut self, id: u64, times: &[f64], states: &[State]) {
        for (t, s) in times.iter().zip(states) {
            self.realization.push(id);
            self.time.push(*t);
            self.x.push(s.x());
            self.y.push(s.y());
        }
    }

    fn into_batch(self, schema: Arc<Schema>) -> anyhow::Result<RecordBatch> {
        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(UInt64Array::from(self.realization)),
            Arc::new(Float64Array::from(self.time)),
            Arc::new(Float64Array::from(self.x)),
            Arc::new(Float64Array::from(self.y)),
        ];
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

/// Sibling path used while a file is being written.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

// Write to a temporary sibling, then rename over `path`, so readers never
// see a half-written file.
fn write_batch(path: &Path, batch: &RecordBatch) -> anyhow::Result<()> {
    let tmp = temp_path(path);
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    fs::rename(&tmp, path).with_context(|| format!("moving {} into place", path.display()))?;
    Ok(())
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str, path: &Path) -> anyhow::Result<&'a Float64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| anyhow!("{}: missing Float64 column `{name}`", path.display()))
}

fn read_columns(path: &Path) -> anyhow::Result<(HashMap<String, String>, Columns)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let meta = builder.schema().metadata().clone();
    let reader = builder.build()?;

    let mut cols = Columns::default();
    for batch in reader {
        let batch = batch?;
        let ids = batch
            .column_by_name("realization")
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| anyhow!("{}: missing UInt64 column `realization`", path.display()))?;

        cols.realization.extend(ids.values().iter().copied());
        cols.time.extend(f64_column(&batch, "time", path)?.values().iter().copied());
        cols.x.extend(f64_column(&batch, "x", path)?.values().iter().copied());
        cols.y.extend(f64_column(&batch, "y", path)?.values().iter().copied());
    }
    Ok((meta, cols))
}

fn check_kind(path: &Path, meta: &HashMap<String, String>, expected: &str) -> anyhow::Result<()> {
    match meta.get(KIND_KEY).map(String::as_str) {
        Some(kind) if kind == expected => Ok(()),
        other => bail!(
            "{}: expected a {expected} dataset, found {}",
            path.display(),
            other.unwrap_or("no kind attribute")
        ),
    }
}

pub fn write_trajectory(path: &Path, trajectory: &Trajectory, attrs: &DatasetAttrs) -> anyhow::Result<()> {
    let mut cols = Columns::default();
    cols.push_path(0, &trajectory.times, &trajectory.states);
    let batch = cols.into_batch(schema(attrs.to_metadata(KIND_TRAJECTORY)))?;
    write_batch(path, &batch)?;
    log::debug!("wrote {} samples to {}", trajectory.len(), path.display());
    Ok(())
}

pub fn read_trajectory(path: &Path) -> anyhow::Result<(Trajectory, DatasetAttrs)> {
    let (meta, cols) = read_columns(path)?;
    check_kind(path, &meta, KIND_TRAJECTORY)?;
    let attrs = DatasetAttrs::from_metadata(&meta)?;
    let states = cols.x.iter().zip(&cols.y).map(|(x, y)| State::new(*x, *y)).collect();
    Ok((Trajectory::from_parts(cols.time, states)?, attrs))
}

/// Realizations are written in ensemble order, each as a contiguous run of rows.
pub fn write_ensemble(path: &Path, ensemble: &Ensemble) -> anyhow::Result<()> {
    let mut cols = Columns::default();
    for r in &ensemble.realizations {
        cols.push_path(r.id, &ensemble.times, &r.states);
    }
    let attrs = DatasetAttrs::from(&ensemble.params);
    let batch = cols.into_batch(schema(attrs.to_metadata(KIND_ENSEMBLE)))?;
    write_batch(path, &batch)?;
    log::debug!(
        "wrote {} realizations x {} samples to {}",
        ensemble.len(),
        ensemble.times.len(),
        path.display()
    );
    Ok(())
}

pub fn read_ensemble(path: &Path) -> anyhow::Result<Ensemble> {
    let (meta, cols) = read_columns(path)?;
    check_kind(path, &meta, KIND_ENSEMBLE)?;
    let params = DatasetAttrs::from_metadata(&meta)?.params()?;

    let mut start = 0;
    let mut ensemble: Option<Ensemble> = None;
    while start < cols.realization.len() {
        let id = cols.realization[start];
        let end = cols.realization[start..]
            .iter()
            .position(|&r| r != id)
            .map_or(cols.realization.len(), |n| start + n);

        let times = &cols.time[start..end];
        let states = (start..end).map(|k| State::new(cols.x[k], cols.y[k])).collect();
        let target = ensemble.get_or_insert_with(|| Ensemble::new(times.to_vec(), params));
        if target.times.as_slice() != times {
            bail!(
                "{}: realization {id} does not share the ensemble time grid",
                path.display()
            );
        }
        target.push(Realization { id, states })?;
        start = end;
    }

    ensemble.ok_or_else(|| anyhow!("{}: ensemble has no rows", path.display()))
}

/// Read every ensemble file in `dir` with a `.parquet` extension, sorted by name.
pub fn read_ensemble_dir(dir: &Path) -> anyhow::Result<Vec<Ensemble>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    files.iter().map(|f| read_ensemble(f)).collect()
}

/// Store each trajectory as `{index}.parquet` (1-based) under `dir`.
///
/// Parquet files already in `dir` are removed first, so the directory holds
/// exactly `paths` afterwards.
pub fn write_trajectory_list(dir: &Path, paths: &[Trajectory], attrs: &DatasetAttrs) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut stale = 0;
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "parquet") {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            stale += 1;
        }
    }
    if stale > 0 {
        log::debug!("removed {stale} old trajectories from {}", dir.display());
    }
    for (i, p) in paths.iter().enumerate() {
        write_trajectory(&dir.join(format!("{}.parquet", i + 1)), p, attrs)?;
    }
    log::info!("saved {} trajectories in {}", paths.len(), dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_both_noise_conventions() {
        for noise in [NoiseIntensity::Sigma(0.2), NoiseIntensity::Epsilon(0.01)] {
            let attrs = DatasetAttrs { alpha: 0.25, noise: Some(noise), iteration: None };
            let meta = attrs.to_metadata(KIND_ENSEMBLE);
            assert_eq!(DatasetAttrs::from_metadata(&meta).unwrap(), attrs);
        }
        let inst = DatasetAttrs::instanton(1.0, 40);
        assert_eq!(DatasetAttrs::from_metadata(&inst.to_metadata(KIND_TRAJECTORY)).unwrap(), inst);
        assert!(inst.params().is_err());
    }

    #[test]
    fn conflicting_noise_attributes_are_rejected() {
        let mut meta = HashMap::new();
        meta.insert("alpha".to_string(), "0.5".to_string());
        meta.insert("sigma".to_string(), "0.1".to_string());
        meta.insert("epsilon".to_string(), "0.01".to_string());
        assert!(DatasetAttrs::from_metadata(&meta).is_err());
        meta.remove("alpha");
        assert!(DatasetAttrs::from_metadata(&meta).is_err());
    }

    #[test]
    fn temp_file_is_a_hidden_sibling() {
        let tmp = temp_path(Path::new("/data/run/instanton.parquet"));
        assert_eq!(tmp, PathBuf::from("/data/run/.instanton.parquet.tmp"));
    }
}
