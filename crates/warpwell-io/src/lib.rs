//! Storage and command-line front end for warpwell runs.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod layout;
pub mod manifest;
pub mod sink;

pub use config::{Environment, RunConfig};
pub use dataset::{
    read_ensemble, read_ensemble_dir, read_trajectory, write_ensemble, write_trajectory,
    write_trajectory_list, DatasetAttrs,
};
pub use layout::{ensure_dir, DataLayout, StartWell};
pub use manifest::{GridSummary, RunManifest};
pub use sink::{load_action_values, load_checkpoint, DirectorySink, LatestCheckpoint, StatusRecord};
