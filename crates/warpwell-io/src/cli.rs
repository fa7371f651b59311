use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use warpwell_core::{NoiseGenerator, NoiseIntensity, SimParams, State, TimeGrid};
use warpwell_detect::{transition_durations, Direction, TransitionDetector};
use warpwell_mam::{BlockSchedule, InstantonRefiner, PathGuess};
use warpwell_models::{ic_spread, COLD_POINT, HOT_POINT, SADDLE_POINT};
use warpwell_sampler::{
    ensemble_integrate, make_observations, relax, DeterministicIntegrator, TrajectoryObserver,
    WaitingTimeExperiment,
};

use crate::config::{Environment, RunConfig};
use crate::dataset::{read_ensemble, read_ensemble_dir, write_ensemble, write_trajectory_list, DatasetAttrs};
use crate::layout::{ensure_dir, DataLayout, StartWell};
use crate::manifest::RunManifest;
use crate::sink::{load_checkpoint, DirectorySink};

#[derive(Parser)]
#[command(name = "warpwell")]
#[command(about = "Warped double-well simulation, transition detection and instanton refinement")]
pub struct Cli {
    /// JSON run configuration (defaults are used when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured environment
    #[arg(long, global = true, value_enum)]
    pub environment: Option<Environment>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Exactly one noise convention.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
pub struct NoiseArgs {
    /// Amplitude multiplying dW
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Variance convention, sigma = sqrt(epsilon)
    #[arg(long)]
    pub epsilon: Option<f64>,
}

impl NoiseArgs {
    pub fn intensity(&self) -> anyhow::Result<NoiseIntensity> {
        match (self.sigma, self.epsilon) {
            (Some(s), None) => Ok(NoiseIntensity::Sigma(s)),
            (None, Some(e)) => Ok(NoiseIntensity::Epsilon(e)),
            _ => bail!("give exactly one of --sigma or --epsilon"),
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum GuessKind {
    /// Straight line between the endpoints
    Linear,
    /// Time-reversed relaxation from next to the end point
    Relaxation,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Integrate a stochastic ensemble and write it to Parquet
    Simulate {
        #[arg(long)]
        alpha: f64,

        #[command(flatten)]
        noise: NoiseArgs,

        /// Well the initial conditions are spread around
        #[arg(long, value_enum, default_value = "cold")]
        start: StartWell,

        /// Time step size
        #[arg(long, default_value = "0.1")]
        dt: f64,

        /// Integration length in time units
        #[arg(long)]
        duration: f64,

        /// Number of realizations
        #[arg(long, default_value = "1")]
        realizations: usize,

        /// Output file (default: under the integration directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Noise-free relaxation from a point, observed at a fixed interval
    Relax {
        #[arg(long)]
        alpha: f64,

        #[arg(long, allow_hyphen_values = true)]
        x: f64,

        #[arg(long, allow_hyphen_values = true)]
        y: f64,

        #[arg(long)]
        duration: f64,

        /// Time between observations
        #[arg(long, default_value = "0.1")]
        obs_freq: f64,

        /// Observations held before flushing to disk
        #[arg(long, default_value = "1000")]
        buffer: usize,

        #[arg(long)]
        out: PathBuf,
    },

    /// Extract clean well-to-well transitions from stored ensembles
    Detect {
        #[arg(long)]
        alpha: f64,

        #[command(flatten)]
        noise: NoiseArgs,

        /// Ensemble files (default: everything in the integration directories)
        #[arg(long, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Override the configured ball size
        #[arg(long)]
        ball_size: Option<f64>,
    },

    /// Minimise the action from a path guess, checkpointing every block
    Refine {
        #[arg(long)]
        alpha: f64,

        #[arg(long, value_enum, default_value = "linear")]
        guess: GuessKind,

        #[arg(long, default_value = "0.1")]
        dt: f64,

        /// Number of path points
        #[arg(long, default_value = "500")]
        steps: usize,

        #[arg(long, default_value = "100")]
        block_len: usize,

        #[arg(long, default_value = "10")]
        blocks: usize,

        /// Blocks after which a path snapshot is kept
        #[arg(long, value_delimiter = ',')]
        snapshot_blocks: Vec<usize>,

        /// Continue from the checkpoint in the output directory
        #[arg(long)]
        resume: bool,

        /// Output directory (default: under the instanton directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Measure waiting times until the saddle line is crossed
    Wait {
        #[arg(long)]
        alpha: f64,

        #[command(flatten)]
        noise: NoiseArgs,

        #[arg(long, value_enum, default_value = "cold")]
        start: StartWell,

        #[arg(long, default_value = "100")]
        block_length: f64,

        #[arg(long, default_value = "0.01")]
        dt: f64,

        #[arg(long, default_value = "10")]
        transitions: usize,

        /// Hard cap on integrated blocks
        #[arg(long)]
        max_blocks: usize,

        /// JSON file for the waiting times
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn well_center(start: StartWell) -> State {
    match start {
        StartWell::Cold => COLD_POINT,
        StartWell::Hot => HOT_POINT,
    }
}

/// Load, override and validate the configuration before any work starts.
pub fn load_config(path: Option<&Path>, environment: Option<Environment>) -> anyhow::Result<RunConfig> {
    let mut config = match path {
        Some(p) => RunConfig::from_json(p)?,
        None => RunConfig::default(),
    };
    if let Some(env) = environment {
        config.environment = env;
    }
    config.validate()?;
    Ok(config)
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.environment)?;
    let layout = DataLayout::new(config.root());
    log::debug!("data root {}", layout.root().display());

    match cli.command {
        Commands::Simulate { alpha, noise, start, dt, duration, realizations, out } => {
            let params = SimParams::new(alpha, noise.intensity()?);
            run_simulate(&config, &layout, params, start, dt, duration, realizations, out)
        }
        Commands::Relax { alpha, x, y, duration, obs_freq, buffer, out } => {
            run_relax(&config, alpha, State::new(x, y), duration, obs_freq, buffer, &out)
        }
        Commands::Detect { alpha, noise, input, ball_size } => {
            let params = SimParams::new(alpha, noise.intensity()?);
            run_detect(&layout, &params, &input, ball_size.unwrap_or(config.ball_size))
        }
        Commands::Refine { alpha, guess, dt, steps, block_len, blocks, snapshot_blocks, resume, out } => {
            let out = out.unwrap_or_else(|| layout.instanton_dir(alpha));
            let schedule = BlockSchedule::new(block_len, blocks).with_snapshots(snapshot_blocks);
            run_refine(&config, alpha, guess, dt, steps, &schedule, resume, &out)
        }
        Commands::Wait { alpha, noise, start, block_length, dt, transitions, max_blocks, out } => {
            let params = SimParams::new(alpha, noise.intensity()?);
            let experiment = WaitingTimeExperiment {
                start: well_center(start),
                block_length,
                dt,
                target_transitions: transitions,
                max_blocks,
            };
            run_wait(&config, &params, &experiment, out.as_deref())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    config: &RunConfig,
    layout: &DataLayout,
    params: SimParams,
    start: StartWell,
    dt: f64,
    duration: f64,
    realizations: usize,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    params.validate()?;
    let grid = TimeGrid::arange(0.0, duration, dt)?;

    // Stream 0 seeds the initial conditions; realizations use 1..=N.
    let mut ic_noise = NoiseGenerator::from_path_id(config.seed, 0);
    let x0s = ic_spread(&well_center(start), realizations, ic_noise.rng_mut());

    log::info!(
        "simulating {realizations} realizations, {} samples, alpha = {}, {} = {}",
        grid.len(),
        params.alpha,
        params.noise.attr_name(),
        params.noise.raw()
    );
    let ensemble = ensemble_integrate(&x0s, &grid, &params, config.seed)?;

    let manifest = RunManifest::for_params("simulate", &params)
        .with_seed(config.seed)
        .with_grid(&grid)
        .with_realizations(ensemble.len());
    let out = match out {
        Some(p) => p,
        None => {
            let dir = layout.integration_dir(params.alpha, &params.noise, start);
            ensure_dir(&dir)?;
            dir.join(format!("{}.parquet", manifest.run_id))
        }
    };
    write_ensemble(&out, &ensemble)?;
    let manifest_path = out.with_extension("manifest.json");
    manifest.save_to_file(&manifest_path)?;

    println!("Wrote {} realizations to {}", ensemble.len(), out.display());
    println!("Wrote manifest to {}", manifest_path.display());
    Ok(())
}

fn run_relax(
    config: &RunConfig,
    alpha: f64,
    x0: State,
    duration: f64,
    obs_freq: f64,
    buffer: usize,
    out: &Path,
) -> anyhow::Result<()> {
    if !(obs_freq > 0.0) || !(duration >= 0.0) {
        bail!("need obs_freq > 0 and duration >= 0, got {obs_freq} and {duration}");
    }
    let mut integrator = DeterministicIntegrator::new(alpha, x0, config.solver)?;
    let mut observer = TrajectoryObserver::for_integrator(&integrator, buffer)?;
    let mut sink = DirectorySink::create(out)?;

    observer.record(&integrator)?;
    let mut remaining = (duration / obs_freq).round() as usize;
    while remaining > 0 {
        if observer.is_full() {
            observer.flush(&mut sink)?;
        }
        let n = remaining.min(buffer - observer.len());
        make_observations(&mut integrator, &mut observer, n, obs_freq)?;
        remaining -= n;
    }
    observer.flush(&mut sink)?;

    RunManifest::for_params("relax", &integrator.params())
        .save_to_file(&out.join("relax.manifest.json"))?;
    println!(
        "Relaxed to ({:.6}, {:.6}) at t = {} in {} batches",
        integrator.state().x(),
        integrator.state().y(),
        integrator.time(),
        observer.flush_count()
    );
    Ok(())
}

fn run_detect(layout: &DataLayout, params: &SimParams, input: &[PathBuf], ball_size: f64) -> anyhow::Result<()> {
    let detector = TransitionDetector::new(ball_size)?;

    let ensembles = if input.is_empty() {
        let mut all = Vec::new();
        for dir in layout.integration_dirs(params.alpha, &params.noise) {
            if dir.is_dir() {
                all.extend(read_ensemble_dir(&dir)?);
            } else {
                log::warn!("no integration directory at {}", dir.display());
            }
        }
        all
    } else {
        input.iter().map(|p| read_ensemble(p)).collect::<anyhow::Result<Vec<_>>>()?
    };
    if ensembles.is_empty() {
        bail!("no ensembles found for alpha = {}", params.alpha);
    }

    let mut pooled = warpwell_detect::ExtractedTransitions::default();
    for ensemble in &ensembles {
        if ensemble.params != *params {
            log::warn!("ensemble parameters {:?} differ from the requested {:?}", ensemble.params, params);
        }
        pooled.extend(detector.extract_ensemble(ensemble));
    }

    let attrs = DatasetAttrs::from(params);
    for (direction, paths) in [
        (Direction::ColdToHot, &pooled.cold_to_hot),
        (Direction::HotToCold, &pooled.hot_to_cold),
    ] {
        let dir = layout.transition_dir(params.alpha, &params.noise, direction);
        write_trajectory_list(&dir, paths, &attrs)?;
        let durations = transition_durations(paths);
        let mean = if durations.is_empty() {
            f64::NAN
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };
        println!("{}: {} transitions, mean duration {mean:.3}", direction.short_name(), paths.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_refine(
    config: &RunConfig,
    alpha: f64,
    guess_kind: GuessKind,
    dt: f64,
    steps: usize,
    schedule: &BlockSchedule,
    resume: bool,
    out: &Path,
) -> anyhow::Result<()> {
    schedule.validate()?;
    let grid = TimeGrid::uniform(0.0, dt, steps)?;

    let (guess, resumed_nit) = match (resume, load_checkpoint(out)?) {
        (true, Some(latest)) => {
            log::info!("resuming from iteration {} in {}", latest.status.nit, out.display());
            if latest.alpha != alpha {
                bail!("checkpoint in {} was made with alpha = {}", out.display(), latest.alpha);
            }
            (PathGuess::new(latest.instanton)?, Some(latest.status.nit))
        }
        (true, None) => bail!("--resume given but {} holds no checkpoint", out.display()),
        (false, existing) => {
            if existing.is_some() {
                log::warn!("starting afresh over the checkpoint in {}", out.display());
            }
            let guess = match guess_kind {
                GuessKind::Linear => PathGuess::linear(HOT_POINT, SADDLE_POINT, &grid)?,
                GuessKind::Relaxation => {
                    let near_saddle = State::new(0.01, 0.0);
                    let span = grid.last() - grid.first();
                    let relaxation = relax(near_saddle, alpha, span, dt, config.solver)?;
                    PathGuess::reversed_relaxation(&relaxation, &grid)?
                }
            };
            (guess, None)
        }
    };

    let mut refiner = InstantonRefiner::new(guess, alpha, None, config.lbfgs)?;
    if let Some(nit) = resumed_nit {
        refiner = refiner.resume_at(nit);
    }
    let mut sink = DirectorySink::create(out)?;
    let outcome = refiner
        .run(schedule, &mut sink)
        .with_context(|| format!("refining into {}", out.display()))?;

    println!(
        "{:?} after {} iterations ({} blocks), action = {:.6e}",
        outcome.status, outcome.nit, outcome.blocks_run, outcome.action
    );
    println!("{}", outcome.message);
    Ok(())
}

fn run_wait(
    config: &RunConfig,
    params: &SimParams,
    experiment: &WaitingTimeExperiment,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let result = experiment.run(params, config.seed)?;
    if let Some(path) = out {
        std::fs::write(path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    let mean = if result.waiting_times.is_empty() {
        f64::NAN
    } else {
        result.waiting_times.iter().sum::<f64>() / result.waiting_times.len() as f64
    };
    println!(
        "{} transitions in {} blocks (mean wait {mean:.1}){}",
        result.waiting_times.len(),
        result.blocks_run,
        if result.completed { "" } else { ", cap reached" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn noise_needs_exactly_one_convention() {
        let ok = Cli::try_parse_from(["warpwell", "simulate", "--alpha", "0.5", "--sigma", "0.2", "--duration", "10"]);
        match ok.unwrap().command {
            Commands::Simulate { noise, start, .. } => {
                assert_eq!(noise.intensity().unwrap(), NoiseIntensity::Sigma(0.2));
                assert_eq!(start, StartWell::Cold);
            }
            _ => panic!("wrong subcommand"),
        }

        let both = Cli::try_parse_from([
            "warpwell", "wait", "--alpha", "0", "--sigma", "0.2", "--epsilon", "0.04", "--max-blocks", "5",
        ]);
        assert!(both.is_err());
        let neither = Cli::try_parse_from(["warpwell", "detect", "--alpha", "0"]);
        assert!(neither.is_err());
    }

    #[test]
    fn refine_accepts_snapshot_lists() {
        let cli = Cli::try_parse_from([
            "warpwell", "--environment", "cluster", "refine", "--alpha", "1", "--snapshot-blocks", "1,2,5",
        ])
        .unwrap();
        assert_eq!(cli.environment, Some(Environment::Cluster));
        match cli.command {
            Commands::Refine { snapshot_blocks, block_len, blocks, .. } => {
                assert_eq!(snapshot_blocks, vec![1, 2, 5]);
                assert_eq!((block_len, blocks), (100, 10));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn cluster_environment_without_a_root_is_rejected() {
        assert!(load_config(None, Some(Environment::Cluster)).is_err());
        assert!(load_config(None, None).is_ok());
    }
}
