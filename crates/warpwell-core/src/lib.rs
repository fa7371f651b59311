pub mod state;
pub mod error;
pub mod params;
pub mod drift;
pub mod diffusion;
pub mod integrators;
pub mod path;
pub mod noise;

// Core types
pub use state::{State, Time};
pub use error::{WellError, WellResult};
pub use params::{NoiseIntensity, SimParams};
pub use noise::NoiseGenerator;

// SDE traits
pub use drift::Drift;
pub use diffusion::Diffusion;

// Integrators
pub use integrators::{SdeIntegrator, EulerMaruyama, DormandPrince, SolverTolerance};

// Grid, path and ensemble types
pub use path::{TimeGrid, Trajectory, Ensemble, Realization};
