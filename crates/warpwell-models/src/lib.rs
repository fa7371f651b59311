pub mod warped_well;
pub mod initial_conditions;

pub use warped_well::{WarpedWell, COLD_POINT, HOT_POINT, SADDLE_POINT};
pub use initial_conditions::{ic_spread, cold_ic_spread, hot_ic_spread};
