//! Transition detection for long double-well time series.
//!
//! Every sample is tagged cold (`-1`), neutral (`0`) or hot (`+1`) by its
//! distance to the two wells. A cold→hot transition is a run
//! `-1, 0, ..., 0, +1`; hot→cold is the mirror image. Each seed sample is
//! paired with the nearest later sample of the opposite well and kept only
//! when everything strictly between them is neutral. Seeds are scanned
//! independently, so segments are never merged or de-duplicated.

pub mod label;
pub mod segment;
pub mod detector;

pub use label::{label, symbolic_sequence, SymbolicLabel};
pub use segment::{transition_durations, Direction, TransitionSegment};
pub use detector::{
    cold_to_hot_segments, hot_to_cold_segments, ExtractedTransitions, TransitionDetector,
    Transitions, DEFAULT_BALL_SIZE,
};
