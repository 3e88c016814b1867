pub mod ghost;

pub use ghost::{GhostDetector, GhostSweeper, SweepOutcome};
