//! Step length calibration against GNSS distance and distance fusion.

pub mod calibration;
pub mod elevation;
pub mod engine;
pub mod location_window;

pub use calibration::{Calibration, CalibrationState};
pub use elevation::{AltitudeOutcome, AltitudeTracker};
pub use engine::{fuse_distance, DistanceAccumulator, DistanceEngine};
pub use location_window::LocationWindow;
