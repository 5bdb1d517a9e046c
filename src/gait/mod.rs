//! Gait pattern detection on the gravity signal.
//!
//! Samples flow extremum detection → smoothing → stride building → pattern matching, and
//! recognised steps are timestamped in the [`StepLedger`].

pub mod extremum;
pub mod ledger;
pub mod smoothing;
pub mod step_counter;
pub mod stride;

pub use extremum::ExtremumFlag;
pub use ledger::StepLedger;
pub use step_counter::{PatternState, StepCountChange, StepCounter, StepCounterParams};
pub use stride::{Stride, StrideKind};
