// Step counting and distance estimation from gravity samples and location fixes

pub mod config;
pub mod distance;
pub mod error;
pub mod events;
pub mod gait;
pub mod recording;
pub mod sensors;
pub mod service;
pub mod storage;

pub use config::EngineConfig;
pub use distance::{fuse_distance, CalibrationState, DistanceEngine};
pub use error::{Result, StepDistError};
pub use events::{DistanceUpdate, EngineEvent, StatusUpdate};
pub use gait::{PatternState, StepCounter, StepCounterParams};
pub use recording::SessionLog;
pub use sensors::{LocationFix, Sample};
pub use service::{DistanceService, EngineSnapshot};
pub use storage::{BackgroundStore, JsonFileStore, KeyValueStore, MemoryStore};
