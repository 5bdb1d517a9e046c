use serde::{Deserialize, Serialize};

/// Fused distance estimate pushed on every step count change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistanceUpdate {
    /// Meters
    pub distance_traveled: i64,
    pub steps_taken: usize,
    /// Meters climbed since the measurement started
    pub relative_altitude_gain: i64,
}

/// Calibration readiness and diagnostics
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub is_ready_to_start: bool,
    pub debug_info: String,
    /// Epoch seconds, 0 when never calibrated
    pub last_calibrated_at: i64,
    pub step_length: f64,
    pub body_height: f64,
}

/// Everything the engine pushes to its host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    Distance(DistanceUpdate),
    Status(StatusUpdate),
}

impl EngineEvent {
    pub fn as_distance(&self) -> Option<&DistanceUpdate> {
        match self {
            EngineEvent::Distance(update) => Some(update),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<&StatusUpdate> {
        match self {
            EngineEvent::Status(update) => Some(update),
            _ => None,
        }
    }
}
