use serde::{Deserialize, Serialize};

/// Gravity vector sample from the device motion source (m/s²)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Epoch seconds
    pub timestamp: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self { x, y, z, timestamp }
    }

    /// Per-axis components, indexed the same way as stride axes.
    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Location fix from the positioning subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Horizontal accuracy radius in meters
    pub horizontal_accuracy: f64,
    /// Vertical accuracy in meters, when the source reports one
    #[serde(default)]
    pub vertical_accuracy: Option<f64>,
    /// Epoch seconds
    pub timestamp: f64,
}

impl LocationFix {
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        horizontal_accuracy: f64,
        timestamp: f64,
    ) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            horizontal_accuracy,
            vertical_accuracy: None,
            timestamp,
        }
    }

    pub fn with_vertical_accuracy(mut self, vertical_accuracy: f64) -> Self {
        self.vertical_accuracy = Some(vertical_accuracy);
        self
    }

    /// Horizontal accuracy rounded to one decimal, as compared against the filter.
    pub fn rounded_accuracy(&self) -> f64 {
        round_accuracy(self.horizontal_accuracy)
    }
}

pub fn round_accuracy(accuracy: f64) -> f64 {
    (accuracy * 10.0).round() / 10.0
}
