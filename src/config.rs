use crate::error::{Result, StepDistError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gravity samples arrive in m/s², the minimum stride amplitude is configured in g.
pub const GRAVITY: f64 = 9.8;

/// Every option a host must supply when starting localization.
pub const OPTION_KEYS: [&str; 12] = [
    "horizontalDistanceFilter",
    "horizontalAccuracyFilter",
    "verticalDistanceFilter",
    "verticalAccuracyFilter",
    "distanceWalkedToCalibrate",
    "updateInterval",
    "stepLengthFactor",
    "betterStrideFactor",
    "deviationLength",
    "deviationAmplitude",
    "minStrideAmplitude",
    "smoothingTimeframe",
];

/// Tuning parameters for both the location side and the step counting side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum movement in meters before the location source reports a new fix
    pub horizontal_distance_filter: f64,
    /// Maximum horizontal accuracy (meters) for a fix to be used
    pub horizontal_accuracy_filter: f64,
    /// Number of altitude samples averaged per elevation window
    pub vertical_distance_filter: usize,
    /// Maximum vertical accuracy (meters) for an altitude to be used
    pub vertical_accuracy_filter: f64,
    /// GNSS distance (meters) that must be walked before step length is calibrated
    pub distance_walked_to_calibrate: f64,
    /// Seconds between two gravity samples
    pub update_interval: f64,
    /// Heuristic factor applied to body height and step frequency
    pub step_length_factor: f64,
    /// How much larger a new stride amplitude must be to replace the representative stride
    pub better_stride_factor: f64,
    /// Allowed relative deviation in stride length
    pub deviation_length: f64,
    /// Allowed relative deviation in stride amplitude
    pub deviation_amplitude: f64,
    /// Minimum stride amplitude in g
    pub min_stride_amplitude: f64,
    /// Smoothing window in samples
    pub smoothing_timeframe: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizontal_distance_filter: 4.0,
            horizontal_accuracy_filter: 8.0,
            vertical_distance_filter: 4,
            vertical_accuracy_filter: 10.0,
            distance_walked_to_calibrate: 40.0,
            update_interval: 0.1,
            step_length_factor: 0.33,
            better_stride_factor: 1.2,
            deviation_length: 0.35,
            deviation_amplitude: 0.35,
            min_stride_amplitude: 0.2,
            smoothing_timeframe: 6,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON options object.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| StepDistError::InvalidConfig(format!("malformed options: {e}")))?;
        Self::from_value(value)
    }

    /// Parse and validate an already decoded options object.
    ///
    /// All options are required; defaults are never substituted for missing keys.
    pub fn from_value(value: Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| StepDistError::InvalidConfig("options must be an object".into()))?;

        if let Some(missing) = OPTION_KEYS.iter().find(|key| !object.contains_key(**key)) {
            return Err(StepDistError::MissingOption(missing.to_string()));
        }

        let config: EngineConfig = serde_json::from_value(value)
            .map_err(|e| StepDistError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        positive("updateInterval", self.update_interval)?;
        positive("horizontalAccuracyFilter", self.horizontal_accuracy_filter)?;
        positive("verticalAccuracyFilter", self.vertical_accuracy_filter)?;
        positive("distanceWalkedToCalibrate", self.distance_walked_to_calibrate)?;
        positive("stepLengthFactor", self.step_length_factor)?;
        positive("betterStrideFactor", self.better_stride_factor)?;
        positive("deviationLength", self.deviation_length)?;
        positive("deviationAmplitude", self.deviation_amplitude)?;

        if !self.horizontal_distance_filter.is_finite() || self.horizontal_distance_filter < 0.0 {
            return Err(StepDistError::InvalidConfig(
                "horizontalDistanceFilter must be a non-negative number".into(),
            ));
        }
        if !self.min_stride_amplitude.is_finite() || self.min_stride_amplitude < 0.0 {
            return Err(StepDistError::InvalidConfig(
                "minStrideAmplitude must be a non-negative number".into(),
            ));
        }
        if self.smoothing_timeframe < 1 {
            return Err(StepDistError::InvalidConfig(
                "smoothingTimeframe must be at least 1".into(),
            ));
        }
        if self.vertical_distance_filter < 2 {
            return Err(StepDistError::InvalidConfig(
                "verticalDistanceFilter must be at least 2".into(),
            ));
        }
        Ok(())
    }

    /// Minimum stride amplitude in the unit of the gravity samples.
    pub fn min_stride_amplitude_ms2(&self) -> f64 {
        self.min_stride_amplitude * GRAVITY
    }

    /// Latency introduced by the smoothing window, in seconds.
    pub fn smoothing_latency(&self) -> f64 {
        self.update_interval * self.smoothing_timeframe as f64
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StepDistError::InvalidConfig(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}
