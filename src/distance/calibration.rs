use crate::error::Result;
use crate::storage::KeyValueStore;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const KEY_STEP_LENGTH: &str = "stepLength";
pub const KEY_LAST_CALIBRATED_AT: &str = "lastCalibratedAt";
pub const KEY_BODY_HEIGHT: &str = "bodyHeight";

/// Learned personal calibration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationState {
    /// Meters per step, 0 until calibrated
    pub step_length: f64,
    /// Epoch seconds of the last successful GNSS calibration
    pub last_calibrated_at: Option<i64>,
    /// Body height in meters
    pub body_height: Option<f64>,
}

impl CalibrationState {
    /// Read the state; absent or unreadable keys read as zero.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let step_length = read_f64(store, KEY_STEP_LENGTH)?;
        let last_calibrated_at = store
            .get(KEY_LAST_CALIBRATED_AT)?
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .filter(|&at| at != 0);
        let body_height = Some(read_f64(store, KEY_BODY_HEIGHT)?).filter(|&h| h > 0.0);

        Ok(Self {
            step_length,
            last_calibrated_at,
            body_height,
        })
    }

    pub fn last_calibrated(&self) -> Option<DateTime<Utc>> {
        self.last_calibrated_at
            .and_then(|at| Utc.timestamp_opt(at, 0).single())
    }
}

fn read_f64(store: &dyn KeyValueStore, key: &str) -> Result<f64> {
    Ok(store
        .get(key)?
        .and_then(|v: Value| v.as_f64())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0))
}

/// Calibration state with write-through persistence.
///
/// The in-memory state is updated first; a failed write is logged and does not roll it back.
pub struct Calibration {
    state: CalibrationState,
    store: Box<dyn KeyValueStore>,
}

impl Calibration {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            state: CalibrationState::default(),
            store,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn step_length(&self) -> f64 {
        self.state.step_length
    }

    pub fn body_height(&self) -> f64 {
        self.state.body_height.unwrap_or(0.0)
    }

    /// Refresh the cached state from storage.
    pub fn reload(&mut self) {
        match CalibrationState::load(self.store.as_ref()) {
            Ok(state) => self.state = state,
            Err(e) => {
                log::warn!("Failed to load calibration, starting uncalibrated: {}", e);
                self.state = CalibrationState::default();
            }
        }
    }

    pub fn save_step_length(&mut self, step_length: f64, calibrated_at: i64) {
        self.state.step_length = step_length;
        self.state.last_calibrated_at = Some(calibrated_at);

        self.persist(KEY_STEP_LENGTH, json!(step_length));
        self.persist(KEY_LAST_CALIBRATED_AT, json!(calibrated_at));
    }

    pub fn save_body_height(&mut self, body_height: f64) {
        self.state.body_height = Some(body_height).filter(|&h| h > 0.0);
        self.persist(KEY_BODY_HEIGHT, json!(body_height));
    }

    /// Remove every persisted value and reload (all zero).
    pub fn reset(&mut self) {
        for key in [KEY_STEP_LENGTH, KEY_LAST_CALIBRATED_AT, KEY_BODY_HEIGHT] {
            if let Err(e) = self.store.remove(key) {
                log::warn!("Failed to remove {}: {}", key, e);
            }
        }
        self.reload();
    }

    fn persist(&mut self, key: &str, value: Value) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("Failed to persist {}: {}", key, e);
        }
    }
}
