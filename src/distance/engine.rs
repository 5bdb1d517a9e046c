use super::calibration::{Calibration, CalibrationState};
use super::elevation::{AltitudeOutcome, AltitudeTracker};
use super::location_window::LocationWindow;
use crate::config::EngineConfig;
use crate::error::{Result, StepDistError};
use crate::events::{DistanceUpdate, EngineEvent, StatusUpdate};
use crate::gait::{StepCountChange, StepCounter, StepCounterParams};
use crate::sensors::{round_accuracy, LocationFix, Sample};
use crate::storage::KeyValueStore;
use crossbeam::channel::Sender;

/// Accuracy reported in status updates that are not triggered by a fix
const NO_FIX_ACCURACY: f64 = 9999.0;

/// Distance and step totals of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceAccumulator {
    /// Distance frozen when a gait pattern or calibration window ended
    pub settled_distance: f64,
    /// Distance of the steps counted since the last fold, at the learned step length
    pub in_flight_distance: f64,
    /// Body height and cadence based estimate
    pub heuristic_distance: f64,
    pub total_steps: usize,
    pub settled_steps: usize,
    pub in_flight_steps: usize,
    pub relative_altitude_gain: i64,
}

impl DistanceAccumulator {
    pub fn step_count_distance(&self) -> f64 {
        self.settled_distance + self.in_flight_distance
    }

    pub fn fused_distance(&self) -> i64 {
        fuse_distance(self.step_count_distance(), self.heuristic_distance)
    }

    /// Freeze the in-flight steps at the current step length.
    fn fold(&mut self, step_length: f64) {
        self.settled_steps += self.in_flight_steps;
        self.settled_distance += self.in_flight_steps as f64 * step_length;
        self.in_flight_steps = 0;
        self.in_flight_distance = 0.0;
    }
}

/// Blend the step count distance with the heuristic distance.
///
/// A zero estimate is treated as "no data" and never dilutes the other one.
pub fn fuse_distance(step_count_distance: f64, heuristic_distance: f64) -> i64 {
    let fused = match (step_count_distance != 0.0, heuristic_distance != 0.0) {
        (false, true) => heuristic_distance,
        (true, false) => step_count_distance,
        (true, true) => (step_count_distance + heuristic_distance) / 2.0,
        (false, false) => 0.0,
    };
    fused.round() as i64
}

/// Distance fusion engine.
///
/// Consumes gravity samples and location fixes on a single processing sequence, learns the
/// personal step length from GNSS distance and pushes [`EngineEvent`]s to its host.
pub struct DistanceEngine {
    config: Option<EngineConfig>,
    calibration: Calibration,
    step_counter: Option<StepCounter>,
    window: LocationWindow,
    altitude: AltitudeTracker,
    accumulator: DistanceAccumulator,
    localizing: bool,
    tracking: bool,
    gnss_calibration: bool,
    calibration_in_progress: bool,
    candidate_distance: f64,
    last_sample_at: f64,
    events: Sender<EngineEvent>,
}

impl DistanceEngine {
    pub fn new(store: Box<dyn KeyValueStore>, events: Sender<EngineEvent>) -> Self {
        let mut calibration = Calibration::new(store);
        calibration.reload();

        Self {
            config: None,
            calibration,
            step_counter: None,
            window: LocationWindow::new(),
            altitude: AltitudeTracker::new(EngineConfig::default().vertical_distance_filter),
            accumulator: DistanceAccumulator::default(),
            localizing: false,
            tracking: false,
            gnss_calibration: false,
            calibration_in_progress: false,
            candidate_distance: 0.0,
            last_sample_at: 0.0,
            events,
        }
    }

    pub fn config(&self) -> Option<&EngineConfig> {
        self.config.as_ref()
    }

    pub fn calibration(&self) -> &CalibrationState {
        self.calibration.state()
    }

    pub fn accumulator(&self) -> &DistanceAccumulator {
        &self.accumulator
    }

    pub fn step_counter(&self) -> Option<&StepCounter> {
        self.step_counter.as_ref()
    }

    pub fn is_localizing(&self) -> bool {
        self.localizing
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn candidate_distance(&self) -> f64 {
        self.candidate_distance
    }

    /// Cadence over the trailing 15 s, relative to the newest gravity sample.
    pub fn steps_per_minute(&self) -> usize {
        self.step_counter
            .as_ref()
            .map_or(0, |counter| counter.steps_per_minute(self.last_sample_at))
    }

    /// Validate `config`, load the calibration and start accepting location fixes.
    pub fn start_localization(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        if self.tracking {
            return Err(StepDistError::AlreadyRunning);
        }

        self.step_counter = Some(StepCounter::new(StepCounterParams::from(&config)));
        self.altitude = AltitudeTracker::new(config.vertical_distance_filter);
        self.config = Some(config);
        self.calibration.reload();
        self.localizing = true;

        log::info!(
            "Localization started (step length {:.3} m, body height {:.2} m)",
            self.calibration.step_length(),
            self.calibration.body_height()
        );
        self.send_status(NO_FIX_ACCURACY, String::new());
        Ok(())
    }

    /// Stop accepting location fixes; a running measurement ends as well.
    pub fn stop_localization(&mut self) -> Result<()> {
        if !self.localizing {
            return Err(StepDistError::NotLocalizing);
        }
        self.localizing = false;
        self.tracking = false;
        log::info!("Localization stopped");
        Ok(())
    }

    /// Reset the measurement and start counting steps.
    pub fn start_measuring_distance(&mut self, enable_gnss_calibration: bool) -> Result<()> {
        if !self.localizing {
            return Err(StepDistError::NotLocalizing);
        }
        if self.tracking {
            return Err(StepDistError::AlreadyRunning);
        }

        self.window.clear();
        self.altitude.reset();
        self.accumulator = DistanceAccumulator::default();
        self.calibration_in_progress = false;
        self.candidate_distance = 0.0;
        if let Some(counter) = self.step_counter.as_mut() {
            counter.reset();
        }

        self.gnss_calibration = enable_gnss_calibration;
        self.tracking = true;
        log::info!(
            "Distance measurement started (GNSS calibration {})",
            if enable_gnss_calibration { "on" } else { "off" }
        );
        Ok(())
    }

    pub fn stop_measuring_distance(&mut self) -> Result<()> {
        if !self.tracking {
            return Err(StepDistError::NotRunning);
        }
        self.tracking = false;
        log::info!(
            "Distance measurement stopped after {} steps",
            self.accumulator.total_steps
        );
        Ok(())
    }

    pub fn set_body_height(&mut self, body_height: f64) -> Result<()> {
        if !body_height.is_finite() || body_height < 0.0 {
            return Err(StepDistError::InvalidConfig(format!(
                "bodyHeight must be a non-negative number, got {body_height}"
            )));
        }
        self.calibration.save_body_height(body_height);
        self.send_status(NO_FIX_ACCURACY, String::new());
        Ok(())
    }

    pub fn reset_calibration(&mut self) {
        self.calibration.reset();
        log::info!("Calibration reset");
        self.send_status(NO_FIX_ACCURACY, String::new());
    }

    pub fn process_sample(&mut self, sample: &Sample) {
        if !self.tracking {
            return;
        }
        self.last_sample_at = sample.timestamp;
        let changes = match self.step_counter.as_mut() {
            Some(counter) => counter.process_sample(sample),
            None => return,
        };
        for change in changes {
            self.on_step_count_changed(change);
        }
    }

    pub fn process_location(&mut self, fix: &LocationFix) {
        if !self.localizing {
            return;
        }
        let accuracy = fix.rounded_accuracy();
        self.send_status(accuracy, format!("Accuracy: {:.1}", accuracy));

        if self.tracking {
            self.process_location_event(fix);
        }
    }

    /// Snapshot of the current readiness status.
    pub fn status(&self, accuracy: f64, debug_info: String) -> StatusUpdate {
        let state = self.calibration.state();
        let accuracy_ok = self
            .config
            .as_ref()
            .map_or(false, |config| round_accuracy(accuracy) <= config.horizontal_accuracy_filter);

        StatusUpdate {
            is_ready_to_start: accuracy_ok
                || state.step_length != 0.0
                || self.calibration.body_height() != 0.0,
            debug_info,
            last_calibrated_at: state.last_calibrated_at.unwrap_or(0),
            step_length: state.step_length,
            body_height: self.calibration.body_height(),
        }
    }

    pub fn distance_update(&self) -> DistanceUpdate {
        DistanceUpdate {
            distance_traveled: self.accumulator.fused_distance(),
            steps_taken: self.accumulator.total_steps,
            relative_altitude_gain: self.accumulator.relative_altitude_gain,
        }
    }

    fn on_step_count_changed(&mut self, change: StepCountChange) {
        let step_length = self.calibration.step_length();
        let body_height = self.calibration.body_height();
        let factor = self.config.as_ref().map_or(0.0, |c| c.step_length_factor);
        let acc = &mut self.accumulator;

        acc.in_flight_steps = change.count.saturating_sub(acc.settled_steps);
        acc.in_flight_distance = acc.in_flight_steps as f64 * step_length;

        let new_steps = change.count.saturating_sub(acc.total_steps);
        acc.heuristic_distance += new_steps as f64 * factor * body_height * change.frequency.sqrt();
        acc.total_steps = change.count;

        self.send(EngineEvent::Distance(self.distance_update()));
    }

    fn process_location_event(&mut self, fix: &LocationFix) {
        let config = match self.config.clone() {
            Some(config) => config,
            None => return,
        };

        if self.gnss_calibration {
            if let Some(candidate) = self.window.candidate_distance() {
                self.candidate_distance = candidate;
                if candidate >= config.distance_walked_to_calibrate {
                    self.calibration_in_progress = true;
                    self.calibrate(candidate, fix.timestamp);
                } else if self.calibration_in_progress {
                    self.calibration_in_progress = false;
                    self.accumulator.fold(self.calibration.step_length());
                    log::debug!(
                        "Calibration window closed, {} steps settled",
                        self.accumulator.settled_steps
                    );
                }
            }
        }

        let accuracy = fix.rounded_accuracy();
        if accuracy <= config.horizontal_accuracy_filter {
            self.window.push(fix.clone());
        } else {
            self.window.clear();
            self.candidate_distance = 0.0;
            self.send_status(
                NO_FIX_ACCURACY,
                format!("Calibr. cancel.: Accuracy ({:.1})", accuracy),
            );
        }

        let altitude_ok = match fix.vertical_accuracy {
            Some(vertical) => vertical <= config.vertical_accuracy_filter,
            None => accuracy <= config.horizontal_accuracy_filter,
        };
        if altitude_ok {
            if let AltitudeOutcome::Accepted { mean, gain } = self.altitude.push(fix.altitude) {
                if gain > 0 {
                    log::debug!("Altitude gain +{} m (window mean {:.0} m)", gain, mean);
                }
                self.accumulator.relative_altitude_gain = self.altitude.gain();
            }
        } else {
            self.altitude.clear();
        }
    }

    fn calibrate(&mut self, candidate: f64, timestamp: f64) {
        let (start, end) = match self.window.time_span() {
            Some(span) => span,
            None => return,
        };
        let steps = self
            .step_counter
            .as_ref()
            .map_or(0, |counter| counter.steps_between(start, end));
        if steps == 0 {
            log::debug!("No steps between {:.1} and {:.1}, calibration skipped", start, end);
            return;
        }

        let step_length = candidate / steps as f64;
        if !step_length.is_finite() || step_length <= 0.0 {
            log::warn!("Discarding invalid step length {}", step_length);
            return;
        }

        let calibrated_at = timestamp.floor() as i64;
        self.calibration.save_step_length(step_length, calibrated_at);
        log::info!(
            "Step length calibrated to {:.3} m ({:.1} m over {} steps)",
            step_length,
            candidate,
            steps
        );
        self.send_status(
            NO_FIX_ACCURACY,
            format!("Calibrated: {:.2} m", step_length),
        );
    }

    fn send_status(&self, accuracy: f64, debug_info: String) {
        self.send(EngineEvent::Status(self.status(accuracy, debug_info)));
    }

    fn send(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Event receiver dropped");
        }
    }
}
