use super::stride::Stride;

/// Window used for the cadence estimate, in seconds.
const CADENCE_WINDOW_SECS: f64 = 15.0;

/// Timestamps of recognised steps.
///
/// Steps of the active gait pattern stay in flight until the pattern is lost, then they
/// are settled. Both partitions only ever grow by appending.
#[derive(Debug, Clone, Default)]
pub struct StepLedger {
    settled: Vec<f64>,
    in_flight: Vec<f64>,
}

impl StepLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_steps(&self) -> usize {
        self.settled.len() + self.in_flight.len()
    }

    pub fn settled_steps(&self) -> usize {
        self.settled.len()
    }

    pub fn in_flight_steps(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of steps with a timestamp in `[start, end]`.
    pub fn steps_between(&self, start: f64, end: f64) -> usize {
        self.settled
            .iter()
            .chain(self.in_flight.iter())
            .filter(|&&t| t >= start && t <= end)
            .count()
    }

    /// Cadence over the trailing 15 s, shifted back by the smoothing latency.
    pub fn steps_per_minute(&self, now: f64, smoothing_latency: f64) -> usize {
        let end = now - smoothing_latency;
        let start = end - CADENCE_WINDOW_SECS;
        self.steps_between(start, end) * (60.0 / CADENCE_WINDOW_SECS) as usize
    }

    /// Replace the in-flight steps with `count` steps implied by a freshly locked pattern.
    ///
    /// The newest stride is confirmed separately, so backfilling starts one step earlier.
    pub fn seed(&mut self, stride: &Stride, count: usize, now: f64, update_interval: f64, smoothing_latency: f64) {
        let step = stride.step_duration(update_interval);
        let mut t = now - smoothing_latency - step;

        self.in_flight.clear();
        for _ in 0..count {
            t -= step;
            self.in_flight.push(t);
        }
    }

    /// Append `count` steps for a confirmed stride, the newest at the smoothed time.
    pub fn append(&mut self, stride: &Stride, count: usize, now: f64, update_interval: f64, smoothing_latency: f64) {
        if count == 0 {
            return;
        }
        let step = stride.step_duration(update_interval);
        let mut t = now - smoothing_latency;

        self.in_flight.push(t);
        for _ in 1..count {
            t -= step;
            self.in_flight.push(t);
        }
    }

    /// Freeze the in-flight steps into the settled partition.
    pub fn settle(&mut self) {
        self.settled.append(&mut self.in_flight);
    }

    /// Earliest and latest step timestamps, if any.
    pub fn observed_range(&self) -> Option<(f64, f64)> {
        self.settled
            .iter()
            .chain(self.in_flight.iter())
            .fold(None, |range, &t| match range {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
    }
}
