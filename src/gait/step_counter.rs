use super::extremum::{classify, ExtremumFlag};
use super::ledger::StepLedger;
use super::smoothing::smooth_window;
use super::stride::{Stride, StrideBuilder, StrideKind};
use crate::config::EngineConfig;
use crate::sensors::Sample;
use std::collections::VecDeque;

/// Steps implied by the strides that confirmed a new pattern
const SEED_STEPS: usize = 4;
/// Steps per confirmed stride
const STEPS_PER_STRIDE: usize = 2;
/// In-flight steps after which no axis may take over the lock
const LOCK_HOLD_STEPS: usize = 15;
/// Similarity results needed before a pattern can be locked
const MIN_SIMILARITIES: usize = 3;
/// Strides kept per axis: the representative is built from positions -5, -3 and -1
const STRIDE_HISTORY: usize = 5;

/// Step counting parameters, derived from the engine configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCounterParams {
    pub update_interval: f64,
    pub better_stride_factor: f64,
    pub deviation_length: f64,
    pub deviation_amplitude: f64,
    /// Minimum stride amplitude in m/s²
    pub min_stride_amplitude: f64,
    pub smoothing_timeframe: usize,
}

impl From<&EngineConfig> for StepCounterParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            update_interval: config.update_interval,
            better_stride_factor: config.better_stride_factor,
            deviation_length: config.deviation_length,
            deviation_amplitude: config.deviation_amplitude,
            min_stride_amplitude: config.min_stride_amplitude_ms2(),
            smoothing_timeframe: config.smoothing_timeframe,
        }
    }
}

impl StepCounterParams {
    fn smoothing_latency(&self) -> f64 {
        self.update_interval * self.smoothing_timeframe as f64
    }
}

/// Pattern matcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternState {
    Searching,
    Locked { axis: usize, kind: StrideKind },
}

/// Raised whenever confirmed steps were added
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCountChange {
    pub count: usize,
    /// Instantaneous step frequency in steps per second
    pub frequency: f64,
}

/// Buffered samples, extremum flags and stride history of one axis.
///
/// Only the trailing part of the signal needed for smoothing is retained; `base` is the
/// absolute sample index of the first buffered value.
#[derive(Debug, Clone)]
struct AxisPipeline {
    base: usize,
    values: Vec<f64>,
    flags: Vec<ExtremumFlag>,
    builder: StrideBuilder,
    strides: VecDeque<Stride>,
    similarities: VecDeque<bool>,
}

impl AxisPipeline {
    fn new(axis: usize) -> Self {
        Self {
            base: 0,
            values: Vec::new(),
            flags: Vec::new(),
            builder: StrideBuilder::new(axis),
            strides: VecDeque::with_capacity(STRIDE_HISTORY),
            similarities: VecDeque::with_capacity(MIN_SIMILARITIES),
        }
    }

    /// Buffer sample `index` and return the smoothed extremum that left the window, if any.
    fn push(&mut self, index: usize, value: f64, smoothing: usize) -> Option<(usize, f64, ExtremumFlag)> {
        self.values.push(value);
        if index == 0 {
            self.flags.push(ExtremumFlag::None);
        } else if index >= 2 {
            let n = self.values.len();
            let flag = classify(self.values[n - 3], self.values[n - 2], self.values[n - 1]);
            self.flags.push(flag);
        }

        let mut extremum = None;
        if index >= smoothing {
            let start = index - smoothing - self.base;
            let end = index - self.base;
            smooth_window(&mut self.values[start..end], &mut self.flags[start..end]);

            let flag = self.flags[start];
            if flag.is_extremum() {
                extremum = Some((index - smoothing, self.values[start], flag));
            }
        }

        let keep_from = (index + 1)
            .saturating_sub(smoothing)
            .min(index.saturating_sub(1));
        if keep_from > self.base {
            let drop = keep_from - self.base;
            self.values.drain(..drop);
            self.flags.drain(..drop);
            self.base = keep_from;
        }

        extremum
    }

    /// Store a new stride and compare it with the previous stride of the same kind.
    fn record(&mut self, stride: Stride, params: &StepCounterParams) {
        if self.strides.len() == STRIDE_HISTORY {
            self.strides.pop_front();
        }
        self.strides.push_back(stride);

        let n = self.strides.len();
        if n >= 3 {
            let similar = self.strides[n - 3].is_similar_to(
                &self.strides[n - 1],
                params.deviation_length,
                params.deviation_amplitude,
            );
            if self.similarities.len() == MIN_SIMILARITIES {
                self.similarities.pop_front();
            }
            self.similarities.push_back(similar);
        }
    }

    /// The two latest comparisons of same-kind strides both matched.
    fn has_pattern(&self) -> bool {
        let n = self.similarities.len();
        n >= MIN_SIMILARITIES && self.similarities[n - 3] && self.similarities[n - 1]
    }

    fn confirming_strides(&self) -> Option<[Stride; 3]> {
        let n = self.strides.len();
        (n >= STRIDE_HISTORY).then(|| [self.strides[n - 5], self.strides[n - 3], self.strides[n - 1]])
    }
}

/// Gait pattern step counter over a triaxial gravity signal.
///
/// Each axis is smoothed and cut into strides independently. Once an axis shows a stable
/// pattern its averaged stride becomes the representative stride, and every further stride
/// of that axis and kind that resembles it counts two steps.
pub struct StepCounter {
    params: StepCounterParams,
    index: usize,
    axes: [AxisPipeline; 3],
    representative: Option<Stride>,
    lock_excluded: [bool; 3],
    ledger: StepLedger,
}

impl StepCounter {
    pub fn new(params: StepCounterParams) -> Self {
        Self {
            params,
            index: 0,
            axes: [AxisPipeline::new(0), AxisPipeline::new(1), AxisPipeline::new(2)],
            representative: None,
            lock_excluded: [false; 3],
            ledger: StepLedger::new(),
        }
    }

    /// Drop all buffered signal, the pattern lock and every recorded step.
    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    pub fn state(&self) -> PatternState {
        match self.representative {
            Some(stride) => PatternState::Locked {
                axis: stride.axis,
                kind: stride.kind,
            },
            None => PatternState::Searching,
        }
    }

    pub fn representative(&self) -> Option<&Stride> {
        self.representative.as_ref()
    }

    pub fn ledger(&self) -> &StepLedger {
        &self.ledger
    }

    pub fn total_steps(&self) -> usize {
        self.ledger.total_steps()
    }

    pub fn steps_between(&self, start: f64, end: f64) -> usize {
        self.ledger.steps_between(start, end)
    }

    pub fn steps_per_minute(&self, now: f64) -> usize {
        self.ledger.steps_per_minute(now, self.params.smoothing_latency())
    }

    /// Feed one gravity sample; returns the step count changes it caused.
    pub fn process_sample(&mut self, sample: &Sample) -> Vec<StepCountChange> {
        let mut changes = Vec::new();
        let values = sample.axes();

        for (axis, &value) in values.iter().enumerate() {
            let extremum = self.axes[axis].push(self.index, value, self.params.smoothing_timeframe);
            if let Some((index, value, flag)) = extremum {
                if let Some(stride) = self.axes[axis].builder.push(index, value, flag) {
                    self.process_stride(axis, stride, sample.timestamp, &mut changes);
                }
            }
        }

        // A slowly rotating phone can make another axis look better mid-walk; keep the lock.
        if self.ledger.in_flight_steps() >= LOCK_HOLD_STEPS {
            self.lock_excluded = [true; 3];
        }

        self.index += 1;
        changes
    }

    fn process_stride(&mut self, axis: usize, stride: Stride, now: f64, changes: &mut Vec<StepCountChange>) {
        let params = self.params;
        let latency = params.smoothing_latency();
        self.axes[axis].record(stride, &params);

        if !self.lock_excluded[axis] && self.axes[axis].has_pattern() {
            let current_amplitude = self.representative.map_or(0.0, |s| s.amplitude);
            if stride.amplitude >= params.min_stride_amplitude
                && stride.amplitude > current_amplitude * params.better_stride_factor
            {
                let candidate = self.axes[axis]
                    .confirming_strides()
                    .and_then(|strides| Stride::representative(&strides));
                if let Some(repr) = candidate {
                    log::debug!(
                        "Gait pattern locked on axis {} ({:?}, amplitude {:.3}, length {})",
                        axis,
                        repr.kind,
                        repr.amplitude,
                        repr.length_total
                    );
                    self.representative = Some(repr);
                    self.lock_excluded[axis] = true;
                    self.ledger
                        .seed(&repr, SEED_STEPS, now, params.update_interval, latency);
                }
            }
        }

        let repr = match self.representative {
            Some(repr) if repr.axis == axis && repr.kind == stride.kind => repr,
            _ => return,
        };

        if repr.is_similar_to(&stride, params.deviation_length, params.deviation_amplitude) {
            self.ledger
                .append(&stride, STEPS_PER_STRIDE, now, params.update_interval, latency);
            if let Some(frequency) = stride.step_frequency(params.update_interval) {
                changes.push(StepCountChange {
                    count: self.ledger.total_steps(),
                    frequency,
                });
            }
        } else {
            log::debug!(
                "Gait pattern lost on axis {} after {} steps",
                axis,
                self.ledger.in_flight_steps()
            );
            self.release_lock();
        }
    }

    fn release_lock(&mut self) {
        self.representative = None;
        self.lock_excluded = [false; 3];
        for pipeline in self.axes.iter_mut() {
            pipeline.similarities.clear();
        }
        self.ledger.settle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    const DT: f64 = 0.1;

    fn counter() -> StepCounter {
        StepCounter::new(StepCounterParams::from(&EngineConfig::default()))
    }

    /// One gait cycle (two steps) per second, sampled every 100 ms.
    fn gait(amplitude: f64, t: f64) -> f64 {
        amplitude * (2.0 * PI * t + 0.3).sin()
    }

    fn feed<F>(counter: &mut StepCounter, from: usize, to: usize, signal: F) -> Vec<StepCountChange>
    where
        F: Fn(f64) -> [f64; 3],
    {
        let mut changes = Vec::new();
        for k in from..to {
            let t = k as f64 * DT;
            let [x, y, z] = signal(t);
            changes.extend(counter.process_sample(&Sample::new(x, y, z, t)));
        }
        changes
    }

    #[test]
    fn test_flat_signal_counts_nothing() {
        let mut counter = counter();
        let changes = feed(&mut counter, 0, 100, |_| [0.0, 0.0, 9.8]);
        assert!(changes.is_empty());
        assert_eq!(counter.state(), PatternState::Searching);
        assert_eq!(counter.total_steps(), 0);
    }

    #[test]
    fn test_sinusoidal_walk() {
        let mut counter = counter();
        let mut locked_at = None;
        let mut last_count = 0;

        for k in 0..100 {
            let t = k as f64 * DT;
            let sample = Sample::new(gait(3.0, t), 0.0, 9.8, t);
            for change in counter.process_sample(&sample) {
                assert!(change.count >= last_count);
                assert_relative_eq!(change.frequency, 2.0, epsilon = 1e-9);
                last_count = change.count;
            }
            if locked_at.is_none() && counter.state() != PatternState::Searching {
                locked_at = Some(t);
            }
        }

        // Three similar stride pairs need five strides on one axis, so 2 s is out of reach
        assert!(locked_at.unwrap() < 5.0);
        assert!(matches!(counter.state(), PatternState::Locked { axis: 0, .. }));
        let total = counter.total_steps();
        assert!((18..=22).contains(&total), "counted {total} steps");
        assert_eq!(total, last_count);
    }

    #[test]
    fn test_small_amplitude_never_locks() {
        let mut counter = counter();
        // 2 × 0.5 m/s² peak to peak is below 0.2 g
        feed(&mut counter, 0, 100, |t| [gait(0.5, t), 0.0, 9.8]);
        assert_eq!(counter.state(), PatternState::Searching);
        assert_eq!(counter.total_steps(), 0);
    }

    #[test]
    fn test_pattern_loss_settles_steps() {
        let mut counter = counter();
        feed(&mut counter, 0, 100, |t| [gait(3.0, t), 0.0, 9.8]);
        let before = counter.total_steps();
        assert_eq!(counter.ledger().settled_steps(), 0);

        // Amplitude triples: strides no longer match the representative
        let mut released = false;
        for k in 100..130 {
            let t = k as f64 * DT;
            counter.process_sample(&Sample::new(gait(9.0, t), 0.0, 9.8, t));
            if counter.state() == PatternState::Searching {
                released = true;
                break;
            }
        }

        assert!(released);
        assert_eq!(counter.ledger().settled_steps(), before);
        assert_eq!(counter.ledger().in_flight_steps(), 0);
        assert_eq!(counter.total_steps(), before);

        // The stronger gait is picked up again and counted on top
        feed(&mut counter, 130, 200, |t| [gait(9.0, t), 0.0, 9.8]);
        assert!(matches!(counter.state(), PatternState::Locked { axis: 0, .. }));
        assert!(counter.total_steps() > before);
        assert_eq!(counter.ledger().settled_steps(), before);
    }

    #[test]
    fn test_better_axis_takes_over_early_lock() {
        let mut counter = counter();
        feed(&mut counter, 0, 100, |t| [gait(3.0, t), gait(6.0, t), 9.8]);
        assert!(matches!(counter.state(), PatternState::Locked { axis: 1, .. }));
    }

    #[test]
    fn test_lock_held_after_fifteen_steps() {
        let mut counter = counter();
        feed(&mut counter, 0, 200, |t| {
            let y = if t >= 10.0 { gait(6.0, t) } else { 0.0 };
            [gait(3.0, t), y, 9.8]
        });
        assert!(matches!(counter.state(), PatternState::Locked { axis: 0, .. }));
        assert!(counter.total_steps() >= 36);
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut counter = counter();
        feed(&mut counter, 0, 100, |t| [gait(3.0, t), 0.0, 9.8]);
        assert!(counter.total_steps() > 0);

        counter.reset();
        assert_eq!(counter.state(), PatternState::Searching);
        assert_eq!(counter.total_steps(), 0);
        assert!(counter.representative().is_none());

        // Counting starts over exactly as on a fresh counter
        let changes = feed(&mut counter, 0, 100, |t| [gait(3.0, t), 0.0, 9.8]);
        assert_eq!(changes.last().map(|c| c.count), Some(counter.total_steps()));
    }

    #[test]
    fn test_buffers_stay_bounded() {
        let mut counter = counter();
        feed(&mut counter, 0, 1000, |t| [gait(3.0, t), gait(1.0, t), 9.8]);
        for pipeline in &counter.axes {
            assert!(pipeline.values.len() <= counter.params.smoothing_timeframe + 2);
            assert!(pipeline.strides.len() <= STRIDE_HISTORY);
            assert!(pipeline.similarities.len() <= MIN_SIMILARITIES);
        }
    }
}
