use std::collections::VecDeque;

/// Summed absolute altitude change at which a window counts as noise
const NOISE_THRESHOLD: f64 = 1.0;

/// Result of feeding one altitude sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AltitudeOutcome {
    /// Window not yet full
    Buffering,
    /// Window too noisy; kept for re-evaluation on the next sample
    Noisy,
    /// Window averaged; `gain` meters were added to the total
    Accepted { mean: f64, gain: i64 },
}

/// Relative altitude gain from a sliding window of altitude readings.
///
/// Descents never reduce the gain.
#[derive(Debug, Clone)]
pub struct AltitudeTracker {
    window: usize,
    samples: VecDeque<f64>,
    last_mean: Option<f64>,
    gain: i64,
}

impl AltitudeTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::with_capacity(window + 1),
            last_mean: None,
            gain: 0,
        }
    }

    pub fn gain(&self) -> i64 {
        self.gain
    }

    pub fn buffered(&self) -> usize {
        self.samples.len()
    }

    pub fn push(&mut self, altitude: f64) -> AltitudeOutcome {
        self.samples.push_back(altitude);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
        if self.samples.len() < self.window {
            return AltitudeOutcome::Buffering;
        }

        let variation: f64 = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|(a, b)| (b - a).abs())
            .sum();
        if variation >= NOISE_THRESHOLD {
            log::debug!("Altitude window rejected, variation {:.2} m", variation);
            return AltitudeOutcome::Noisy;
        }

        let mean = (self.samples.iter().sum::<f64>() / self.samples.len() as f64).round();
        let mut gain = 0;
        if let Some(last) = self.last_mean {
            let delta = mean - last;
            if delta >= 0.0 {
                gain = delta.round() as i64;
                self.gain += gain;
            }
        }
        self.last_mean = Some(mean);
        self.samples.pop_front();

        AltitudeOutcome::Accepted { mean, gain }
    }

    /// Forget buffered samples; the accumulated gain and reference mean are kept.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_mean = None;
        self.gain = 0;
    }
}
