use super::extremum::ExtremumFlag;
use std::collections::VecDeque;

/// Order of the three extrema a stride is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrideKind {
    MaxMinMax,
    MinMaxMin,
}

/// One gait cycle on one axis, described by three consecutive extrema.
///
/// Lengths are in samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stride {
    pub height_max: f64,
    pub height_min: f64,
    pub amplitude: f64,
    pub length_first: usize,
    pub length_second: usize,
    pub length_total: usize,
    pub axis: usize,
    pub kind: StrideKind,
}

impl Stride {
    pub fn new(
        height_max: f64,
        height_min: f64,
        length_first: usize,
        length_second: usize,
        axis: usize,
        kind: StrideKind,
    ) -> Self {
        Self {
            height_max,
            height_min,
            amplitude: height_max - height_min,
            length_first,
            length_second,
            length_total: length_first + length_second,
            axis,
            kind,
        }
    }

    /// Representative stride averaged from strides of one axis and kind.
    ///
    /// Only amplitude and total length are meaningful; heights and half lengths are zero.
    /// Returns `None` when the strides disagree on axis or kind.
    pub fn representative(strides: &[Stride]) -> Option<Stride> {
        let first = strides.first()?;
        if strides
            .iter()
            .any(|s| s.axis != first.axis || s.kind != first.kind)
        {
            return None;
        }

        let count = strides.len() as f64;
        let amplitude = strides.iter().map(|s| s.amplitude).sum::<f64>() / count;
        let length = strides.iter().map(|s| s.length_total).sum::<usize>() as f64 / count;

        Some(Stride {
            height_max: 0.0,
            height_min: 0.0,
            amplitude,
            length_first: 0,
            length_second: 0,
            length_total: length.round() as usize,
            axis: first.axis,
            kind: first.kind,
        })
    }

    /// Relative similarity test, normalised by `self`.
    ///
    /// Not symmetric: callers pass the stored or representative stride as `self`.
    pub fn is_similar_to(&self, other: &Stride, deviation_length: f64, deviation_amplitude: f64) -> bool {
        if self.length_total == 0 || self.amplitude <= 0.0 {
            return false;
        }
        let diff_length =
            self.length_total.abs_diff(other.length_total) as f64 / self.length_total as f64;
        let diff_amplitude = (self.amplitude - other.amplitude).abs() / self.amplitude;

        diff_length <= deviation_length && diff_amplitude <= deviation_amplitude
    }

    /// Step duration in seconds; one stride spans two steps.
    pub fn step_duration(&self, update_interval: f64) -> f64 {
        self.length_total as f64 * update_interval / 2.0
    }

    /// Step frequency in steps per second, `None` for a zero-length stride.
    pub fn step_frequency(&self, update_interval: f64) -> Option<f64> {
        let duration = self.step_duration(update_interval);
        (duration > 0.0).then(|| 1.0 / duration)
    }
}

/// Sliding window over the last three smoothed extrema of one axis.
#[derive(Debug, Clone)]
pub struct StrideBuilder {
    axis: usize,
    extrema: VecDeque<(usize, f64)>,
}

impl StrideBuilder {
    pub fn new(axis: usize) -> Self {
        Self {
            axis,
            extrema: VecDeque::with_capacity(3),
        }
    }

    /// Record an extremum at absolute sample `index`.
    ///
    /// Once three extrema are buffered every further extremum yields one stride; `flag` is
    /// the type of the newest extremum and decides the stride kind.
    pub fn push(&mut self, index: usize, value: f64, flag: ExtremumFlag) -> Option<Stride> {
        self.extrema.push_back((index, value));
        if self.extrema.len() < 3 {
            return None;
        }

        let (x0, y0) = self.extrema[0];
        let (x1, y1) = self.extrema[1];
        let (x2, y2) = self.extrema[2];
        self.extrema.pop_front();

        let outer = (y0 + y2) / 2.0;
        let (first, second) = (x1 - x0, x2 - x1);
        let stride = match flag {
            ExtremumFlag::Maximum => {
                Stride::new(outer, y1, first, second, self.axis, StrideKind::MaxMinMax)
            }
            _ => Stride::new(y1, outer, first, second, self.axis, StrideKind::MinMaxMin),
        };
        Some(stride)
    }
}
