use crate::sensors::LocationFix;
use geo::{HaversineDistance, Point};

/// Fixes needed before a ground-truth distance is measured
const MIN_FIXES: usize = 3;

/// Accuracy-filtered run of location fixes used as calibration ground truth.
///
/// The first fix only anchors the window in time; distance is measured from the second fix
/// on, so the stretch walked before the smoothing filter produced steps is left out.
#[derive(Debug, Clone, Default)]
pub struct LocationWindow {
    fixes: Vec<LocationFix>,
}

impl LocationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fix: LocationFix) {
        self.fixes.push(fix);
    }

    pub fn clear(&mut self) {
        self.fixes.clear();
    }

    /// Great-circle length of the buffered path, once enough fixes are buffered.
    pub fn candidate_distance(&self) -> Option<f64> {
        if self.fixes.len() < MIN_FIXES {
            return None;
        }
        Some(path_length(&self.fixes[1..]))
    }

    /// Timestamps of the first and last buffered fix.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        match (self.fixes.first(), self.fixes.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

fn point(fix: &LocationFix) -> Point<f64> {
    Point::new(fix.longitude, fix.latitude)
}

/// Cumulative haversine distance along `fixes` in meters.
pub fn path_length(fixes: &[LocationFix]) -> f64 {
    fixes
        .windows(2)
        .map(|pair| point(&pair[0]).haversine_distance(&point(&pair[1])))
        .sum()
}
