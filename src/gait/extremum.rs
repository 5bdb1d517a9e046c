/// Classification of a buffered sample relative to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtremumFlag {
    Maximum,
    Minimum,
    #[default]
    None,
}

impl ExtremumFlag {
    pub fn is_extremum(self) -> bool {
        self != ExtremumFlag::None
    }
}

/// Classify the middle of three consecutive same-axis samples.
///
/// A plateau to the right still counts (`c <= b` / `c >= b`), a plateau to the left does not,
/// so a flat top yields exactly one flagged sample.
pub fn classify(a: f64, b: f64, c: f64) -> ExtremumFlag {
    if a < b && c <= b {
        ExtremumFlag::Maximum
    } else if a > b && c >= b {
        ExtremumFlag::Minimum
    } else {
        ExtremumFlag::None
    }
}
