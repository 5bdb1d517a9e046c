use super::extremum::ExtremumFlag;

/// Collapse the first pair of same-type extrema in a window into a single extremum.
///
/// Samples strictly between the pair are replaced by the midpoint of the two endpoint
/// values and their flags cleared. Of the two endpoints only the more extreme one keeps
/// its flag; values of the endpoints are left untouched. At most one pair is resolved per
/// call, later pairs are picked up as the window slides.
///
/// Returns `true` if a pair was resolved.
pub fn smooth_window(values: &mut [f64], flags: &mut [ExtremumFlag]) -> bool {
    debug_assert_eq!(values.len(), flags.len());

    let first = match flags.iter().position(|flag| flag.is_extremum()) {
        Some(pos) => pos,
        None => return false,
    };
    let kind = flags[first];
    let second = match flags[first + 1..].iter().position(|flag| *flag == kind) {
        Some(offset) => first + 1 + offset,
        None => return false,
    };

    let midpoint = (values[first] + values[second]) / 2.0;
    for pos in first + 1..second {
        values[pos] = midpoint;
        flags[pos] = ExtremumFlag::None;
    }

    let first_is_higher = values[first] > values[second];
    let loser = match (kind, first_is_higher) {
        (ExtremumFlag::Maximum, true) | (ExtremumFlag::Minimum, false) => second,
        _ => first,
    };
    flags[loser] = ExtremumFlag::None;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExtremumFlag::{Maximum as Max, Minimum as Min, None as No};

    #[test]
    fn test_window_without_pair_is_unchanged() {
        let mut values = vec![0.0, 1.0, 0.5, -1.0, 0.2, 0.3];
        let mut flags = vec![No, Max, No, Min, No, No];
        let (before_v, before_f) = (values.clone(), flags.clone());

        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!(values, before_v);
        assert_eq!(flags, before_f);
    }

    #[test]
    fn test_empty_window_is_unchanged() {
        let mut values = vec![1.0; 4];
        let mut flags = vec![No; 4];
        assert!(!smooth_window(&mut values, &mut flags));
        assert_eq!(values, vec![1.0; 4]);
    }

    #[test]
    fn test_maxima_pair_keeps_higher_peak() {
        let mut values = vec![0.0, 2.0, 1.5, 1.8, 2.5, 0.0];
        let mut flags = vec![No, Max, Min, No, Max, No];

        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(values, vec![0.0, 2.0, 2.25, 2.25, 2.5, 0.0]);
        assert_eq!(flags, vec![No, No, No, No, Max, No]);
    }

    #[test]
    fn test_maxima_pair_keeps_first_when_higher() {
        let mut values = vec![3.0, 1.0, 2.0];
        let mut flags = vec![Max, No, Max];

        smooth_window(&mut values, &mut flags);
        assert_eq!(flags, vec![Max, No, No]);
        assert_eq!(values, vec![3.0, 2.5, 2.0]);
    }

    #[test]
    fn test_minima_pair_keeps_lower_trough() {
        let mut values = vec![-1.0, 0.2, -0.5, 1.0];
        let mut flags = vec![Min, Max, Min, No];

        assert!(smooth_window(&mut values, &mut flags));
        assert_eq!(flags, vec![Min, No, No, No]);
        assert_eq!(values, vec![-1.0, -0.75, -0.5, 1.0]);
    }

    #[test]
    fn test_only_first_pair_is_resolved() {
        let mut values = vec![1.0, 0.0, 1.2, -1.0, 0.0, -1.5];
        let mut flags = vec![Max, No, Max, Min, No, Min];

        smooth_window(&mut values, &mut flags);
        assert_eq!(flags, vec![No, No, Max, Min, No, Min]);
        assert_eq!(&values[3..], &[-1.0, 0.0, -1.5]);
    }
}
