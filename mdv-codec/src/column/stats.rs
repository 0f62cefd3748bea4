//! Summary statistics recorded on numeric column descriptors.

use std::collections::BTreeMap;

/// Probability cut points for the quantile pairs; each is paired with its complement.
pub const QUANTILE_CUTS: [f64; 3] = [0.001, 0.01, 0.05];

/// Descriptor keys for [`QUANTILE_CUTS`], in the same order.
pub const QUANTILE_KEYS: [&str; 3] = ["0.001", "0.01", "0.05"];

#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub min_max: [f64; 2],
    pub quantiles: BTreeMap<String, [f64; 2]>,
}

impl NumericStats {
    /// Compute stats over the finite values only. Returns `None` if there are none.
    pub fn compute(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let quantiles = QUANTILE_CUTS
            .iter()
            .zip(QUANTILE_KEYS)
            .map(|(q, key)| {
                (
                    key.to_string(),
                    [percentile(&sorted, *q), percentile(&sorted, 1.0 - q)],
                )
            })
            .collect();

        Some(Self {
            min_max: [sorted[0], sorted[sorted.len() - 1]],
            quantiles,
        })
    }
}

/// Linear interpolation percentile of ascending `sorted` at probability `p` in `[0, 1]`.
///
/// The rank is `p * (n - 1)`; the result interpolates between the two neighbouring order
/// statistics.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = p.clamp(0.0, 1.0) * last as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// The shortest decimal form of an `f32`, widened to `f64`.
///
/// Keeps descriptor JSON free of widening noise such as `0.10000000149011612`.
pub fn widen_f32(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn ignores_missing_values() {
        let stats = NumericStats::compute([1.0, 2.0, 3.0, 4.0, 5.0, f64::NAN]).unwrap();
        assert_eq!(stats.min_max, [1.0, 5.0]);
        let [lo, hi] = stats.quantiles["0.05"];
        assert!((lo - 1.2).abs() < 1e-9);
        assert!((hi - 4.8).abs() < 1e-9);
        let [lo, hi] = stats.quantiles["0.001"];
        assert!((lo - 1.004).abs() < 1e-9);
        assert!((hi - 4.996).abs() < 1e-9);
    }

    #[test]
    fn all_missing_has_no_stats() {
        assert!(NumericStats::compute([f64::NAN, f64::NAN]).is_none());
        assert!(NumericStats::compute(Vec::<f64>::new()).is_none());
    }

    #[rstest]
    #[case(&[7.0], 0.3, 7.0)]
    #[case(&[0.0, 10.0], 0.25, 2.5)]
    #[case(&[1.0, 2.0, 3.0, 4.0], 1.0, 4.0)]
    #[case(&[1.0, 2.0, 3.0, 4.0], 0.0, 1.0)]
    fn linear_percentile(#[case] sorted: &[f64], #[case] p: f64, #[case] expected: f64) {
        assert!((percentile(sorted, p) - expected).abs() < 1e-12);
    }

    #[test]
    fn widening_keeps_short_form() {
        assert_eq!(widen_f32(0.1), 0.1);
        assert_eq!(widen_f32(-3.0), -3.0);
    }
}
