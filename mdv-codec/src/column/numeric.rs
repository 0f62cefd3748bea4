use mdv_error::{MdvResult, mdv_bail};

use crate::Datum;
use crate::column::stats::{NumericStats, widen_f32};

/// Stored in `int32` columns where the input had no numeric value.
pub const INT32_MISSING: i32 = i32::MIN;

/// Coerce values to 32-bit floats; anything unparseable becomes NaN.
pub(crate) fn encode_f32(values: &[Datum]) -> (Vec<f32>, Option<NumericStats>) {
    #[allow(clippy::cast_possible_truncation)]
    let stored: Vec<f32> = values.iter().map(|v| v.to_f64() as f32).collect();
    let stats = NumericStats::compute(stored.iter().copied().map(widen_f32));
    (stored, stats)
}

/// Coerce values to 32-bit integers.
///
/// Missing values become [`INT32_MISSING`]. Fractional values and values outside the
/// representable range are rejected rather than truncated.
pub(crate) fn encode_i32(values: &[Datum]) -> MdvResult<(Vec<i32>, Option<NumericStats>)> {
    let mut stored = Vec::with_capacity(values.len());
    for (row, value) in values.iter().enumerate() {
        let v = value.to_f64();
        if v.is_nan() {
            stored.push(INT32_MISSING);
            continue;
        }
        if v.fract() != 0.0 || v <= f64::from(INT32_MISSING) || v > f64::from(i32::MAX) {
            mdv_bail!(Encoding: "row {row} value {value} is not a representable int32");
        }
        #[allow(clippy::cast_possible_truncation)]
        let v = v as i32;
        stored.push(v);
    }
    let stats = NumericStats::compute(
        stored
            .iter()
            .filter(|v| **v != INT32_MISSING)
            .map(|v| f64::from(*v)),
    );
    Ok((stored, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datums;

    #[test]
    fn unparseable_values_become_nan() {
        let (stored, stats) = encode_f32(&datums(["1", "x", "2.5", ""]));
        assert_eq!(stored[0], 1.0);
        assert!(stored[1].is_nan());
        assert_eq!(stored[2], 2.5);
        assert!(stored[3].is_nan());
        assert_eq!(stats.unwrap().min_max, [1.0, 2.5]);
    }

    #[test]
    fn int32_uses_missing_sentinel() {
        let values = vec![Datum::Int(4), Datum::Null, Datum::from("-2")];
        let (stored, stats) = encode_i32(&values).unwrap();
        assert_eq!(stored, vec![4, INT32_MISSING, -2]);
        assert_eq!(stats.unwrap().min_max, [-2.0, 4.0]);
    }

    #[test]
    fn int32_rejects_fractions_and_overflow() {
        assert!(encode_i32(&[Datum::Float(1.5)]).is_err());
        assert!(encode_i32(&[Datum::Int(i64::from(i32::MAX) + 1)]).is_err());
        assert!(encode_i32(&[Datum::Int(i64::from(i32::MIN))]).is_err());
    }
}
