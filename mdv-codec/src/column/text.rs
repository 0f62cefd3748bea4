use std::collections::HashMap;

use itertools::Itertools;
use mdv_error::{MdvResult, mdv_bail};

use crate::Datum;

/// Replaces absent, empty or unrepresentable values in text-like columns.
pub const MISSING_TEXT: &str = "ND";

/// A text column is promoted to `unique` once it has this many distinct values.
pub const TEXT_DICTIONARY_LIMIT: usize = 256;

/// Row values with missing entries replaced by [`MISSING_TEXT`].
pub(crate) fn text_values(values: &[Datum]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_text().unwrap_or_else(|| MISSING_TEXT.to_string()))
        .collect()
}

/// Distinct values ordered by descending frequency, ties broken by first appearance.
pub(crate) fn frequency_dictionary(rows: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, value) in rows.iter().enumerate() {
        counts.entry(value.as_str()).or_insert((0, idx)).0 += 1;
    }
    counts
        .into_iter()
        .sorted_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)))
        .map(|(value, _)| value.to_string())
        .collect()
}

/// Map each row to its dictionary index as a single byte.
pub(crate) fn encode_codes(rows: &[String], dictionary: &[String]) -> MdvResult<Vec<u8>> {
    if dictionary.len() >= TEXT_DICTIONARY_LIMIT {
        mdv_bail!(
            Encoding: "text dictionary of {} entries does not fit one byte codes",
            dictionary.len()
        );
    }
    let lookup: HashMap<&str, u8> = dictionary
        .iter()
        .map(String::as_str)
        .zip(0u8..=u8::MAX)
        .collect();
    rows.iter()
        .enumerate()
        .map(|(row, value)| match lookup.get(value.as_str()) {
            Some(code) => Ok(*code),
            None => mdv_bail!(Encoding: "row {row} value {value:?} missing from dictionary"),
        })
        .collect()
}

pub(crate) fn decode_codes(codes: &[u8], dictionary: &[String]) -> MdvResult<Vec<String>> {
    codes
        .iter()
        .enumerate()
        .map(|(row, code)| match dictionary.get(*code as usize) {
            Some(value) => Ok(value.clone()),
            None => mdv_bail!(
                "row {row} has code {code} but the dictionary holds {} values",
                dictionary.len()
            ),
        })
        .collect()
}
