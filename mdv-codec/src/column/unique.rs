use mdv_container::FixedStrings;
use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::Datum;

/// Row values of a declared `unique` column. Absent values are stored as empty strings.
pub(crate) fn raw_values(values: &[Datum]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.as_text().unwrap_or_default())
        .collect()
}

/// Store each row as a fixed-width UTF-8 string as wide as the longest row.
pub(crate) fn encode(rows: &[String]) -> MdvResult<FixedStrings> {
    let width = rows.iter().map(String::len).max().unwrap_or(0);
    let width = u32::try_from(width)
        .map_err(|_| mdv_err!(Encoding: "string of {width} bytes is too long to store"))?;
    FixedStrings::try_from_strs(rows, width)
}

pub(crate) fn decode(
    strings: &FixedStrings,
    string_length: usize,
    rows: usize,
) -> MdvResult<Vec<String>> {
    if strings.len() != rows || strings.width() as usize != string_length {
        mdv_bail!(
            "unique array holds {} strings of width {}, expected {rows} of width {string_length}",
            strings.len(),
            strings.width()
        );
    }
    strings
        .iter()
        .map(|s| s.map(str::to_string))
        .collect()
}
