use std::collections::HashMap;

use itertools::Itertools;
use mdv_error::{MdvResult, mdv_bail};

use crate::Datum;

/// Code written to unused slots of a multitext row. Never a valid dictionary index.
pub const MULTITEXT_EMPTY_CODE: u16 = u16::MAX;

/// Dictionaries must stay strictly below this size so that no index collides with
/// [`MULTITEXT_EMPTY_CODE`].
pub const MULTITEXT_DICTIONARY_LIMIT: usize = MULTITEXT_EMPTY_CODE as usize;

/// The encoded form of a multitext column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultitextCodes {
    /// `rows × stride` codes, row major.
    pub codes: Vec<u16>,
    /// Slots per row; the largest token count of any row.
    pub stride: usize,
    pub dictionary: Vec<String>,
}

/// Split a row into trimmed, non-empty tokens. Non-string values have no tokens.
fn tokens(value: &Datum) -> Vec<&str> {
    match value {
        Datum::Str(s) => s.split(',').map(str::trim).filter(|t| !t.is_empty()).collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn encode(values: &[Datum]) -> MdvResult<MultitextCodes> {
    let rows: Vec<Vec<&str>> = values.iter().map(tokens).collect();

    let mut lookup: HashMap<&str, u16> = HashMap::new();
    let mut dictionary: Vec<String> = Vec::new();
    for token in rows.iter().flatten() {
        if lookup.contains_key(token) {
            continue;
        }
        let Ok(code) = u16::try_from(dictionary.len()) else {
            mdv_bail!(Encoding: "multitext dictionary overflow at token {token:?}");
        };
        if code == MULTITEXT_EMPTY_CODE {
            mdv_bail!(
                Encoding: "multitext dictionary reached {MULTITEXT_DICTIONARY_LIMIT} distinct tokens at {token:?}"
            );
        }
        lookup.insert(*token, code);
        dictionary.push((*token).to_string());
    }

    let stride = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut codes = vec![MULTITEXT_EMPTY_CODE; rows.len() * stride];
    for (row, row_tokens) in rows.iter().enumerate() {
        let slots = &mut codes[row * stride..(row + 1) * stride];
        for (slot, token) in slots.iter_mut().zip(row_tokens.iter().sorted()) {
            *slot = lookup[token];
        }
    }

    Ok(MultitextCodes {
        codes,
        stride,
        dictionary,
    })
}

pub(crate) fn decode(
    codes: &[u16],
    stride: usize,
    rows: usize,
    dictionary: &[String],
) -> MdvResult<Vec<String>> {
    if codes.len() != rows * stride {
        mdv_bail!(
            "multitext array holds {} codes, expected {rows} rows x stride {stride}",
            codes.len()
        );
    }
    if stride == 0 {
        return Ok(vec![String::new(); rows]);
    }
    codes
        .chunks_exact(stride)
        .enumerate()
        .map(|(row, chunk)| {
            let mut tokens = Vec::with_capacity(stride);
            for code in chunk.iter().filter(|c| **c != MULTITEXT_EMPTY_CODE) {
                let Some(token) = dictionary.get(*code as usize) else {
                    mdv_bail!(
                        "row {row} has code {code} but the dictionary holds {} tokens",
                        dictionary.len()
                    );
                };
                tokens.push(token.as_str());
            }
            Ok(tokens.join(","))
        })
        .collect()
}
