//! Encoding of logical column values into typed arrays, and back.
//!
//! The variant of a column is decided once, at encode time, from its declared datatype and the
//! shape of its data (a `text` column with too many distinct values becomes `unique`). Decoding
//! dispatches on the variant recorded in the descriptor.

use log::debug;
use mdv_container::{FixedStrings, TypedArray};
use mdv_error::{MdvResult, mdv_bail, mdv_err};

pub use multitext::{MULTITEXT_DICTIONARY_LIMIT, MULTITEXT_EMPTY_CODE, MultitextCodes};
pub use numeric::INT32_MISSING;
pub use stats::{NumericStats, QUANTILE_CUTS, QUANTILE_KEYS, percentile};
pub use text::{MISSING_TEXT, TEXT_DICTIONARY_LIMIT};

use crate::{ColumnDescriptor, Datatype, Datum};

mod multitext;
mod numeric;
mod stats;
mod text;
mod unique;

/// A column in its stored form, tagged by variant.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedColumn {
    Text {
        codes: Vec<u8>,
        dictionary: Vec<String>,
    },
    Multitext(MultitextCodes),
    Unique(FixedStrings),
    Float {
        values: Vec<f32>,
        stats: Option<NumericStats>,
    },
    Int32 {
        values: Vec<i32>,
        stats: Option<NumericStats>,
    },
}

impl EncodedColumn {
    /// The datatype this column is stored as. `Float` keeps the declared numeric kind.
    fn datatype(&self, declared: &Datatype) -> Datatype {
        match self {
            EncodedColumn::Text { .. } => Datatype::Text,
            EncodedColumn::Multitext(_) => Datatype::Multitext,
            EncodedColumn::Unique(_) => Datatype::Unique,
            EncodedColumn::Float { .. } if *declared == Datatype::Integer => Datatype::Integer,
            EncodedColumn::Float { .. } => Datatype::Double,
            EncodedColumn::Int32 { .. } => Datatype::Int32,
        }
    }

    /// Rewrite the encoding-derived attributes of `descriptor` to describe this column.
    fn describe(&self, descriptor: &mut ColumnDescriptor) {
        let declared = descriptor.datatype.clone().unwrap_or(Datatype::Text);
        descriptor.clear_encoding();
        descriptor.datatype = Some(self.datatype(&declared));
        match self {
            EncodedColumn::Text { dictionary, .. } => {
                descriptor.values = Some(dictionary.clone());
            }
            EncodedColumn::Multitext(encoded) => {
                descriptor.values = Some(encoded.dictionary.clone());
                descriptor.string_length = Some(encoded.stride);
            }
            EncodedColumn::Unique(strings) => {
                descriptor.string_length = Some(strings.width() as usize);
            }
            EncodedColumn::Float { stats, .. } | EncodedColumn::Int32 { stats, .. } => {
                if let Some(stats) = stats {
                    descriptor.min_max = Some(stats.min_max);
                    descriptor.quantiles = Some(stats.quantiles.clone());
                }
            }
        }
    }

    pub fn into_array(self) -> TypedArray {
        match self {
            EncodedColumn::Text { codes, .. } => TypedArray::U8(codes),
            EncodedColumn::Multitext(encoded) => TypedArray::U16(encoded.codes),
            EncodedColumn::Unique(strings) => TypedArray::Utf8(strings),
            EncodedColumn::Float { values, .. } => TypedArray::F32(values),
            EncodedColumn::Int32 { values, .. } => TypedArray::I32(values),
        }
    }
}

/// Logical values recovered from a stored column.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedColumn {
    /// `text`, `multitext` (comma joined) and `unique` columns.
    Strings(Vec<String>),
    /// `integer` and `double` columns; NaN marks a missing value.
    Float(Vec<f32>),
    /// `int32` columns; [`INT32_MISSING`] marks a missing value.
    Int32(Vec<i32>),
}

impl DecodedColumn {
    pub fn len(&self) -> usize {
        match self {
            DecodedColumn::Strings(v) => v.len(),
            DecodedColumn::Float(v) => v.len(),
            DecodedColumn::Int32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every row as display text, one entry per row.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            DecodedColumn::Strings(v) => v.clone(),
            DecodedColumn::Float(v) => v.iter().map(|x| x.to_string()).collect(),
            DecodedColumn::Int32(v) => v
                .iter()
                .map(|x| {
                    if *x == INT32_MISSING {
                        "NaN".to_string()
                    } else {
                        x.to_string()
                    }
                })
                .collect(),
        }
    }
}

/// Encode a column's values into its stored variant.
///
/// `descriptor.datatype` selects the encoding. Fails with an encoding error for unrecognized
/// datatypes and for values that the datatype cannot represent.
pub fn encode_values(descriptor: &ColumnDescriptor, values: &[Datum]) -> MdvResult<EncodedColumn> {
    let Some(datatype) = &descriptor.datatype else {
        mdv_bail!(Encoding: "column {} has no datatype", descriptor.field);
    };
    Ok(match datatype {
        Datatype::Text => {
            let rows = text::text_values(values);
            let dictionary = text::frequency_dictionary(&rows);
            if dictionary.len() < TEXT_DICTIONARY_LIMIT {
                let codes = text::encode_codes(&rows, &dictionary)?;
                EncodedColumn::Text { codes, dictionary }
            } else {
                debug!(
                    "column {} has {} distinct values, storing as unique",
                    descriptor.field,
                    dictionary.len()
                );
                EncodedColumn::Unique(unique::encode(&rows)?)
            }
        }
        Datatype::Unique => EncodedColumn::Unique(unique::encode(&unique::raw_values(values))?),
        Datatype::Multitext => EncodedColumn::Multitext(multitext::encode(values)?),
        Datatype::Integer | Datatype::Double => {
            let (values, stats) = numeric::encode_f32(values);
            EncodedColumn::Float { values, stats }
        }
        Datatype::Int32 => {
            let (values, stats) = numeric::encode_i32(values)?;
            EncodedColumn::Int32 { values, stats }
        }
        Datatype::Unrecognized(name) => {
            mdv_bail!(Encoding: "column {} has unrecognized datatype {name:?}", descriptor.field)
        }
    })
}

/// Encode `values` and return the updated descriptor with the array to store.
///
/// The input descriptor is not modified; callers persist the returned one. A missing datatype
/// is inferred from the values.
pub fn encode_column(
    descriptor: &ColumnDescriptor,
    values: &[Datum],
) -> MdvResult<(ColumnDescriptor, TypedArray)> {
    let mut updated = descriptor.clone();
    if updated.datatype.is_none() {
        updated.datatype = Some(infer_datatype(values));
    }
    let encoded = encode_values(&updated, values)
        .map_err(|e| e.with_context(format!("encoding column {}", descriptor.field)))?;
    encoded.describe(&mut updated);
    Ok((updated, encoded.into_array()))
}

/// Decode a stored array of `rows` rows back into logical values.
pub fn decode_column(
    descriptor: &ColumnDescriptor,
    array: &TypedArray,
    rows: usize,
) -> MdvResult<DecodedColumn> {
    let field = &descriptor.field;
    let datatype = descriptor
        .datatype
        .as_ref()
        .ok_or_else(|| mdv_err!("column {field} has no datatype"))?;
    let dictionary = || {
        descriptor
            .values
            .as_deref()
            .ok_or_else(|| mdv_err!("column {field} has no values dictionary"))
    };
    let string_length = || {
        descriptor
            .string_length
            .ok_or_else(|| mdv_err!("column {field} has no stringLength"))
    };

    let decoded = match (datatype, array) {
        (Datatype::Text, TypedArray::U8(codes)) => {
            check_rows(field, codes.len(), rows)?;
            DecodedColumn::Strings(text::decode_codes(codes, dictionary()?)?)
        }
        (Datatype::Multitext, TypedArray::U16(codes)) => DecodedColumn::Strings(
            multitext::decode(codes, string_length()?, rows, dictionary()?)?,
        ),
        (Datatype::Unique, TypedArray::Utf8(strings)) => {
            DecodedColumn::Strings(unique::decode(strings, string_length()?, rows)?)
        }
        (Datatype::Integer | Datatype::Double, TypedArray::F32(values)) => {
            check_rows(field, values.len(), rows)?;
            DecodedColumn::Float(values.clone())
        }
        (Datatype::Int32, TypedArray::I32(values)) => {
            check_rows(field, values.len(), rows)?;
            DecodedColumn::Int32(values.clone())
        }
        (datatype, array) => mdv_bail!(
            "column {field} is declared {datatype} but stored as {}",
            array.dtype()
        ),
    };
    Ok(decoded)
}

fn check_rows(field: &str, len: usize, rows: usize) -> MdvResult<()> {
    if len != rows {
        mdv_bail!("column {field} stores {len} values for {rows} rows");
    }
    Ok(())
}

/// Choose a datatype for undeclared columns.
///
/// All present values integral gives `integer`, all numeric gives `double`, anything else `text`.
pub fn infer_datatype(values: &[Datum]) -> Datatype {
    let mut all_int = true;
    let mut any = false;
    for value in values.iter().filter(|v| !v.is_null()) {
        match value {
            Datum::Null | Datum::Int(_) => {}
            Datum::Float(_) => all_int = false,
            Datum::Str(_) => return Datatype::Text,
        }
        any = true;
    }
    match (any, all_int) {
        (false, _) => Datatype::Text,
        (true, true) => Datatype::Integer,
        (true, false) => Datatype::Double,
    }
}
