//! Per-row numeric vectors attached to a linked data source.
//!
//! A rows-as-columns link from data source A to data source B stores one vector of length
//! `size(A)` for every row of B. Each subgroup holds these vectors either densely, as one
//! flat `f32` array ordered by B row, or as a compressed-row sparse triple.

use std::fmt::{Display, Formatter};

use bytes::{BufMut, Bytes, BytesMut};
use mdv_container::{Dataset, Group, TypedArray, from_le_bytes};
use mdv_error::{MdvResult, mdv_bail, mdv_err};
use serde::{Deserialize, Serialize};

/// Dataset holding the values of a subgroup, dense or sparse.
pub const X_KEY: &str = "x";
/// Sparse column indices, one per stored value.
pub const I_KEY: &str = "i";
/// Sparse row offsets, `size(B) + 1` of them.
pub const P_KEY: &str = "p";
/// Single element dataset holding the dense row length, `size(A)`.
pub const LENGTH_KEY: &str = "length";
/// Single element dataset holding the number of dense rows, `size(B)`.
///
/// Groups written without it derive the count from `x` and `length`.
pub const ROWS_KEY: &str = "rows";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubgroupKind {
    Dense,
    Sparse,
}

impl Display for SubgroupKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SubgroupKind::Dense => f.write_str("dense"),
            SubgroupKind::Sparse => f.write_str("sparse"),
        }
    }
}

/// Display metadata for one subgroup of a rows-as-columns link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgroupDescriptor {
    /// Name of the container group holding the arrays.
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: SubgroupKind,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SubgroupDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: SubgroupKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            extra: serde_json::Map::new(),
        }
    }
}

/// A dense `rows × len` matrix held row major, one row per row of B.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    len: usize,
    values: Vec<f32>,
}

impl DenseMatrix {
    /// Wrap values already laid out row after row.
    pub fn from_row_major(rows: usize, len: usize, values: Vec<f32>) -> MdvResult<Self> {
        check_shape(rows, len, values.len())?;
        Ok(Self { rows, len, values })
    }

    /// Transpose column-major values, where element `(row, j)` sits at `j * rows + row`.
    pub fn from_column_major(rows: usize, len: usize, values: &[f32]) -> MdvResult<Self> {
        check_shape(rows, len, values.len())?;
        let mut transposed = Vec::with_capacity(values.len());
        for row in 0..rows {
            transposed.extend((0..len).map(|j| values[j * rows + row]));
        }
        Ok(Self {
            rows,
            len,
            values: transposed,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Length of every row.
    pub fn row_len(&self) -> usize {
        self.len
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        (row < self.rows).then(|| &self.values[row * self.len..(row + 1) * self.len])
    }
}

fn check_shape(rows: usize, len: usize, actual: usize) -> MdvResult<()> {
    let expected = rows
        .checked_mul(len)
        .ok_or_else(|| mdv_err!(Encoding: "dense matrix of {rows} x {len} is too large"))?;
    if actual != expected {
        mdv_bail!(Encoding: "dense matrix of {rows} x {len} needs {expected} values, got {actual}");
    }
    Ok(())
}

/// A compressed-row sparse matrix: row `k` holds `x[p[k]..p[k+1]]` at indices `i[p[k]..p[k+1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRows {
    x: Vec<f32>,
    i: Vec<u32>,
    p: Vec<u64>,
}

impl SparseRows {
    /// Validate the offsets and the index/value pairing.
    pub fn try_new(x: Vec<f32>, i: Vec<u32>, p: Vec<u64>) -> MdvResult<Self> {
        if x.len() != i.len() {
            mdv_bail!(Encoding: "sparse matrix has {} values but {} indices", x.len(), i.len());
        }
        let Some((first, last)) = p.first().zip(p.last()) else {
            mdv_bail!(Encoding: "sparse matrix needs at least one row offset");
        };
        if *first != 0 || *last != x.len() as u64 {
            mdv_bail!(
                Encoding: "sparse row offsets must run from 0 to {}, got {first}..{last}",
                x.len()
            );
        }
        if let Some(pair) = p.windows(2).find(|w| w[0] > w[1]) {
            mdv_bail!(Encoding: "sparse row offsets decrease from {} to {}", pair[0], pair[1]);
        }
        Ok(Self { x, i, p })
    }

    pub fn rows(&self) -> usize {
        self.p.len() - 1
    }

    pub fn x(&self) -> &[f32] {
        &self.x
    }

    pub fn i(&self) -> &[u32] {
        &self.i
    }

    pub fn p(&self) -> &[u64] {
        &self.p
    }
}

/// Vectors to store in one subgroup.
#[derive(Debug, Clone, PartialEq)]
pub enum SubgroupData {
    Dense(DenseMatrix),
    Sparse(SparseRows),
}

impl SubgroupData {
    pub fn kind(&self) -> SubgroupKind {
        match self {
            SubgroupData::Dense(_) => SubgroupKind::Dense,
            SubgroupData::Sparse(_) => SubgroupKind::Sparse,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            SubgroupData::Dense(m) => m.rows(),
            SubgroupData::Sparse(m) => m.rows(),
        }
    }
}

/// Replace the arrays in `group` with `data`.
///
/// `size_a` is the vector length and `size_b` the number of vectors; both must agree with the
/// data. Arrays of the other kind left by an earlier write are removed.
pub fn write_subgroup(
    group: &Group,
    data: &SubgroupData,
    size_a: usize,
    size_b: usize,
) -> MdvResult<()> {
    if data.rows() != size_b {
        mdv_bail!(
            Encoding: "subgroup {} has {} rows, linked data source has {size_b}",
            group.name(),
            data.rows()
        );
    }
    for key in [X_KEY, I_KEY, P_KEY, LENGTH_KEY, ROWS_KEY] {
        group.delete_dataset(key)?;
    }
    match data {
        SubgroupData::Dense(matrix) => {
            if matrix.row_len() != size_a {
                mdv_bail!(
                    Encoding: "subgroup {} rows have length {}, expected {size_a}",
                    group.name(),
                    matrix.row_len()
                );
            }
            group.create_dataset(X_KEY, &TypedArray::F32(matrix.values().to_vec()))?;
            group.create_dataset(LENGTH_KEY, &TypedArray::U64(vec![size_a as u64]))?;
            group.create_dataset(ROWS_KEY, &TypedArray::U64(vec![size_b as u64]))?;
        }
        SubgroupData::Sparse(matrix) => {
            if let Some(index) = matrix.i().iter().find(|i| **i as usize >= size_a) {
                mdv_bail!(
                    Encoding: "subgroup {} has index {index} outside vectors of length {size_a}",
                    group.name()
                );
            }
            group.create_dataset(X_KEY, &TypedArray::F32(matrix.x().to_vec()))?;
            group.create_dataset(I_KEY, &TypedArray::U32(matrix.i().to_vec()))?;
            group.create_dataset(P_KEY, &TypedArray::U64(matrix.p().to_vec()))?;
        }
    }
    Ok(())
}

/// Open datasets of one stored subgroup, for serving many rows.
#[derive(Debug, Clone)]
pub struct SubgroupReader {
    name: String,
    layout: Layout,
}

#[derive(Debug, Clone)]
enum Layout {
    Dense { x: Dataset, len: usize, rows: usize },
    Sparse { x: Dataset, i: Dataset, p: Dataset },
}

impl SubgroupReader {
    pub fn open(group: &Group, kind: SubgroupKind) -> MdvResult<Self> {
        let layout = match kind {
            SubgroupKind::Dense => {
                let x = group.dataset(X_KEY)?;
                let len = read_scalar(group, LENGTH_KEY)?;
                let rows = if group.contains(ROWS_KEY)? {
                    read_scalar(group, ROWS_KEY)?
                } else {
                    x.len().checked_div(len).unwrap_or(0)
                };
                if rows.checked_mul(len) != Some(x.len()) {
                    mdv_bail!(
                        Consistency: "subgroup {} stores {} values for {rows} rows of length {len}",
                        group.name(),
                        x.len()
                    );
                }
                Layout::Dense { x, len, rows }
            }
            SubgroupKind::Sparse => Layout::Sparse {
                x: group.dataset(X_KEY)?,
                i: group.dataset(I_KEY)?,
                p: group.dataset(P_KEY)?,
            },
        };
        Ok(Self {
            name: group.name().to_string(),
            layout,
        })
    }

    pub fn kind(&self) -> SubgroupKind {
        match self.layout {
            Layout::Dense { .. } => SubgroupKind::Dense,
            Layout::Sparse { .. } => SubgroupKind::Sparse,
        }
    }

    /// Number of stored vectors.
    pub fn rows(&self) -> usize {
        match &self.layout {
            Layout::Dense { rows, .. } => *rows,
            Layout::Sparse { p, .. } => p.len().saturating_sub(1),
        }
    }

    /// Bytes for vector `row`, read directly from storage.
    ///
    /// Dense rows are the raw little-endian `f32` slice. Sparse rows are
    /// `[u32 count][u32 × count indices][f32 × count values]`, little endian.
    pub fn row_bytes(&self, row: usize) -> MdvResult<Bytes> {
        let rows = self.rows();
        if row >= rows {
            mdv_bail!(
                NotFound: "row {row} out of range for subgroup {} with {rows} rows",
                self.name
            );
        }
        match &self.layout {
            Layout::Dense { x, len, .. } => x.byte_range(row * len..(row + 1) * len),
            Layout::Sparse { x, i, p } => {
                let bounds = p.read_range::<u64>(row..row + 2)?;
                let to_usize = |offset: u64| {
                    usize::try_from(offset).map_err(|_| {
                        mdv_err!(Consistency: "subgroup {} offset {offset} overflows", self.name)
                    })
                };
                let range = to_usize(bounds[0])?..to_usize(bounds[1])?;
                let count = u32::try_from(range.len()).map_err(|_| {
                    mdv_err!(Consistency: "subgroup {} row {row} is too long", self.name)
                })?;

                let indices = i.byte_range(range.clone())?;
                let values = x.byte_range(range)?;
                let mut out = BytesMut::with_capacity(4 + indices.len() + values.len());
                out.put_u32_le(count);
                out.put_slice(&indices);
                out.put_slice(&values);
                Ok(out.freeze())
            }
        }
    }
}

fn read_scalar(group: &Group, key: &str) -> MdvResult<usize> {
    let value = group.dataset(key)?.read_range::<u64>(0..1)?;
    usize::try_from(value[0])
        .map_err(|_| mdv_err!(Consistency: "subgroup {} {key} overflows", group.name()))
}

/// Number of vectors stored in a subgroup.
pub fn subgroup_row_count(group: &Group, kind: SubgroupKind) -> MdvResult<usize> {
    Ok(SubgroupReader::open(group, kind)?.rows())
}

/// Bytes for one vector of a subgroup. See [`SubgroupReader::row_bytes`].
pub fn subgroup_row_bytes(group: &Group, kind: SubgroupKind, row: usize) -> MdvResult<Bytes> {
    SubgroupReader::open(group, kind)?.row_bytes(row)
}

/// A sparse row parsed back from its wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseRow {
    pub fn from_wire(bytes: &[u8]) -> MdvResult<Self> {
        let Some((head, rest)) = bytes.split_first_chunk::<4>() else {
            mdv_bail!(Encoding: "sparse row of {} bytes has no count", bytes.len());
        };
        let count = u32::from_le_bytes(*head) as usize;
        if rest.len() != count * 8 {
            mdv_bail!(
                Encoding: "sparse row declares {count} entries but carries {} bytes",
                rest.len()
            );
        }
        let (indices, values) = rest.split_at(count * 4);
        Ok(Self {
            indices: from_le_bytes(indices),
            values: from_le_bytes(values),
        })
    }
}
