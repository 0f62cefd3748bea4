//! Codecs for MDV data source columns and tensor subgroups.
//!
//! [`encode_column`] turns logical values into a typed array plus an updated
//! [`ColumnDescriptor`]; [`decode_column`] reverses it. The [`tensor`] module stores and serves
//! the per-row vectors of rows-as-columns links.

pub use column::*;
pub use datum::*;
pub use schema::*;
pub use tensor::{
    DenseMatrix, SparseRow, SparseRows, SubgroupData, SubgroupDescriptor, SubgroupKind,
    SubgroupReader, subgroup_row_bytes, subgroup_row_count, write_subgroup,
};

mod column;
mod datum;
mod schema;
pub mod tensor;
