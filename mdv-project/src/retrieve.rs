//! Raw byte access to stored columns and subgroup rows.
//!
//! Nothing here decodes to logical values: columns are served as their stored little-endian
//! payload, and subgroup rows in the wire layout produced by [`SubgroupReader::row_bytes`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::{Bytes, BytesMut};
use mdv_codec::SubgroupReader;
use mdv_container::Group;
use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::MdvProject;
use crate::metadata::DataSourceDescriptor;

/// One unit of a byte payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ByteRequest {
    /// The full stored array of a column.
    Column(String),
    /// One vector of a rows-as-columns subgroup.
    SubgroupRow { stub: String, row: usize },
}

impl ByteRequest {
    pub fn column(field: impl Into<String>) -> Self {
        ByteRequest::Column(field.into())
    }

    pub fn subgroup_row(stub: impl Into<String>, row: usize) -> Self {
        ByteRequest::SubgroupRow {
            stub: stub.into(),
            row,
        }
    }
}

pub(crate) fn column_bytes(
    ds: &DataSourceDescriptor,
    group: &Group,
    field: &str,
) -> MdvResult<Bytes> {
    if ds.column(field).is_none() {
        mdv_bail!(NotFound: "column {field} not found in data source {}", ds.name);
    }
    Ok(group.dataset(field)?.bytes())
}

pub(crate) fn subgroup_reader(
    ds: &DataSourceDescriptor,
    group: &Group,
    stub: &str,
) -> MdvResult<SubgroupReader> {
    let (_, subgroup) = ds
        .subgroup(stub)
        .ok_or_else(|| mdv_err!(NotFound: "subgroup {stub} not found in data source {}", ds.name))?;
    SubgroupReader::open(&group.group(&subgroup.name)?, subgroup.kind)
}

impl MdvProject {
    /// The stored bytes of one column.
    pub fn get_column_bytes(&self, datasource: &str, field: &str) -> MdvResult<Bytes> {
        let _guard = self.lock().read()?;
        let ds = self.metadata().get_datasource(datasource)?;
        let group = self.container()?.group(datasource)?;
        column_bytes(&ds, &group, field)
    }

    /// The bytes of one vector of subgroup `stub`.
    ///
    /// Dense rows are raw `f32` values; sparse rows are `[u32 count][u32 indices][f32 values]`.
    pub fn get_subgroup_row_bytes(
        &self,
        datasource: &str,
        stub: &str,
        row: usize,
    ) -> MdvResult<Bytes> {
        let _guard = self.lock().read()?;
        let ds = self.metadata().get_datasource(datasource)?;
        let group = self.container()?.group(datasource)?;
        subgroup_reader(&ds, &group, stub)?.row_bytes(row)
    }

    /// Concatenate the bytes of every request, in order, into one payload.
    pub fn get_byte_data(&self, datasource: &str, requests: &[ByteRequest]) -> MdvResult<Bytes> {
        let _guard = self.lock().read()?;
        let ds = self.metadata().get_datasource(datasource)?;
        let group = self.container()?.group(datasource)?;

        let mut readers: HashMap<&str, SubgroupReader> = HashMap::new();
        let mut parts = Vec::with_capacity(requests.len());
        for request in requests {
            let part = match request {
                ByteRequest::Column(field) => column_bytes(&ds, &group, field)?,
                ByteRequest::SubgroupRow { stub, row } => {
                    let reader = match readers.entry(stub.as_str()) {
                        Entry::Occupied(entry) => entry.into_mut(),
                        Entry::Vacant(entry) => entry.insert(subgroup_reader(&ds, &group, stub)?),
                    };
                    reader.row_bytes(*row)?
                }
            };
            parts.push(part);
        }

        if parts.len() == 1 {
            return Ok(parts.swap_remove(0));
        }
        let mut out = BytesMut::with_capacity(parts.iter().map(Bytes::len).sum());
        for part in parts {
            out.extend_from_slice(&part);
        }
        Ok(out.freeze())
    }
}
