use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use log::{info, warn};
use mdv_codec::{ColumnDescriptor, Datatype, Datum, decode_column, encode_column};
use mdv_error::{MdvError, MdvResult, mdv_bail, mdv_err};

use crate::MdvProject;
use crate::metadata::DataSourceDescriptor;

/// One column of a table being added, with its values in row order.
#[derive(Debug, Clone)]
pub struct ColumnInput {
    pub descriptor: ColumnDescriptor,
    pub values: Vec<Datum>,
}

impl ColumnInput {
    pub fn new(field: impl Into<String>, values: Vec<Datum>) -> Self {
        Self {
            descriptor: ColumnDescriptor::new(field),
            values,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_name(name);
        self
    }

    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.descriptor = self.descriptor.with_datatype(datatype);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddDataSourceOptions {
    /// Overwrite a data source of the same name instead of failing.
    pub replace_data: bool,
    /// Row count; defaults to the length of the first column.
    pub size: Option<usize>,
}

/// Outcome of adding a data source.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Fields stored, in input order.
    pub added: Vec<String>,
    /// Fields that could not be encoded, with the reason.
    pub skipped: Vec<(String, MdvError)>,
}

impl MdvProject {
    /// Create a data source from columns of values.
    ///
    /// Columns are encoded independently: one that fails to encode is skipped and reported,
    /// and the rest are still added. Failing to write to the container aborts the whole call.
    pub fn add_datasource(
        &self,
        name: &str,
        columns: Vec<ColumnInput>,
        options: AddDataSourceOptions,
    ) -> MdvResult<IngestReport> {
        if name.is_empty() {
            mdv_bail!("data source name must not be empty");
        }
        let guard = self.lock().write()?;
        let container = self.container()?;

        let exists = self
            .metadata()
            .list_datasources()?
            .iter()
            .any(|ds| ds.name == name);
        if exists && !options.replace_data {
            mdv_bail!("data source {name} already exists");
        }
        if exists || container.contains_group(name)? {
            self.delete_datasource_locked(&guard, name)?;
        }

        let size = options
            .size
            .or_else(|| columns.first().map(|c| c.values.len()))
            .unwrap_or(0);
        let group = container.create_group(name)?;

        let mut report = IngestReport::default();
        let mut descriptor = DataSourceDescriptor::new(name, size);
        let mut seen = HashSet::new();
        for input in columns {
            let field = input.descriptor.field.clone();
            let encoded = if !seen.insert(field.clone()) {
                Err(mdv_err!("column {field} appears more than once"))
            } else if input.values.len() != size {
                Err(mdv_err!(
                    Encoding: "column {field} has {} values for {size} rows",
                    input.values.len()
                ))
            } else {
                encode_column(&input.descriptor, &input.values)
            };
            match encoded {
                Ok((column, array)) => {
                    group.create_dataset(&field, &array)?;
                    descriptor.columns.push(column);
                    report.added.push(field);
                }
                Err(e) => {
                    warn!("cannot add column {field} to data source {name}: {}", e.message());
                    report.skipped.push((field, e));
                }
            }
        }

        self.metadata().set_datasource(descriptor)?;
        info!(
            "added data source {name}: {size} rows, {} columns, {} skipped",
            report.added.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Join a table of annotations onto an existing data source and store them as text columns.
    ///
    /// `index_field` names both the data source column and the input column that rows are
    /// matched on. Rows without a matching annotation, or whose annotation is empty, get
    /// `missing_value`. When a key occurs twice in the annotations the first row wins.
    /// Existing columns with the same field are replaced. As in [`Self::add_datasource`],
    /// a column that cannot be encoded is skipped and reported.
    pub fn add_annotations(
        &self,
        datasource: &str,
        index_field: &str,
        columns: Vec<ColumnInput>,
        missing_value: &str,
    ) -> MdvResult<IngestReport> {
        let guard = self.lock().write()?;
        let Some(keys) = columns.iter().find(|c| c.descriptor.field == index_field) else {
            mdv_bail!("annotations have no {index_field} column");
        };
        let key_count = keys.values.len();
        let mut rows_by_key = HashMap::new();
        for (row, key) in keys.values.iter().enumerate() {
            let Some(key) = key.as_text() else {
                continue;
            };
            match rows_by_key.entry(key) {
                Entry::Occupied(e) => {
                    warn!("annotation key {} is repeated, keeping its first row", e.key());
                }
                Entry::Vacant(e) => {
                    e.insert(row);
                }
            }
        }

        self.update_datasource(&guard, datasource, |ds, group| {
            let index = ds.column(index_field).ok_or_else(|| {
                mdv_err!("column {index_field} not found in data source {datasource}")
            })?;
            let index = decode_column(index, &group.read_dataset(index_field)?, ds.size)?;
            let matched: Vec<Option<usize>> = index
                .to_strings()
                .iter()
                .map(|key| rows_by_key.get(key).copied())
                .collect();

            let mut report = IngestReport::default();
            let mut seen = HashSet::new();
            for input in columns {
                let field = input.descriptor.field.clone();
                if field == index_field {
                    continue;
                }
                let encoded = if !seen.insert(field.clone()) {
                    Err(mdv_err!("column {field} appears more than once"))
                } else if input.values.len() != key_count {
                    Err(mdv_err!(
                        Encoding: "annotation column {field} has {} values for {key_count} keys",
                        input.values.len()
                    ))
                } else {
                    let values: Vec<Datum> = matched
                        .iter()
                        .map(|row| {
                            let text = row.and_then(|r| input.values[r].as_text());
                            Datum::Str(text.unwrap_or_else(|| missing_value.to_string()))
                        })
                        .collect();
                    let descriptor = input.descriptor.clone().with_datatype(Datatype::Text);
                    encode_column(&descriptor, &values)
                };
                match encoded {
                    Ok((column, array)) => {
                        group.create_dataset(&field, &array)?;
                        ds.upsert_column(column);
                        report.added.push(field);
                    }
                    Err(e) => {
                        warn!("cannot annotate {datasource} with {field}: {}", e.message());
                        report.skipped.push((field, e));
                    }
                }
            }
            info!(
                "annotated data source {datasource} on {index_field}: {} columns, {} skipped",
                report.added.len(),
                report.skipped.len()
            );
            Ok(report)
        })
    }
}
