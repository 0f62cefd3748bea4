use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use mdv_codec::{
    ColumnDescriptor, Datum, DecodedColumn, SubgroupData, SubgroupDescriptor, decode_column,
    encode_column, write_subgroup,
};
use mdv_container::{Container, Group, TypedArray};
use mdv_error::{MdvResult, mdv_bail, mdv_err};

use crate::lock::{LockGuard, LockMode, ProjectLock};
use crate::metadata::{
    DataSourceDescriptor, JsonMetadataStore, Link, MetadataStore, ROWS_AS_COLUMNS,
    RowsAsColumnsLink,
};
use crate::options::ProjectOptions;

/// A project directory: the array container, the data source metadata and the lock that
/// guards both.
///
/// Every public operation takes the project lock for its duration, in read mode for lookups
/// and write mode for anything that changes metadata or stored arrays. The container is opened
/// per operation and nothing is held between calls, so several processes can share a project.
pub struct MdvProject {
    dir: PathBuf,
    options: ProjectOptions,
    lock: ProjectLock,
    metadata: Arc<dyn MetadataStore>,
}

impl MdvProject {
    /// Open the project at `dir` with default options, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> MdvResult<Self> {
        Self::open_with_options(dir, ProjectOptions::default())
    }

    pub fn open_with_options(dir: impl AsRef<Path>, options: ProjectOptions) -> MdvResult<Self> {
        let dir = dir.as_ref();
        options.validate()?;
        fs::create_dir_all(dir)?;
        let store = JsonMetadataStore::open(dir.join(options.metadata_file()))?;
        Self::open_with_store(dir, options, Arc::new(store))
    }

    /// Open the project with descriptors kept in `metadata` instead of the metadata file.
    pub fn open_with_store(
        dir: impl AsRef<Path>,
        options: ProjectOptions,
        metadata: Arc<dyn MetadataStore>,
    ) -> MdvResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        options.validate()?;
        fs::create_dir_all(&dir)?;
        let lock = ProjectLock::new(dir.join(options.lock_file()))?;
        debug!("opened project {}", dir.display());
        Ok(Self {
            dir,
            options,
            lock,
            metadata,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    /// The inter-process lock, for callers that batch several reads under one guard.
    pub fn lock(&self) -> &ProjectLock {
        &self.lock
    }

    pub(crate) fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    pub(crate) fn container(&self) -> MdvResult<Container> {
        Container::open(self.dir.join(self.options.container_dir()))
    }

    pub fn datasources(&self) -> MdvResult<Vec<DataSourceDescriptor>> {
        let _guard = self.lock.read()?;
        self.metadata.list_datasources()
    }

    pub fn get_datasource_metadata(&self, name: &str) -> MdvResult<DataSourceDescriptor> {
        let _guard = self.lock.read()?;
        self.metadata.get_datasource(name)
    }

    /// Insert or replace a descriptor as given. Stored arrays are not touched.
    pub fn set_datasource_metadata(&self, descriptor: DataSourceDescriptor) -> MdvResult<()> {
        let _guard = self.lock.write()?;
        self.metadata.set_datasource(descriptor)
    }

    pub fn get_column_metadata(&self, datasource: &str, field: &str) -> MdvResult<ColumnDescriptor> {
        let _guard = self.lock.read()?;
        let ds = self.metadata.get_datasource(datasource)?;
        ds.column(field)
            .cloned()
            .ok_or_else(|| mdv_err!("column {field} not found in data source {datasource}"))
    }

    /// Set one key of a column descriptor, such as `name` or `colors`.
    ///
    /// `field` cannot be changed, and values that do not fit the key's type are rejected.
    pub fn set_column_metadata(
        &self,
        datasource: &str,
        field: &str,
        key: &str,
        value: serde_json::Value,
    ) -> MdvResult<()> {
        if key == "field" {
            mdv_bail!("the field of column {field} cannot be changed");
        }
        let guard = self.lock.write()?;
        self.update_datasource(&guard, datasource, |ds, _| {
            let column = ds
                .column_mut(field)
                .ok_or_else(|| mdv_err!("column {field} not found in data source {datasource}"))?;
            let mut json = serde_json::to_value(&*column)?;
            if let Some(map) = json.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            *column = serde_json::from_value(json)?;
            Ok(())
        })
    }

    /// Remove a data source's arrays and descriptor.
    pub fn delete_datasource(&self, name: &str) -> MdvResult<()> {
        let guard = self.lock.write()?;
        self.delete_datasource_locked(&guard, name)
    }

    pub(crate) fn delete_datasource_locked(&self, guard: &LockGuard, name: &str) -> MdvResult<()> {
        guard.require(LockMode::Write)?;
        let had_group = self.container()?.delete_group(name)?;
        let had_metadata = self.metadata.remove_datasource(name)?;
        if !had_group && !had_metadata {
            mdv_bail!("data source {name} does not exist");
        }
        debug!("deleted data source {name}");
        Ok(())
    }

    /// Load a descriptor, apply `update` with the data source's group, and store the result.
    ///
    /// Nothing is persisted if `update` fails; arrays it already replaced stay replaced.
    pub(crate) fn update_datasource<R>(
        &self,
        guard: &LockGuard,
        name: &str,
        update: impl FnOnce(&mut DataSourceDescriptor, &Group) -> MdvResult<R>,
    ) -> MdvResult<R> {
        guard.require(LockMode::Write)?;
        let mut ds = self.metadata.get_datasource(name)?;
        let group = self.container()?.require_group(name)?;
        let result = update(&mut ds, &group)?;
        self.metadata.set_datasource(ds)?;
        Ok(result)
    }

    /// Encode `values` and store them as `column`, replacing any column with the same field.
    ///
    /// Returns the descriptor as persisted, with dictionary and statistics filled in.
    pub fn set_column(
        &self,
        datasource: &str,
        column: ColumnDescriptor,
        values: &[Datum],
    ) -> MdvResult<ColumnDescriptor> {
        let guard = self.lock.write()?;
        self.update_datasource(&guard, datasource, |ds, group| {
            if values.len() != ds.size {
                mdv_bail!(
                    Encoding: "column {} has {} values but data source {datasource} has {} rows",
                    column.field,
                    values.len(),
                    ds.size
                );
            }
            let (updated, array) = encode_column(&column, values)?;
            group.create_dataset(&updated.field, &array)?;
            ds.upsert_column(updated.clone());
            Ok(updated)
        })
    }

    /// Store an already encoded array for `column` as is, after checking that it decodes.
    pub fn set_column_with_raw_data(
        &self,
        datasource: &str,
        column: ColumnDescriptor,
        array: &TypedArray,
    ) -> MdvResult<()> {
        let guard = self.lock.write()?;
        self.update_datasource(&guard, datasource, |ds, group| {
            decode_column(&column, array, ds.size)
                .map_err(|e| e.with_context(format!("raw data for column {}", column.field)))?;
            group.create_dataset(&column.field, array)?;
            ds.upsert_column(column);
            Ok(())
        })
    }

    /// Remove a column. Returns false, with a warning, if the column did not exist.
    pub fn remove_column(&self, datasource: &str, field: &str) -> MdvResult<bool> {
        let guard = self.lock.write()?;
        self.update_datasource(&guard, datasource, |ds, group| {
            let before = ds.columns.len();
            ds.columns.retain(|c| c.field != field);
            if ds.columns.len() == before {
                warn!("deleting non existing column {field} from {datasource}");
                return Ok(false);
            }
            group.delete_dataset(field)?;
            Ok(true)
        })
    }

    /// Decode a stored column back to its logical values.
    pub fn get_column(&self, datasource: &str, field: &str) -> MdvResult<DecodedColumn> {
        let _guard = self.lock.read()?;
        let ds = self.metadata.get_datasource(datasource)?;
        let column = ds
            .column(field)
            .ok_or_else(|| mdv_err!("column {field} not found in data source {datasource}"))?;
        let array = self.container()?.group(datasource)?.read_dataset(field)?;
        decode_column(column, &array, ds.size)
    }

    /// Decode every column of a data source, in descriptor order.
    pub fn get_datasource_table(
        &self,
        datasource: &str,
    ) -> MdvResult<Vec<(ColumnDescriptor, DecodedColumn)>> {
        let _guard = self.lock.read()?;
        let ds = self.metadata.get_datasource(datasource)?;
        let group = self.container()?.group(datasource)?;
        ds.columns
            .into_iter()
            .map(|column| {
                let array = group.read_dataset(&column.field)?;
                let decoded = decode_column(&column, &array, ds.size)
                    .map_err(|e| e.with_context(format!("column {}", column.field)))?;
                Ok((column, decoded))
            })
            .collect()
    }

    /// Record a link of `kind` from `datasource` to `link_to`, replacing one of the same kind.
    pub fn insert_link(
        &self,
        datasource: &str,
        link_to: &str,
        kind: &str,
        data: serde_json::Value,
    ) -> MdvResult<()> {
        let guard = self.lock.write()?;
        self.insert_link_locked(&guard, datasource, link_to, kind, data)
    }

    fn insert_link_locked(
        &self,
        guard: &LockGuard,
        datasource: &str,
        link_to: &str,
        kind: &str,
        data: serde_json::Value,
    ) -> MdvResult<()> {
        self.metadata
            .get_datasource(link_to)
            .map_err(|e| e.with_context(format!("linking {datasource} to {link_to}")))?;
        self.update_datasource(guard, datasource, |ds, _| {
            ds.links.entry(link_to.to_string()).or_default().set(kind, data)
        })
    }

    /// Link `row_ds` to `col_ds` so that each row of `col_ds` can be shown as a column of
    /// `row_ds`, named by the values of `name_column`.
    ///
    /// Replaces any previous rows-as-columns link between the two, subgroups included.
    pub fn add_rows_as_columns_link(
        &self,
        row_ds: &str,
        col_ds: &str,
        name_column: &str,
        name: &str,
    ) -> MdvResult<()> {
        let guard = self.lock.write()?;
        let to = self.metadata.get_datasource(col_ds)?;
        if !to
            .columns
            .iter()
            .any(|c| c.name == name_column || c.field == name_column)
        {
            mdv_bail!("column {name_column} does not exist in data source {col_ds}");
        }
        let link = RowsAsColumnsLink {
            name_column: name_column.to_string(),
            name: name.to_string(),
            subgroups: Default::default(),
            extra: Default::default(),
        };
        self.insert_link_locked(
            &guard,
            row_ds,
            col_ds,
            ROWS_AS_COLUMNS,
            serde_json::to_value(link)?,
        )
    }

    /// Store per-row vectors for an existing rows-as-columns link under `stub`.
    ///
    /// The data must hold one vector per row of `col_ds`, each as long as `row_ds` has rows.
    /// `name` defaults to the stub and `label` to the name. A stub already used by another
    /// link of `row_ds`, or a `name` already holding another stub's vectors, is a schema error.
    pub fn add_rows_as_columns_subgroup(
        &self,
        row_ds: &str,
        col_ds: &str,
        stub: &str,
        data: &SubgroupData,
        name: Option<&str>,
        label: Option<&str>,
    ) -> MdvResult<SubgroupDescriptor> {
        if stub.is_empty() {
            mdv_bail!("subgroup stub must not be empty");
        }
        let name = name.unwrap_or(stub);
        let label = label.unwrap_or(name);

        let guard = self.lock.write()?;
        let size_b = self.metadata.get_datasource(col_ds)?.size;
        self.update_datasource(&guard, row_ds, |ds, group| {
            let size_a = ds.size;
            for (linked, link) in ds.rows_as_columns() {
                for (other, subgroup) in &link.subgroups {
                    if other == stub && linked != col_ds {
                        mdv_bail!("stub {stub} is already used by the link to {linked}");
                    }
                    if other != stub && subgroup.name == name {
                        mdv_bail!("{name} already holds the vectors of subgroup {other}");
                    }
                }
            }
            let replaced = ds
                .subgroup(stub)
                .map(|(_, previous)| previous.name.clone())
                .filter(|previous| previous != name);

            let link = ds
                .links
                .get_mut(col_ds)
                .and_then(|l| l.rows_as_columns.as_mut())
                .ok_or_else(|| mdv_err!("no rows_as_columns link from {row_ds} to {col_ds}"))?;

            write_subgroup(&group.require_group(name)?, data, size_a, size_b)
                .map_err(|e| e.with_context(format!("subgroup {stub} of {row_ds}")))?;
            let descriptor = SubgroupDescriptor::new(name, label, data.kind());
            link.subgroups.insert(stub.to_string(), descriptor.clone());
            if let Some(previous) = replaced {
                group.delete_group(&previous)?;
            }
            Ok(descriptor)
        })
    }

    /// Links of `datasource`, keyed by linked data source, optionally only those of one kind.
    pub fn get_links(
        &self,
        datasource: &str,
        filter: Option<&str>,
    ) -> MdvResult<Vec<(String, Link)>> {
        let _guard = self.lock.read()?;
        let ds = self.metadata.get_datasource(datasource)?;
        Ok(ds
            .links
            .into_iter()
            .filter(|(_, link)| filter.is_none_or(|kind| link.has(kind)))
            .collect())
    }
}
