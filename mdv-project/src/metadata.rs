//! Data source descriptors and the JSON file they are kept in.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use mdv_codec::{ColumnDescriptor, SubgroupDescriptor};
use mdv_error::{MdvError, MdvResult, mdv_bail, mdv_err};
use serde::{Deserialize, Serialize};

/// Link kind whose data is a [`RowsAsColumnsLink`].
pub const ROWS_AS_COLUMNS: &str = "rows_as_columns";

/// Schema of one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    pub name: String,
    /// Row count.
    pub size: usize,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    /// Links to other data sources, keyed by the linked data source name, in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, Link>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DataSourceDescriptor {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            columns: Vec::new(),
            links: IndexMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn column(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn column_mut(&mut self, field: &str) -> Option<&mut ColumnDescriptor> {
        self.columns.iter_mut().find(|c| c.field == field)
    }

    /// Replace the column with the same field, or append it.
    pub fn upsert_column(&mut self, column: ColumnDescriptor) {
        match self.column_mut(&column.field) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    /// Every rows-as-columns link of this data source, with the linked data source name.
    pub fn rows_as_columns(&self) -> impl Iterator<Item = (&str, &RowsAsColumnsLink)> + '_ {
        self.links
            .iter()
            .filter_map(|(to, link)| link.rows_as_columns.as_ref().map(|r| (to.as_str(), r)))
    }

    /// Find the subgroup stored under `stub` in any rows-as-columns link.
    pub fn subgroup(&self, stub: &str) -> Option<(&str, &SubgroupDescriptor)> {
        self.rows_as_columns()
            .find_map(|(to, link)| link.subgroups.get(stub).map(|sg| (to, sg)))
    }
}

/// The relations from one data source to another, by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_as_columns: Option<RowsAsColumnsLink>,
    /// Link kinds this crate does not interpret.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl Link {
    pub fn has(&self, kind: &str) -> bool {
        if kind == ROWS_AS_COLUMNS {
            self.rows_as_columns.is_some()
        } else {
            self.other.contains_key(kind)
        }
    }

    /// Set the data for `kind`, replacing what was there.
    pub fn set(&mut self, kind: &str, data: serde_json::Value) -> MdvResult<()> {
        if kind == ROWS_AS_COLUMNS {
            self.rows_as_columns = Some(serde_json::from_value(data)?);
        } else {
            self.other.insert(kind.to_string(), data);
        }
        Ok(())
    }
}

/// Per-row vectors of the linked data source exposed as columns of this one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsAsColumnsLink {
    /// Column of the linked data source that names each vector.
    pub name_column: String,
    pub name: String,
    /// Keyed by stub, in the order they were added.
    #[serde(default)]
    pub subgroups: IndexMap<String, SubgroupDescriptor>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Storage for data source descriptors.
pub trait MetadataStore: Send + Sync {
    fn list_datasources(&self) -> MdvResult<Vec<DataSourceDescriptor>>;

    /// Insert `descriptor`, or replace the one with the same name.
    fn set_datasource(&self, descriptor: DataSourceDescriptor) -> MdvResult<()>;

    /// Returns false if no data source had that name.
    fn remove_datasource(&self, name: &str) -> MdvResult<bool>;

    fn get_datasource(&self, name: &str) -> MdvResult<DataSourceDescriptor> {
        self.list_datasources()?
            .into_iter()
            .find(|ds| ds.name == name)
            .ok_or_else(|| mdv_err!("data source {name} does not exist"))
    }
}

/// Descriptors kept as a JSON array in a single file, rewritten whole on every change.
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    path: PathBuf,
}

impl JsonMetadataStore {
    /// Use the file at `path`, creating it with no data sources if absent.
    pub fn open(path: impl Into<PathBuf>) -> MdvResult<Self> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            store.save(&[])?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> MdvResult<Vec<DataSourceDescriptor>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| MdvError::from(e).with_context(format!("reading {}", self.path.display())))
    }

    fn save(&self, datasources: &[DataSourceDescriptor]) -> MdvResult<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_vec_pretty(datasources)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn list_datasources(&self) -> MdvResult<Vec<DataSourceDescriptor>> {
        self.load()
    }

    fn set_datasource(&self, descriptor: DataSourceDescriptor) -> MdvResult<()> {
        if descriptor.name.is_empty() {
            mdv_bail!("data source name must not be empty");
        }
        let mut datasources = self.load()?;
        match datasources.iter_mut().find(|ds| ds.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => datasources.push(descriptor),
        }
        self.save(&datasources)
    }

    fn remove_datasource(&self, name: &str) -> MdvResult<bool> {
        let mut datasources = self.load()?;
        let before = datasources.len();
        datasources.retain(|ds| ds.name != name);
        if datasources.len() == before {
            return Ok(false);
        }
        self.save(&datasources)?;
        Ok(true)
    }
}
