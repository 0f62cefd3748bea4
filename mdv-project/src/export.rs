//! Packaging of a data source into one compressed blob plus a byte-offset index.
//!
//! Every column array and every subgroup row is gzip compressed on its own and appended to the
//! blob. The index maps each segment key to the inclusive byte range it occupies, so a client
//! can fetch and inflate a single segment with one range request.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use mdv_error::{MdvResult, mdv_bail, mdv_err};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tempfile::NamedTempFile;

use crate::MdvProject;
use crate::lock::{LockGuard, LockMode};
use crate::metadata::DataSourceDescriptor;
use crate::retrieve::{column_bytes, subgroup_reader};

/// Bytes `start..=end_inclusive` of an export blob. Serialized as `[start, end_inclusive]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SegmentRange {
    pub start: u64,
    pub end_inclusive: u64,
}

impl Display for SegmentRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end_inclusive)
    }
}

impl SegmentRange {
    /// Compressed size of the segment. Never zero, as a gzip member always carries a header.
    pub fn compressed_len(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }

    pub fn as_range(&self) -> MdvResult<Range<usize>> {
        let to_usize = |v: u64| {
            usize::try_from(v).map_err(|_| mdv_err!(Consistency: "segment offset {v} overflows"))
        };
        Ok(to_usize(self.start)?..to_usize(self.end_inclusive)? + 1)
    }
}

impl Serialize for SegmentRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.start, self.end_inclusive].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SegmentRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [start, end_inclusive] = <[u64; 2]>::deserialize(deserializer)?;
        Ok(Self {
            start,
            end_inclusive,
        })
    }
}

/// Segment keys and their byte ranges, in blob order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportIndex {
    entries: Vec<(String, SegmentRange)>,
}

impl ExportIndex {
    pub fn iter(&self) -> impl Iterator<Item = (&str, SegmentRange)> + '_ {
        self.entries.iter().map(|(k, r)| (k.as_str(), *r))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<SegmentRange> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, r)| *r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Byte length of the blob this index describes.
    pub fn blob_len(&self) -> u64 {
        self.entries
            .last()
            .map_or(0, |(_, range)| range.end_inclusive + 1)
    }
}

impl Serialize for ExportIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, range) in &self.entries {
            map.serialize_entry(key, range)?;
        }
        map.end()
    }
}

struct IndexVisitor;

impl<'de> Visitor<'de> for IndexVisitor {
    type Value = ExportIndex;

    fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("a map of segment keys to [start, end] pairs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(entry) = access.next_entry::<String, SegmentRange>()? {
            entries.push(entry);
        }
        Ok(ExportIndex { entries })
    }
}

impl<'de> Deserialize<'de> for ExportIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(IndexVisitor)
    }
}

/// Files written for one data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// `{name}.gz`, the concatenated segments.
    pub blob: PathBuf,
    /// `{name}.json`, the [`ExportIndex`].
    pub index: PathBuf,
}

/// Compresses segments one at a time onto a writer, recording where each one lands.
struct SegmentWriter<W: Write> {
    writer: W,
    position: u64,
    level: Compression,
    index: ExportIndex,
    keys: HashSet<String>,
}

impl<W: Write> SegmentWriter<W> {
    fn new(writer: W, level: Compression) -> Self {
        Self {
            writer,
            position: 0,
            level,
            index: ExportIndex::default(),
            keys: HashSet::new(),
        }
    }

    fn push(&mut self, key: String, data: &[u8]) -> MdvResult<SegmentRange> {
        if !self.keys.insert(key.clone()) {
            mdv_bail!("export key {key} is used by more than one segment");
        }
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;
        self.writer.write_all(&compressed)?;

        let range = SegmentRange {
            start: self.position,
            end_inclusive: self.position + compressed.len() as u64 - 1,
        };
        self.position += compressed.len() as u64;
        self.index.entries.push((key, range));
        Ok(range)
    }

    fn finish(mut self) -> MdvResult<(W, ExportIndex)> {
        self.writer.flush()?;
        Ok((self.writer, self.index))
    }
}

/// Move a finished temporary file to `path`, replacing whatever is there.
fn publish(file: NamedTempFile, path: &Path) -> MdvResult<()> {
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl MdvProject {
    /// Write `{name}.gz` and `{name}.json` for one data source into `out_dir`.
    ///
    /// Segments are the columns in descriptor order, then for each rows-as-columns link and
    /// each of its subgroups, one segment per row of the linked data source keyed
    /// `{stub}{row}`. Any failure aborts the export; files from an earlier export stay as they were.
    pub fn export_datasource(
        &self,
        datasource: &str,
        out_dir: impl AsRef<Path>,
    ) -> MdvResult<ExportPaths> {
        let guard = self.lock().read()?;
        fs::create_dir_all(out_dir.as_ref())?;
        let ds = self.metadata().get_datasource(datasource)?;
        self.export_locked(&guard, &ds, out_dir.as_ref())
    }

    /// Export every data source into `out_dir` under a single read lock.
    pub fn export_all(&self, out_dir: impl AsRef<Path>) -> MdvResult<Vec<ExportPaths>> {
        let guard = self.lock().read()?;
        fs::create_dir_all(out_dir.as_ref())?;
        self.metadata()
            .list_datasources()?
            .iter()
            .map(|ds| self.export_locked(&guard, ds, out_dir.as_ref()))
            .collect()
    }

    fn export_locked(
        &self,
        guard: &LockGuard,
        ds: &DataSourceDescriptor,
        out_dir: &Path,
    ) -> MdvResult<ExportPaths> {
        guard.require(LockMode::Read)?;
        let paths = ExportPaths {
            blob: out_dir.join(format!("{}.gz", ds.name)),
            index: out_dir.join(format!("{}.json", ds.name)),
        };

        // Unpublished temporary files are removed when dropped.
        let index = self
            .write_segments(ds, out_dir)
            .and_then(|(blob, index)| {
                let mut file = NamedTempFile::new_in(out_dir)?;
                file.write_all(&serde_json::to_vec(&index)?)?;
                file.as_file().sync_all()?;
                publish(blob, &paths.blob)?;
                publish(file, &paths.index)?;
                Ok(index)
            })
            .map_err(|e| e.with_context(format!("exporting data source {}", ds.name)))?;

        info!(
            "exported data source {} to {}: {} segments, {} bytes",
            ds.name,
            paths.blob.display(),
            index.len(),
            index.blob_len()
        );
        Ok(paths)
    }

    fn write_segments(
        &self,
        ds: &DataSourceDescriptor,
        out_dir: &Path,
    ) -> MdvResult<(NamedTempFile, ExportIndex)> {
        let level = Compression::new(self.options().compression_level());
        let mut file = NamedTempFile::new_in(out_dir)?;
        let mut segments = SegmentWriter::new(BufWriter::new(file.as_file_mut()), level);
        let group = self.container()?.group(&ds.name)?;

        for column in &ds.columns {
            let bytes = column_bytes(ds, &group, &column.field)?;
            segments.push(column.field.clone(), &bytes)?;
        }

        for (linked, link) in ds.rows_as_columns() {
            let rows = self.metadata().get_datasource(linked)?.size;
            for stub in link.subgroups.keys() {
                let reader = subgroup_reader(ds, &group, stub)?;
                for row in 0..rows {
                    segments.push(format!("{stub}{row}"), &reader.row_bytes(row)?)?;
                }
                debug!("exported {rows} rows of subgroup {stub} of {}", ds.name);
            }
        }

        let (writer, index) = segments.finish()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok((file, index))
    }
}
