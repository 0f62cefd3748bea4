//! MDV projects: a directory holding data sources for the MDV front end.
//!
//! A project directory contains
//!
//! * `datafile/`, the container of encoded column arrays and subgroup vectors,
//! * `datasources.json`, the descriptor of every data source,
//! * `lock`, the file used for inter-process reader/writer locking.
//!
//! [`MdvProject`] writes columns through the codecs in [`mdv_codec`], serves stored bytes to
//! clients without decoding them, and packages a data source as a gzip blob with an offset
//! index for static delivery.

pub use export::*;
pub use ingest::*;
pub use lock::*;
pub use metadata::*;
pub use options::*;
pub use project::*;
pub use retrieve::ByteRequest;

mod export;
mod ingest;
mod lock;
mod metadata;
mod options;
mod project;
mod retrieve;
#[cfg(test)]
mod tests;
