use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The declared logical type of a column.
///
/// Unknown names survive deserialization as [`Datatype::Unrecognized`] so that encoding can
/// report them as an encoding error rather than failing to load the whole schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Dictionary encoded categories, at most 255 distinct values.
    Text,
    /// Comma separated tags per row.
    Multitext,
    /// Fixed-width raw strings.
    Unique,
    /// Whole numbers, stored as 32-bit floats.
    Integer,
    /// Real numbers, stored as 32-bit floats.
    Double,
    /// Whole numbers, stored as 32-bit signed integers.
    Int32,
    /// A name that is not one of the above.
    Unrecognized(String),
}

impl Datatype {
    pub fn name(&self) -> &str {
        match self {
            Datatype::Text => "text",
            Datatype::Multitext => "multitext",
            Datatype::Unique => "unique",
            Datatype::Integer => "integer",
            Datatype::Double => "double",
            Datatype::Int32 => "int32",
            Datatype::Unrecognized(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "text" => Datatype::Text,
            "multitext" => Datatype::Multitext,
            "unique" => Datatype::Unique,
            "integer" => Datatype::Integer,
            "double" => Datatype::Double,
            "int32" => Datatype::Int32,
            other => Datatype::Unrecognized(other.to_string()),
        }
    }
}

impl Display for Datatype {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for Datatype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Datatype::from_name(&name))
    }
}

/// Schema entry for one column of a data source.
///
/// Type-specific attributes are rewritten by every encode; keys this crate does not know about
/// (display colours, editing flags) are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Storage key, immutable once created.
    pub field: String,
    /// Display label.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Datatype>,
    /// Dictionary for `text` and `multitext`, indexed by code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    /// Stride for `multitext`, byte width for `unique`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_max: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantiles: Option<BTreeMap<String, [f64; 2]>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ColumnDescriptor {
    /// A column whose field and display name are the same.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            field,
            datatype: None,
            values: None,
            string_length: None,
            min_max: None,
            quantiles: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_datatype(mut self, datatype: Datatype) -> Self {
        self.datatype = Some(datatype);
        self
    }

    /// Drop every attribute derived by a previous encode.
    pub(crate) fn clear_encoding(&mut self) {
        self.values = None;
        self.string_length = None;
        self.min_max = None;
        self.quantiles = None;
    }
}
