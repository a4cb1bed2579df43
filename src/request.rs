//! Merge request types.
//!
//! A request maps `dataset.table|index` keys to column descriptors. Key
//! order is significant: it decides the order of the emitted joins and of
//! the output columns, so the request keeps its tables in a `Vec` and
//! decodes JSON objects entry by entry.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MergeResult;
use crate::parser;

/// Semantic role of a column in the nearest-location join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnRole {
    Date,
    Latitude,
    Longitude,
    /// Plain data column, encoded as `""`.
    #[default]
    #[serde(rename = "")]
    Plain,
}

impl ColumnRole {
    /// Roles every table must expose exactly once among its selected columns.
    pub const REQUIRED: [ColumnRole; 3] = [Self::Latitude, Self::Longitude, Self::Date];

    /// Column names recognized by [`ColumnRole::infer`], per role.
    pub const KNOWN_NAMES: [(ColumnRole, &'static [&'static str]); 3] = [
        (Self::Date, &["date", "timestamp", "time"]),
        (Self::Latitude, &["latitude", "lat"]),
        (Self::Longitude, &["longitude", "lon", "lng"]),
    ];

    /// Suggest a role from a column name (case-insensitive).
    pub fn infer(column: &str) -> Self {
        let lower = column.to_ascii_lowercase();
        Self::KNOWN_NAMES
            .iter()
            .find(|(_, names)| names.contains(&lower.as_str()))
            .map(|(role, _)| *role)
            .unwrap_or(Self::Plain)
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRole::Date => write!(f, "date"),
            ColumnRole::Latitude => write!(f, "latitude"),
            ColumnRole::Longitude => write!(f, "longitude"),
            ColumnRole::Plain => write!(f, "plain"),
        }
    }
}

fn default_selected() -> bool {
    true
}

/// One source column and how it should appear in the merged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Source column identifier.
    pub name: String,
    /// Output alias, unique (case-insensitive) across the request.
    #[serde(rename = "newName")]
    pub new_name: String,
    #[serde(rename = "type", default)]
    pub role: ColumnRole,
    #[serde(default = "default_selected")]
    pub selected: bool,
}

impl ColumnDescriptor {
    /// A selected column keeping its own name, with an inferred role.
    pub fn inferred(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            role: ColumnRole::infer(&name),
            new_name: name.clone(),
            name,
            selected: true,
        }
    }

    /// A selected column with an explicit role.
    pub fn new(name: impl Into<String>, new_name: impl Into<String>, role: ColumnRole) -> Self {
        Self {
            name: name.into(),
            new_name: new_name.into(),
            role,
            selected: true,
        }
    }

    pub fn deselected(mut self) -> Self {
        self.selected = false;
        self
    }
}

/// Parsed `dataset.table|index` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    /// Dataset-qualified table name.
    pub table: String,
    pub index: u32,
}

impl TableKey {
    pub fn new(table: impl Into<String>, index: u32) -> Self {
        Self {
            table: table.into(),
            index,
        }
    }

    pub fn parse(key: &str) -> MergeResult<Self> {
        parser::parse_table_key(key)
    }

    /// Index 0 drives the row cardinality of the result.
    pub fn is_main(&self) -> bool {
        self.index == 0
    }

    /// Deterministic `t<index>` alias used throughout the generated SQL.
    pub fn alias(&self) -> String {
        format!("t{}", self.index)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.table, self.index)
    }
}

/// Columns declared for one table key, as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub key: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// An ordered mapping of table keys to their column descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub tables: Vec<TableColumns>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a table (builder style).
    pub fn table(mut self, key: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        self.tables.push(TableColumns {
            key: key.into(),
            columns,
        });
        self
    }

    /// Decode a request from its JSON object form.
    pub fn from_json(input: &str) -> MergeResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Build a starter request from table names and their column lists.
    ///
    /// Indices follow input order, so the first table becomes the main
    /// table. Every column is selected, keeps its name, and gets an
    /// inferred role.
    pub fn scaffold<I, C>(tables: I) -> Self
    where
        I: IntoIterator<Item = (String, C)>,
        C: IntoIterator<Item = String>,
    {
        let tables = tables
            .into_iter()
            .enumerate()
            .map(|(index, (table, columns))| TableColumns {
                key: TableKey::new(table, index as u32).to_string(),
                columns: columns.into_iter().map(ColumnDescriptor::inferred).collect(),
            })
            .collect();
        Self { tables }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Serialize for Request {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.tables.len()))?;
        for entry in &self.tables {
            map.serialize_entry(&entry.key, &entry.columns)?;
        }
        map.end()
    }
}

// Decoded entry by entry so key order survives without an ordered map type.
impl<'de> Deserialize<'de> for Request {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RequestVisitor;

        impl<'de> Visitor<'de> for RequestVisitor {
            type Value = Request;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of 'dataset.table|index' keys to column lists")
            }

            fn visit_map<M>(self, mut map: M) -> Result<Request, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut tables = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, columns)) = map.next_entry::<String, Vec<ColumnDescriptor>>()? {
                    if tables.iter().any(|t: &TableColumns| t.key == key) {
                        return Err(de::Error::custom(format!("duplicate table key '{}'", key)));
                    }
                    tables.push(TableColumns { key, columns });
                }
                Ok(Request { tables })
            }
        }

        deserializer.deserialize_map(RequestVisitor)
    }
}

/// A request bundled with its generation target, as posted by the merge UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeEnvelope {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, alias = "newTableName")]
    pub output_table_name: Option<String>,
    pub payload: Request,
}

/// Either a bare request or one wrapped in a [`MergeEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDocument {
    Envelope(MergeEnvelope),
    Bare(Request),
}

// Only answers whether the top-level object has a `payload` key.
#[derive(Deserialize)]
struct PayloadMarker {
    #[serde(default)]
    payload: Option<de::IgnoredAny>,
}

impl RequestDocument {
    /// Decode an envelope if the object has a `payload` key, else a bare request.
    pub fn from_json(input: &str) -> MergeResult<Self> {
        let marker: PayloadMarker = serde_json::from_str(input)?;
        if marker.payload.is_some() {
            let envelope: MergeEnvelope = serde_json::from_str(input)?;
            Ok(RequestDocument::Envelope(envelope))
        } else {
            Request::from_json(input).map(RequestDocument::Bare)
        }
    }

    pub fn into_parts(self) -> (Option<String>, Option<String>, Request) {
        match self {
            RequestDocument::Envelope(env) => (env.project_id, env.output_table_name, env.payload),
            RequestDocument::Bare(request) => (None, None, request),
        }
    }
}
