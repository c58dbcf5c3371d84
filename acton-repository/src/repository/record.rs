//! Records, primary keys and select lists
//!
//! The repository is independent of any table's shape, so a persisted row is
//! a JSON object ([`Row`]) wrapped in a [`Record`]. Typed access goes through
//! [`Record::deserialize`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::FilterValue;
use super::traits::RepositoryResult;

/// Column holding the creation timestamp
pub const CREATED_AT: &str = "created_at";

/// Column holding the last-update timestamp
pub const UPDATED_AT: &str = "updated_at";

/// Column holding the soft-delete marker
pub const DELETED_AT: &str = "deleted_at";

/// Attribute map of a single row
pub type Row = serde_json::Map<String, Value>;

/// Primary key value, integer or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Auto-increment style key
    Integer(i64),
    /// String key (UUID, slug, ...)
    Text(String),
}

impl RecordId {
    /// Read a key out of a JSON value
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Integer),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// The key as a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        Self::Integer(i64::from(id))
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

impl From<&RecordId> for RecordId {
    fn from(id: &RecordId) -> Self {
        id.clone()
    }
}

impl From<RecordId> for FilterValue {
    fn from(id: RecordId) -> Self {
        match id {
            RecordId::Integer(i) => FilterValue::Integer(i),
            RecordId::Text(s) => FilterValue::String(s),
        }
    }
}

/// One or more primary keys
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ids(Vec<RecordId>);

impl Ids {
    /// Build from any iterator of keys
    pub fn new<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<RecordId>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }

    /// The keys in order
    pub fn as_slice(&self) -> &[RecordId] {
        &self.0
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key was given
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys as filter values for an IN list
    pub fn to_filter_values(&self) -> Vec<FilterValue> {
        self.0.iter().cloned().map(FilterValue::from).collect()
    }
}

impl From<RecordId> for Ids {
    fn from(id: RecordId) -> Self {
        Self(vec![id])
    }
}

impl From<&RecordId> for Ids {
    fn from(id: &RecordId) -> Self {
        Self(vec![id.clone()])
    }
}

impl From<i64> for Ids {
    fn from(id: i64) -> Self {
        Self(vec![RecordId::Integer(id)])
    }
}

impl From<&str> for Ids {
    fn from(id: &str) -> Self {
        Self(vec![RecordId::from(id)])
    }
}

impl From<String> for Ids {
    fn from(id: String) -> Self {
        Self(vec![RecordId::Text(id)])
    }
}

impl From<Vec<RecordId>> for Ids {
    fn from(ids: Vec<RecordId>) -> Self {
        Self(ids)
    }
}

impl From<Vec<i64>> for Ids {
    fn from(ids: Vec<i64>) -> Self {
        Self::new(ids)
    }
}

impl From<Vec<&str>> for Ids {
    fn from(ids: Vec<&str>) -> Self {
        Self::new(ids)
    }
}

impl From<Vec<String>> for Ids {
    fn from(ids: Vec<String>) -> Self {
        Self::new(ids)
    }
}

impl From<&[i64]> for Ids {
    fn from(ids: &[i64]) -> Self {
        Self::new(ids.iter().copied())
    }
}

/// Select list for a query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    /// Every column (`*`)
    #[default]
    All,
    /// Only the named columns, in order
    Only(Vec<String>),
}

impl Columns {
    /// Select the named columns; `["*"]` selects everything
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() || columns.iter().any(|c| c == "*") {
            Self::All
        } else {
            Self::Only(columns)
        }
    }

    /// Keep only the selected attributes of a row
    pub fn project(&self, row: &Row) -> Row {
        match self {
            Self::All => row.clone(),
            Self::Only(columns) => columns
                .iter()
                .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                .collect(),
        }
    }
}

impl From<&[&str]> for Columns {
    fn from(columns: &[&str]) -> Self {
        Self::only(columns.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(columns: [&str; N]) -> Self {
        Self::only(columns)
    }
}

impl From<Vec<String>> for Columns {
    fn from(columns: Vec<String>) -> Self {
        Self::only(columns)
    }
}

/// A persisted row
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    attributes: Row,
}

impl Record {
    /// Wrap an attribute map
    pub fn new(attributes: Row) -> Self {
        Self { attributes }
    }

    /// Value of one attribute
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Primary key, read from the given key column
    pub fn key(&self, primary_key: &str) -> Option<RecordId> {
        self.attributes.get(primary_key).and_then(RecordId::from_json)
    }

    /// Soft-delete timestamp, if the row is trashed
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.attributes.get(DELETED_AT))
    }

    /// Creation timestamp, if recorded
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.attributes.get(CREATED_AT))
    }

    /// Last-update timestamp, if recorded
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        timestamp(self.attributes.get(UPDATED_AT))
    }

    /// Whether the soft-delete marker is set
    pub fn is_trashed(&self) -> bool {
        matches!(self.attributes.get(DELETED_AT), Some(v) if !v.is_null())
    }

    /// All attributes
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Mutable attributes, for backends
    pub fn attributes_mut(&mut self) -> &mut Row {
        &mut self.attributes
    }

    /// Consume into the attribute map
    pub fn into_attributes(self) -> Row {
        self.attributes
    }

    /// Deserialize the attributes into a typed entity
    ///
    /// `operation` labels the error when the attributes do not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(
        &self,
        operation: RepositoryOperation,
    ) -> RepositoryResult<T> {
        serde_json::from_value(Value::Object(self.attributes.clone()))
            .map_err(|e| RepositoryError::serialization_error(operation, e.to_string()))
    }
}

impl From<Row> for Record {
    fn from(attributes: Row) -> Self {
        Self::new(attributes)
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build a [`Row`] from a JSON object literal
///
/// Non-object values produce an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
