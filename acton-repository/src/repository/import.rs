//! Streaming import of delimited files
//!
//! A [`BatchReader`] pulls lines from a `csv::Reader` one at a time, maps each
//! one through a [`RowMapper`] and hands out batches of at most
//! [`ImportOptions::chunk_size`] rows. Only the batch being filled is held in
//! memory, so arbitrarily large files can be imported.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{BatchReader, ColumnMapping, ImportOptions, RowMapper};
//!
//! let data = "hello,1\nworld,2\nagain,3\n";
//! let mapper = RowMapper::Columns(ColumnMapping::new().column("content", 0_usize));
//! let options = ImportOptions { chunk_size: 2, ..Default::default() };
//!
//! let mut reader = BatchReader::from_reader(data.as_bytes(), mapper, &options).unwrap();
//! assert_eq!(reader.next_batch().unwrap().map(|b| b.len()), Some(2));
//! assert_eq!(reader.next_batch().unwrap().map(|b| b.len()), Some(1));
//! assert!(reader.next_batch().unwrap().is_none());
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{RepositoryError, RepositoryOperation};
use super::record::Row;
use super::traits::RepositoryResult;

/// Default field separator
pub const DEFAULT_SEPARATOR: char = ',';

/// Default number of rows per insert batch
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

// Upper bound on the up-front allocation for a batch
const MAX_PREALLOCATED_ROWS: usize = 4096;

/// Options controlling how a file is split into batches
///
/// Unknown keys are ignored when deserializing and missing keys take their
/// defaults, so a loose option map such as `{"chunkSize": 500}` is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Field separator, a single ASCII character
    pub separator: char,
    /// Rows per insert batch
    #[serde(alias = "chunkSize")]
    pub chunk_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ImportOptions {
    /// Read options from a loose JSON map; `null` yields the defaults
    pub fn from_value(value: Value) -> RepositoryResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| {
            RepositoryError::validation_failed(
                RepositoryOperation::Import,
                format!("invalid import options: {}", e),
            )
        })
    }

    /// Reject options the reader cannot honour
    pub fn validate(&self) -> RepositoryResult<()> {
        if !self.separator.is_ascii() {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Import,
                format!("separator '{}' is not a single-byte character", self.separator),
            ));
        }
        if self.chunk_size == 0 {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::Import,
                "chunk_size must be greater than zero",
            ));
        }
        Ok(())
    }

    fn delimiter(&self) -> u8 {
        // validate() guarantees an ASCII separator
        self.separator as u8
    }
}

/// Column of the source file, by position or by header name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceColumn {
    /// Zero-based position in the line
    Index(usize),
    /// Name in the header line
    Name(String),
}

impl From<usize> for SourceColumn {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for SourceColumn {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SourceColumn {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Ordered mapping from destination field to source column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<(String, SourceColumn)>,
}

impl ColumnMapping {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a destination field to a source column
    #[must_use]
    pub fn column(mut self, field: impl Into<String>, source: impl Into<SourceColumn>) -> Self {
        self.columns.push((field.into(), source.into()));
        self
    }

    /// The mapping entries in order
    pub fn entries(&self) -> &[(String, SourceColumn)] {
        &self.columns
    }

    /// Whether any source column is given by header name
    pub fn uses_names(&self) -> bool {
        self.columns
            .iter()
            .any(|(_, source)| matches!(source, SourceColumn::Name(_)))
    }

    fn resolve(&self, headers: Option<&StringRecord>) -> RepositoryResult<Vec<(String, usize)>> {
        self.columns
            .iter()
            .map(|(field, source)| {
                let index = match source {
                    SourceColumn::Index(index) => *index,
                    SourceColumn::Name(name) => headers
                        .and_then(|h| h.iter().position(|header| header.trim() == name.as_str()))
                        .ok_or_else(|| {
                            RepositoryError::malformed_row(
                                Some(1),
                                format!("header '{}' not found for field '{}'", name, field),
                            )
                        })?,
                };
                Ok((field.clone(), index))
            })
            .collect()
    }
}

impl<F, S> FromIterator<(F, S)> for ColumnMapping
where
    F: Into<String>,
    S: Into<SourceColumn>,
{
    fn from_iter<I: IntoIterator<Item = (F, S)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(field, source)| (field.into(), source.into()))
                .collect(),
        }
    }
}

type TransformFn = Box<dyn FnMut(&StringRecord) -> RepositoryResult<Row> + Send>;

/// Strategy turning one source line into one row
pub enum RowMapper {
    /// Copy mapped columns as strings
    Columns(ColumnMapping),
    /// Caller-supplied transform
    Transform(TransformFn),
}

impl RowMapper {
    /// Wrap a transform closure
    pub fn transform<F>(f: F) -> Self
    where
        F: FnMut(&StringRecord) -> RepositoryResult<Row> + Send + 'static,
    {
        Self::Transform(Box::new(f))
    }
}

impl From<ColumnMapping> for RowMapper {
    fn from(mapping: ColumnMapping) -> Self {
        Self::Columns(mapping)
    }
}

impl fmt::Debug for RowMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columns(mapping) => f.debug_tuple("Columns").field(mapping).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// Lazy batch producer over a delimited source
pub struct BatchReader<R> {
    reader: csv::Reader<R>,
    mapper: RowMapper,
    resolved: Vec<(String, usize)>,
    chunk_size: usize,
    record: StringRecord,
    rows_read: u64,
    finished: bool,
}

impl BatchReader<File> {
    /// Open a file for import
    ///
    /// Options are validated before the file is touched.
    pub fn open(
        path: impl AsRef<Path>,
        mapper: RowMapper,
        options: &ImportOptions,
    ) -> RepositoryResult<Self> {
        options.validate()?;
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            let mut error = RepositoryError::from(e);
            error.message = format!("cannot open '{}': {}", path.display(), error.message);
            error
        })?;
        Self::from_reader(file, mapper, options)
    }
}

impl<R: Read> BatchReader<R> {
    /// Read from any byte source
    pub fn from_reader(source: R, mapper: RowMapper, options: &ImportOptions) -> RepositoryResult<Self> {
        options.validate()?;

        let header_mode = matches!(&mapper, RowMapper::Columns(mapping) if mapping.uses_names());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter())
            .has_headers(header_mode)
            .flexible(true)
            .from_reader(source);

        let resolved = match &mapper {
            RowMapper::Columns(mapping) if header_mode => {
                let headers = reader.headers()?.clone();
                mapping.resolve(Some(&headers))?
            }
            RowMapper::Columns(mapping) => mapping.resolve(None)?,
            RowMapper::Transform(_) => Vec::new(),
        };

        Ok(Self {
            reader,
            mapper,
            resolved,
            chunk_size: options.chunk_size,
            record: StringRecord::new(),
            rows_read: 0,
            finished: false,
        })
    }

    /// Next batch of mapped rows, or `None` once the source is exhausted
    ///
    /// Every returned batch is non-empty; only the last may be shorter than
    /// the chunk size. After an error the reader yields no further batches.
    pub fn next_batch(&mut self) -> RepositoryResult<Option<Vec<Row>>> {
        if self.finished {
            return Ok(None);
        }
        match self.fill_batch() {
            Ok(batch) if batch.is_empty() => {
                self.finished = true;
                Ok(None)
            }
            Ok(batch) => Ok(Some(batch)),
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Number of source lines mapped so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn fill_batch(&mut self) -> RepositoryResult<Vec<Row>> {
        let mut batch = Vec::with_capacity(self.chunk_size.min(MAX_PREALLOCATED_ROWS));
        while batch.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                self.finished = true;
                break;
            }
            let row = map_record(&mut self.mapper, &self.resolved, &self.record)?;
            self.rows_read += 1;
            batch.push(row);
        }
        Ok(batch)
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = RepositoryResult<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

impl<R> fmt::Debug for BatchReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchReader")
            .field("mapper", &self.mapper)
            .field("chunk_size", &self.chunk_size)
            .field("rows_read", &self.rows_read)
            .field("finished", &self.finished)
            .finish()
    }
}

fn map_record(
    mapper: &mut RowMapper,
    resolved: &[(String, usize)],
    record: &StringRecord,
) -> RepositoryResult<Row> {
    let line = record.position().map(|p| p.line());
    match mapper {
        RowMapper::Transform(transform) => {
            transform(record).map_err(|e| e.with_operation(RepositoryOperation::Import))
        }
        RowMapper::Columns(_) => resolved
            .iter()
            .map(|(field, index)| {
                record
                    .get(*index)
                    .map(|cell| (field.clone(), Value::String(cell.to_string())))
                    .ok_or_else(|| {
                        RepositoryError::malformed_row(
                            line,
                            format!(
                                "column {} missing for field '{}' ({} columns in line)",
                                index,
                                field,
                                record.len()
                            ),
                        )
                    })
            })
            .collect(),
    }
}
