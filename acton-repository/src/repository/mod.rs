//! Generic table repository with soft-delete scopes
//!
//! This module provides a repository over any table reachable through a
//! [`TableBackend`]: scoped reads, loosely-typed filter descriptors, page-based
//! retrieval, CRUD, soft delete with per-record force-delete and restore, and
//! streaming import of delimited files in fixed-size batches.
//!
//! # Features
//!
//! - **Query context**: [`QueryContext`] keeps the trash [`Scope`] and hands out
//!   fresh [`Query`] values, never a shared builder
//! - **Filters**: [`Filter`] normalizes single triples, lists of triples and
//!   JSON descriptors through [`IntoFilter`]
//! - **Pagination**: [`PageRequest`] in, [`Paginated`] out
//! - **Import**: [`BatchReader`] streams a file through a [`RowMapper`] into
//!   bulk inserts
//! - **Backends**: [`MemoryTable`] in process, `PgTable` with the `database`
//!   feature
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{
//!     Columns, ColumnMapping, ImportOptions, MemoryTable, PageRequest, Repository,
//!     RowMapper, TableHandle,
//! };
//!
//! let messages = Repository::new(MemoryTable::new(TableHandle::new("messages")));
//!
//! let mapper = RowMapper::Columns(ColumnMapping::new().column("content", 0_usize));
//! let batches = messages
//!     .import_file("messages.csv", mapper, &ImportOptions::default())
//!     .await?;
//!
//! let page = messages.paginate(&PageRequest::new(20), Columns::All).await?;
//! println!("{} batches, {} pages", batches, page.last_page());
//! ```

mod base;
mod error;
mod filter;
mod import;
mod memory;
mod pagination;
#[cfg(feature = "database")]
mod postgres;
mod query;
mod record;
mod traits;

pub use base::Repository;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use filter::{Filter, FilterCondition, FilterOperator, FilterValue, IntoFilter};
pub use import::{
    BatchReader, ColumnMapping, ImportOptions, RowMapper, SourceColumn, DEFAULT_CHUNK_SIZE,
    DEFAULT_SEPARATOR,
};
pub use memory::MemoryTable;
pub use pagination::{OrderDirection, PageRequest, Paginated, DEFAULT_PAGE_NAME, DEFAULT_PER_PAGE};
#[cfg(feature = "database")]
pub use postgres::PgTable;
pub use query::{Query, QueryContext, Scope, TableHandle};
pub use record::{row, Columns, Ids, Record, RecordId, Row, CREATED_AT, DELETED_AT, UPDATED_AT};
pub use traits::{RepositoryResult, TableBackend};
