//! # acton-repository
//!
//! Generic table repository with soft-delete scopes, loosely-typed filter
//! descriptors, page-based retrieval and streaming import of delimited files.
//!
//! ## Features
//!
//! - **Scoped reads**: default, with-trashed and only-trashed views of a table
//! - **Filter descriptors**: single triples, lists of triples or JSON, all
//!   normalized to one [`repository::Filter`] type
//! - **Soft delete**: delete, per-record force delete and restore with exact counts
//! - **Batch import**: CSV files streamed into bounded insert batches
//! - **Backends**: in-memory table, PostgreSQL via `sqlx` (`database` feature)
//! - **Ambient stack**: Figment configuration, JSON `tracing` output
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_repository::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!
//!     // Initialize tracing
//!     init_tracing(&config)?;
//!
//!     let mut messages = Repository::with_config(
//!         MemoryTable::new(TableHandle::new("messages")),
//!         &config,
//!     );
//!
//!     messages.create(row(json!({"content": "hello"}))).await?;
//!     messages.delete(1_i64).await?;
//!
//!     let trashed = messages.only_trashed().all(Columns::All).await?;
//!     assert_eq!(trashed.len(), 1);
//!
//!     messages.new_query().restore(1_i64).await?;
//!
//!     let mapper = RowMapper::Columns(ColumnMapping::new().column("content", 0_usize));
//!     let batches = messages
//!         .import_file("messages.csv", mapper, &config.import)
//!         .await?;
//!     println!("imported {} batches", batches);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod error;
pub mod observability;
pub mod repository;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, RepositoryConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observability::init_tracing;

    pub use crate::repository::{
        row, BatchReader, ColumnMapping, Columns, Filter, FilterCondition, FilterOperator,
        FilterValue, Ids, ImportOptions, IntoFilter, MemoryTable, OrderDirection, PageRequest,
        Paginated, Query, QueryContext, Record, RecordId, Repository, RepositoryError,
        RepositoryErrorKind, RepositoryOperation, RepositoryResult, Row, RowMapper, Scope,
        SourceColumn, TableBackend, TableHandle,
    };

    #[cfg(feature = "database")]
    pub use crate::database::create_pool;

    #[cfg(feature = "database")]
    pub use crate::repository::PgTable;
}
