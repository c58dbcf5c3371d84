//! Persistence backend trait
//!
//! [`TableBackend`] is the narrow interface the repository calls into. It uses
//! RPITIT (Return Position Impl Trait In Traits), available since Rust 1.75,
//! so implementations write plain `async fn`s without `async_trait`.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{Query, Record, RepositoryResult, TableBackend};
//!
//! impl TableBackend for AuditTable {
//!     fn table(&self) -> &TableHandle {
//!         &self.handle
//!     }
//!
//!     async fn select(&self, query: &Query) -> RepositoryResult<Vec<Record>> {
//!         // Render the query for the storage engine
//!         todo!()
//!     }
//!     // ... other methods
//! }
//! ```

use std::future::Future;

use super::error::RepositoryError;
use super::pagination::{PageRequest, Paginated};
use super::query::{Query, TableHandle};
use super::record::{Record, RecordId, Row};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Storage operations for one table
///
/// Queries arrive fully described: scope, conditions, ordering and limits are
/// all carried by the [`Query`] value. On tables that soft-delete,
/// implementations must honour the scope (`Default` hides rows whose
/// `deleted_at` is set, `OnlyTrashed` shows only those). They must not
/// swallow storage errors.
pub trait TableBackend: Send + Sync {
    /// Table name and entity capabilities
    fn table(&self) -> &TableHandle;

    /// Rows matching the query, projected to its select list
    fn select(&self, query: &Query) -> impl Future<Output = RepositoryResult<Vec<Record>>> + Send;

    /// Number of rows matching the query's scope and conditions
    fn count(&self, query: &Query) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Insert one row, filling the key and timestamps the table maintains
    ///
    /// Returns the stored row.
    fn insert(&self, row: Row) -> impl Future<Output = RepositoryResult<Record>> + Send;

    /// Insert rows as given, without timestamps or per-row hooks
    ///
    /// Either every row is stored or none is. Returns the number stored.
    fn insert_many(&self, rows: Vec<Row>) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Merge attributes into a non-trashed row
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` with `NotFound` kind if no such row exists.
    fn update(
        &self,
        id: &RecordId,
        row: Row,
    ) -> impl Future<Output = RepositoryResult<Record>> + Send;

    /// Delete every row matching the query
    ///
    /// Soft-deletes when the table supports it, removes the rows otherwise.
    /// Returns the number of rows affected.
    fn destroy(&self, query: &Query) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Permanently remove one row, trashed or not
    ///
    /// Returns `true` if a row was removed.
    fn force_delete(&self, id: &RecordId) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// Clear the soft-delete marker of one trashed row
    ///
    /// Returns `true` if the row was restored, `false` if missing or not trashed.
    fn restore(&self, id: &RecordId) -> impl Future<Output = RepositoryResult<bool>> + Send;

    /// One page of the query's results plus the total count
    ///
    /// The provided implementation counts without limit/offset, then selects
    /// the requested window.
    fn paginate(
        &self,
        query: &Query,
        request: &PageRequest,
    ) -> impl Future<Output = RepositoryResult<Paginated<Record>>> + Send {
        async move {
            let per_page = request.effective_per_page();
            let total = self.count(&query.clone().without_window()).await?;
            let window = query
                .clone()
                .without_window()
                .offset(request.offset())
                .limit(per_page);
            let items = self.select(&window).await?;

            Ok(Paginated {
                items,
                per_page,
                total,
                current_page: request.current_page(),
                page_name: request.page_name.clone(),
            })
        }
    }
}
