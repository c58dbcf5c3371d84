//! Generic table repository
//!
//! [`Repository`] owns a [`TableBackend`] and a [`QueryContext`]. Reads run in
//! the context's current scope; writes address rows according to their own
//! rules (`update`/`delete` see live rows, `force_delete*` sees every row,
//! `restore*` sees trashed rows only) regardless of the scope.
//!
//! # Example
//!
//! ```rust,ignore
//! use acton_repository::repository::{
//!     row, Columns, FilterCondition, MemoryTable, Repository, TableHandle,
//! };
//! use serde_json::json;
//!
//! let mut messages = Repository::new(MemoryTable::new(TableHandle::new("messages")));
//!
//! messages.create(row(json!({"content": "hello"}))).await?;
//! messages.delete(1_i64).await?;
//!
//! assert!(messages.find(1_i64, Columns::All).await?.is_none());
//! assert!(messages.only_trashed().find(1_i64, Columns::All).await?.is_some());
//!
//! let found = messages
//!     .new_query()
//!     .find_where(FilterCondition::eq("content", "hello"), Columns::All)
//!     .await?;
//! assert!(found.is_empty());
//! ```

use std::path::Path;

use tracing::{debug, info, warn};

use super::error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
use super::filter::{FilterCondition, FilterValue, IntoFilter};
use super::import::{BatchReader, ImportOptions, RowMapper};
use super::pagination::{OrderDirection, PageRequest, Paginated, DEFAULT_PER_PAGE};
use super::query::{Query, QueryContext, Scope};
use super::record::{Columns, Ids, Record, RecordId, Row};
use super::traits::{RepositoryResult, TableBackend};
use crate::config::Config;

/// Repository over one table
#[derive(Debug)]
pub struct Repository<B> {
    backend: B,
    context: QueryContext,
    per_page: u64,
}

impl<B: TableBackend> Repository<B> {
    /// Repository in the default scope with the default page size
    pub fn new(backend: B) -> Self {
        let context = QueryContext::new(backend.table().clone());
        Self {
            backend,
            context,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Repository using the configured default page size
    pub fn with_config(backend: B, config: &Config) -> Self {
        let mut repository = Self::new(backend);
        if config.repository.per_page > 0 {
            repository.per_page = config.repository.per_page;
        }
        repository
    }

    /// The storage backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Name of the table
    pub fn table_name(&self) -> &str {
        &self.context.table().name
    }

    /// Current trash scope
    pub fn scope(&self) -> Scope {
        self.context.scope()
    }

    /// Page size used when a request does not set one
    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Reset the scope to default
    pub fn new_query(&mut self) -> &mut Self {
        self.context.new_query();
        self
    }

    /// Include soft-deleted rows in subsequent reads
    pub fn with_trashed(&mut self) -> &mut Self {
        self.context.with_trashed();
        self
    }

    /// Only soft-deleted rows in subsequent reads
    pub fn only_trashed(&mut self) -> &mut Self {
        self.context.only_trashed();
        self
    }

    /// Fresh query in the current scope
    pub fn current_query(&self) -> Query {
        self.context.current_query()
    }

    /// Fresh query in the default scope, independent of the context
    pub fn builder(&self) -> Query {
        self.context.unscoped_query()
    }

    /// Every row visible in the current scope
    pub async fn all(&self, columns: impl Into<Columns>) -> RepositoryResult<Vec<Record>> {
        self.backend
            .select(&self.current_query().select(columns.into()))
            .await
    }

    /// Row with the given key, if visible in the current scope
    pub async fn find(
        &self,
        id: impl Into<RecordId>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Option<Record>> {
        let ids = Ids::from(id.into());
        let query = self
            .current_query()
            .select(columns.into())
            .where_key(&ids)
            .limit(1);
        Ok(self.backend.select(&query).await?.into_iter().next())
    }

    /// Rows with any of the given keys; missing keys are skipped
    pub async fn find_many(
        &self,
        ids: impl Into<Ids>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let ids = ids.into();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.current_query().select(columns.into()).where_key(&ids);
        self.backend.select(&query).await
    }

    /// First row matching the filter
    pub async fn find_first(
        &self,
        filter: impl IntoFilter,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Option<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?)
            .limit(1);
        Ok(self.backend.select(&query).await?.into_iter().next())
    }

    /// Rows matching the filter
    pub async fn find_where(
        &self,
        filter: impl IntoFilter,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?);
        self.backend.select(&query).await
    }

    /// At most `limit` rows matching the filter; `None` uses the page size
    pub async fn find_where_limit(
        &self,
        filter: impl IntoFilter,
        limit: Option<u64>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?)
            .limit(limit.unwrap_or(self.per_page));
        self.backend.select(&query).await
    }

    /// Rows whose field equals the value
    pub async fn find_by_field(
        &self,
        field: impl Into<String>,
        value: impl Into<FilterValue>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        self.find_where(FilterCondition::eq(field, value), columns)
            .await
    }

    /// Rows whose field is one of the values
    pub async fn find_where_in<V: Into<FilterValue>>(
        &self,
        field: impl Into<String>,
        values: Vec<V>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let values = values.into_iter().map(Into::into).collect();
        let query = self
            .current_query()
            .select(columns.into())
            .where_in(field, values);
        self.backend.select(&query).await
    }

    /// Rows whose field is none of the values
    pub async fn find_where_not_in<V: Into<FilterValue>>(
        &self,
        field: impl Into<String>,
        values: Vec<V>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let values = values.into_iter().map(Into::into).collect();
        let query = self
            .current_query()
            .select(columns.into())
            .where_not_in(field, values);
        self.backend.select(&query).await
    }

    /// Rows whose field lies in `[low, high]`
    pub async fn find_where_between(
        &self,
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .where_between(field, low, high);
        self.backend.select(&query).await
    }

    /// Rows whose field lies outside `[low, high]`
    pub async fn find_where_not_between(
        &self,
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .where_not_between(field, low, high);
        self.backend.select(&query).await
    }

    /// Rows matching the filter, sorted by one field
    pub async fn find_order_by(
        &self,
        filter: impl IntoFilter,
        field: impl Into<String>,
        direction: OrderDirection,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Vec<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?)
            .order_by(field, direction);
        self.backend.select(&query).await
    }

    /// First row matching the filter in the given order
    pub async fn find_order_by_first(
        &self,
        filter: impl IntoFilter,
        field: impl Into<String>,
        direction: OrderDirection,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Option<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?)
            .order_by(field, direction)
            .limit(1);
        Ok(self.backend.select(&query).await?.into_iter().next())
    }

    /// One page of the rows visible in the current scope
    pub async fn paginate(
        &self,
        request: &PageRequest,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Paginated<Record>> {
        let query = self.current_query().select(columns.into());
        self.backend.paginate(&query, &self.page_request(request)).await
    }

    /// One page of the rows matching the filter
    pub async fn find_where_paginate(
        &self,
        filter: impl IntoFilter,
        request: &PageRequest,
        columns: impl Into<Columns>,
    ) -> RepositoryResult<Paginated<Record>> {
        let query = self
            .current_query()
            .select(columns.into())
            .filter(filter.into_filter()?);
        self.backend.paginate(&query, &self.page_request(request)).await
    }

    /// Insert one row, returning it with its key and timestamps
    pub async fn create(&self, row: Row) -> RepositoryResult<Record> {
        let record = self.backend.insert(row).await?;
        debug!(
            table = %self.table_name(),
            id = ?record.key(&self.context.table().primary_key),
            "Created record"
        );
        Ok(record)
    }

    /// Bulk insert rows as given, without timestamps
    pub async fn create_many(&self, rows: Vec<Row>) -> RepositoryResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let inserted = self.backend.insert_many(rows).await?;
        debug!(table = %self.table_name(), inserted, "Bulk inserted records");
        Ok(inserted)
    }

    /// Merge attributes into a live row
    ///
    /// # Errors
    ///
    /// `NotFound` if no live row has the key.
    pub async fn update(&self, row: Row, id: impl Into<RecordId>) -> RepositoryResult<Record> {
        let id = id.into();
        let record = self.backend.update(&id, row).await?;
        debug!(table = %self.table_name(), %id, "Updated record");
        Ok(record)
    }

    /// Update the first live row matching `condition`, or insert one
    ///
    /// The inserted row is `condition` overlaid with `row`.
    pub async fn update_or_create(&self, row: Row, condition: Row) -> RepositoryResult<Record> {
        if condition.is_empty() {
            return Err(RepositoryError::validation_failed(
                RepositoryOperation::UpdateOrCreate,
                "condition must name at least one field",
            ));
        }

        let primary_key = self.context.table().primary_key.clone();
        let query = condition
            .iter()
            .fold(self.builder(), |query, (field, value)| {
                query.where_condition(FilterCondition::eq(field.clone(), value))
            })
            .limit(1);

        let existing = self.backend.select(&query).await?.into_iter().next();
        match existing.and_then(|record| record.key(&primary_key)) {
            Some(id) => {
                let record = self.backend.update(&id, row).await?;
                debug!(table = %self.table_name(), %id, "Updated matching record");
                Ok(record)
            }
            None => {
                let mut attributes = condition;
                attributes.extend(row);
                self.create(attributes).await
            }
        }
    }

    /// Delete live rows by key; soft when the table supports it
    pub async fn delete(&self, ids: impl Into<Ids>) -> RepositoryResult<u64> {
        let ids = ids.into();
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = self.backend.destroy(&self.builder().where_key(&ids)).await?;
        info!(table = %self.table_name(), deleted, "Deleted records by key");
        Ok(deleted)
    }

    /// Delete live rows matching the filter
    pub async fn delete_where(&self, filter: impl IntoFilter) -> RepositoryResult<u64> {
        let query = self.builder().filter(filter.into_filter()?);
        let deleted = self.backend.destroy(&query).await?;
        info!(table = %self.table_name(), deleted, "Deleted records by filter");
        Ok(deleted)
    }

    /// Permanently remove rows by key, trashed or not
    ///
    /// Returns the number of rows actually removed. On failure the error
    /// carries the number removed before it in `affected`.
    pub async fn force_delete(&self, ids: impl Into<Ids>) -> RepositoryResult<u64> {
        let ids = ids.into();
        if ids.is_empty() {
            return Ok(0);
        }
        let query = self.builder().with_scope(Scope::WithTrashed).where_key(&ids);
        self.force_delete_each(query).await
    }

    /// Permanently remove every row matching the filter, trashed or not
    pub async fn force_delete_where(&self, filter: impl IntoFilter) -> RepositoryResult<u64> {
        let query = self
            .builder()
            .with_scope(Scope::WithTrashed)
            .filter(filter.into_filter()?);
        self.force_delete_each(query).await
    }

    /// Restore trashed rows by key
    ///
    /// Returns the number of rows actually restored. On failure the error
    /// carries the number restored before it in `affected`.
    pub async fn restore(&self, ids: impl Into<Ids>) -> RepositoryResult<u64> {
        let ids = ids.into();
        if ids.is_empty() {
            return Ok(0);
        }
        let query = self.builder().with_scope(Scope::OnlyTrashed).where_key(&ids);
        self.restore_each(query).await
    }

    /// Restore every trashed row matching the filter
    pub async fn restore_where(&self, filter: impl IntoFilter) -> RepositoryResult<u64> {
        let query = self
            .builder()
            .with_scope(Scope::OnlyTrashed)
            .filter(filter.into_filter()?);
        self.restore_each(query).await
    }

    /// Stream a delimited file into the table in batches
    ///
    /// Each batch is bulk inserted as soon as it is read. Returns the number
    /// of batches inserted. Batches inserted before a failure stay in place;
    /// the error carries their count in `affected`.
    ///
    /// Opening the file and reading each batch run on the blocking thread
    /// pool, so only one batch is held in memory at a time.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        mapper: RowMapper,
        options: &ImportOptions,
    ) -> RepositoryResult<usize> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();
        let open_options = options.clone();
        let mut reader =
            read_blocking(move || BatchReader::open(&open_path, mapper, &open_options)).await?;
        let mut batches = 0_usize;

        loop {
            let (returned, next) = read_blocking(move || {
                let next = reader.next_batch();
                Ok((reader, next))
            })
            .await
            .map_err(|e| e.with_affected(batches as u64))?;
            reader = returned;

            let batch = match next {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    warn!(table = %self.table_name(), batches, error = %e, "Import aborted");
                    return Err(e.with_affected(batches as u64));
                }
            };

            let rows = batch.len();
            if let Err(e) = self.backend.insert_many(batch).await {
                warn!(table = %self.table_name(), batches, error = %e, "Import aborted");
                return Err(e.with_affected(batches as u64));
            }
            batches += 1;
            debug!(table = %self.table_name(), batch = batches, rows, "Imported batch");
        }

        info!(
            table = %self.table_name(),
            path = %path.display(),
            batches,
            rows = reader.rows_read(),
            "Import completed"
        );
        Ok(batches)
    }

    fn page_request(&self, request: &PageRequest) -> PageRequest {
        if request.per_page == 0 {
            PageRequest {
                per_page: self.per_page,
                ..request.clone()
            }
        } else {
            request.clone()
        }
    }

    async fn keys_of(&self, query: Query) -> RepositoryResult<Vec<RecordId>> {
        let primary_key = self.context.table().primary_key.clone();
        let records = self
            .backend
            .select(&query.select(Columns::only([primary_key.clone()])))
            .await?;
        Ok(records
            .iter()
            .filter_map(|record| record.key(&primary_key))
            .collect())
    }

    async fn force_delete_each(&self, query: Query) -> RepositoryResult<u64> {
        let mut removed = 0;
        for id in self.keys_of(query).await? {
            match self.backend.force_delete(&id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(table = %self.table_name(), %id, removed, error = %e, "Force delete aborted");
                    return Err(e.with_affected(removed));
                }
            }
        }
        info!(table = %self.table_name(), removed, "Force deleted records");
        Ok(removed)
    }

    async fn restore_each(&self, query: Query) -> RepositoryResult<u64> {
        let mut restored = 0;
        for id in self.keys_of(query).await? {
            match self.backend.restore(&id).await {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(table = %self.table_name(), %id, restored, error = %e, "Restore aborted");
                    return Err(e.with_affected(restored));
                }
            }
        }
        info!(table = %self.table_name(), restored, "Restored records");
        Ok(restored)
    }
}

async fn read_blocking<T, F>(task: F) -> RepositoryResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> RepositoryResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.map_err(|e| {
        RepositoryError::new(
            RepositoryOperation::Import,
            RepositoryErrorKind::Io,
            format!("import reader task failed: {}", e),
        )
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryTable;
    use crate::repository::query::TableHandle;
    use crate::repository::record::row;
    use serde_json::{json, Value};

    async fn seeded() -> Repository<MemoryTable> {
        let repository = Repository::new(MemoryTable::new(TableHandle::new("messages")));
        for (content, votes) in [("alpha", 5), ("beta", 1), ("gamma", 3), ("delta", 8)] {
            repository
                .create(row(json!({"content": content, "votes": votes})))
                .await
                .unwrap();
        }
        repository
    }

    // Memory table whose force_delete/restore fail or report a miss on
    // chosen keys, recording every key it was asked about.
    struct FlakyTable {
        inner: MemoryTable,
        fail_on: Option<RecordId>,
        skip: Option<RecordId>,
        touched: std::sync::Mutex<Vec<RecordId>>,
    }

    impl FlakyTable {
        fn new(fail_on: Option<i64>, skip: Option<i64>) -> Self {
            Self {
                inner: MemoryTable::new(TableHandle::new("messages")),
                fail_on: fail_on.map(RecordId::from),
                skip: skip.map(RecordId::from),
                touched: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn touch(&self, id: &RecordId) -> RepositoryResult<Option<bool>> {
            self.touched.lock().unwrap().push(id.clone());
            if self.fail_on.as_ref() == Some(id) {
                return Err(RepositoryError::connection_failed("connection reset"));
            }
            if self.skip.as_ref() == Some(id) {
                return Ok(Some(false));
            }
            Ok(None)
        }

        fn touched(&self) -> Vec<RecordId> {
            self.touched.lock().unwrap().clone()
        }
    }

    impl TableBackend for FlakyTable {
        fn table(&self) -> &TableHandle {
            self.inner.table()
        }

        async fn select(&self, query: &Query) -> RepositoryResult<Vec<Record>> {
            self.inner.select(query).await
        }

        async fn count(&self, query: &Query) -> RepositoryResult<u64> {
            self.inner.count(query).await
        }

        async fn insert(&self, row: Row) -> RepositoryResult<Record> {
            self.inner.insert(row).await
        }

        async fn insert_many(&self, rows: Vec<Row>) -> RepositoryResult<u64> {
            self.inner.insert_many(rows).await
        }

        async fn update(&self, id: &RecordId, row: Row) -> RepositoryResult<Record> {
            self.inner.update(id, row).await
        }

        async fn destroy(&self, query: &Query) -> RepositoryResult<u64> {
            self.inner.destroy(query).await
        }

        async fn force_delete(&self, id: &RecordId) -> RepositoryResult<bool> {
            if let Some(done) = self.touch(id)? {
                return Ok(done);
            }
            self.inner.force_delete(id).await
        }

        async fn restore(&self, id: &RecordId) -> RepositoryResult<bool> {
            if let Some(done) = self.touch(id)? {
                return Ok(done);
            }
            self.inner.restore(id).await
        }
    }

    async fn flaky(fail_on: Option<i64>, skip: Option<i64>) -> Repository<FlakyTable> {
        let repository = Repository::new(FlakyTable::new(fail_on, skip));
        for content in ["alpha", "beta", "gamma", "delta"] {
            repository
                .create(row(json!({"content": content})))
                .await
                .unwrap();
        }
        repository
    }

    fn keys(ids: &[i64]) -> Vec<RecordId> {
        ids.iter().copied().map(RecordId::from).collect()
    }

    async fn stored_keys(repository: &Repository<FlakyTable>) -> Vec<RecordId> {
        repository
            .backend()
            .inner
            .rows()
            .await
            .iter()
            .filter_map(|r| r.get("id").and_then(RecordId::from_json))
            .collect()
    }

    fn contents(records: &[Record]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.get("content").and_then(Value::as_str).map(String::from))
            .collect()
    }

    #[tokio::test]
    async fn test_find_and_find_many() {
        let repository = seeded().await;

        let record = repository.find(2_i64, Columns::All).await.unwrap().unwrap();
        assert_eq!(record.get("content"), Some(&json!("beta")));
        assert!(repository.find(99_i64, Columns::All).await.unwrap().is_none());

        let records = repository
            .find_many(vec![1_i64, 3, 99], ["content"])
            .await
            .unwrap();
        assert_eq!(contents(&records), vec!["alpha", "gamma"]);
        assert!(records[0].get("votes").is_none());

        assert!(repository
            .find_many(Vec::<i64>::new(), Columns::All)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_finders() {
        let repository = seeded().await;

        let first = repository
            .find_first(FilterCondition::gt("votes", 2_i64), Columns::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.get("content"), Some(&json!("alpha")));

        let limited = repository
            .find_where_limit(FilterCondition::gte("votes", 1_i64), Some(2), Columns::All)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        let by_field = repository
            .find_by_field("content", "delta", Columns::All)
            .await
            .unwrap();
        assert_eq!(by_field.len(), 1);

        let within = repository
            .find_where_in("votes", vec![1_i64, 8], Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&within), vec!["beta", "delta"]);

        let outside = repository
            .find_where_not_in("votes", vec![1_i64, 8], Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&outside), vec!["alpha", "gamma"]);

        let between = repository
            .find_where_between("votes", 3_i64, 5_i64, Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&between), vec!["alpha", "gamma"]);

        let not_between = repository
            .find_where_not_between("votes", 3_i64, 5_i64, Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&not_between), vec!["beta", "delta"]);
    }

    #[tokio::test]
    async fn test_json_descriptors() {
        let repository = seeded().await;

        let records = repository
            .find_where(&json!(["content", "like", "%ta"]), Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&records), vec!["beta", "delta"]);

        let records = repository
            .find_where(
                &json!([["content", "like", "%ta"], ["votes", ">", 4]]),
                Columns::All,
            )
            .await
            .unwrap();
        assert_eq!(contents(&records), vec!["delta"]);

        let err = repository
            .find_where(&json!([]), Columns::All)
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::MalformedFilter);
    }

    #[tokio::test]
    async fn test_null_descriptors_match_null_columns() {
        let repository = Repository::new(MemoryTable::new(TableHandle::new("messages")));
        repository
            .create(row(json!({"content": "root", "parent_id": null})))
            .await
            .unwrap();
        repository
            .create(row(json!({"content": "reply", "parent_id": 1})))
            .await
            .unwrap();

        let roots = repository
            .find_by_field("parent_id", Value::Null, Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&roots), vec!["root"]);

        let roots = repository
            .find_where(&json!(["parent_id", null]), Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&roots), vec!["root"]);

        let replies = repository
            .find_where(&json!(["parent_id", "!=", null]), Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&replies), vec!["reply"]);

        let replies = repository
            .find_where(FilterCondition::ne("parent_id", FilterValue::Null), Columns::All)
            .await
            .unwrap();
        assert_eq!(contents(&replies), vec!["reply"]);
    }

    #[tokio::test]
    async fn test_order_by() {
        let repository = seeded().await;

        let ordered = repository
            .find_order_by(
                FilterCondition::is_not_null("content"),
                "votes",
                OrderDirection::Descending,
                Columns::All,
            )
            .await
            .unwrap();
        assert_eq!(contents(&ordered), vec!["delta", "alpha", "gamma", "beta"]);

        let lowest = repository
            .find_order_by_first(
                FilterCondition::is_not_null("content"),
                "votes",
                OrderDirection::Ascending,
                Columns::All,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lowest.get("content"), Some(&json!("beta")));
    }

    #[tokio::test]
    async fn test_paginate_uses_repository_page_size() {
        let repository = seeded().await;

        let page = repository
            .paginate(&PageRequest::new(0), Columns::All)
            .await
            .unwrap();
        assert_eq!(page.per_page, DEFAULT_PER_PAGE);
        assert_eq!(page.items.len(), 4);

        let page = repository
            .find_where_paginate(
                FilterCondition::gt("votes", 1_i64),
                &PageRequest::new(2).page(2).page_name("messages"),
                Columns::All,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page_name, "messages");
    }

    #[tokio::test]
    async fn test_update_and_update_or_create() {
        let repository = seeded().await;

        let updated = repository
            .update(row(json!({"votes": 10})), 1_i64)
            .await
            .unwrap();
        assert_eq!(updated.get("votes"), Some(&json!(10)));
        assert_eq!(updated.get("content"), Some(&json!("alpha")));

        let err = repository
            .update(row(json!({"votes": 10})), 42_i64)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let matched = repository
            .update_or_create(row(json!({"votes": 0})), row(json!({"content": "beta"})))
            .await
            .unwrap();
        assert_eq!(matched.key("id"), Some(RecordId::Integer(2)));
        assert_eq!(matched.get("votes"), Some(&json!(0)));

        let created = repository
            .update_or_create(row(json!({"votes": 7})), row(json!({"content": "epsilon"})))
            .await
            .unwrap();
        assert_eq!(created.key("id"), Some(RecordId::Integer(5)));
        assert_eq!(created.get("content"), Some(&json!("epsilon")));
        assert_eq!(created.get("votes"), Some(&json!(7)));

        let err = repository
            .update_or_create(row(json!({"votes": 7})), Row::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_delete_where_then_restore_where() {
        let mut repository = seeded().await;

        let deleted = repository
            .delete_where(FilterCondition::lt("votes", 4_i64))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(repository.all(Columns::All).await.unwrap().len(), 2);
        assert_eq!(
            repository.with_trashed().all(Columns::All).await.unwrap().len(),
            4
        );
        repository.new_query();

        let restored = repository
            .restore_where(FilterCondition::eq("content", "beta"))
            .await
            .unwrap();
        assert_eq!(restored, 1);
        assert_eq!(repository.all(Columns::All).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mutations_ignore_context_scope() {
        let mut repository = seeded().await;
        repository.delete(1_i64).await.unwrap();

        repository.only_trashed();
        // delete only sees live rows even while reads are scoped to trash
        assert_eq!(repository.delete(1_i64).await.unwrap(), 0);
        assert_eq!(repository.delete(2_i64).await.unwrap(), 1);
        assert_eq!(repository.all(Columns::All).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_force_delete_covers_trashed_rows() {
        let repository = seeded().await;
        repository.delete(vec![1_i64, 2]).await.unwrap();

        let removed = repository.force_delete(vec![1_i64, 3, 99]).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repository.backend().len().await, 2);
    }

    #[tokio::test]
    async fn test_create_many_skips_timestamps() {
        let repository = seeded().await;
        let inserted = repository
            .create_many(vec![
                row(json!({"content": "x"})),
                row(json!({"content": "y"})),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(repository.create_many(Vec::new()).await.unwrap(), 0);

        let bulk = repository
            .find_by_field("content", "x", Columns::All)
            .await
            .unwrap();
        assert!(bulk[0].created_at().is_none());
    }

    #[tokio::test]
    async fn test_with_config_page_size() {
        let mut config = Config::default();
        config.repository.per_page = 3;
        let repository =
            Repository::with_config(MemoryTable::new(TableHandle::new("messages")), &config);
        assert_eq!(repository.per_page(), 3);
        assert_eq!(repository.table_name(), "messages");
    }

    #[tokio::test]
    async fn test_force_delete_stops_at_first_failure() {
        let repository = flaky(Some(3), None).await;

        let err = repository
            .force_delete(vec![1_i64, 2, 3, 4])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ConnectionFailed);
        assert_eq!(err.affected, Some(2));
        assert_eq!(repository.backend().touched(), keys(&[1, 2, 3]));

        assert_eq!(stored_keys(&repository).await, keys(&[3, 4]));
    }

    #[tokio::test]
    async fn test_restore_stops_at_first_failure() {
        let repository = flaky(Some(2), None).await;
        repository.delete(vec![1_i64, 2, 3]).await.unwrap();

        let err = repository
            .restore_where(FilterCondition::is_not_null("content"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ConnectionFailed);
        assert_eq!(err.affected, Some(1));
        assert_eq!(repository.backend().touched(), keys(&[1, 2]));

        let live = repository.all(Columns::All).await.unwrap();
        assert_eq!(contents(&live), vec!["alpha", "delta"]);
    }

    #[tokio::test]
    async fn test_per_record_misses_are_not_counted() {
        let repository = flaky(None, Some(2)).await;

        let removed = repository.force_delete(vec![1_i64, 2, 3]).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repository.backend().touched(), keys(&[1, 2, 3]));
        assert_eq!(stored_keys(&repository).await, keys(&[2, 4]));
    }
}
