//! In-process table backend
//!
//! [`MemoryTable`] keeps rows in insertion order behind a `tokio` lock and
//! evaluates queries the way a SQL engine would: NULL never compares equal,
//! `LIKE` is case-sensitive with `%`/`_` wildcards, and `BETWEEN` is inclusive.
//! Integer keys are assigned from an auto-increment counter when a row does not
//! carry one.

use std::cmp::Ordering;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::error::{RepositoryError, RepositoryOperation};
use super::filter::{FilterCondition, FilterOperator, FilterValue};
use super::pagination::OrderDirection;
use super::query::{Query, Scope, TableHandle};
use super::record::{Record, RecordId, Row, CREATED_AT, DELETED_AT, UPDATED_AT};
use super::traits::{RepositoryResult, TableBackend};

static NULL: Value = Value::Null;

/// Table stored in memory
#[derive(Debug)]
pub struct MemoryTable {
    handle: TableHandle,
    unique: Vec<String>,
    state: RwLock<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    rows: Vec<Row>,
    next_id: i64,
}

impl MemoryTable {
    /// Empty table
    pub fn new(handle: TableHandle) -> Self {
        Self {
            handle,
            unique: Vec::new(),
            state: RwLock::new(MemoryState {
                rows: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Enforce uniqueness of a column on insert and update
    #[must_use]
    pub fn unique(mut self, column: impl Into<String>) -> Self {
        self.unique.push(column.into());
        self
    }

    /// Copy of every stored row, trashed or not
    pub async fn rows(&self) -> Vec<Row> {
        self.state.read().await.rows.clone()
    }

    /// Number of stored rows, trashed or not
    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    /// Whether the table holds no rows at all
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.rows.is_empty()
    }

    fn key_of(&self, row: &Row) -> Option<RecordId> {
        row.get(&self.handle.primary_key).and_then(RecordId::from_json)
    }

    fn is_trashed(&self, row: &Row) -> bool {
        self.handle.soft_deletes && is_trashed(row)
    }

    fn in_scope(&self, scope: Scope, row: &Row) -> bool {
        match scope {
            Scope::Default => !self.is_trashed(row),
            Scope::WithTrashed => true,
            Scope::OnlyTrashed => self.is_trashed(row),
        }
    }

    fn matching<'a>(&self, rows: &'a [Row], query: &Query) -> Vec<&'a Row> {
        rows.iter()
            .filter(|row| self.in_scope(query.scope(), row))
            .filter(|row| query.conditions().iter().all(|c| satisfies(c, row)))
            .collect()
    }

    /// Assign a key if missing and check key/unique constraints against the
    /// stored rows plus rows accepted earlier in the same batch.
    fn admit(
        &self,
        state: &mut MemoryState,
        mut row: Row,
        pending: &[Row],
        operation: RepositoryOperation,
    ) -> RepositoryResult<Row> {
        let id = match self.key_of(&row) {
            Some(id) => {
                if let RecordId::Integer(i) = id {
                    state.next_id = state.next_id.max(i.saturating_add(1));
                }
                id
            }
            None => {
                let id = state.next_id;
                row.insert(self.handle.primary_key.clone(), Value::from(id));
                state.next_id = id.saturating_add(1);
                RecordId::Integer(id)
            }
        };

        let taken = state
            .rows
            .iter()
            .chain(pending)
            .any(|other| self.key_of(other).as_ref() == Some(&id));
        if taken {
            return Err(RepositoryError::already_exists(&self.handle.name, id.to_string())
                .with_operation(operation));
        }

        self.check_unique(state.rows.iter().chain(pending), &row, None, operation)?;
        Ok(row)
    }

    fn check_unique<'a>(
        &self,
        existing: impl Iterator<Item = &'a Row>,
        row: &Row,
        skip: Option<&RecordId>,
        operation: RepositoryOperation,
    ) -> RepositoryResult<()> {
        if self.unique.is_empty() {
            return Ok(());
        }
        for other in existing {
            if skip.is_some() && self.key_of(other).as_ref() == skip {
                continue;
            }
            for column in &self.unique {
                match (row.get(column), other.get(column)) {
                    (Some(a), Some(b)) if !a.is_null() && a == b => {
                        return Err(RepositoryError::constraint_violation(
                            operation,
                            format!(
                                "duplicate value {} for unique column '{}' on '{}'",
                                a, column, self.handle.name
                            ),
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl TableBackend for MemoryTable {
    fn table(&self) -> &TableHandle {
        &self.handle
    }

    async fn select(&self, query: &Query) -> RepositoryResult<Vec<Record>> {
        let state = self.state.read().await;
        let mut rows = self.matching(&state.rows, query);

        if !query.orders().is_empty() {
            rows.sort_by(|a, b| {
                query
                    .orders()
                    .iter()
                    .map(|(field, direction)| {
                        let ordering = compare_json(
                            a.get(field).unwrap_or(&NULL),
                            b.get(field).unwrap_or(&NULL),
                        );
                        match direction {
                            OrderDirection::Ascending => ordering,
                            OrderDirection::Descending => ordering.reverse(),
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let skip = query.offset_value().unwrap_or(0) as usize;
        let take = query.limit_value().map_or(usize::MAX, |l| l as usize);

        Ok(rows
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| Record::new(query.columns().project(row)))
            .collect())
    }

    async fn count(&self, query: &Query) -> RepositoryResult<u64> {
        let state = self.state.read().await;
        Ok(self.matching(&state.rows, query).len() as u64)
    }

    async fn insert(&self, mut row: Row) -> RepositoryResult<Record> {
        if self.handle.timestamps {
            let now = Value::String(Utc::now().to_rfc3339());
            row.entry(CREATED_AT).or_insert_with(|| now.clone());
            row.entry(UPDATED_AT).or_insert(now);
        }

        let mut state = self.state.write().await;
        let row = self.admit(&mut state, row, &[], RepositoryOperation::Create)?;
        state.rows.push(row.clone());
        Ok(Record::new(row))
    }

    async fn insert_many(&self, rows: Vec<Row>) -> RepositoryResult<u64> {
        let mut state = self.state.write().await;
        let mut accepted = Vec::with_capacity(rows.len());
        for row in rows {
            let row = self.admit(&mut state, row, &accepted, RepositoryOperation::CreateMany)?;
            accepted.push(row);
        }

        let inserted = accepted.len() as u64;
        state.rows.extend(accepted);
        Ok(inserted)
    }

    async fn update(&self, id: &RecordId, changes: Row) -> RepositoryResult<Record> {
        let mut state = self.state.write().await;
        let position = state
            .rows
            .iter()
            .position(|row| self.key_of(row).as_ref() == Some(id) && !self.is_trashed(row))
            .ok_or_else(|| {
                RepositoryError::not_found(&self.handle.name, id.to_string())
                    .with_operation(RepositoryOperation::Update)
            })?;

        let mut updated = state.rows[position].clone();
        updated.extend(changes);
        if self.handle.timestamps {
            updated.insert(UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        self.check_unique(state.rows.iter(), &updated, Some(id), RepositoryOperation::Update)?;

        state.rows[position] = updated.clone();
        Ok(Record::new(updated))
    }

    async fn destroy(&self, query: &Query) -> RepositoryResult<u64> {
        let mut state = self.state.write().await;
        let targets: Vec<RecordId> = self
            .matching(&state.rows, query)
            .into_iter()
            .filter_map(|row| self.key_of(row))
            .collect();

        if self.handle.soft_deletes {
            let now = Value::String(Utc::now().to_rfc3339());
            let mut affected = 0;
            for row in state.rows.iter_mut() {
                let hit = self.key_of(row).is_some_and(|id| targets.contains(&id));
                if hit && !is_trashed(row) {
                    row.insert(DELETED_AT.to_string(), now.clone());
                    if self.handle.timestamps {
                        row.insert(UPDATED_AT.to_string(), now.clone());
                    }
                    affected += 1;
                }
            }
            Ok(affected)
        } else {
            let before = state.rows.len();
            state
                .rows
                .retain(|row| !self.key_of(row).is_some_and(|id| targets.contains(&id)));
            Ok((before - state.rows.len()) as u64)
        }
    }

    async fn force_delete(&self, id: &RecordId) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let before = state.rows.len();
        state.rows.retain(|row| self.key_of(row).as_ref() != Some(id));
        Ok(state.rows.len() < before)
    }

    async fn restore(&self, id: &RecordId) -> RepositoryResult<bool> {
        if !self.handle.soft_deletes {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        let Some(row) = state
            .rows
            .iter_mut()
            .find(|row| self.key_of(row).as_ref() == Some(id) && is_trashed(row))
        else {
            return Ok(false);
        };

        row.insert(DELETED_AT.to_string(), Value::Null);
        if self.handle.timestamps {
            row.insert(UPDATED_AT.to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        Ok(true)
    }
}

fn is_trashed(row: &Row) -> bool {
    matches!(row.get(DELETED_AT), Some(v) if !v.is_null())
}

fn satisfies(condition: &FilterCondition, row: &Row) -> bool {
    let value = row.get(&condition.field).unwrap_or(&NULL);
    match condition.operator {
        FilterOperator::IsNull => value.is_null(),
        FilterOperator::IsNotNull => !value.is_null(),
        FilterOperator::Equal => compare(value, &condition.value) == Some(Ordering::Equal),
        FilterOperator::NotEqual => {
            matches!(compare(value, &condition.value), Some(o) if o != Ordering::Equal)
        }
        FilterOperator::GreaterThan => compare(value, &condition.value) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => matches!(
            compare(value, &condition.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        FilterOperator::LessThan => compare(value, &condition.value) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => matches!(
            compare(value, &condition.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        FilterOperator::Like => like(value, &condition.value) == Some(true),
        FilterOperator::NotLike => like(value, &condition.value) == Some(false),
        FilterOperator::In => condition.value.as_list().is_some_and(|items| {
            items
                .iter()
                .any(|item| compare(value, item) == Some(Ordering::Equal))
        }),
        FilterOperator::NotIn => {
            !value.is_null()
                && condition.value.as_list().is_some_and(|items| {
                    items
                        .iter()
                        .all(|item| compare(value, item) != Some(Ordering::Equal))
                })
        }
        FilterOperator::Between | FilterOperator::NotBetween => {
            let Some([low, high]) = condition.value.as_list().and_then(|b| <&[_; 2]>::try_from(b).ok())
            else {
                return false;
            };
            let inside = match (compare(value, low), compare(value, high)) {
                (Some(lo), Some(hi)) => lo != Ordering::Less && hi != Ordering::Greater,
                _ => return false,
            };
            if condition.operator == FilterOperator::Between {
                inside
            } else {
                !inside
            }
        }
    }
}

/// SQL-style comparison; `None` when either side is NULL or the types differ
fn compare(value: &Value, other: &FilterValue) -> Option<Ordering> {
    match (value, other) {
        (Value::Null, _) | (_, FilterValue::Null) => None,
        (Value::Number(a), FilterValue::Integer(b)) => match a.as_i64() {
            Some(a) => Some(a.cmp(b)),
            None => a.as_f64()?.partial_cmp(&(*b as f64)),
        },
        (Value::Number(a), FilterValue::Float(b)) => a.as_f64()?.partial_cmp(b),
        (Value::String(a), FilterValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), FilterValue::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn like(value: &Value, pattern: &FilterValue) -> Option<bool> {
    let (Value::String(text), FilterValue::String(pattern)) = (value, pattern) else {
        return None;
    };
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    Some(like_match(&text, &pattern))
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
    // Iterative wildcard match with single-star backtracking
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Total order used for ORDER BY: NULL < bool < number < string < other
fn compare_json(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::error::RepositoryErrorKind;
    use crate::repository::record::{row, Columns, Ids};
    use serde_json::json;

    fn table() -> MemoryTable {
        MemoryTable::new(TableHandle::new("messages"))
    }

    fn query(table: &MemoryTable) -> Query {
        Query::new(table.table().clone(), Scope::Default)
    }

    #[test]
    fn test_like_match() {
        let m = |t: &str, p: &str| {
            like_match(
                &t.chars().collect::<Vec<_>>(),
                &p.chars().collect::<Vec<_>>(),
            )
        };
        assert!(m("hello world", "%world"));
        assert!(m("hello world", "hello%"));
        assert!(m("hello world", "%lo w%"));
        assert!(m("abc", "a_c"));
        assert!(m("", "%"));
        assert!(!m("abc", "a_"));
        assert!(!m("Hello", "hello"));
        assert!(m("aXbXc", "%X%X%"));
    }

    #[test]
    fn test_null_never_equal() {
        let r = row(json!({"a": null}));
        let raw_equal = FilterCondition {
            field: "a".to_string(),
            operator: FilterOperator::Equal,
            value: FilterValue::Null,
        };
        assert!(!satisfies(&raw_equal, &r));
        assert!(satisfies(&FilterCondition::eq("a", FilterValue::Null), &r));
        assert!(!satisfies(&FilterCondition::ne("a", FilterValue::Null), &r));
        assert!(!satisfies(&FilterCondition::ne("a", 1_i64), &r));
        assert!(satisfies(&FilterCondition::is_null("a"), &r));
        assert!(satisfies(&FilterCondition::is_null("missing"), &r));
        assert!(!satisfies(&FilterCondition::not_in_list("a", vec![1_i64]), &r));
    }

    #[test]
    fn test_between_inclusive() {
        let r = row(json!({"n": 5}));
        assert!(satisfies(&FilterCondition::between("n", 5_i64, 10_i64), &r));
        assert!(satisfies(&FilterCondition::between("n", 1_i64, 5_i64), &r));
        assert!(!satisfies(&FilterCondition::not_between("n", 1_i64, 5_i64), &r));
        assert!(satisfies(&FilterCondition::not_between("n", 6_i64, 9_i64), &r));
        assert!(satisfies(&FilterCondition::between("n", 4.5_f64, 5.5_f64), &r));
    }

    #[tokio::test]
    async fn test_insert_assigns_keys_and_timestamps() {
        let table = table();
        let first = table.insert(row(json!({"content": "a"}))).await.unwrap();
        let second = table.insert(row(json!({"content": "b"}))).await.unwrap();

        assert_eq!(first.key("id"), Some(RecordId::Integer(1)));
        assert_eq!(second.key("id"), Some(RecordId::Integer(2)));
        assert!(first.created_at().is_some());
        assert!(first.updated_at().is_some());
    }

    #[tokio::test]
    async fn test_max_explicit_key_does_not_overflow_counter() {
        let table = table();
        table.insert(row(json!({"id": i64::MAX}))).await.unwrap();

        let err = table.insert(row(json!({}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_table_without_soft_deletes_ignores_deleted_at() {
        let table = MemoryTable::new(TableHandle::new("logs").soft_deletes(false));
        table
            .insert(row(json!({"message": "boot", "deleted_at": "2024-01-01T00:00:00+00:00"})))
            .await
            .unwrap();
        let id = RecordId::Integer(1);
        let handle = table.table().clone();

        let live = table.select(&Query::new(handle.clone(), Scope::Default)).await.unwrap();
        assert_eq!(live.len(), 1);
        let trashed = table
            .select(&Query::new(handle.clone(), Scope::OnlyTrashed))
            .await
            .unwrap();
        assert!(trashed.is_empty());

        let updated = table.update(&id, row(json!({"message": "ready"}))).await.unwrap();
        assert_eq!(updated.get("message"), Some(&json!("ready")));
        assert!(!table.restore(&id).await.unwrap());

        let removed = table
            .destroy(&Query::new(handle, Scope::Default).where_key(&Ids::from(id)))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_explicit_key_advances_counter_and_rejects_duplicates() {
        let table = table();
        table.insert(row(json!({"id": 10}))).await.unwrap();
        let next = table.insert(row(json!({}))).await.unwrap();
        assert_eq!(next.key("id"), Some(RecordId::Integer(11)));

        let err = table.insert(row(json!({"id": 10}))).await.unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_insert_many_is_all_or_nothing() {
        let table = table().unique("email");
        table.insert(row(json!({"email": "a@x"}))).await.unwrap();

        let err = table
            .insert_many(vec![
                row(json!({"email": "b@x"})),
                row(json!({"email": "a@x"})),
            ])
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ConstraintViolation);
        assert_eq!(table.len().await, 1);

        let inserted = table
            .insert_many(vec![row(json!({"email": "b@x"})), row(json!({"email": "c@x"}))])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        // Bulk insert writes rows as given
        assert!(table.rows().await[2].get(CREATED_AT).is_none());
    }

    #[tokio::test]
    async fn test_select_orders_limits_and_projects() {
        let table = table();
        for (content, votes) in [("a", 3), ("b", 1), ("c", 2)] {
            table
                .insert(row(json!({"content": content, "votes": votes})))
                .await
                .unwrap();
        }

        let records = table
            .select(
                &query(&table)
                    .order_by("votes", OrderDirection::Descending)
                    .limit(2)
                    .select(Columns::from(["content"])),
            )
            .await
            .unwrap();
        let contents: Vec<_> = records.iter().map(|r| r.get("content").cloned()).collect();
        assert_eq!(contents, vec![Some(json!("a")), Some(json!("c"))]);
        assert!(records[0].get("id").is_none());
    }

    #[tokio::test]
    async fn test_soft_destroy_then_scopes() {
        let table = table();
        table.insert(row(json!({"content": "a"}))).await.unwrap();
        table.insert(row(json!({"content": "b"}))).await.unwrap();

        let affected = table
            .destroy(&query(&table).where_key(&Ids::from(1_i64)))
            .await
            .unwrap();
        assert_eq!(affected, 1);

        assert_eq!(table.count(&query(&table)).await.unwrap(), 1);
        assert_eq!(
            table
                .count(&query(&table).with_scope(Scope::WithTrashed))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            table
                .count(&query(&table).with_scope(Scope::OnlyTrashed))
                .await
                .unwrap(),
            1
        );

        assert!(table.restore(&RecordId::Integer(1)).await.unwrap());
        assert!(!table.restore(&RecordId::Integer(1)).await.unwrap());
        assert_eq!(table.count(&query(&table)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_hard_destroy_without_soft_deletes() {
        let table = MemoryTable::new(TableHandle::new("logs").soft_deletes(false));
        table.insert(row(json!({"level": "info"}))).await.unwrap();
        table.insert(row(json!({"level": "warn"}))).await.unwrap();

        let q = Query::new(table.table().clone(), Scope::Default)
            .where_condition(FilterCondition::eq("level", "info"));
        assert_eq!(table.destroy(&q).await.unwrap(), 1);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_missing_or_trashed_is_not_found() {
        let table = table();
        table.insert(row(json!({"content": "a"}))).await.unwrap();

        let err = table
            .update(&RecordId::Integer(99), row(json!({"content": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::NotFound);
        assert_eq!(err.operation, RepositoryOperation::Update);

        table
            .destroy(&query(&table).where_key(&Ids::from(1_i64)))
            .await
            .unwrap();
        let err = table
            .update(&RecordId::Integer(1), row(json!({"content": "x"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_force_delete_reports_removal() {
        let table = table();
        table.insert(row(json!({"content": "a"}))).await.unwrap();
        assert!(table.force_delete(&RecordId::Integer(1)).await.unwrap());
        assert!(!table.force_delete(&RecordId::Integer(1)).await.unwrap());
        assert!(table.is_empty().await);
    }
}
