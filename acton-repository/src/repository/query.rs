//! Query values and the scoped query context
//!
//! A [`Query`] is a plain value: table handle, trash scope, select list,
//! conditions, ordering and limits. The [`QueryContext`] never hands out a
//! shared builder; [`QueryContext::current_query`] builds a fresh `Query` from
//! the table handle and the scope tag each time, so filters added by one read
//! can never leak into the next.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{FilterCondition, QueryContext, Scope, TableHandle};
//!
//! let mut context = QueryContext::new(TableHandle::new("messages"));
//! context.only_trashed();
//!
//! let first = context.current_query().where_condition(FilterCondition::eq("id", 1_i64));
//! let second = context.current_query();
//!
//! assert_eq!(first.conditions().len(), 1);
//! assert!(second.conditions().is_empty());
//! assert_eq!(second.scope(), Scope::OnlyTrashed);
//! ```

use std::fmt;

use super::filter::{Filter, FilterCondition, FilterValue};
use super::pagination::OrderDirection;
use super::record::{Columns, Ids};

/// Trash visibility of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// Exclude soft-deleted rows
    #[default]
    Default,
    /// Include soft-deleted rows
    WithTrashed,
    /// Only soft-deleted rows
    OnlyTrashed,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::WithTrashed => write!(f, "with_trashed"),
            Self::OnlyTrashed => write!(f, "only_trashed"),
        }
    }
}

/// Table name plus the capabilities of the stored entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableHandle {
    /// Table name
    pub name: String,
    /// Primary key column
    pub primary_key: String,
    /// Whether deletes set `deleted_at` instead of removing the row
    pub soft_deletes: bool,
    /// Whether inserts and updates maintain `created_at` / `updated_at`
    pub timestamps: bool,
}

impl TableHandle {
    /// Handle with an `id` key, soft deletes and timestamps enabled
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            soft_deletes: true,
            timestamps: true,
        }
    }

    /// Use a different primary key column
    #[must_use]
    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Enable or disable soft deletes
    #[must_use]
    pub fn soft_deletes(mut self, enabled: bool) -> Self {
        self.soft_deletes = enabled;
        self
    }

    /// Enable or disable automatic timestamps
    #[must_use]
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}

/// A fully described read (or bulk write) against one table
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: TableHandle,
    scope: Scope,
    columns: Columns,
    conditions: Vec<FilterCondition>,
    orders: Vec<(String, OrderDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    /// Empty query over a table in the given scope
    pub fn new(table: TableHandle, scope: Scope) -> Self {
        Self {
            table,
            scope,
            columns: Columns::All,
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Replace the select list
    #[must_use]
    pub fn select(mut self, columns: Columns) -> Self {
        self.columns = columns;
        self
    }

    /// Change the trash scope
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// AND every condition of a normalized filter
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.conditions.extend(filter.into_conditions());
        self
    }

    /// AND a single condition
    #[must_use]
    pub fn where_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict to the given primary keys
    #[must_use]
    pub fn where_key(self, ids: &Ids) -> Self {
        let field = self.table.primary_key.clone();
        self.where_in(field, ids.to_filter_values())
    }

    /// `field IN (values)`
    #[must_use]
    pub fn where_in(self, field: impl Into<String>, values: Vec<FilterValue>) -> Self {
        self.where_condition(FilterCondition::in_list(field, values))
    }

    /// `field NOT IN (values)`
    #[must_use]
    pub fn where_not_in(self, field: impl Into<String>, values: Vec<FilterValue>) -> Self {
        self.where_condition(FilterCondition::not_in_list(field, values))
    }

    /// `field BETWEEN low AND high`
    #[must_use]
    pub fn where_between(
        self,
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.where_condition(FilterCondition::between(field, low, high))
    }

    /// `field NOT BETWEEN low AND high`
    #[must_use]
    pub fn where_not_between(
        self,
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.where_condition(FilterCondition::not_between(field, low, high))
    }

    /// Append an ORDER BY term
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.orders.push((field.into(), direction));
        self
    }

    /// Cap the number of rows
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip rows
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Drop limit and offset, keeping everything else (used for counting)
    #[must_use]
    pub fn without_window(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// Target table
    pub fn table(&self) -> &TableHandle {
        &self.table
    }

    /// Trash scope
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Select list
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Conditions joined with AND
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// ORDER BY terms in order
    pub fn orders(&self) -> &[(String, OrderDirection)] {
        &self.orders
    }

    /// Row cap
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Rows to skip
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }
}

/// Table handle plus the current trash scope
///
/// The scope persists until changed; [`QueryContext::new_query`] resets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    table: TableHandle,
    scope: Scope,
}

impl QueryContext {
    /// Context over a table in the default scope
    pub fn new(table: TableHandle) -> Self {
        Self {
            table,
            scope: Scope::Default,
        }
    }

    /// Reset the scope to default
    pub fn new_query(&mut self) -> &mut Self {
        self.scope = Scope::Default;
        self
    }

    /// Include soft-deleted rows in subsequent reads
    pub fn with_trashed(&mut self) -> &mut Self {
        self.scope = Scope::WithTrashed;
        self
    }

    /// Only soft-deleted rows in subsequent reads
    pub fn only_trashed(&mut self) -> &mut Self {
        self.scope = Scope::OnlyTrashed;
        self
    }

    /// Fresh query in the current scope
    pub fn current_query(&self) -> Query {
        Query::new(self.table.clone(), self.scope)
    }

    /// Fresh query in the default scope, regardless of the current one
    pub fn unscoped_query(&self) -> Query {
        Query::new(self.table.clone(), Scope::Default)
    }

    /// Current scope
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Table handle
    pub fn table(&self) -> &TableHandle {
        &self.table
    }
}
