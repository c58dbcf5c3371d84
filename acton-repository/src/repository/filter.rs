//! Filter descriptors and their normalized form
//!
//! A filter descriptor is either a single `(field, operator, value)` triple or
//! a list of them. Every read and bulk-write operation normalizes its
//! descriptor into a [`Filter`], a non-empty ordered list of
//! [`FilterCondition`]s, before anything reaches the backend.
//!
//! Typed callers build conditions directly:
//!
//! ```rust
//! use acton_repository::repository::{Filter, FilterCondition, IntoFilter};
//!
//! let single = FilterCondition::eq("status", "active").into_filter().unwrap();
//! let listed = vec![FilterCondition::eq("status", "active")].into_filter().unwrap();
//! assert_eq!(single, listed);
//! ```
//!
//! Loosely-typed callers hand over JSON shaped like `["field", value]`,
//! `["field", "op", value]`, or a list of those:
//!
//! ```rust
//! use acton_repository::repository::{Filter, FilterCondition};
//! use serde_json::json;
//!
//! let filter = Filter::parse(&json!([["votes", ">", 100], ["status", "active"]])).unwrap();
//! assert_eq!(filter.conditions()[0], FilterCondition::gt("votes", 100_i64));
//! assert_eq!(filter.conditions()[1], FilterCondition::eq("status", "active"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::error::RepositoryError;
use super::traits::RepositoryResult;

/// Comparison operators for filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Pattern matching (LIKE)
    Like,
    /// Negated pattern matching (NOT LIKE)
    NotLike,
    /// Value is in a list (IN)
    In,
    /// Value is not in a list (NOT IN)
    NotIn,
    /// Value lies in an inclusive range (BETWEEN)
    Between,
    /// Value lies outside an inclusive range (NOT BETWEEN)
    NotBetween,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::NotLike => write!(f, "NOT LIKE"),
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::Between => write!(f, "BETWEEN"),
            Self::NotBetween => write!(f, "NOT BETWEEN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

impl FromStr for FilterOperator {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Self::Equal),
            "!=" | "<>" => Ok(Self::NotEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterThanOrEqual),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessThanOrEqual),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            "in" => Ok(Self::In),
            "not in" => Ok(Self::NotIn),
            "between" => Ok(Self::Between),
            "not between" => Ok(Self::NotBetween),
            "is null" => Ok(Self::IsNull),
            "is not null" => Ok(Self::IsNotNull),
            _ => Err(RepositoryError::malformed_filter(format!(
                "unknown operator '{}'",
                s
            ))),
        }
    }
}

/// A value that can be used in filter conditions
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// List of values (IN lists and BETWEEN bounds)
    List(Vec<FilterValue>),
    /// Null value
    Null,
}

impl FilterValue {
    /// Convert a JSON value, keeping integers integral
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::String(value.to_string()),
        }
    }

    /// Convert back into a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => Value::Null,
        }
    }

    /// Items of a list value, `None` for scalars
    pub fn as_list(&self) -> Option<&[FilterValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(list: Vec<String>) -> Self {
        Self::List(list.into_iter().map(Self::String).collect())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(list: Vec<&str>) -> Self {
        Self::List(list.into_iter().map(Self::from).collect())
    }
}

impl From<Vec<i64>> for FilterValue {
    fn from(list: Vec<i64>) -> Self {
        Self::List(list.into_iter().map(Self::Integer).collect())
    }
}

impl From<Vec<FilterValue>> for FilterValue {
    fn from(list: Vec<FilterValue>) -> Self {
        Self::List(list)
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        Self::from_json(&value)
    }
}

impl From<&Value> for FilterValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

/// A single `(field, operator, value)` condition
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The field name to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    ///
    /// Equality against null becomes `IS NULL`, inequality against null
    /// becomes `IS NOT NULL`.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        let operator = match (operator, &value) {
            (FilterOperator::Equal, FilterValue::Null) => FilterOperator::IsNull,
            (FilterOperator::NotEqual, FilterValue::Null) => FilterOperator::IsNotNull,
            (operator, _) => operator,
        };
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter (field = value)
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// Create a not-equal filter (field != value)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// Create a greater-than filter (field > value)
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// Create a greater-than-or-equal filter (field >= value)
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// Create a less-than filter (field < value)
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// Create a less-than-or-equal filter (field <= value)
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// Create a LIKE pattern filter (`%` and `_` wildcards)
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Like, FilterValue::String(pattern.into()))
    }

    /// Create a NOT LIKE pattern filter
    pub fn not_like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::NotLike, FilterValue::String(pattern.into()))
    }

    /// Create an IN list filter
    pub fn in_list<V: Into<FilterValue>>(field: impl Into<String>, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::new(field, FilterOperator::In, FilterValue::List(values))
    }

    /// Create a NOT IN list filter
    pub fn not_in_list<V: Into<FilterValue>>(field: impl Into<String>, values: Vec<V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self::new(field, FilterOperator::NotIn, FilterValue::List(values))
    }

    /// Create an inclusive BETWEEN filter
    pub fn between(
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        Self::new(
            field,
            FilterOperator::Between,
            FilterValue::List(vec![low.into(), high.into()]),
        )
    }

    /// Create a NOT BETWEEN filter
    pub fn not_between(
        field: impl Into<String>,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        Self::new(
            field,
            FilterOperator::NotBetween,
            FilterValue::List(vec![low.into(), high.into()]),
        )
    }

    /// Create an IS NULL filter
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// Create an IS NOT NULL filter
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }

    /// Check that the value shape fits the operator
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.field.trim().is_empty() {
            return Err(RepositoryError::malformed_filter("field name is empty"));
        }
        match (self.operator, &self.value) {
            (FilterOperator::In | FilterOperator::NotIn, FilterValue::List(_)) => Ok(()),
            (FilterOperator::In | FilterOperator::NotIn, _) => Err(RepositoryError::malformed_filter(
                format!("{} on '{}' needs a list of values", self.operator, self.field),
            )),
            (FilterOperator::Between | FilterOperator::NotBetween, FilterValue::List(bounds))
                if bounds.len() == 2 =>
            {
                Ok(())
            }
            (FilterOperator::Between | FilterOperator::NotBetween, _) => {
                Err(RepositoryError::malformed_filter(format!(
                    "{} on '{}' needs exactly two bounds",
                    self.operator, self.field
                )))
            }
            (FilterOperator::IsNull | FilterOperator::IsNotNull, _) => Ok(()),
            (_, FilterValue::List(_)) => Err(RepositoryError::malformed_filter(format!(
                "{} on '{}' does not accept a list",
                self.operator, self.field
            ))),
            _ => Ok(()),
        }
    }
}

/// Normalized filter: a non-empty, ordered list of conditions joined with AND
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    conditions: Vec<FilterCondition>,
}

impl Filter {
    /// Build a filter from conditions, rejecting an empty list or an
    /// operator/value mismatch
    pub fn new(conditions: Vec<FilterCondition>) -> RepositoryResult<Self> {
        if conditions.is_empty() {
            return Err(RepositoryError::malformed_filter("filter list is empty"));
        }
        for condition in &conditions {
            condition.validate()?;
        }
        Ok(Self { conditions })
    }

    /// Normalize a loosely-typed JSON descriptor
    ///
    /// The descriptor is a list of triples when its first element is itself
    /// an array, otherwise it is a single triple.
    pub fn parse(descriptor: &Value) -> RepositoryResult<Self> {
        let items = descriptor
            .as_array()
            .ok_or_else(|| RepositoryError::malformed_filter("filter descriptor must be an array"))?;
        let first = items
            .first()
            .ok_or_else(|| RepositoryError::malformed_filter("filter descriptor is empty"))?;

        if first.is_array() {
            let conditions = items
                .iter()
                .map(parse_triple)
                .collect::<RepositoryResult<Vec<_>>>()?;
            Self::new(conditions)
        } else {
            Self::new(vec![parse_triple(descriptor)?])
        }
    }

    /// The conditions in order
    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Consume the filter, returning its conditions
    pub fn into_conditions(self) -> Vec<FilterCondition> {
        self.conditions
    }

    /// Append another condition
    #[must_use]
    pub fn and(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

fn parse_triple(triple: &Value) -> RepositoryResult<FilterCondition> {
    let parts = triple
        .as_array()
        .ok_or_else(|| RepositoryError::malformed_filter(format!("expected a triple, got {}", triple)))?;

    let (field, operator, value) = match parts.as_slice() {
        [field, value] => (field, FilterOperator::Equal, value),
        [field, operator, value] => {
            let operator = operator.as_str().ok_or_else(|| {
                RepositoryError::malformed_filter(format!("operator must be a string, got {}", operator))
            })?;
            (field, operator.parse()?, value)
        }
        _ => {
            return Err(RepositoryError::malformed_filter(format!(
                "expected 2 or 3 elements, got {}",
                parts.len()
            )))
        }
    };

    let field = field
        .as_str()
        .ok_or_else(|| RepositoryError::malformed_filter(format!("field must be a string, got {}", field)))?;

    Ok(FilterCondition::new(field, operator, FilterValue::from_json(value)))
}

/// Conversion into a normalized [`Filter`]
///
/// Implemented for a single condition, a list of conditions, and JSON
/// descriptors so repository methods accept any of them.
pub trait IntoFilter {
    /// Normalize into a filter
    fn into_filter(self) -> RepositoryResult<Filter>;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Ok(self)
    }
}

impl IntoFilter for FilterCondition {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Filter::new(vec![self])
    }
}

impl IntoFilter for Vec<FilterCondition> {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Filter::new(self)
    }
}

impl<const N: usize> IntoFilter for [FilterCondition; N] {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Filter::new(self.into())
    }
}

impl IntoFilter for &Value {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Filter::parse(self)
    }
}

impl IntoFilter for Value {
    fn into_filter(self) -> RepositoryResult<Filter> {
        Filter::parse(&self)
    }
}
