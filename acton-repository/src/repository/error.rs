//! Repository error types
//!
//! Every repository operation returns a [`RepositoryError`] that records which
//! operation failed, the category of failure, and (for per-record loops and
//! imports) how much work completed before the failure surfaced.
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
//!
//! let error = RepositoryError::not_found("messages", "42").with_operation(RepositoryOperation::Update);
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert_eq!(error.entity_id.as_deref(), Some("42"));
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Looking up rows by primary key
    Find,
    /// Reading rows through a filtered query
    FindAll,
    /// Counting rows matching a query
    Count,
    /// Page-based retrieval
    Paginate,
    /// Normalizing a filter descriptor
    CompileFilter,
    /// Inserting a single row
    Create,
    /// Bulk insert
    CreateMany,
    /// Updating an existing row
    Update,
    /// Update-or-insert by condition
    UpdateOrCreate,
    /// Deleting rows (soft when the table supports it)
    Delete,
    /// Permanently removing rows
    ForceDelete,
    /// Reversing a soft delete
    Restore,
    /// Streaming a delimited file into the table
    Import,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Find => write!(f, "find"),
            Self::FindAll => write!(f, "find_all"),
            Self::Count => write!(f, "count"),
            Self::Paginate => write!(f, "paginate"),
            Self::CompileFilter => write!(f, "compile_filter"),
            Self::Create => write!(f, "create"),
            Self::CreateMany => write!(f, "create_many"),
            Self::Update => write!(f, "update"),
            Self::UpdateOrCreate => write!(f, "update_or_create"),
            Self::Delete => write!(f, "delete"),
            Self::ForceDelete => write!(f, "force_delete"),
            Self::Restore => write!(f, "restore"),
            Self::Import => write!(f, "import"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// Requested row does not exist
    NotFound,
    /// Row with the same primary key already exists
    AlreadyExists,
    /// Constraint violation reported by the backend (unique, foreign key, ...)
    ConstraintViolation,
    /// Arguments rejected before reaching the backend
    ValidationFailed,
    /// Filter descriptor has an invalid shape
    MalformedFilter,
    /// Imported row does not fit the column mapping
    MalformedRow,
    /// File could not be opened or read
    Io,
    /// Failed to connect to the backend
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// Underlying database error
    DatabaseError,
    /// Serialization or deserialization error
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::MalformedFilter => write!(f, "malformed_filter"),
            Self::MalformedRow => write!(f, "malformed_row"),
            Self::Io => write!(f, "io"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured repository error with operation context
///
/// `affected` is set when an operation that works record by record (force
/// delete, restore) or batch by batch (import) fails part-way: it holds the
/// number of records or batches already committed before the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The table or entity type involved
    pub entity_type: Option<String>,
    /// The primary key involved
    pub entity_id: Option<String>,
    /// Work completed before the failure
    pub affected: Option<u64>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            entity_id: None,
            affected: None,
        }
    }

    /// Create a "not found" error with entity context
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_repository::repository::RepositoryError;
    ///
    /// let error = RepositoryError::not_found("messages", "7");
    /// assert_eq!(error.entity_type.as_deref(), Some("messages"));
    /// ```
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Find,
            RepositoryErrorKind::NotFound,
            "Entity not found",
        )
        .with_entity(entity_type, entity_id)
    }

    /// Create an "already exists" error with entity context
    pub fn already_exists(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Create,
            RepositoryErrorKind::AlreadyExists,
            "Entity already exists",
        )
        .with_entity(entity_type, identifier)
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a malformed filter error
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_repository::repository::{RepositoryError, RepositoryErrorKind};
    ///
    /// let error = RepositoryError::malformed_filter("filter list is empty");
    /// assert_eq!(error.kind, RepositoryErrorKind::MalformedFilter);
    /// ```
    pub fn malformed_filter(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::CompileFilter,
            RepositoryErrorKind::MalformedFilter,
            message,
        )
    }

    /// Create a malformed row error, optionally pointing at the source line
    pub fn malformed_row(line: Option<u64>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match line {
            Some(line) => format!("line {}: {}", line, message),
            None => message,
        };
        Self::new(
            RepositoryOperation::Import,
            RepositoryErrorKind::MalformedRow,
            message,
        )
    }

    /// Create a connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Find,
            RepositoryErrorKind::ConnectionFailed,
            message,
        )
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Record how many records or batches completed before the failure
    ///
    /// The kind and message are left untouched so the backend's error
    /// still reaches the caller as-is.
    #[must_use]
    pub fn with_affected(mut self, affected: u64) -> Self {
        self.affected = Some(affected);
        self
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed | RepositoryErrorKind::Timeout
        )
    }

    /// Whether this is a not-found condition
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        if let Some(affected) = self.affected {
            write!(f, " ({} completed before failure)", affected)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        Self::new(
            RepositoryOperation::Import,
            RepositoryErrorKind::Io,
            err.to_string(),
        )
    }
}

impl From<csv::Error> for RepositoryError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return Self::new(
                RepositoryOperation::Import,
                RepositoryErrorKind::Io,
                err.to_string(),
            );
        }
        let line = err.position().map(|pos| pos.line());
        Self::malformed_row(line, err.to_string())
    }
}

#[cfg(feature = "database")]
impl RepositoryError {
    /// Classify a driver error raised while performing `operation`
    pub fn from_sqlx(operation: RepositoryOperation, err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(operation, RepositoryErrorKind::NotFound, "Row not found"),
            E::PoolTimedOut => Self::timeout(operation, "Connection pool timed out"),
            E::PoolClosed => {
                Self::connection_failed("Connection pool is closed").with_operation(operation)
            }
            E::Io(e) => Self::connection_failed(e.to_string()).with_operation(operation),
            E::Tls(e) => {
                Self::connection_failed(format!("TLS error: {}", e)).with_operation(operation)
            }
            E::WorkerCrashed => {
                Self::connection_failed("Database worker crashed").with_operation(operation)
            }
            E::ColumnDecode { index, source } => Self::serialization_error(
                operation,
                format!("Failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::serialization_error(operation, e.to_string()),
            E::Database(db_err) => {
                let kind = if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                {
                    RepositoryErrorKind::ConstraintViolation
                } else {
                    RepositoryErrorKind::DatabaseError
                };
                Self::new(operation, kind, db_err.to_string())
            }
            other => Self::database_error(operation, other.to_string()),
        }
    }
}
