//! Ordering and page-based retrieval types
//!
//! # Example
//!
//! ```rust
//! use acton_repository::repository::{OrderDirection, PageRequest};
//!
//! let request = PageRequest::new(2).page(3);
//! assert_eq!(request.offset(), 4);
//! assert_eq!(format!("{}", OrderDirection::Descending), "desc");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RepositoryError;

/// Default number of items per page
pub const DEFAULT_PER_PAGE: u64 = 20;

/// Default query-string name of the page parameter
pub const DEFAULT_PAGE_NAME: &str = "page";

/// Direction for ordering results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    Descending,
}

impl OrderDirection {
    /// SQL keyword for ORDER BY
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

impl FromStr for OrderDirection {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(RepositoryError::malformed_filter(format!(
                "unknown order direction '{}'",
                other
            ))),
        }
    }
}

/// Parameters for page-based retrieval
///
/// Pages are 1-indexed; page 0 is treated as page 1 and a `per_page` of 0
/// falls back to [`DEFAULT_PER_PAGE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items per page
    pub per_page: u64,
    /// 1-indexed page number
    pub page: u64,
    /// Name of the page parameter, carried through to the result
    pub page_name: String,
}

impl PageRequest {
    /// First page with the given size
    #[must_use]
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page,
            page: 1,
            page_name: DEFAULT_PAGE_NAME.to_string(),
        }
    }

    /// Select a page
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// Rename the page parameter
    #[must_use]
    pub fn page_name(mut self, page_name: impl Into<String>) -> Self {
        self.page_name = page_name.into();
        self
    }

    /// Page size after applying the default
    #[must_use]
    pub fn effective_per_page(&self) -> u64 {
        if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            self.per_page
        }
    }

    /// Page number after clamping to 1
    #[must_use]
    pub fn current_page(&self) -> u64 {
        self.page.max(1)
    }

    /// Number of rows to skip
    #[must_use]
    pub fn offset(&self) -> u64 {
        (self.current_page() - 1).saturating_mul(self.effective_per_page())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the totals needed to render navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Page size used for the query
    pub per_page: u64,
    /// Total number of matching rows across all pages
    pub total: u64,
    /// 1-indexed page number
    pub current_page: u64,
    /// Name of the page parameter
    pub page_name: String,
}

impl<T> Paginated<T> {
    /// Number of the last page (at least 1)
    #[must_use]
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Whether a page follows this one
    #[must_use]
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    /// Map the items, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            per_page: self.per_page,
            total: self.total,
            current_page: self.current_page,
            page_name: self.page_name,
        }
    }
}
