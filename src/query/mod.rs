//! Query predicate building.
//!
//! Turns a sparse [`FilterSpec`], an allow-listed sort and a validated
//! [`Page`] into a [`PreparedQuery`] for the storage collaborator.

mod builder;
mod filters;
mod page;
mod sort;

pub use builder::{Clause, PredicateBuilder, PreparedPredicate, PreparedQuery};
pub use filters::{BindValue, ComparisonKind, FilterEntry, FilterSpec};
pub use page::{Page, PageLimits};
pub use sort::{SortDirection, SortOption, resolve_sort};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown sort key `{0}`")]
    UnknownSort(String),
    #[error("no sort options configured")]
    NoSortOptions,
    #[error("pagination `{0}` must not be negative")]
    NegativePagination(&'static str),
    #[error("filter on `{column}` expects a {expected} value, got {found}")]
    ValueKind {
        column: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}
