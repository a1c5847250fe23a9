//! Allow-listed sort orders.

use std::fmt;

use super::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC NULLS LAST",
            SortDirection::Desc => "DESC NULLS LAST",
        }
    }
}

/// A symbolic sort name bound to a fixed column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub name: &'static str,
    pub column: &'static str,
    pub direction: SortDirection,
}

impl SortOption {
    pub const fn asc(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            direction: SortDirection::Asc,
        }
    }

    pub const fn desc(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Resolve a caller-supplied sort name against `allowed`.
///
/// `None` selects the first entry; names outside the list are rejected.
pub fn resolve_sort(
    allowed: &'static [SortOption],
    requested: Option<&str>,
) -> Result<SortOption, QueryError> {
    let Some(requested) = requested.map(str::trim).filter(|name| !name.is_empty()) else {
        return allowed
            .first()
            .copied()
            .ok_or(QueryError::NoSortOptions);
    };

    allowed
        .iter()
        .find(|option| option.name.eq_ignore_ascii_case(requested))
        .copied()
        .ok_or_else(|| QueryError::UnknownSort(requested.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SORTS: &[SortOption] = &[
        SortOption::desc("pp_desc", "s.pp"),
        SortOption::asc("pp_asc", "s.pp"),
    ];

    #[test]
    fn absent_name_picks_default() {
        assert_eq!(resolve_sort(SORTS, None).unwrap(), SORTS[0]);
        assert_eq!(resolve_sort(SORTS, Some("  ")).unwrap(), SORTS[0]);
    }

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(resolve_sort(SORTS, Some("PP_ASC")).unwrap(), SORTS[1]);
    }

    #[test]
    fn raw_column_text_is_rejected() {
        let err = resolve_sort(SORTS, Some("s.pp; DROP TABLE scores")).unwrap_err();
        assert!(matches!(err, QueryError::UnknownSort(_)));
    }

    #[test]
    fn empty_allow_list_is_an_error() {
        assert!(matches!(
            resolve_sort(&[], None),
            Err(QueryError::NoSortOptions)
        ));
    }
}
