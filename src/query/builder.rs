//! Parameterized predicate composition.
//!
//! Clause fragments are assembled only from allow-listed `&'static str`
//! columns and placeholder indices; every value is carried separately as a
//! [`BindValue`] whose position matches its `$n` placeholder.

use super::QueryError;
use super::filters::{BindValue, ComparisonKind, FilterSpec};
use super::page::Page;
use super::sort::SortOption;

/// One conditional fragment and the value bound to its placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub fragment: String,
    pub param: BindValue,
}

/// Accumulated clauses plus the index the next parameter will take.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPredicate {
    clauses: Vec<Clause>,
    next_index: usize,
}

impl PreparedPredicate {
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// `" WHERE a AND b"`, or an empty string when no filter is present.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            return String::new();
        }
        let fragments: Vec<&str> = self
            .clauses
            .iter()
            .map(|clause| clause.fragment.as_str())
            .collect();
        format!(" WHERE {}", fragments.join(" AND "))
    }

    /// Finish without ordering or pagination, e.g. for lookups and aggregates.
    ///
    /// `tail` is appended verbatim after the WHERE clause (GROUP BY and the like).
    pub fn into_query(self, select: &'static str, tail: &'static str) -> PreparedQuery {
        let mut sql = String::from(select);
        sql.push_str(&self.where_clause());
        sql.push_str(tail);
        PreparedQuery {
            sql,
            params: self.clauses.into_iter().map(|clause| clause.param).collect(),
        }
    }

    /// Finish with an allow-listed ORDER BY and `LIMIT`/`OFFSET` as the last
    /// two parameters.
    ///
    /// `tiebreak` keeps the order total so pages never overlap.
    pub fn into_paged_query(
        self,
        select: &'static str,
        sort: SortOption,
        tiebreak: &'static str,
        page: Page,
    ) -> PreparedQuery {
        let limit_index = self.next_index;
        let offset_index = limit_index + 1;

        let mut sql = String::from(select);
        sql.push_str(&self.where_clause());
        sql.push_str(" ORDER BY ");
        sql.push_str(&sort.to_string());
        if tiebreak != sort.column {
            sql.push_str(", ");
            sql.push_str(tiebreak);
            sql.push(' ');
            sql.push_str(sort.direction.as_sql());
        }
        sql.push_str(&format!(" LIMIT ${limit_index} OFFSET ${offset_index}"));

        let mut params: Vec<BindValue> =
            self.clauses.into_iter().map(|clause| clause.param).collect();
        params.push(BindValue::Int(page.fetch_limit()));
        params.push(BindValue::Int(page.offset_param()));

        PreparedQuery { sql, params }
    }
}

/// SQL text plus its ordered parameters; the text never carries user data.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// Builds a [`PreparedPredicate`] one optional filter at a time.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    clauses: Vec<Clause>,
    next_index: usize,
}

impl Default for PredicateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
            next_index: 1,
        }
    }

    /// Append `column <kind> $n` when `present`; otherwise do nothing.
    ///
    /// The parameter index advances by exactly one per appended clause.
    pub fn add_filter(
        &mut self,
        present: bool,
        kind: ComparisonKind,
        column: &'static str,
        value: BindValue,
    ) -> Result<&mut Self, QueryError> {
        if !present || value.is_empty_list() {
            return Ok(self);
        }

        let index = self.next_index;
        let (fragment, param) = match kind {
            ComparisonKind::Equals => (format!("{column} = ${index}"), scalar(column, value)?),
            ComparisonKind::RangeMin => (format!("{column} >= ${index}"), scalar(column, value)?),
            ComparisonKind::RangeMax => (format!("{column} <= ${index}"), scalar(column, value)?),
            ComparisonKind::Substring => match value {
                BindValue::Text(text) => (
                    format!("{column} ILIKE ${index}"),
                    BindValue::Text(contains_pattern(&text)),
                ),
                other => return Err(mismatch(column, "text", &other)),
            },
            ComparisonKind::SetMembership => {
                if !value.is_list() {
                    return Err(mismatch(column, "list", &value));
                }
                (format!("{column} = ANY(${index})"), value)
            }
            ComparisonKind::DateFrom | ComparisonKind::DateTo => {
                if !matches!(value, BindValue::Date(_)) {
                    return Err(mismatch(column, "date", &value));
                }
                let op = if kind == ComparisonKind::DateFrom {
                    ">="
                } else {
                    "<="
                };
                (format!("{column}::date {op} ${index}"), value)
            }
        };

        self.clauses.push(Clause { fragment, param });
        self.next_index += 1;
        Ok(self)
    }

    /// Apply every entry of `spec`, in order.
    pub fn apply(&mut self, spec: &FilterSpec) -> Result<&mut Self, QueryError> {
        for entry in spec.entries() {
            if let Some(value) = entry.value.clone() {
                self.add_filter(entry.is_present(), entry.kind, entry.column, value)?;
            }
        }
        Ok(self)
    }

    pub fn finish(self) -> PreparedPredicate {
        PreparedPredicate {
            clauses: self.clauses,
            next_index: self.next_index,
        }
    }
}

fn scalar(column: &'static str, value: BindValue) -> Result<BindValue, QueryError> {
    if value.is_list() {
        return Err(mismatch(column, "scalar", &value));
    }
    Ok(value)
}

fn mismatch(column: &'static str, expected: &'static str, value: &BindValue) -> QueryError {
    QueryError::ValueKind {
        column,
        expected,
        found: value.kind_name(),
    }
}

/// `%text%` with LIKE metacharacters in `text` escaped.
fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::query::page::PageLimits;
    use crate::query::sort::SortOption;

    const SELECT: &str = "SELECT s.score_id, s.pp FROM scores s";

    fn score_spec(
        min_pp: Option<f64>,
        username: Option<&str>,
        mods: Option<Vec<String>>,
        played_from: Option<time::Date>,
    ) -> FilterSpec {
        FilterSpec::new()
            .with("min_pp", "s.pp", ComparisonKind::RangeMin, min_pp)
            .with("max_pp", "s.pp", ComparisonKind::RangeMax, None::<f64>)
            .with("username", "u.username", ComparisonKind::Substring, username)
            .with("mods", "s.mods", ComparisonKind::SetMembership, mods)
            .with("played_from", "s.played_at", ComparisonKind::DateFrom, played_from)
    }

    fn paged(spec: &FilterSpec) -> PreparedQuery {
        let mut builder = PredicateBuilder::new();
        builder.apply(spec).unwrap();
        let page = Page::from_raw(Some(20), Some(40), PageLimits::default()).unwrap();
        builder.finish().into_paged_query(
            SELECT,
            SortOption::desc("pp_desc", "s.pp"),
            "s.score_id",
            page,
        )
    }

    #[test]
    fn absent_filters_emit_nothing() {
        let query = paged(&score_spec(None, None, None, None));
        assert_eq!(
            query.sql,
            "SELECT s.score_id, s.pp FROM scores s ORDER BY s.pp DESC NULLS LAST, \
             s.score_id DESC NULLS LAST LIMIT $1 OFFSET $2"
        );
        assert_eq!(query.params, vec![BindValue::Int(21), BindValue::Int(40)]);
    }

    #[test]
    fn k_present_filters_emit_k_fragments_and_k_plus_two_params() {
        let cases = [
            score_spec(Some(300.0), None, None, None),
            score_spec(Some(300.0), Some("whit"), None, None),
            score_spec(
                Some(300.0),
                Some("whit"),
                Some(vec!["HD".into(), "DT".into()]),
                None,
            ),
            score_spec(
                Some(300.0),
                Some("whit"),
                Some(vec!["HD".into()]),
                Some(date!(2024 - 01 - 01)),
            ),
        ];

        for (k, spec) in cases.iter().enumerate().map(|(i, spec)| (i + 1, spec)) {
            let mut builder = PredicateBuilder::new();
            builder.apply(spec).unwrap();
            let predicate = builder.finish();
            assert_eq!(predicate.len(), k);
            assert_eq!(predicate.next_index(), k + 1);

            let query = paged(spec);
            assert_eq!(query.params.len(), k + 2);
            assert!(query.sql.contains(&format!("LIMIT ${} OFFSET ${}", k + 1, k + 2)));
        }
    }

    #[test]
    fn placeholders_follow_present_filters_only() {
        let spec = score_spec(None, Some("rafis"), None, Some(date!(2023 - 06 - 01)));
        let query = paged(&spec);
        assert!(query.sql.contains("WHERE u.username ILIKE $1 AND s.played_at::date >= $2"));
        assert_eq!(query.params[0], BindValue::Text("%rafis%".into()));
        assert_eq!(query.params[1], BindValue::Date(date!(2023 - 06 - 01)));
    }

    #[test]
    fn hostile_values_only_travel_as_parameters() {
        let hostile = "x'; DROP TABLE scores; --";
        let spec = score_spec(None, Some(hostile), Some(vec![hostile.to_string()]), None);
        let query = paged(&spec);

        assert!(!query.sql.contains('\''));
        assert!(!query.sql.contains(';'));
        assert!(!query.sql.contains("--"));
        assert!(!query.sql.contains("DROP"));
        assert_eq!(
            query.params[0],
            BindValue::Text(format!("%{hostile}%"))
        );
        assert_eq!(
            query.params[1],
            BindValue::TextList(vec![hostile.to_string()])
        );
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[test]
    fn set_membership_binds_one_array_parameter() {
        let mut builder = PredicateBuilder::new();
        builder
            .add_filter(
                true,
                ComparisonKind::SetMembership,
                "s.grade",
                BindValue::TextList(vec!["S".into(), "SS".into(), "A".into()]),
            )
            .unwrap();
        let predicate = builder.finish();
        assert_eq!(predicate.clauses()[0].fragment, "s.grade = ANY($1)");
        assert_eq!(predicate.next_index(), 2);
    }

    #[test]
    fn present_flag_false_skips_even_with_value() {
        let mut builder = PredicateBuilder::new();
        builder
            .add_filter(false, ComparisonKind::Equals, "s.user_id", BindValue::Int(1))
            .unwrap()
            .add_filter(true, ComparisonKind::Equals, "s.beatmap_id", BindValue::Int(2))
            .unwrap();
        let predicate = builder.finish();
        assert_eq!(predicate.len(), 1);
        assert_eq!(predicate.clauses()[0].fragment, "s.beatmap_id = $1");
    }

    #[test]
    fn mismatched_value_kinds_are_rejected() {
        let mut builder = PredicateBuilder::new();
        let err = builder
            .add_filter(true, ComparisonKind::Substring, "u.username", BindValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, QueryError::ValueKind { expected: "text", .. }));

        let err = builder
            .add_filter(
                true,
                ComparisonKind::RangeMin,
                "s.pp",
                BindValue::IntList(vec![1]),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::ValueKind { expected: "scalar", .. }));
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn unpaged_query_appends_tail() {
        let mut builder = PredicateBuilder::new();
        builder
            .add_filter(true, ComparisonKind::Equals, "p.country", BindValue::from("JP"))
            .unwrap();
        let query = builder
            .finish()
            .into_query("SELECT s.grade, COUNT(*) FROM scores s", " GROUP BY s.grade");
        assert_eq!(
            query.sql,
            "SELECT s.grade, COUNT(*) FROM scores s WHERE p.country = $1 GROUP BY s.grade"
        );
        assert_eq!(query.params, vec![BindValue::Text("JP".into())]);
    }
}
