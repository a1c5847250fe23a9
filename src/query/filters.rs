//! Sparse filter specifications.

use serde::Serialize;
use time::Date;

/// A value that travels to storage only through a positional parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Int(i64),
    Float(f64),
    Text(String),
    Date(Date),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl BindValue {
    pub(crate) fn is_list(&self) -> bool {
        matches!(self, BindValue::IntList(_) | BindValue::TextList(_))
    }

    pub(crate) fn is_empty_list(&self) -> bool {
        match self {
            BindValue::IntList(values) => values.is_empty(),
            BindValue::TextList(values) => values.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            BindValue::Int(_) => "int",
            BindValue::Float(_) => "float",
            BindValue::Text(_) => "text",
            BindValue::Date(_) => "date",
            BindValue::IntList(_) => "int list",
            BindValue::TextList(_) => "text list",
        }
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        BindValue::Int(value)
    }
}

impl From<i32> for BindValue {
    fn from(value: i32) -> Self {
        BindValue::Int(value.into())
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        BindValue::Float(value)
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        BindValue::Text(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        BindValue::Text(value.to_string())
    }
}

impl From<Date> for BindValue {
    fn from(value: Date) -> Self {
        BindValue::Date(value)
    }
}

impl From<Vec<i64>> for BindValue {
    fn from(values: Vec<i64>) -> Self {
        BindValue::IntList(values)
    }
}

impl From<Vec<String>> for BindValue {
    fn from(values: Vec<String>) -> Self {
        BindValue::TextList(values)
    }
}

/// How a filter value constrains its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    Equals,
    /// Inclusive lower bound.
    RangeMin,
    /// Inclusive upper bound.
    RangeMax,
    /// Case-insensitive containment.
    Substring,
    /// Column value is one of a bound array.
    SetMembership,
    /// Inclusive lower calendar-date bound.
    DateFrom,
    /// Inclusive upper calendar-date bound.
    DateTo,
}

/// One optional constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: ComparisonKind,
    pub value: Option<BindValue>,
}

impl FilterEntry {
    /// Absent values and empty sets contribute nothing to the predicate.
    pub fn is_present(&self) -> bool {
        self.value
            .as_ref()
            .is_some_and(|value| !value.is_empty_list())
    }
}

/// Per-request filter set; most entries are usually absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    entries: Vec<FilterEntry>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Into<BindValue>>(
        mut self,
        name: &'static str,
        column: &'static str,
        kind: ComparisonKind,
        value: Option<V>,
    ) -> Self {
        self.entries.push(FilterEntry {
            name,
            column,
            kind,
            value: value.map(Into::into),
        });
        self
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_present()).count()
    }

    pub fn get(&self, name: &str) -> Option<&FilterEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}
