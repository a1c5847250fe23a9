//! Score and beatmap search inputs.
//!
//! Inputs are validated and turned into a parameterized query plus cache key
//! parts before the cache is consulted.

use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use super::catalogue::{
    BEATMAP_SELECT, BEATMAP_SORTS, BEATMAP_TIEBREAK, SCORE_SELECT, SCORE_SORTS, SCORE_TIEBREAK,
};
use super::error::AppError;
use crate::cache::KeyPart;
use crate::domain::entities::EntityRecord;
use crate::query::{
    ComparisonKind, FilterSpec, Page, PageLimits, PredicateBuilder, PreparedQuery, resolve_sort,
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreSearch {
    pub min_pp: Option<f64>,
    pub max_pp: Option<f64>,
    pub min_accuracy: Option<f64>,
    pub max_accuracy: Option<f64>,
    pub grades: Vec<String>,
    pub mods: Vec<String>,
    pub username: Option<String>,
    pub beatmap_title: Option<String>,
    #[serde(with = "calendar_date::option")]
    pub played_from: Option<Date>,
    #[serde(with = "calendar_date::option")]
    pub played_to: Option<Date>,
    pub user_id: Option<i64>,
    pub beatmap_id: Option<i64>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatmapSearch {
    pub min_stars: Option<f64>,
    pub max_stars: Option<f64>,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,
    /// Seconds.
    pub max_length: Option<i64>,
    pub modes: Vec<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub creator: Option<String>,
    #[serde(with = "calendar_date::option")]
    pub ranked_from: Option<Date>,
    #[serde(with = "calendar_date::option")]
    pub ranked_to: Option<Date>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<EntityRecord>,
    pub limit: u32,
    pub offset: u64,
    pub has_more: bool,
}

impl SearchResults {
    /// `rows` may hold one look-ahead row beyond the page; it only sets `has_more`.
    pub fn from_rows(mut rows: Vec<EntityRecord>, page: Page) -> Self {
        let limit = page.limit as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        Self {
            items: rows,
            limit: page.limit,
            offset: page.offset,
            has_more,
        }
    }
}

/// A validated search, ready to key and run.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSearch {
    pub query: PreparedQuery,
    pub page: Page,
    pub key_parts: Vec<KeyPart>,
}

impl ScoreSearch {
    pub fn prepare(&self, limits: PageLimits) -> Result<PreparedSearch, AppError> {
        check_range("pp", self.min_pp, self.max_pp)?;
        check_range("accuracy", self.min_accuracy, self.max_accuracy)?;
        check_dates("played", self.played_from, self.played_to)?;
        check_id("user_id", self.user_id)?;
        check_id("beatmap_id", self.beatmap_id)?;

        let sort = resolve_sort(SCORE_SORTS, self.sort.as_deref())?;
        let page = Page::from_raw(self.limit, self.offset, limits)?;
        let grades = normalize_set(&self.grades);
        let mods = normalize_set(&self.mods);
        let username = normalize_text(self.username.as_deref());
        let beatmap_title = normalize_text(self.beatmap_title.as_deref());

        let filters = FilterSpec::new()
            .with("user_id", "sc.user_id", ComparisonKind::Equals, self.user_id)
            .with("beatmap_id", "sc.beatmap_id", ComparisonKind::Equals, self.beatmap_id)
            .with("min_pp", "sc.pp", ComparisonKind::RangeMin, self.min_pp)
            .with("max_pp", "sc.pp", ComparisonKind::RangeMax, self.max_pp)
            .with("min_accuracy", "sc.accuracy", ComparisonKind::RangeMin, self.min_accuracy)
            .with("max_accuracy", "sc.accuracy", ComparisonKind::RangeMax, self.max_accuracy)
            .with("grades", "sc.grade", ComparisonKind::SetMembership, Some(grades.clone()))
            .with("mods", "sc.mods", ComparisonKind::SetMembership, Some(mods.clone()))
            .with("username", "p.username", ComparisonKind::Substring, username.clone())
            .with("beatmap_title", "b.title", ComparisonKind::Substring, beatmap_title.clone())
            .with("played_from", "sc.played_at", ComparisonKind::DateFrom, self.played_from)
            .with("played_to", "sc.played_at", ComparisonKind::DateTo, self.played_to);

        let mut builder = PredicateBuilder::new();
        builder.apply(&filters)?;
        let query = builder
            .finish()
            .into_paged_query(SCORE_SELECT, sort, SCORE_TIEBREAK, page);

        let key_parts = vec![
            self.user_id.into(),
            self.beatmap_id.into(),
            self.min_pp.into(),
            self.max_pp.into(),
            self.min_accuracy.into(),
            self.max_accuracy.into(),
            KeyPart::set(grades),
            KeyPart::set(mods),
            folded(username.as_deref()),
            folded(beatmap_title.as_deref()),
            self.played_from.into(),
            self.played_to.into(),
            sort.name.into(),
            page.limit.into(),
            page.offset.into(),
        ];

        Ok(PreparedSearch {
            query,
            page,
            key_parts,
        })
    }
}

impl BeatmapSearch {
    pub fn prepare(&self, limits: PageLimits) -> Result<PreparedSearch, AppError> {
        check_range("stars", self.min_stars, self.max_stars)?;
        check_range("bpm", self.min_bpm, self.max_bpm)?;
        check_dates("ranked", self.ranked_from, self.ranked_to)?;
        if self.max_length.is_some_and(|length| length < 0) {
            return Err(AppError::validation("max_length must not be negative"));
        }

        let sort = resolve_sort(BEATMAP_SORTS, self.sort.as_deref())?;
        let page = Page::from_raw(self.limit, self.offset, limits)?;
        let modes: Vec<String> = normalize_set(&self.modes)
            .into_iter()
            .map(|mode| mode.to_lowercase())
            .collect();
        let title = normalize_text(self.title.as_deref());
        let artist = normalize_text(self.artist.as_deref());
        let creator = normalize_text(self.creator.as_deref());

        let filters = FilterSpec::new()
            .with("min_stars", "b.stars", ComparisonKind::RangeMin, self.min_stars)
            .with("max_stars", "b.stars", ComparisonKind::RangeMax, self.max_stars)
            .with("min_bpm", "b.bpm", ComparisonKind::RangeMin, self.min_bpm)
            .with("max_bpm", "b.bpm", ComparisonKind::RangeMax, self.max_bpm)
            .with("max_length", "b.length", ComparisonKind::RangeMax, self.max_length)
            .with("modes", "b.mode", ComparisonKind::SetMembership, Some(modes.clone()))
            .with("title", "b.title", ComparisonKind::Substring, title.clone())
            .with("artist", "b.artist", ComparisonKind::Substring, artist.clone())
            .with("creator", "b.creator", ComparisonKind::Substring, creator.clone())
            .with("ranked_from", "b.ranked_at", ComparisonKind::DateFrom, self.ranked_from)
            .with("ranked_to", "b.ranked_at", ComparisonKind::DateTo, self.ranked_to);

        let mut builder = PredicateBuilder::new();
        builder.apply(&filters)?;
        let query = builder
            .finish()
            .into_paged_query(BEATMAP_SELECT, sort, BEATMAP_TIEBREAK, page);

        let key_parts = vec![
            self.min_stars.into(),
            self.max_stars.into(),
            self.min_bpm.into(),
            self.max_bpm.into(),
            self.max_length.into(),
            KeyPart::set(modes),
            folded(title.as_deref()),
            folded(artist.as_deref()),
            folded(creator.as_deref()),
            self.ranked_from.into(),
            self.ranked_to.into(),
            sort.name.into(),
            page.limit.into(),
            page.offset.into(),
        ];

        Ok(PreparedSearch {
            query,
            page,
            key_parts,
        })
    }
}

/// Parse a `YYYY-MM-DD` date supplied for `field`.
pub fn parse_date(field: &str, text: &str) -> Result<Date, AppError> {
    Date::parse(text.trim(), DATE_FORMAT)
        .map_err(|_| AppError::validation(format!("{field} must be a date in YYYY-MM-DD form")))
}

fn check_range(field: &str, min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    for value in [min, max].into_iter().flatten() {
        if !value.is_finite() {
            return Err(AppError::validation(format!("{field} bounds must be finite")));
        }
    }
    match (min, max) {
        (Some(min), Some(max)) if min > max => Err(AppError::validation(format!(
            "min {field} must not exceed max {field}"
        ))),
        _ => Ok(()),
    }
}

fn check_dates(field: &str, from: Option<Date>, to: Option<Date>) -> Result<(), AppError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(AppError::validation(format!(
            "{field}_from must not be after {field}_to"
        ))),
        _ => Ok(()),
    }
}

fn check_id(field: &str, id: Option<i64>) -> Result<(), AppError> {
    match id {
        Some(id) if id <= 0 => Err(AppError::validation(format!("{field} must be positive"))),
        _ => Ok(()),
    }
}

/// Trimmed, upper-cased, de-duplicated and sorted; blanks dropped.
fn normalize_set(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|value| value.trim().to_uppercase())
        .filter(|value| !value.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn folded(value: Option<&str>) -> KeyPart {
    value.map_or(KeyPart::Null, KeyPart::folded)
}
