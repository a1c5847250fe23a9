//! Leaderboard analytics service.
//!
//! Every operation validates its input, derives a cache key and serves the
//! result through [`ReadThrough`]. On a miss, independent storage reads fan
//! out concurrently and the joined rows are assembled by the comparison
//! engine.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::catalogue::{
    GRADE_DISTRIBUTION_SELECT, GRADE_DISTRIBUTION_TAIL, LEADERBOARD_AGGREGATE_SELECT,
    PLAYER_METRICS, PLAYER_SELECT, SCORE_DUEL_METRICS, SCORE_PRIMARY, SCORE_SELECT, SCORE_SORTS,
    SCORE_TIEBREAK, SHARED_ITEM_FIELD, SINGLE_ROW,
};
use super::error::AppError;
use super::repos::RecordSource;
use super::search::{BeatmapSearch, ScoreSearch, SearchResults};
use crate::cache::{CacheDomain, KeyPart, ReadThrough};
use crate::compare::{
    ComparisonBounds, ComparisonResult, Differential, Duel, HeadToHead, compare, differential,
    duel, head_to_head,
};
use crate::config::Settings;
use crate::domain::entities::EntityRecord;
use crate::domain::error::DomainError;
use crate::query::{BindValue, ComparisonKind, Page, PageLimits, PredicateBuilder, PreparedQuery};

const DEFAULT_TOP_SCORES: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct AnalyticsSettings {
    pub bounds: ComparisonBounds,
    pub page_limits: PageLimits,
    /// Scores per player considered in a head-to-head.
    pub top_scores: u32,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            bounds: ComparisonBounds::default(),
            page_limits: PageLimits::default(),
            top_scores: DEFAULT_TOP_SCORES,
        }
    }
}

impl From<&Settings> for AnalyticsSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            bounds: settings.comparison.bounds(),
            page_limits: settings.query.page_limits(),
            top_scores: settings.comparison.top_scores.get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerComparison {
    pub players: Vec<EntityRecord>,
    pub comparison: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadReport {
    pub players: Vec<EntityRecord>,
    pub shared: HeadToHead,
    pub differentials: Vec<Differential>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDuelReport {
    pub beatmap_id: i64,
    pub scores: Vec<EntityRecord>,
    pub duel: Duel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeCount {
    pub grade: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSummary {
    pub country: Option<String>,
    pub player_count: u64,
    pub pp_average: f64,
    pub pp_max: f64,
    pub accuracy_average: f64,
    pub grades: Vec<GradeCount>,
}

pub struct AnalyticsService<S> {
    source: Arc<S>,
    cache: ReadThrough,
    settings: AnalyticsSettings,
}

impl<S> Clone for AnalyticsService<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
            settings: self.settings,
        }
    }
}

impl<S: RecordSource> AnalyticsService<S> {
    pub fn new(source: Arc<S>, cache: ReadThrough, settings: AnalyticsSettings) -> Self {
        Self {
            source,
            cache,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn player(&self, user_id: i64) -> Result<EntityRecord, AppError> {
        check_id("user_id", user_id)?;
        let key = self.cache.key(CacheDomain::Player, &[user_id.into()]);
        self.cache
            .get_or_fetch(&key, || async {
                self.find_player(user_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("player", user_id).into())
            })
            .await
    }

    /// Rank 2..=N players on the comparison metrics. Order is significant:
    /// `[a, b]` and `[b, a]` are cached separately.
    #[instrument(skip(self))]
    pub async fn compare_players(&self, user_ids: &[i64]) -> Result<PlayerComparison, AppError> {
        self.settings.bounds.check(user_ids.len())?;
        check_distinct(user_ids)?;
        for id in user_ids {
            check_id("user_id", *id)?;
        }

        let parts: Vec<KeyPart> = user_ids.iter().map(|id| KeyPart::from(*id)).collect();
        let key = self.cache.key(CacheDomain::Comparison, &parts);
        self.cache
            .get_or_fetch(&key, || async {
                let players = self.require_players(user_ids).await?;
                let comparison = compare(&players, PLAYER_METRICS, self.settings.bounds)?;
                Ok(PlayerComparison {
                    players,
                    comparison,
                })
            })
            .await
    }

    /// Compare two players on the beatmaps both have top scores on.
    #[instrument(skip(self))]
    pub async fn head_to_head(&self, user_a: i64, user_b: i64) -> Result<HeadToHeadReport, AppError> {
        check_id("user_id", user_a)?;
        check_id("user_id", user_b)?;
        check_distinct(&[user_a, user_b])?;

        let key = self
            .cache
            .key(CacheDomain::HeadToHead, &[user_a.into(), user_b.into()]);
        self.cache
            .get_or_fetch(&key, || async {
                let (player_a, player_b, scores_a, scores_b) = tokio::try_join!(
                    self.find_player(user_a),
                    self.find_player(user_b),
                    self.top_scores(user_a),
                    self.top_scores(user_b),
                )?;
                let player_a = player_a.ok_or_else(|| DomainError::not_found("player", user_a))?;
                let player_b = player_b.ok_or_else(|| DomainError::not_found("player", user_b))?;

                let shared = head_to_head(
                    &player_a.id,
                    &player_b.id,
                    &scores_a,
                    &scores_b,
                    SHARED_ITEM_FIELD,
                    &SCORE_PRIMARY,
                );
                let differentials = PLAYER_METRICS
                    .iter()
                    .map(|spec| differential(&player_a, &player_b, spec))
                    .collect();

                Ok(HeadToHeadReport {
                    players: vec![player_a, player_b],
                    shared,
                    differentials,
                })
            })
            .await
    }

    /// Each player's best score on one beatmap, decided on pp.
    #[instrument(skip(self))]
    pub async fn score_duel(
        &self,
        beatmap_id: i64,
        user_a: i64,
        user_b: i64,
    ) -> Result<ScoreDuelReport, AppError> {
        check_id("beatmap_id", beatmap_id)?;
        check_id("user_id", user_a)?;
        check_id("user_id", user_b)?;
        check_distinct(&[user_a, user_b])?;

        let key = self.cache.key(
            CacheDomain::ScoreDuel,
            &[beatmap_id.into(), user_a.into(), user_b.into()],
        );
        self.cache
            .get_or_fetch(&key, || async {
                let (score_a, score_b) = tokio::try_join!(
                    self.best_score(beatmap_id, user_a),
                    self.best_score(beatmap_id, user_b),
                )?;
                let score_a = score_a.ok_or_else(|| {
                    DomainError::not_found("score", format!("{user_a}@{beatmap_id}"))
                })?;
                let score_b = score_b.ok_or_else(|| {
                    DomainError::not_found("score", format!("{user_b}@{beatmap_id}"))
                })?;

                let duel = duel(&score_a, &score_b, &SCORE_PRIMARY, SCORE_DUEL_METRICS);
                Ok(ScoreDuelReport {
                    beatmap_id,
                    scores: vec![score_a, score_b],
                    duel,
                })
            })
            .await
    }

    #[instrument(skip(self, search))]
    pub async fn search_scores(&self, search: &ScoreSearch) -> Result<SearchResults, AppError> {
        let prepared = search.prepare(self.settings.page_limits)?;
        let key = self.cache.key(CacheDomain::ScoreSearch, &prepared.key_parts);
        self.cache
            .get_or_fetch(&key, || async {
                let rows = self.source.fetch(&prepared.query).await?;
                Ok(SearchResults::from_rows(rows, prepared.page))
            })
            .await
    }

    #[instrument(skip(self, search))]
    pub async fn search_beatmaps(&self, search: &BeatmapSearch) -> Result<SearchResults, AppError> {
        let prepared = search.prepare(self.settings.page_limits)?;
        let key = self
            .cache
            .key(CacheDomain::BeatmapSearch, &prepared.key_parts);
        self.cache
            .get_or_fetch(&key, || async {
                let rows = self.source.fetch(&prepared.query).await?;
                Ok(SearchResults::from_rows(rows, prepared.page))
            })
            .await
    }

    /// Leaderboard-wide aggregates, optionally for one country.
    #[instrument(skip(self))]
    pub async fn leaderboard_summary(
        &self,
        country: Option<&str>,
    ) -> Result<LeaderboardSummary, AppError> {
        let country = match country.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                Some(code.to_ascii_uppercase())
            }
            Some(_) => {
                return Err(AppError::validation(
                    "country must be a two-letter country code",
                ));
            }
            None => None,
        };

        let key = self.cache.key(
            CacheDomain::Analytics,
            &["leaderboard_summary".into(), country.clone().into()],
        );
        self.cache
            .get_or_fetch(&key, || async {
                let aggregate_query = country_query(
                    LEADERBOARD_AGGREGATE_SELECT,
                    "",
                    country.as_deref(),
                )?;
                let grades_query = country_query(
                    GRADE_DISTRIBUTION_SELECT,
                    GRADE_DISTRIBUTION_TAIL,
                    country.as_deref(),
                )?;
                let (aggregate, grades) = tokio::try_join!(
                    self.source.fetch(&aggregate_query),
                    self.source.fetch(&grades_query),
                )?;

                let aggregate = aggregate.into_iter().next().unwrap_or_default();
                let grades = grades
                    .into_iter()
                    .map(|row| GradeCount {
                        count: row.metric("score_count").map_or(0, |count| count as u64),
                        grade: row.id,
                    })
                    .collect();

                Ok(LeaderboardSummary {
                    country: country.clone(),
                    player_count: aggregate
                        .metric("player_count")
                        .map_or(0, |count| count as u64),
                    pp_average: aggregate.metric("pp_average").unwrap_or(0.0),
                    pp_max: aggregate.metric("pp_max").unwrap_or(0.0),
                    accuracy_average: aggregate.metric("accuracy_average").unwrap_or(0.0),
                    grades,
                })
            })
            .await
    }

    /// Evict a player's profile and every cached comparison, head-to-head and
    /// duel, since any of them may include the player.
    #[instrument(skip(self))]
    pub async fn invalidate_player(&self, user_id: i64) -> usize {
        let key = self.cache.key(CacheDomain::Player, &[user_id.into()]);
        let mut removed = usize::from(self.cache.invalidate(&key).await);
        for domain in [
            CacheDomain::Comparison,
            CacheDomain::HeadToHead,
            CacheDomain::ScoreDuel,
        ] {
            removed += self.cache.invalidate_domain(domain).await;
        }
        info!(user_id, removed, "Invalidated player cache entries");
        removed
    }

    async fn find_player(&self, user_id: i64) -> Result<Option<EntityRecord>, AppError> {
        let mut builder = PredicateBuilder::new();
        builder.add_filter(
            true,
            ComparisonKind::Equals,
            "p.user_id",
            BindValue::Int(user_id),
        )?;
        let query = builder.finish().into_query(PLAYER_SELECT, SINGLE_ROW);
        Ok(self.source.fetch(&query).await?.into_iter().next())
    }

    /// Fetch every player concurrently; the first missing id, in request
    /// order, is reported as not found.
    async fn require_players(&self, user_ids: &[i64]) -> Result<Vec<EntityRecord>, AppError> {
        let found = try_join_all(user_ids.iter().map(|id| self.find_player(*id))).await?;
        user_ids
            .iter()
            .zip(found)
            .map(|(id, player)| player.ok_or_else(|| DomainError::not_found("player", id).into()))
            .collect()
    }

    async fn top_scores(&self, user_id: i64) -> Result<Vec<EntityRecord>, AppError> {
        let mut builder = PredicateBuilder::new();
        builder.add_filter(
            true,
            ComparisonKind::Equals,
            "sc.user_id",
            BindValue::Int(user_id),
        )?;
        let page = Page {
            limit: self.settings.top_scores.max(1),
            offset: 0,
        };
        let query = builder
            .finish()
            .into_paged_query(SCORE_SELECT, SCORE_SORTS[0], SCORE_TIEBREAK, page);
        let mut scores = self.source.fetch(&query).await?;
        scores.truncate(page.limit as usize);
        Ok(scores)
    }

    async fn best_score(
        &self,
        beatmap_id: i64,
        user_id: i64,
    ) -> Result<Option<EntityRecord>, AppError> {
        let mut builder = PredicateBuilder::new();
        builder
            .add_filter(
                true,
                ComparisonKind::Equals,
                "sc.beatmap_id",
                BindValue::Int(beatmap_id),
            )?
            .add_filter(
                true,
                ComparisonKind::Equals,
                "sc.user_id",
                BindValue::Int(user_id),
            )?;
        let page = Page {
            limit: 1,
            offset: 0,
        };
        let query = builder
            .finish()
            .into_paged_query(SCORE_SELECT, SCORE_SORTS[0], SCORE_TIEBREAK, page);
        Ok(self.source.fetch(&query).await?.into_iter().next())
    }
}

fn country_query(
    select: &'static str,
    tail: &'static str,
    country: Option<&str>,
) -> Result<PreparedQuery, AppError> {
    let mut builder = PredicateBuilder::new();
    builder.add_filter(
        country.is_some(),
        ComparisonKind::Equals,
        "p.country",
        BindValue::Text(country.unwrap_or_default().to_string()),
    )?;
    Ok(builder.finish().into_query(select, tail))
}

fn check_id(field: &str, id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::validation(format!("{field} must be positive")));
    }
    Ok(())
}

fn check_distinct(ids: &[i64]) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(**id)) {
        Some(id) => Err(AppError::validation(format!(
            "player {id} appears more than once"
        ))),
        None => Ok(()),
    }
}
