//! Multi-entity comparison and ranking.
//!
//! Metrics declare their direction and missing-value policy through
//! [`MetricSpec`]; [`compare`] ranks 2..=N records on each metric and adds
//! signed differentials when exactly two records are compared.

mod engine;
mod head_to_head;
mod metrics;

pub use engine::{
    ComparisonBounds, ComparisonResult, DEFAULT_MAX_ENTITIES, Differential, MIN_ENTITIES,
    MetricRanking, Outcome, RankedEntry, compare, differential, rank_metric,
};
pub use head_to_head::{Duel, HeadToHead, SharedItem, duel, head_to_head};
pub use metrics::{Direction, MetricSpec, MissingValue, WORST_RANK_SENTINEL};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompareError {
    #[error("at least {min} entities are required, got {count}")]
    TooFewEntities { count: usize, min: usize },
    #[error("at most {max} entities can be compared, got {count}")]
    TooManyEntities { count: usize, max: usize },
    #[error("entity `{0}` appears more than once")]
    DuplicateEntity(String),
    #[error("no metrics to compare")]
    NoMetrics,
}
