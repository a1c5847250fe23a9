//! Multi-entity ranking and two-entity differentials.
//!
//! Every metric is ranked independently in its own direction; equal values
//! share a dense rank and keep their input order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::CompareError;
use super::metrics::{Direction, MetricSpec};
use crate::domain::entities::EntityRecord;

pub const MIN_ENTITIES: usize = 2;
pub const DEFAULT_MAX_ENTITIES: usize = 5;

/// Accepted entity count for one comparison. The minimum is fixed at two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonBounds {
    max: usize,
}

impl Default for ComparisonBounds {
    fn default() -> Self {
        Self {
            max: DEFAULT_MAX_ENTITIES,
        }
    }
}

impl ComparisonBounds {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(MIN_ENTITIES),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn check(&self, count: usize) -> Result<(), CompareError> {
        if count < MIN_ENTITIES {
            return Err(CompareError::TooFewEntities {
                count,
                min: MIN_ENTITIES,
            });
        }
        if count > self.max {
            return Err(CompareError::TooManyEntities {
                count,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    EntityA,
    EntityB,
    Tie,
}

impl Outcome {
    /// Decide between two values of one metric; equal values tie.
    pub fn decide(a: f64, b: f64, direction: Direction) -> Self {
        match direction.order(a, b) {
            std::cmp::Ordering::Less => Outcome::EntityA,
            std::cmp::Ordering::Greater => Outcome::EntityB,
            std::cmp::Ordering::Equal => Outcome::Tie,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub entity_id: String,
    pub value: f64,
    pub rank: u32,
    /// The stored value was null or absent and the metric's default was used.
    pub substituted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRanking {
    pub metric: String,
    pub direction: Direction,
    pub best: f64,
    pub worst: f64,
    pub average: f64,
    pub entries: Vec<RankedEntry>,
}

/// Signed gap between two entities; positive always favours `entity_a`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differential {
    pub metric: String,
    pub entity_a: String,
    pub entity_b: String,
    pub value: f64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub entity_ids: Vec<String>,
    pub metrics: Vec<MetricRanking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differentials: Option<Vec<Differential>>,
}

impl ComparisonResult {
    pub fn metric(&self, name: &str) -> Option<&MetricRanking> {
        self.metrics.iter().find(|ranking| ranking.metric == name)
    }
}

/// Rank `entities` on every metric in `metrics`.
///
/// Two-entity comparisons also carry per-metric differentials.
pub fn compare(
    entities: &[EntityRecord],
    metrics: &[MetricSpec],
    bounds: ComparisonBounds,
) -> Result<ComparisonResult, CompareError> {
    bounds.check(entities.len())?;
    if metrics.is_empty() {
        return Err(CompareError::NoMetrics);
    }
    let mut seen = HashSet::with_capacity(entities.len());
    for entity in entities {
        if !seen.insert(entity.id.as_str()) {
            return Err(CompareError::DuplicateEntity(entity.id.clone()));
        }
    }

    let rankings = metrics
        .iter()
        .map(|spec| rank_metric(entities, spec))
        .collect();

    let differentials = match entities {
        [a, b] => Some(
            metrics
                .iter()
                .map(|spec| differential(a, b, spec))
                .collect(),
        ),
        _ => None,
    };

    Ok(ComparisonResult {
        entity_ids: entities.iter().map(|entity| entity.id.clone()).collect(),
        metrics: rankings,
        differentials,
    })
}

/// Dense ranking of `entities` on one metric.
///
/// Ties share a rank and the next distinct value takes the next integer.
/// Equal values keep their input order. Callers guarantee `entities` is
/// non-empty.
pub fn rank_metric(entities: &[EntityRecord], spec: &MetricSpec) -> MetricRanking {
    let mut entries: Vec<RankedEntry> = entities
        .iter()
        .map(|entity| {
            let (value, substituted) = spec.value_of(entity);
            RankedEntry {
                entity_id: entity.id.clone(),
                value,
                rank: 0,
                substituted,
            }
        })
        .collect();

    entries.sort_by(|left, right| spec.direction.order(left.value, right.value));

    let mut rank = 0;
    let mut previous: Option<f64> = None;
    for entry in &mut entries {
        if previous != Some(entry.value) {
            rank += 1;
            previous = Some(entry.value);
        }
        entry.rank = rank;
    }

    let count = entries.len().max(1) as f64;
    let average = entries.iter().map(|entry| entry.value).sum::<f64>() / count;
    let best = entries.first().map_or(0.0, |entry| entry.value);
    let worst = entries.last().map_or(0.0, |entry| entry.value);

    MetricRanking {
        metric: spec.name.to_string(),
        direction: spec.direction,
        best,
        worst,
        average,
        entries,
    }
}

/// `a - b` for higher-is-better metrics and `b - a` for lower-is-better.
pub fn differential(a: &EntityRecord, b: &EntityRecord, spec: &MetricSpec) -> Differential {
    let (a_value, _) = spec.value_of(a);
    let (b_value, _) = spec.value_of(b);
    let value = match spec.direction {
        Direction::HigherIsBetter => a_value - b_value,
        Direction::LowerIsBetter => b_value - a_value,
    };
    Differential {
        metric: spec.name.to_string(),
        entity_a: a.id.clone(),
        entity_b: b.id.clone(),
        value,
        outcome: Outcome::decide(a_value, b_value, spec.direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::metrics::WORST_RANK_SENTINEL;

    fn player(id: &str, pp: f64) -> EntityRecord {
        EntityRecord::new(id).with_metric("pp", pp)
    }

    #[test]
    fn ranks_higher_is_better_metric() {
        let entities = [player("A", 500.0), player("B", 800.0), player("C", 650.0)];
        let result = compare(
            &entities,
            &[MetricSpec::higher("pp")],
            ComparisonBounds::default(),
        )
        .unwrap();

        let pp = result.metric("pp").unwrap();
        let order: Vec<(&str, f64, u32)> = pp
            .entries
            .iter()
            .map(|entry| (entry.entity_id.as_str(), entry.value, entry.rank))
            .collect();
        assert_eq!(order, vec![("B", 800.0, 1), ("C", 650.0, 2), ("A", 500.0, 3)]);
        assert_eq!(pp.best, 800.0);
        assert_eq!(pp.worst, 500.0);
        assert_eq!(pp.average, 650.0);
        assert!(result.differentials.is_none());
    }

    #[test]
    fn lower_is_better_differential_favours_smaller_rank() {
        let p1 = EntityRecord::new("p1").with_metric("country_rank", 5.0);
        let p2 = EntityRecord::new("p2").with_metric("country_rank", 20.0);
        let result = compare(
            &[p1, p2],
            &[MetricSpec::lower("country_rank")],
            ComparisonBounds::default(),
        )
        .unwrap();

        let diff = &result.differentials.unwrap()[0];
        assert_eq!(diff.value, 15.0);
        assert_eq!(diff.outcome, Outcome::EntityA);
    }

    #[test]
    fn higher_is_better_differential_is_a_minus_b() {
        let diff = differential(
            &player("a", 600.0),
            &player("b", 750.0),
            &MetricSpec::higher("pp"),
        );
        assert_eq!(diff.value, -150.0);
        assert_eq!(diff.outcome, Outcome::EntityB);
    }

    #[test]
    fn missing_rank_sorts_last_not_first() {
        let ranked = EntityRecord::new("ranked").with_metric("global_rank", 12_000.0);
        let unranked = EntityRecord::new("unranked").with_metric("global_rank", None::<f64>);
        let ranking = rank_metric(&[unranked, ranked], &MetricSpec::lower("global_rank"));

        assert_eq!(ranking.entries[0].entity_id, "ranked");
        assert_eq!(ranking.entries[1].entity_id, "unranked");
        assert!(ranking.entries[1].substituted);
        assert_eq!(ranking.worst, WORST_RANK_SENTINEL);
    }

    #[test]
    fn missing_higher_metric_counts_as_zero() {
        let ranking = rank_metric(
            &[EntityRecord::new("none"), player("some", 10.0)],
            &MetricSpec::higher("pp"),
        );
        assert_eq!(ranking.entries[1].entity_id, "none");
        assert_eq!(ranking.entries[1].value, 0.0);
        assert_eq!(ranking.average, 5.0);
    }

    #[test]
    fn signed_zero_values_tie() {
        let a = player("a", 0.0);
        let b = player("b", -0.0);
        let spec = MetricSpec::higher("pp");

        let diff = differential(&a, &b, &spec);
        assert_eq!(diff.value, 0.0);
        assert_eq!(diff.outcome, Outcome::Tie);

        let ranking = rank_metric(&[b.clone(), a.clone()], &spec);
        let ranks: Vec<(&str, u32)> = ranking
            .entries
            .iter()
            .map(|entry| (entry.entity_id.as_str(), entry.rank))
            .collect();
        assert_eq!(ranks, vec![("b", 1), ("a", 1)]);
    }

    #[test]
    fn ties_share_a_dense_rank_in_input_order() {
        let entities = [
            player("a", 700.0),
            player("b", 900.0),
            player("c", 700.0),
            player("d", 100.0),
        ];
        let ranking = rank_metric(&entities, &MetricSpec::higher("pp"));
        let ranks: Vec<(&str, u32)> = ranking
            .entries
            .iter()
            .map(|entry| (entry.entity_id.as_str(), entry.rank))
            .collect();
        assert_eq!(ranks, vec![("b", 1), ("a", 2), ("c", 2), ("d", 3)]);
    }

    #[test]
    fn equal_pair_differential_is_a_tie() {
        let diff = differential(&player("a", 400.0), &player("b", 400.0), &MetricSpec::higher("pp"));
        assert_eq!(diff.value, 0.0);
        assert_eq!(diff.outcome, Outcome::Tie);
    }

    #[test]
    fn entity_count_bounds() {
        let metrics = [MetricSpec::higher("pp")];
        let make = |n: usize| -> Vec<EntityRecord> {
            (0..n).map(|i| player(&format!("p{i}"), i as f64)).collect()
        };

        assert!(matches!(
            compare(&make(1), &metrics, ComparisonBounds::default()),
            Err(CompareError::TooFewEntities { count: 1, min: 2 })
        ));
        assert!(matches!(
            compare(&make(6), &metrics, ComparisonBounds::default()),
            Err(CompareError::TooManyEntities { count: 6, max: 5 })
        ));
        assert!(compare(&make(2), &metrics, ComparisonBounds::default()).is_ok());
        assert!(compare(&make(5), &metrics, ComparisonBounds::default()).is_ok());
    }

    #[test]
    fn configured_maximum_cannot_drop_below_two() {
        assert_eq!(ComparisonBounds::new(0).max(), MIN_ENTITIES);
        assert!(ComparisonBounds::new(8).check(8).is_ok());
    }

    #[test]
    fn duplicates_and_empty_metric_lists_are_rejected() {
        let metrics = [MetricSpec::higher("pp")];
        assert!(matches!(
            compare(
                &[player("a", 1.0), player("a", 2.0)],
                &metrics,
                ComparisonBounds::default()
            ),
            Err(CompareError::DuplicateEntity(id)) if id == "a"
        ));
        assert!(matches!(
            compare(
                &[player("a", 1.0), player("b", 2.0)],
                &[],
                ComparisonBounds::default()
            ),
            Err(CompareError::NoMetrics)
        ));
    }

    #[test]
    fn heterogeneous_metrics_rank_independently() {
        let a = EntityRecord::new("a")
            .with_metric("pp", 9000.0)
            .with_metric("accuracy", 97.1)
            .with_metric("global_rank", 40.0);
        let b = EntityRecord::new("b")
            .with_metric("pp", 8700.0)
            .with_metric("accuracy", 99.2)
            .with_metric("global_rank", 55.0);
        let metrics = [
            MetricSpec::higher("pp"),
            MetricSpec::higher("accuracy"),
            MetricSpec::lower("global_rank"),
        ];
        let result = compare(&[a, b], &metrics, ComparisonBounds::default()).unwrap();

        let leaders: Vec<&str> = result
            .metrics
            .iter()
            .map(|ranking| ranking.entries[0].entity_id.as_str())
            .collect();
        assert_eq!(leaders, vec!["a", "b", "a"]);

        let outcomes: Vec<Outcome> = result
            .differentials
            .unwrap()
            .iter()
            .map(|diff| diff.outcome)
            .collect();
        assert_eq!(
            outcomes,
            vec![Outcome::EntityA, Outcome::EntityB, Outcome::EntityA]
        );
    }
}
