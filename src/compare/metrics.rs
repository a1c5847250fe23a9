//! Metric declarations: ranking direction and null policy.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::entities::EntityRecord;

/// Substitute for a missing lower-is-better value, e.g. an unranked player's
/// country rank. Any real rank sorts ahead of it.
pub const WORST_RANK_SENTINEL: f64 = 999_999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    /// Orders `a` before `b` when `a` is the better value. Numerically equal
    /// values (including `0.0` and `-0.0`) are `Equal`.
    pub fn order(self, a: f64, b: f64) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        match self {
            Direction::HigherIsBetter => b.total_cmp(&a),
            Direction::LowerIsBetter => a.total_cmp(&b),
        }
    }

    pub fn worst_value(self) -> f64 {
        match self {
            Direction::HigherIsBetter => 0.0,
            Direction::LowerIsBetter => WORST_RANK_SENTINEL,
        }
    }
}

/// What a null or absent metric counts as.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValue {
    Zero,
    /// The worst value for the metric's direction.
    Worst,
    Fixed(f64),
}

/// A named metric taking part in a comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub direction: Direction,
    pub missing: MissingValue,
}

impl MetricSpec {
    /// Higher is better; missing counts as zero.
    pub const fn higher(name: &'static str) -> Self {
        Self {
            name,
            direction: Direction::HigherIsBetter,
            missing: MissingValue::Zero,
        }
    }

    /// Lower is better; missing counts as the worst possible value.
    pub const fn lower(name: &'static str) -> Self {
        Self {
            name,
            direction: Direction::LowerIsBetter,
            missing: MissingValue::Worst,
        }
    }

    pub const fn missing_as(mut self, missing: MissingValue) -> Self {
        self.missing = missing;
        self
    }

    pub fn substitute(&self) -> f64 {
        match self.missing {
            MissingValue::Zero => 0.0,
            MissingValue::Worst => self.direction.worst_value(),
            MissingValue::Fixed(value) => value,
        }
    }

    /// The record's value with the missing policy applied, and whether it was substituted.
    pub fn value_of(&self, record: &EntityRecord) -> (f64, bool) {
        match record.metric(self.name) {
            Some(value) => (value, false),
            None => (self.substitute(), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_direction() {
        assert_eq!(MetricSpec::higher("pp").substitute(), 0.0);
        assert_eq!(
            MetricSpec::lower("country_rank").substitute(),
            WORST_RANK_SENTINEL
        );
        assert_eq!(
            MetricSpec::lower("global_rank")
                .missing_as(MissingValue::Fixed(5_000_000.0))
                .substitute(),
            5_000_000.0
        );
    }

    #[test]
    fn order_puts_better_values_first() {
        assert_eq!(Direction::HigherIsBetter.order(800.0, 500.0), Ordering::Less);
        assert_eq!(Direction::LowerIsBetter.order(5.0, 20.0), Ordering::Less);
        assert_eq!(Direction::LowerIsBetter.order(7.0, 7.0), Ordering::Equal);
    }

    #[test]
    fn signed_zeros_are_equal() {
        for direction in [Direction::HigherIsBetter, Direction::LowerIsBetter] {
            assert_eq!(direction.order(0.0, -0.0), Ordering::Equal);
            assert_eq!(direction.order(-0.0, 0.0), Ordering::Equal);
        }
    }

    #[test]
    fn value_of_reports_substitution() {
        let record = EntityRecord::new("1").with_metric("pp", 321.0);
        assert_eq!(MetricSpec::higher("pp").value_of(&record), (321.0, false));
        assert_eq!(
            MetricSpec::lower("country_rank").value_of(&record),
            (WORST_RANK_SENTINEL, true)
        );
    }
}
