//! Pairwise comparison restricted to items both entities share.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::engine::{Differential, Outcome, differential};
use super::metrics::MetricSpec;
use crate::domain::entities::EntityRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedItem {
    pub item: String,
    pub a_value: f64,
    pub b_value: f64,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub entity_a: String,
    pub entity_b: String,
    pub metric: String,
    pub items: Vec<SharedItem>,
    pub a_wins: u32,
    pub b_wins: u32,
    pub ties: u32,
    pub overall: Outcome,
}

/// Compare two entities' item-level records on the items both have.
///
/// Records are grouped by `item_field`; when an entity has several records
/// for one item, its best under `primary` counts. Records without the field
/// are ignored. Shared items are reported in ascending item order, numeric
/// identifiers compared as numbers.
pub fn head_to_head(
    entity_a: &str,
    entity_b: &str,
    a_items: &[EntityRecord],
    b_items: &[EntityRecord],
    item_field: &str,
    primary: &MetricSpec,
) -> HeadToHead {
    let a_best = best_per_item(a_items, item_field, primary);
    let b_best = best_per_item(b_items, item_field, primary);

    let mut items = Vec::new();
    let (mut a_wins, mut b_wins, mut ties) = (0, 0, 0);
    for (item, a_value) in &a_best {
        let Some(b_value) = b_best.get(item) else {
            continue;
        };
        let outcome = Outcome::decide(*a_value, *b_value, primary.direction);
        match outcome {
            Outcome::EntityA => a_wins += 1,
            Outcome::EntityB => b_wins += 1,
            Outcome::Tie => ties += 1,
        }
        items.push(SharedItem {
            item: item.clone(),
            a_value: *a_value,
            b_value: *b_value,
            outcome,
        });
    }
    items.sort_by(|left, right| item_order(&left.item, &right.item));

    let overall = match a_wins.cmp(&b_wins) {
        Ordering::Greater => Outcome::EntityA,
        Ordering::Less => Outcome::EntityB,
        Ordering::Equal => Outcome::Tie,
    };

    HeadToHead {
        entity_a: entity_a.to_string(),
        entity_b: entity_b.to_string(),
        metric: primary.name.to_string(),
        items,
        a_wins,
        b_wins,
        ties,
        overall,
    }
}

/// Numeric identifiers first, by value; anything else after, lexicographically.
fn item_order(left: &str, right: &str) -> Ordering {
    match (left.parse::<i64>(), right.parse::<i64>()) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => left.cmp(right),
    }
}

fn best_per_item(
    records: &[EntityRecord],
    item_field: &str,
    primary: &MetricSpec,
) -> BTreeMap<String, f64> {
    let mut best: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        let Some(item) = record.field_text(item_field) else {
            continue;
        };
        let (value, _) = primary.value_of(record);
        best.entry(item)
            .and_modify(|current| {
                if primary.direction.order(value, *current) == Ordering::Less {
                    *current = value;
                }
            })
            .or_insert(value);
    }
    best
}

/// Two records contending for one shared item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duel {
    pub entity_a: String,
    pub entity_b: String,
    pub metric: String,
    pub outcome: Outcome,
    pub differentials: Vec<Differential>,
}

/// Decide a duel on `primary`; `extra` metrics only contribute differentials.
pub fn duel(a: &EntityRecord, b: &EntityRecord, primary: &MetricSpec, extra: &[MetricSpec]) -> Duel {
    let decisive = differential(a, b, primary);
    let outcome = decisive.outcome;
    let mut differentials = Vec::with_capacity(extra.len() + 1);
    differentials.push(decisive);
    differentials.extend(
        extra
            .iter()
            .filter(|spec| spec.name != primary.name)
            .map(|spec| differential(a, b, spec)),
    );

    Duel {
        entity_a: a.id.clone(),
        entity_b: b.id.clone(),
        metric: primary.name.to_string(),
        outcome,
        differentials,
    }
}
