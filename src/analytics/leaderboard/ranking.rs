use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::{EntryMetadata, LeaderboardEntry};

/// Measure codes where a lower value is better regardless of label wording.
pub const INVERSE_MEASURE_CODES: [&str; 5] = ["C27", "C28", "C29", "D02", "D03"];

const INVERSE_MEASURE_PHRASES: [&str; 5] = [
    "members choosing to leave",
    "complaints about",
    "disenrollment",
    "leaving the plan",
    "readmission",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    /// `labels` carries every name the measure is known by, so an alias that
    /// drops the attrition wording cannot flip the sort.
    pub fn for_measure(code: &str, labels: &[&str]) -> Self {
        if is_inverse_code(code) || labels.iter().any(|label| is_inverse_measure(label)) {
            Self::Lower
        } else {
            Self::Higher
        }
    }

    /// Orders better values first.
    fn compare(self, left: f64, right: f64) -> Ordering {
        match self {
            Self::Higher => right.total_cmp(&left),
            Self::Lower => left.total_cmp(&right),
        }
    }

    fn is_improvement(self, delta: f64) -> bool {
        match self {
            Self::Higher => delta > 0.0,
            Self::Lower => delta < 0.0,
        }
    }
}

pub fn is_inverse_code(code: &str) -> bool {
    let normalized = code.trim().to_ascii_uppercase();
    INVERSE_MEASURE_CODES.contains(&normalized.as_str())
}

pub fn is_inverse_measure(label: &str) -> bool {
    let normalized = label.to_lowercase();
    INVERSE_MEASURE_PHRASES
        .iter()
        .any(|phrase| normalized.contains(phrase))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProfile {
    pub dominant_state: Option<String>,
    pub dominant_share: Option<f64>,
    pub total_enrollment: Option<i64>,
    pub metadata: EntryMetadata,
}

/// A contract or organization with its current-year value.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    pub entity_id: String,
    pub value: f64,
    pub profile: EntityProfile,
}

/// Best values first, ties by entity id; ranks are ordinal and never shared.
pub fn rank_top_performers(
    entities: &[ScoredEntity],
    prior: &BTreeMap<String, f64>,
    direction: Direction,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut ordered = entities.iter().collect::<Vec<&ScoredEntity>>();
    ordered.sort_by(|left, right| {
        direction
            .compare(left.value, right.value)
            .then_with(|| left.entity_id.cmp(&right.entity_id))
    });

    ordered
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, entity)| to_entry(entity, prior.get(&entity.entity_id).copied(), index + 1))
        .collect()
}

/// Entities present in both years whose delta moved in the requested
/// sense, largest move first.
pub fn rank_movers(
    entities: &[ScoredEntity],
    prior: &BTreeMap<String, f64>,
    direction: Direction,
    limit: usize,
    improving: bool,
) -> Vec<LeaderboardEntry> {
    let mut moved = entities
        .iter()
        .filter_map(|entity| {
            let prior_value = prior.get(&entity.entity_id).copied()?;
            let delta = entity.value - prior_value;
            let wanted = if improving {
                direction.is_improvement(delta)
            } else {
                direction.is_improvement(-delta)
            };
            wanted.then_some((entity, prior_value, delta))
        })
        .collect::<Vec<(&ScoredEntity, f64, f64)>>();

    moved.sort_by(|left, right| {
        let magnitude = right.2.abs().total_cmp(&left.2.abs());
        magnitude.then_with(|| left.0.entity_id.cmp(&right.0.entity_id))
    });

    moved
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (entity, prior_value, _))| to_entry(entity, Some(prior_value), index + 1))
        .collect()
}

fn to_entry(entity: &ScoredEntity, prior_value: Option<f64>, rank: usize) -> LeaderboardEntry {
    LeaderboardEntry {
        entity_id: entity.entity_id.clone(),
        value: entity.value,
        prior_value,
        delta: prior_value.map(|prior| entity.value - prior),
        rank,
        dominant_state: entity.profile.dominant_state.clone(),
        dominant_share: entity.profile.dominant_share,
        total_enrollment: entity.profile.total_enrollment,
        metadata: entity.profile.metadata.clone(),
    }
}
