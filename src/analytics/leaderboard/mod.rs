//! Ranked leaderboard sections over the enrollment landscape.
//!
//! Each requested measure produces one section with three independently
//! truncated lists: top performers for the data year, and the biggest
//! improvers and decliners against the prior year.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::buckets::{EnrollmentBucket, classify, format_enrollment};
use crate::analytics::landscape::{ContractLandscape, PlanTypeGroup, load_landscape};
use crate::analytics::measures::{MeasureDetails, ValueType, resolve_measure};
use crate::analytics::statistics::{StatisticsSummary, summarize};
use crate::model::EnrollmentPeriod;
use crate::store::{Repository, StoreResult};
use crate::util::timestamp_now;

mod filters;
mod organization;
mod ranking;

pub use filters::{ContractSeries, LeaderboardFilters, PlanTypeFilter, STATE_SHARE_THRESHOLD};
pub use ranking::{Direction, EntityProfile, ScoredEntity, is_inverse_measure};

use organization::{group_by_organization, organization_values, scored_organizations};
use ranking::{rank_movers, rank_top_performers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardMode {
    Contract,
    Organization,
}

impl LeaderboardMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contract => "contract",
            Self::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardRequest {
    pub mode: LeaderboardMode,
    pub filters: LeaderboardFilters,
    pub measure_codes: Vec<String>,
    pub as_of_year: Option<i32>,
    pub period: Option<EnrollmentPeriod>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub name: String,
    pub parent_organization: Option<String>,
    pub enrollment_label: String,
    pub enrollment_bucket: EnrollmentBucket,
    pub plan_type_groups: Vec<PlanTypeGroup>,
    pub bcbs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub entity_id: String,
    pub value: f64,
    pub prior_value: Option<f64>,
    pub delta: Option<f64>,
    pub rank: usize,
    pub dominant_state: Option<String>,
    pub dominant_share: Option<f64>,
    pub total_enrollment: Option<i64>,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSection {
    pub key: String,
    pub name: String,
    pub domain: Option<String>,
    pub direction: Direction,
    pub unit: String,
    pub value_type: Option<ValueType>,
    pub data_year: i32,
    pub prior_year: i32,
    pub summary: StatisticsSummary,
    pub top_performers: Vec<LeaderboardEntry>,
    pub biggest_movers: Vec<LeaderboardEntry>,
    pub biggest_decliners: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub generated_at: String,
    pub mode: LeaderboardMode,
    pub filters: LeaderboardFilters,
    pub data_year: Option<i32>,
    pub prior_year: Option<i32>,
    pub enrollment_period: Option<EnrollmentPeriod>,
    pub eligible_contracts: usize,
    pub sections: Vec<LeaderboardSection>,
}

pub fn generate_leaderboard<R: Repository + ?Sized>(
    repository: &R,
    request: &LeaderboardRequest,
) -> StoreResult<LeaderboardResponse> {
    let (enrollment_period, contracts) = match load_landscape(repository, request.period)? {
        Some(landscape) => (Some(landscape.period), landscape.contracts),
        None => (None, Vec::new()),
    };

    let eligible = contracts
        .iter()
        .filter(|contract| request.filters.admits(contract))
        .collect::<Vec<&ContractLandscape>>();
    let contract_ids = eligible
        .iter()
        .map(|contract| contract.contract_id.clone())
        .collect::<Vec<String>>();

    info!(
        mode = request.mode.as_str(),
        landscape_contracts = contracts.len(),
        eligible_contracts = eligible.len(),
        measures = request.measure_codes.len(),
        "leaderboard scope resolved"
    );

    let mut sections = Vec::with_capacity(request.measure_codes.len());
    for code in &request.measure_codes {
        let Some(current) = resolve_measure(repository, code, &contract_ids, request.as_of_year)?
        else {
            warn!(code = %code, "measure has no metadata; section omitted");
            continue;
        };

        let data_year = current.latest_year;
        let prior_year = data_year - 1;
        let prior_values = resolve_measure(repository, code, &contract_ids, Some(prior_year))?
            .map(|details| details.values_for_year(prior_year))
            .unwrap_or_default();
        let current_values = current.values_for_year(data_year);

        sections.push(build_section(
            &current,
            data_year,
            &eligible,
            &current_values,
            &prior_values,
            request.mode,
            request.limit,
        ));
    }

    let data_year = sections.iter().map(|section| section.data_year).max();
    Ok(LeaderboardResponse {
        generated_at: timestamp_now(),
        mode: request.mode,
        filters: request.filters.clone(),
        data_year,
        prior_year: data_year.map(|year| year - 1),
        enrollment_period,
        eligible_contracts: eligible.len(),
        sections,
    })
}

/// One section from already resolved values. `current_values` and
/// `prior_values` are keyed by contract id.
pub fn build_section(
    details: &MeasureDetails,
    data_year: i32,
    eligible: &[&ContractLandscape],
    current_values: &BTreeMap<String, f64>,
    prior_values: &BTreeMap<String, f64>,
    mode: LeaderboardMode,
    limit: usize,
) -> LeaderboardSection {
    let direction = Direction::for_measure(&details.code, &details.labels());

    let (entities, prior) = match mode {
        LeaderboardMode::Contract => {
            let entities = eligible
                .iter()
                .filter_map(|contract| {
                    current_values
                        .get(&contract.contract_id)
                        .map(|value| ScoredEntity {
                            entity_id: contract.contract_id.clone(),
                            value: *value,
                            profile: contract_profile(contract),
                        })
                })
                .collect::<Vec<ScoredEntity>>();
            (entities, prior_values.clone())
        }
        LeaderboardMode::Organization => {
            let groups = group_by_organization(eligible);
            (
                scored_organizations(&groups, current_values),
                organization_values(&groups, prior_values),
            )
        }
    };

    let summary = summarize(
        &entities
            .iter()
            .map(|entity| entity.value)
            .collect::<Vec<f64>>(),
    );

    LeaderboardSection {
        key: details.code.clone(),
        name: details.name.clone(),
        domain: details.domain.clone(),
        direction,
        unit: details.unit.clone(),
        value_type: details.value_type,
        data_year,
        prior_year: data_year - 1,
        summary,
        top_performers: rank_top_performers(&entities, &prior, direction, limit),
        biggest_movers: rank_movers(&entities, &prior, direction, limit, true),
        biggest_decliners: rank_movers(&entities, &prior, direction, limit, false),
    }
}

fn contract_profile(contract: &ContractLandscape) -> EntityProfile {
    EntityProfile {
        dominant_state: contract.dominant_state.clone(),
        dominant_share: contract.dominant_share,
        total_enrollment: contract.total_enrollment,
        metadata: EntryMetadata {
            name: contract.display_name().to_string(),
            parent_organization: contract.parent_org.clone(),
            enrollment_label: format_enrollment(contract.total_enrollment),
            enrollment_bucket: classify(contract.total_enrollment),
            plan_type_groups: contract.plan_type_groups.iter().copied().collect(),
            bcbs: contract.bcbs_flag,
            contract_count: None,
        },
    }
}
