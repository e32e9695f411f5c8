//! Per-contract enrollment landscape for one reporting period.
//!
//! Enrollment is aggregated plan -> state -> contract. A missing value stays
//! `None` at every level and never collapses to zero; only a level with no
//! reported contributor at all is `None`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::model::{ContractRow, EnrollmentPeriod, EnrollmentRow, PlanLandscapeRow};
use crate::store::{Repository, StoreResult};

pub const UNKNOWN_STATE: &str = "UNKNOWN";

const TRUTHY_INDICATORS: [&str; 5] = ["y", "yes", "true", "t", "1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTypeGroup {
    Snp,
    Not,
}

impl PlanTypeGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snp => "SNP",
            Self::Not => "NOT",
        }
    }
}

impl fmt::Display for PlanTypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanFeature {
    pub contract_id: String,
    pub plan_id: String,
    pub state_bucket: String,
    pub plan_type_group: PlanTypeGroup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractStateEnrollment {
    pub contract_id: String,
    pub state_bucket: String,
    pub total_enrollment: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantStateSource {
    Enrollment,
    PlanCount,
    Unresolved,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractNames {
    pub contract_name: Option<String>,
    pub marketing_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractLandscape {
    pub contract_id: String,
    pub names: ContractNames,
    pub parent_org: Option<String>,
    pub bcbs_flag: bool,
    pub total_enrollment: Option<i64>,
    pub plan_type_groups: BTreeSet<PlanTypeGroup>,
    pub dominant_state: Option<String>,
    pub dominant_share: Option<f64>,
    pub dominant_state_source: DominantStateSource,
}

impl ContractLandscape {
    pub fn display_name(&self) -> &str {
        self.names
            .marketing_name
            .as_deref()
            .or(self.names.contract_name.as_deref())
            .unwrap_or(&self.contract_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Landscape {
    pub period: EnrollmentPeriod,
    pub contracts: Vec<ContractLandscape>,
}

/// Loads the landscape for `period`, or for the most recent reported period
/// when none is pinned. `Ok(None)` when the store has no usable enrollment.
pub fn load_landscape<R: Repository + ?Sized>(
    repository: &R,
    period: Option<EnrollmentPeriod>,
) -> StoreResult<Option<Landscape>> {
    let period = match period {
        Some(period) => period,
        None => match repository.latest_enrollment_period()? {
            Some(period) => period,
            None => {
                info!("no enrollment period with reported enrollment");
                return Ok(None);
            }
        },
    };

    let enrollment = repository.enrollment_rows(period)?;
    let plans = repository.plan_landscape_rows()?;
    let contracts = repository.contract_rows()?;

    let landscape = build_landscape(period, &enrollment, &plans, &contracts);
    info!(
        year = period.year,
        month = period.month,
        enrollment_rows = enrollment.len(),
        contracts = landscape.len(),
        "built enrollment landscape"
    );

    Ok(Some(Landscape {
        period,
        contracts: landscape,
    }))
}

/// One record per contract present in the period's enrollment rows, sorted
/// by contract id.
pub fn build_landscape(
    period: EnrollmentPeriod,
    enrollment: &[EnrollmentRow],
    plans: &[PlanLandscapeRow],
    contracts: &[ContractRow],
) -> Vec<ContractLandscape> {
    let period_rows = enrollment
        .iter()
        .filter(|row| row.report_year == period.year && row.report_month == period.month)
        .collect::<Vec<&EnrollmentRow>>();

    let plan_index = index_plans(plans);
    let contract_index = contracts
        .iter()
        .map(|row| (row.contract_id.as_str(), row))
        .collect::<BTreeMap<&str, &ContractRow>>();

    let features = plan_features(&period_rows, &plan_index, &contract_index);
    let state_totals = state_enrollments(&period_rows, &plan_index);
    let plan_counts = plan_counts_by_state(plans);

    let mut groups_by_contract = BTreeMap::<&str, BTreeSet<PlanTypeGroup>>::new();
    for feature in &features {
        groups_by_contract
            .entry(feature.contract_id.as_str())
            .or_default()
            .insert(feature.plan_type_group);
    }

    let mut states_by_contract = BTreeMap::<&str, Vec<&ContractStateEnrollment>>::new();
    for state in &state_totals {
        states_by_contract
            .entry(state.contract_id.as_str())
            .or_default()
            .push(state);
    }

    states_by_contract
        .into_iter()
        .map(|(contract_id, states)| {
            let total_enrollment = contract_total(states.iter().copied());
            let (dominant_state, dominant_share, dominant_state_source) =
                match select_dominant_state(&states, total_enrollment) {
                    Some((state, share)) => {
                        (Some(state.to_string()), share, DominantStateSource::Enrollment)
                    }
                    None => match fallback_state(plan_counts.get(contract_id)) {
                        Some(state) => (Some(state), None, DominantStateSource::PlanCount),
                        None => (None, None, DominantStateSource::Unresolved),
                    },
                };

            if dominant_state_source != DominantStateSource::Enrollment {
                debug!(
                    contract_id = %contract_id,
                    fallback_state = ?dominant_state,
                    "dominant state not attributable from enrollment"
                );
            }

            let contract = contract_index.get(contract_id).copied();
            ContractLandscape {
                contract_id: contract_id.to_string(),
                names: ContractNames {
                    contract_name: contract.and_then(|row| non_blank(row.contract_name.as_deref())),
                    marketing_name: contract
                        .and_then(|row| non_blank(row.marketing_name.as_deref())),
                },
                parent_org: contract.and_then(|row| non_blank(row.parent_organization.as_deref())),
                bcbs_flag: contract.is_some_and(|row| row.is_blue_cross_blue_shield),
                total_enrollment,
                plan_type_groups: groups_by_contract.remove(contract_id).unwrap_or_default(),
                dominant_state,
                dominant_share,
                dominant_state_source,
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct PlanInfo {
    state: Option<String>,
    snp: bool,
}

/// Keyed by (contract, plan). A plan listed in several states takes the
/// lowest state code so its enrollment is counted once.
fn index_plans(plans: &[PlanLandscapeRow]) -> BTreeMap<(&str, &str), PlanInfo> {
    let mut index = BTreeMap::<(&str, &str), PlanInfo>::new();
    for row in plans {
        let info = index
            .entry((row.contract_id.as_str(), row.plan_id.as_str()))
            .or_default();
        if let Some(state) = normalize_state(row.state_abbreviation.as_deref()) {
            let replace = info.state.as_ref().is_none_or(|current| state < *current);
            if replace {
                info.state = Some(state);
            }
        }
        info.snp |= is_truthy_indicator(row.special_needs_plan_indicator.as_deref());
    }
    index
}

fn plan_features(
    period_rows: &[&EnrollmentRow],
    plan_index: &BTreeMap<(&str, &str), PlanInfo>,
    contract_index: &BTreeMap<&str, &ContractRow>,
) -> BTreeSet<PlanFeature> {
    period_rows
        .iter()
        .filter(|row| reported_enrollment(row).is_some())
        .map(|row| {
            let plan = plan_index.get(&(row.contract_id.as_str(), row.plan_id.as_str()));
            let contract_snp = contract_index
                .get(row.contract_id.as_str())
                .is_some_and(|contract| is_truthy_indicator(contract.snp_indicator.as_deref()));
            let plan_snp = plan.is_some_and(|info| info.snp);
            let text_snp = is_snp_plan_type(row.plan_type.as_deref());

            PlanFeature {
                contract_id: row.contract_id.clone(),
                plan_id: row.plan_id.clone(),
                state_bucket: state_bucket(plan),
                plan_type_group: if contract_snp || plan_snp || text_snp {
                    PlanTypeGroup::Snp
                } else {
                    PlanTypeGroup::Not
                },
            }
        })
        .collect()
}

fn state_enrollments(
    period_rows: &[&EnrollmentRow],
    plan_index: &BTreeMap<(&str, &str), PlanInfo>,
) -> Vec<ContractStateEnrollment> {
    let mut totals = BTreeMap::<(String, String), Option<i64>>::new();
    for row in period_rows {
        let plan = plan_index.get(&(row.contract_id.as_str(), row.plan_id.as_str()));
        let slot = totals
            .entry((row.contract_id.clone(), state_bucket(plan)))
            .or_insert(None);
        if let Some(value) = reported_enrollment(row) {
            *slot = Some(slot.unwrap_or(0) + value);
        }
    }

    totals
        .into_iter()
        .map(|((contract_id, state_bucket), total_enrollment)| ContractStateEnrollment {
            contract_id,
            state_bucket,
            total_enrollment,
        })
        .collect()
}

/// Sum of reported state totals; `None` only when every state is unreported.
pub fn contract_total<'a>(
    states: impl IntoIterator<Item = &'a ContractStateEnrollment>,
) -> Option<i64> {
    states
        .into_iter()
        .filter_map(|state| state.total_enrollment)
        .fold(None, |total, value| Some(total.unwrap_or(0) + value))
}

/// Winning state and its share of `contract_total`. Returns `None` when the
/// winner is the unknown bucket or carries no reported enrollment.
pub fn select_dominant_state<'a>(
    states: &[&'a ContractStateEnrollment],
    contract_total: Option<i64>,
) -> Option<(&'a str, Option<f64>)> {
    let winner = states
        .iter()
        .copied()
        .min_by(|left, right| compare_dominance(left, right))?;

    if winner.state_bucket == UNKNOWN_STATE {
        return None;
    }
    let state_total = winner.total_enrollment?;

    let share = contract_total
        .filter(|total| *total > 0)
        .map(|total| state_total as f64 / total as f64);
    Some((winner.state_bucket.as_str(), share))
}

fn compare_dominance(left: &ContractStateEnrollment, right: &ContractStateEnrollment) -> Ordering {
    let left_unknown = left.state_bucket == UNKNOWN_STATE;
    let right_unknown = right.state_bucket == UNKNOWN_STATE;

    left_unknown
        .cmp(&right_unknown)
        .then(match (left.total_enrollment, right.total_enrollment) {
            (Some(left_total), Some(right_total)) => right_total.cmp(&left_total),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| left.state_bucket.cmp(&right.state_bucket))
}

/// Distinct plans per known state, per contract.
fn plan_counts_by_state(plans: &[PlanLandscapeRow]) -> BTreeMap<&str, BTreeMap<String, usize>> {
    let mut distinct = BTreeMap::<&str, BTreeMap<String, BTreeSet<&str>>>::new();
    for row in plans {
        if let Some(state) = normalize_state(row.state_abbreviation.as_deref()) {
            distinct
                .entry(row.contract_id.as_str())
                .or_default()
                .entry(state)
                .or_default()
                .insert(row.plan_id.as_str());
        }
    }

    distinct
        .into_iter()
        .map(|(contract_id, states)| {
            let counts = states
                .into_iter()
                .map(|(state, plan_ids)| (state, plan_ids.len()))
                .collect();
            (contract_id, counts)
        })
        .collect()
}

/// State with the most distinct plans; ties go to the lower state code.
fn fallback_state(plan_counts: Option<&BTreeMap<String, usize>>) -> Option<String> {
    plan_counts?
        .iter()
        .max_by(|left, right| left.1.cmp(right.1).then(right.0.cmp(left.0)))
        .map(|(state, _)| state.clone())
}

fn state_bucket(plan: Option<&PlanInfo>) -> String {
    plan.and_then(|info| info.state.clone())
        .unwrap_or_else(|| UNKNOWN_STATE.to_string())
}

fn normalize_state(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|state| !state.is_empty())
        .map(str::to_ascii_uppercase)
        .filter(|state| state != UNKNOWN_STATE)
}

/// Negative counts are treated as unreported.
fn reported_enrollment(row: &EnrollmentRow) -> Option<i64> {
    row.enrollment.filter(|value| *value >= 0)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

pub fn is_truthy_indicator(value: Option<&str>) -> bool {
    value.is_some_and(|text| {
        let normalized = text.trim().to_ascii_lowercase();
        TRUTHY_INDICATORS.contains(&normalized.as_str())
    })
}

pub fn is_snp_plan_type(plan_type: Option<&str>) -> bool {
    plan_type.is_some_and(|text| {
        let normalized = text.to_ascii_lowercase();
        normalized.contains("snp") || normalized.contains("special needs")
    })
}
