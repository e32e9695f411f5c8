use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::buckets::{classify, format_enrollment};
use crate::analytics::landscape::ContractLandscape;

use super::EntryMetadata;
use super::ranking::{EntityProfile, ScoredEntity};

/// Contracts grouped by parent organization; contracts without one are
/// left out of organization boards.
pub fn group_by_organization<'a>(
    contracts: &[&'a ContractLandscape],
) -> BTreeMap<String, Vec<&'a ContractLandscape>> {
    let mut groups = BTreeMap::<String, Vec<&ContractLandscape>>::new();
    for contract in contracts {
        if let Some(parent) = contract.parent_org.as_deref() {
            groups.entry(parent.to_string()).or_default().push(contract);
        }
    }
    groups
}

/// Enrollment-weighted mean of member values, or the plain mean when no
/// member with a value has a positive known enrollment.
pub fn organization_value(
    members: &[&ContractLandscape],
    values: &BTreeMap<String, f64>,
) -> Option<f64> {
    let valued = members
        .iter()
        .filter_map(|contract| {
            values
                .get(&contract.contract_id)
                .map(|value| (*value, contract.total_enrollment.filter(|total| *total > 0)))
        })
        .collect::<Vec<(f64, Option<i64>)>>();
    if valued.is_empty() {
        return None;
    }

    let weighted = valued
        .iter()
        .filter_map(|(value, weight)| weight.map(|weight| (*value, weight as f64)))
        .collect::<Vec<(f64, f64)>>();
    if weighted.is_empty() {
        let sum = valued.iter().map(|(value, _)| value).sum::<f64>();
        return Some(sum / valued.len() as f64);
    }

    let total_weight = weighted.iter().map(|(_, weight)| weight).sum::<f64>();
    let weighted_sum = weighted
        .iter()
        .map(|(value, weight)| value * weight)
        .sum::<f64>();
    Some(weighted_sum / total_weight)
}

pub fn organization_values(
    groups: &BTreeMap<String, Vec<&ContractLandscape>>,
    values: &BTreeMap<String, f64>,
) -> BTreeMap<String, f64> {
    groups
        .iter()
        .filter_map(|(organization, members)| {
            organization_value(members, values).map(|value| (organization.clone(), value))
        })
        .collect()
}

pub fn scored_organizations(
    groups: &BTreeMap<String, Vec<&ContractLandscape>>,
    values: &BTreeMap<String, f64>,
) -> Vec<ScoredEntity> {
    groups
        .iter()
        .filter_map(|(organization, members)| {
            let value = organization_value(members, values)?;
            Some(ScoredEntity {
                entity_id: organization.clone(),
                value,
                profile: organization_profile(organization, members),
            })
        })
        .collect()
}

fn organization_profile(organization: &str, members: &[&ContractLandscape]) -> EntityProfile {
    let total_enrollment = members
        .iter()
        .filter_map(|contract| contract.total_enrollment)
        .fold(None, |total: Option<i64>, value| {
            Some(total.unwrap_or(0) + value)
        });
    let plan_type_groups = members
        .iter()
        .flat_map(|contract| contract.plan_type_groups.iter().copied())
        .collect::<BTreeSet<_>>();

    EntityProfile {
        dominant_state: None,
        dominant_share: None,
        total_enrollment,
        metadata: EntryMetadata {
            name: organization.to_string(),
            parent_organization: Some(organization.to_string()),
            enrollment_label: format_enrollment(total_enrollment),
            enrollment_bucket: classify(total_enrollment),
            plan_type_groups: plan_type_groups.into_iter().collect(),
            bcbs: members.iter().any(|contract| contract.bcbs_flag),
            contract_count: Some(members.len()),
        },
    }
}
