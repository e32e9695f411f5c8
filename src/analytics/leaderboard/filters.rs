use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::Serialize;

use crate::analytics::buckets::EnrollmentBucket;
use crate::analytics::landscape::{ContractLandscape, PlanTypeGroup};

/// Minimum dominant share for a contract to count toward a state board.
pub const STATE_SHARE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTypeFilter {
    All,
    Snp,
    Not,
}

impl PlanTypeFilter {
    pub fn admits(self, groups: &BTreeSet<PlanTypeGroup>) -> bool {
        match self {
            Self::All => true,
            Self::Snp => groups.contains(&PlanTypeGroup::Snp),
            Self::Not => groups.contains(&PlanTypeGroup::Not),
        }
    }
}

/// Contract id series: `H` (MA / MA-PD) or `S` (stand-alone PDP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractSeries {
    All,
    H,
    S,
}

impl ContractSeries {
    pub fn admits(self, contract_id: &str) -> bool {
        let prefix = contract_id
            .trim_start()
            .chars()
            .next()
            .map(|ch| ch.to_ascii_uppercase());
        match self {
            Self::All => true,
            Self::H => prefix == Some('H'),
            Self::S => prefix == Some('S'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardFilters {
    pub state: Option<String>,
    pub plan_type: PlanTypeFilter,
    pub series: ContractSeries,
    pub enrollment_level: EnrollmentBucket,
    pub bcbs_only: bool,
}

impl Default for LeaderboardFilters {
    fn default() -> Self {
        Self {
            state: None,
            plan_type: PlanTypeFilter::All,
            series: ContractSeries::All,
            enrollment_level: EnrollmentBucket::All,
            bcbs_only: false,
        }
    }
}

impl LeaderboardFilters {
    /// Trims and upper-cases the state; a blank state means no state filter.
    pub fn normalized(mut self) -> Self {
        self.state = self
            .state
            .as_deref()
            .map(str::trim)
            .filter(|state| !state.is_empty())
            .map(str::to_ascii_uppercase);
        self
    }

    pub fn admits(&self, contract: &ContractLandscape) -> bool {
        self.admits_state(contract)
            && self.plan_type.admits(&contract.plan_type_groups)
            && self.series.admits(&contract.contract_id)
            && self.enrollment_level.admits(contract.total_enrollment)
            && (!self.bcbs_only || contract.bcbs_flag)
    }

    fn admits_state(&self, contract: &ContractLandscape) -> bool {
        let Some(requested) = self.state.as_deref() else {
            return true;
        };

        let state_matches = contract
            .dominant_state
            .as_deref()
            .is_some_and(|state| state.eq_ignore_ascii_case(requested));
        let share_qualifies = contract
            .dominant_share
            .is_some_and(|share| share >= STATE_SHARE_THRESHOLD);
        state_matches && share_qualifies
    }
}
