use rusqlite::Connection;

use crate::commands::ingest::load_seed;
use crate::model::{
    ContractRow, EnrollmentRow, MeasureRow, MetricRow, PlanLandscapeRow, SeedDocument,
};
use crate::store::{SqliteRepository, ensure_schema};

pub fn seeded_repository(seed: &SeedDocument) -> SqliteRepository {
    let connection = Connection::open_in_memory().expect("open memory db");
    ensure_schema(&connection).expect("create schema");
    let (counts, _) = load_seed(&connection, seed).expect("load seed");
    assert_eq!(counts.rows_rejected, 0, "fixture rows should all be valid");
    SqliteRepository::from_connection(connection)
}

pub fn contract(contract_id: &str, parent: Option<&str>) -> ContractRow {
    ContractRow {
        contract_id: contract_id.to_string(),
        contract_name: Some(format!("{contract_id} Plan")),
        marketing_name: None,
        parent_organization: parent.map(ToOwned::to_owned),
        snp_indicator: None,
        is_blue_cross_blue_shield: false,
    }
}

pub fn plan(contract_id: &str, plan_id: &str, state: &str) -> PlanLandscapeRow {
    PlanLandscapeRow {
        contract_id: contract_id.to_string(),
        plan_id: plan_id.to_string(),
        state_abbreviation: Some(state.to_string()),
        special_needs_plan_indicator: None,
    }
}

pub fn enrollment(
    contract_id: &str,
    plan_id: &str,
    year: i32,
    month: u32,
    value: Option<i64>,
) -> EnrollmentRow {
    EnrollmentRow {
        contract_id: contract_id.to_string(),
        plan_id: plan_id.to_string(),
        report_year: year,
        report_month: month,
        enrollment: value,
        plan_type: Some("HMO".to_string()),
    }
}

pub fn measure(code: &str, name: &str, year: i32) -> MeasureRow {
    MeasureRow {
        code: code.to_string(),
        name: name.to_string(),
        alias: None,
        domain: Some("Member Experience".to_string()),
        weight: Some(1.5),
        year,
    }
}

pub fn percent_metric(contract_id: &str, code: &str, year: i32, rate: f64) -> MetricRow {
    MetricRow {
        contract_id: contract_id.to_string(),
        measure_code: code.to_string(),
        year,
        rate_percent: Some(rate),
        value_numeric: None,
        value_unit: None,
        star_rating: None,
    }
}

pub fn star_metric(contract_id: &str, code: &str, year: i32, stars: &str) -> MetricRow {
    MetricRow {
        contract_id: contract_id.to_string(),
        measure_code: code.to_string(),
        year,
        rate_percent: None,
        value_numeric: None,
        value_unit: None,
        star_rating: Some(stars.to_string()),
    }
}
