use std::path::Path;

use super::*;
use crate::analytics::measures::{ValueType, reconcile_rows, resolve_measure};
use crate::model::SeedDocument;
use crate::test_support::{
    contract, enrollment, measure, percent_metric, plan, seeded_repository, star_metric,
};

#[test]
fn latest_period_skips_periods_with_only_null_enrollment() {
    let repository = seeded_repository(&SeedDocument {
        enrollment: vec![
            enrollment("H0001", "001", 2024, 12, Some(40)),
            enrollment("H0001", "001", 2025, 1, Some(45)),
            enrollment("H0001", "001", 2025, 2, None),
        ],
        ..SeedDocument::default()
    });

    let period = repository
        .latest_enrollment_period()
        .expect("query period")
        .expect("period exists");
    assert_eq!(period, EnrollmentPeriod { year: 2025, month: 1 });

    let rows = repository.enrollment_rows(period).expect("enrollment rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].enrollment, Some(45));
}

#[test]
fn latest_period_skips_periods_with_only_negative_enrollment() {
    let repository = seeded_repository(&SeedDocument {
        enrollment: vec![
            enrollment("H0001", "001", 2025, 3, Some(120)),
            enrollment("H0001", "001", 2025, 4, Some(-1)),
            enrollment("H0002", "001", 2025, 4, None),
        ],
        ..SeedDocument::default()
    });

    assert_eq!(
        repository.latest_enrollment_period().expect("query period"),
        Some(EnrollmentPeriod { year: 2025, month: 3 })
    );
}

#[test]
fn empty_store_has_no_period() {
    let repository = seeded_repository(&SeedDocument::default());
    assert_eq!(repository.latest_enrollment_period().expect("query"), None);
    assert_eq!(repository.count_rows("enrollment").expect("count"), 0);
}

#[test]
fn contract_and_plan_rows_round_trip() {
    let mut bcbs = contract("H0002", Some("Blue Plans Inc"));
    bcbs.is_blue_cross_blue_shield = true;
    let repository = seeded_repository(&SeedDocument {
        contracts: vec![contract("H0001", None), bcbs],
        plans: vec![plan("H0001", "001", "CA"), plan("H0001", "0'2", "NV")],
        ..SeedDocument::default()
    });

    let contracts = repository.contract_rows().expect("contracts");
    assert_eq!(contracts.len(), 2);
    assert!(!contracts[0].is_blue_cross_blue_shield);
    assert!(contracts[1].is_blue_cross_blue_shield);
    assert_eq!(
        contracts[1].parent_organization.as_deref(),
        Some("Blue Plans Inc")
    );

    let plans = repository.plan_landscape_rows().expect("plans");
    assert!(plans.iter().any(|row| row.plan_id == "0'2"));
}

#[test]
fn measure_lookup_is_case_insensitive_and_binds_code() {
    let repository = seeded_repository(&SeedDocument {
        measures: vec![
            measure("C01", "Breast Cancer Screening", 2024),
            measure("C01", "Breast Cancer Screening", 2025),
        ],
        ..SeedDocument::default()
    });

    let rows = repository.measure_rows("c01").expect("measure rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].year, 2025);

    let injected = repository
        .measure_rows("C01' OR '1'='1")
        .expect("measure rows");
    assert!(injected.is_empty());
}

#[test]
fn metric_rows_filter_by_batch_and_year() {
    let repository = seeded_repository(&SeedDocument {
        metrics: vec![
            percent_metric("H0001", "C01", 2024, 70.0),
            percent_metric("H0001", "C01", 2025, 75.0),
            star_metric("H0002", "C01", 2025, "4"),
            percent_metric("H0003", "C01", 2025, 90.0),
            percent_metric("H0001", "C02", 2025, 10.0),
        ],
        ..SeedDocument::default()
    });

    let batch = vec!["H0001".to_string(), "H0002".to_string()];
    let rows = repository
        .metric_rows("C01", &batch, None)
        .expect("metric rows");
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.contract_id != "H0003"));

    let capped = repository
        .metric_rows("C01", &batch, Some(2024))
        .expect("metric rows");
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].rate_percent, Some(70.0));

    assert!(
        repository
            .metric_rows("C01", &[], None)
            .expect("empty batch")
            .is_empty()
    );
}

#[test]
fn chunked_resolution_matches_single_batch() {
    let contract_count = METRIC_FETCH_CHUNK * 2 + 37;
    let contract_ids = (0..contract_count)
        .map(|index| format!("H{index:04}"))
        .collect::<Vec<String>>();
    let mut metrics = Vec::new();
    for (index, contract_id) in contract_ids.iter().enumerate() {
        metrics.push(percent_metric(contract_id, "C01", 2025, index as f64));
        metrics.push(star_metric(contract_id, "C01", 2025, "3"));
        if index % 3 == 0 {
            metrics.push(percent_metric(contract_id, "C01", 2024, 99.0));
        }
    }
    let repository = seeded_repository(&SeedDocument {
        measures: vec![measure("C01", "Breast Cancer Screening", 2025)],
        metrics,
        ..SeedDocument::default()
    });

    let unchunked = reconcile_rows(
        &repository
            .metric_rows("C01", &contract_ids, None)
            .expect("single batch"),
    );
    let chunked = resolve_measure(&repository, "C01", &contract_ids, None)
        .expect("resolve")
        .expect("details");

    assert_eq!(chunked.contracts_with_data, contract_count);
    assert_eq!(chunked.contract_values, unchunked);
    assert!(
        chunked
            .contract_values
            .values()
            .all(|value| value.year == 2025 && value.value_type == ValueType::Percent)
    );
}

#[test]
fn open_read_only_reports_missing_database_as_configuration_error() {
    let result = SqliteRepository::open_read_only(Path::new("/nonexistent/ma_landscape.sqlite"));
    assert!(matches!(result, Err(StoreError::Configuration(_))));
}
