use std::path::PathBuf;

use chrono::Utc;
use rusqlite::Connection;

use super::*;
use crate::analytics::landscape::load_landscape;
use crate::cli::StoreArgs;
use crate::model::{ContractRow, EnrollmentRow, MetricRow};
use crate::store::{ensure_schema, get_metadata};
use crate::test_support::{contract, enrollment, percent_metric, plan, star_metric};

fn memory_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("open memory db");
    ensure_schema(&connection).expect("create schema");
    connection
}

fn count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

#[test]
fn normalize_contract_id_uppercases_and_validates() {
    let pattern = Regex::new(r"^[A-Z]\d{4}$").expect("regex");
    assert_eq!(
        normalize_contract_id(" h1234 ", &pattern),
        Some("H1234".to_string())
    );
    assert_eq!(normalize_contract_id("H12345", &pattern), None);
    assert_eq!(normalize_contract_id("1234H", &pattern), None);
    assert_eq!(normalize_contract_id("", &pattern), None);
}

#[test]
fn load_seed_rejects_malformed_rows_and_keeps_the_rest() {
    let connection = memory_connection();
    let seed = SeedDocument {
        contracts: vec![ContractRow {
            contract_id: "h0001".to_string(),
            contract_name: Some("Alpha".to_string()),
            marketing_name: None,
            parent_organization: None,
            snp_indicator: None,
            is_blue_cross_blue_shield: true,
        }],
        enrollment: vec![
            EnrollmentRow {
                contract_id: "H0001".to_string(),
                plan_id: "001".to_string(),
                report_year: 2025,
                report_month: 2,
                enrollment: Some(10),
                plan_type: None,
            },
            EnrollmentRow {
                contract_id: "H0001".to_string(),
                plan_id: "002".to_string(),
                report_year: 2025,
                report_month: 13,
                enrollment: Some(10),
                plan_type: None,
            },
        ],
        metrics: vec![MetricRow {
            contract_id: "not-a-contract".to_string(),
            measure_code: "C01".to_string(),
            year: 2025,
            rate_percent: Some(1.0),
            value_numeric: None,
            value_unit: None,
            star_rating: None,
        }],
        ..SeedDocument::default()
    };

    let (counts, warnings) = load_seed(&connection, &seed).expect("load seed");
    assert_eq!(counts.contracts_inserted, 1);
    assert_eq!(counts.enrollment_inserted, 1);
    assert_eq!(counts.metrics_inserted, 0);
    assert_eq!(counts.rows_rejected, 2);
    assert_eq!(warnings.len(), 2);

    assert_eq!(count(&connection, "contracts"), 1);
    assert_eq!(count(&connection, "enrollment"), 1);
    let stored_id: String = connection
        .query_row("SELECT contract_id FROM contracts", [], |row| row.get(0))
        .expect("stored contract");
    assert_eq!(stored_id, "H0001");
}

#[test]
fn seed_document_tolerates_missing_tables_and_fields() {
    let raw = r#"
    {
      "contracts": [{ "contract_id": "S1234" }],
      "measures": [{ "code": "d01", "name": "Drug Plan Call Center", "year": 2024 }]
    }
    "#;

    let seed: SeedDocument = serde_json::from_str(raw).expect("seed should deserialize");
    assert!(seed.enrollment.is_empty());
    assert!(!seed.contracts[0].is_blue_cross_blue_shield);

    let connection = memory_connection();
    let (counts, _) = load_seed(&connection, &seed).expect("load seed");
    assert_eq!(counts.measures_inserted, 1);
    let code: String = connection
        .query_row("SELECT code FROM measures", [], |row| row.get(0))
        .expect("stored measure");
    assert_eq!(code, "D01");
}

#[test]
fn clearing_source_tables_keeps_metadata() {
    let connection = memory_connection();
    let seed = SeedDocument {
        contracts: vec![ContractRow {
            contract_id: "H0002".to_string(),
            contract_name: None,
            marketing_name: None,
            parent_organization: None,
            snp_indicator: None,
            is_blue_cross_blue_shield: false,
        }],
        ..SeedDocument::default()
    };
    load_seed(&connection, &seed).expect("load seed");

    clear_source_tables(&connection).expect("clear tables");
    assert_eq!(count(&connection, "contracts"), 0);
    assert_eq!(
        get_metadata(&connection, "db_schema_version").expect("metadata"),
        Some(DB_SCHEMA_VERSION.to_string())
    );
}

fn repeatable_seed() -> SeedDocument {
    SeedDocument {
        contracts: vec![contract("H0001", Some("Alpha Health"))],
        plans: vec![plan("H0001", "001", "CA")],
        enrollment: vec![enrollment("H0001", "001", 2025, 3, Some(600))],
        metrics: vec![
            percent_metric("H0001", "C01", 2025, 71.0),
            star_metric("H0001", "C01", 2025, "4"),
        ],
        ..SeedDocument::default()
    }
}

#[test]
fn loading_the_same_seed_twice_keeps_totals() {
    let connection = memory_connection();
    let seed = repeatable_seed();

    load_seed(&connection, &seed).expect("first load");
    let (counts, warnings) = load_seed(&connection, &seed).expect("second load");
    assert!(warnings.is_empty());
    assert_eq!(counts.metrics_inserted, 0);
    assert_eq!(counts.duplicate_metrics_skipped, 2);

    assert_eq!(count(&connection, "plan_landscape"), 1);
    assert_eq!(count(&connection, "enrollment"), 1);
    assert_eq!(count(&connection, "measure_metrics"), 2);

    let repository = SqliteRepository::from_connection(connection);
    let landscape = load_landscape(&repository, None)
        .expect("load landscape")
        .expect("landscape exists");
    assert_eq!(landscape.contracts.len(), 1);
    assert_eq!(landscape.contracts[0].total_enrollment, Some(600));
}

#[test]
fn reloaded_enrollment_row_takes_the_newer_value() {
    let connection = memory_connection();
    let mut seed = repeatable_seed();
    load_seed(&connection, &seed).expect("first load");

    seed.enrollment[0].enrollment = Some(650);
    load_seed(&connection, &seed).expect("second load");

    assert_eq!(count(&connection, "enrollment"), 1);
    let stored: i64 = connection
        .query_row("SELECT enrollment FROM enrollment", [], |row| row.get(0))
        .expect("stored enrollment");
    assert_eq!(stored, 650);
}

#[test]
fn schema_upgrade_collapses_rows_written_without_natural_keys() {
    let connection = memory_connection();
    connection
        .execute_batch(
            "
            DROP INDEX idx_enrollment_key;
            DROP INDEX idx_plan_landscape_key;
            INSERT INTO enrollment(contract_id, plan_id, report_year, report_month, enrollment)
              VALUES ('H0001', '001', 2025, 3, 600), ('H0001', '001', 2025, 3, 600);
            INSERT INTO plan_landscape(contract_id, plan_id, state_abbreviation)
              VALUES ('H0001', '001', NULL), ('H0001', '001', NULL), ('H0001', '001', 'CA');
            ",
        )
        .expect("write legacy rows");

    ensure_schema(&connection).expect("upgrade schema");
    assert_eq!(count(&connection, "enrollment"), 1);
    assert_eq!(count(&connection, "plan_landscape"), 2);
}

#[test]
fn run_creates_missing_database_directory() {
    let root: PathBuf = std::env::temp_dir().join(format!(
        "ma_landscape_ingest_{}_{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::create_dir_all(&root).expect("create temp root");
    let seed_path = root.join("seed.json");
    fs::write(
        &seed_path,
        r#"{ "contracts": [{ "contract_id": "H0001" }],
            "enrollment": [{ "contract_id": "H0001", "plan_id": "001",
                             "report_year": 2025, "report_month": 3, "enrollment": 600 }] }"#,
    )
    .expect("write seed");
    let db_path = root.join("elsewhere").join("nested").join("landscape.sqlite");

    run(IngestArgs {
        store: StoreArgs {
            cache_root: root.join("cache"),
            db_path: Some(db_path.clone()),
        },
        seed: seed_path,
        manifest_path: None,
        replace: false,
    })
    .expect("ingest into nested path");

    assert!(db_path.is_file());
    let connection = Connection::open(&db_path).expect("reopen store");
    assert_eq!(count(&connection, "enrollment"), 1);
    drop(connection);

    fs::remove_dir_all(&root).expect("remove temp root");
}
