use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

pub const DB_SCHEMA_VERSION: &str = "0.3.0";

/// Tables cleared by `ingest --replace`, children before parents.
pub const SOURCE_TABLES: [&str; 5] = [
    "measure_metrics",
    "measures",
    "enrollment",
    "plan_landscape",
    "contracts",
];

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contracts (
              contract_id TEXT PRIMARY KEY,
              contract_name TEXT,
              marketing_name TEXT,
              parent_organization TEXT,
              snp_indicator TEXT,
              is_blue_cross_blue_shield INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS plan_landscape (
              contract_id TEXT NOT NULL,
              plan_id TEXT NOT NULL,
              state_abbreviation TEXT,
              special_needs_plan_indicator TEXT
            );

            CREATE TABLE IF NOT EXISTS enrollment (
              contract_id TEXT NOT NULL,
              plan_id TEXT NOT NULL,
              report_year INTEGER NOT NULL,
              report_month INTEGER NOT NULL,
              enrollment INTEGER,
              plan_type TEXT
            );

            CREATE TABLE IF NOT EXISTS measures (
              code TEXT NOT NULL,
              name TEXT NOT NULL,
              alias TEXT,
              domain TEXT,
              weight REAL,
              year INTEGER NOT NULL,
              PRIMARY KEY (code, year)
            );

            CREATE TABLE IF NOT EXISTS measure_metrics (
              contract_id TEXT NOT NULL,
              measure_code TEXT NOT NULL,
              year INTEGER NOT NULL,
              rate_percent REAL,
              value_numeric REAL,
              value_unit TEXT,
              star_rating TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_enrollment_period
              ON enrollment(report_year, report_month);
            CREATE INDEX IF NOT EXISTS idx_plan_landscape_contract
              ON plan_landscape(contract_id, plan_id);
            CREATE INDEX IF NOT EXISTS idx_measure_metrics_lookup
              ON measure_metrics(measure_code, contract_id, year);
            ",
        )
        .context("failed to create store schema")?;

    ensure_natural_keys(connection)?;

    set_metadata(connection, "db_schema_version", DB_SCHEMA_VERSION)?;
    Ok(())
}

/// Natural keys that make re-ingesting a seed idempotent. Nullable columns are
/// folded through `ifnull` so NULLs compare equal. Stores written before the
/// keys existed are collapsed to their last-written row first.
const NATURAL_KEYS: [(&str, &str, &str); 3] = [
    (
        "plan_landscape",
        "idx_plan_landscape_key",
        "contract_id, plan_id, ifnull(state_abbreviation, '')",
    ),
    (
        "enrollment",
        "idx_enrollment_key",
        "contract_id, plan_id, report_year, report_month",
    ),
    (
        "measure_metrics",
        "idx_measure_metrics_key",
        "contract_id, measure_code, year, ifnull(rate_percent, ''), \
         ifnull(value_numeric, ''), ifnull(value_unit, ''), ifnull(star_rating, '')",
    ),
];

fn ensure_natural_keys(connection: &Connection) -> Result<()> {
    for (table, index, columns) in NATURAL_KEYS {
        let exists = connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![index],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("failed to look up index {index}"))?
            .is_some();
        if exists {
            continue;
        }

        let removed = connection
            .execute(
                &format!(
                    "DELETE FROM {table} WHERE rowid NOT IN (
                       SELECT MAX(rowid) FROM {table} GROUP BY {columns}
                     )"
                ),
                [],
            )
            .with_context(|| format!("failed to collapse duplicate rows in {table}"))?;
        if removed > 0 {
            info!(table, removed, "collapsed duplicate rows before adding natural key");
        }
        connection
            .execute(&format!("CREATE UNIQUE INDEX {index} ON {table}({columns})"), [])
            .with_context(|| format!("failed to create index {index}"))?;
    }
    Ok(())
}

pub fn set_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}

pub fn get_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))
}

pub fn clear_source_tables(connection: &Connection) -> Result<()> {
    for table in SOURCE_TABLES {
        connection
            .execute(&format!("DELETE FROM {table}"), [])
            .with_context(|| format!("failed to clear table {table}"))?;
    }
    Ok(())
}
