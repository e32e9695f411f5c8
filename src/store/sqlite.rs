use std::path::Path;

use rusqlite::types::ToSql;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use super::{Repository, StoreError, StoreResult};
use crate::model::{
    ContractRow, EnrollmentPeriod, EnrollmentRow, MeasureRow, MetricRow, PlanLandscapeRow,
};

pub struct SqliteRepository {
    connection: Connection,
}

impl SqliteRepository {
    pub fn open_read_only(db_path: &Path) -> StoreResult<Self> {
        if !db_path.exists() {
            return Err(StoreError::Configuration(format!(
                "database file missing: {} (run `ingest` first)",
                db_path.display()
            )));
        }

        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| {
            StoreError::Configuration(format!(
                "failed to open database read-only: {}: {err}",
                db_path.display()
            ))
        })?;

        Ok(Self { connection })
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn count_rows(&self, table: &'static str) -> StoreResult<i64> {
        self.connection
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map_err(StoreError::query(format!("counting rows in {table}")))
    }
}

impl Repository for SqliteRepository {
    fn latest_enrollment_period(&self) -> StoreResult<Option<EnrollmentPeriod>> {
        self.connection
            .query_row(
                "
                SELECT report_year, report_month
                FROM enrollment
                WHERE enrollment IS NOT NULL AND enrollment >= 0
                ORDER BY report_year DESC, report_month DESC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok(EnrollmentPeriod {
                        year: row.get(0)?,
                        month: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::query("resolving latest enrollment period"))
    }

    fn enrollment_rows(&self, period: EnrollmentPeriod) -> StoreResult<Vec<EnrollmentRow>> {
        let context = format!(
            "reading enrollment for {}-{:02}",
            period.year, period.month
        );
        let mut statement = self
            .connection
            .prepare(
                "
                SELECT contract_id, plan_id, report_year, report_month, enrollment, plan_type
                FROM enrollment
                WHERE report_year = ?1 AND report_month = ?2
                ORDER BY contract_id, plan_id
                ",
            )
            .map_err(StoreError::query(context.clone()))?;

        statement
            .query_map(params![period.year, period.month], enrollment_from_row)
            .and_then(|rows| rows.collect())
            .map_err(StoreError::query(context))
    }

    fn plan_landscape_rows(&self) -> StoreResult<Vec<PlanLandscapeRow>> {
        let mut statement = self
            .connection
            .prepare(
                "
                SELECT contract_id, plan_id, state_abbreviation, special_needs_plan_indicator
                FROM plan_landscape
                ORDER BY contract_id, plan_id
                ",
            )
            .map_err(StoreError::query("reading plan landscape"))?;

        statement
            .query_map([], |row| {
                Ok(PlanLandscapeRow {
                    contract_id: row.get(0)?,
                    plan_id: row.get(1)?,
                    state_abbreviation: row.get(2)?,
                    special_needs_plan_indicator: row.get(3)?,
                })
            })
            .and_then(|rows| rows.collect())
            .map_err(StoreError::query("reading plan landscape"))
    }

    fn contract_rows(&self) -> StoreResult<Vec<ContractRow>> {
        let mut statement = self
            .connection
            .prepare(
                "
                SELECT
                  contract_id,
                  contract_name,
                  marketing_name,
                  parent_organization,
                  snp_indicator,
                  COALESCE(is_blue_cross_blue_shield, 0)
                FROM contracts
                ORDER BY contract_id
                ",
            )
            .map_err(StoreError::query("reading contracts"))?;

        statement
            .query_map([], |row| {
                Ok(ContractRow {
                    contract_id: row.get(0)?,
                    contract_name: row.get(1)?,
                    marketing_name: row.get(2)?,
                    parent_organization: row.get(3)?,
                    snp_indicator: row.get(4)?,
                    is_blue_cross_blue_shield: row.get(5)?,
                })
            })
            .and_then(|rows| rows.collect())
            .map_err(StoreError::query("reading contracts"))
    }

    fn measure_rows(&self, code: &str) -> StoreResult<Vec<MeasureRow>> {
        let context = format!("reading measure metadata for {code}");
        let mut statement = self
            .connection
            .prepare(
                "
                SELECT code, name, alias, domain, weight, year
                FROM measures
                WHERE upper(code) = upper(?1)
                ORDER BY year DESC
                ",
            )
            .map_err(StoreError::query(context.clone()))?;

        statement
            .query_map(params![code.trim()], |row| {
                Ok(MeasureRow {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    alias: row.get(2)?,
                    domain: row.get(3)?,
                    weight: row.get(4)?,
                    year: row.get(5)?,
                })
            })
            .and_then(|rows| rows.collect())
            .map_err(StoreError::query(context))
    }

    fn metric_rows(
        &self,
        measure_code: &str,
        contract_ids: &[String],
        max_year: Option<i32>,
    ) -> StoreResult<Vec<MetricRow>> {
        if contract_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..contract_ids.len())
            .map(|index| format!("?{}", index + 3))
            .collect::<Vec<String>>()
            .join(", ");
        let sql = format!(
            "
            SELECT
              contract_id,
              measure_code,
              year,
              rate_percent,
              value_numeric,
              value_unit,
              star_rating
            FROM measure_metrics
            WHERE upper(measure_code) = upper(?1)
              AND (?2 IS NULL OR year <= ?2)
              AND contract_id IN ({placeholders})
            "
        );

        let context = format!(
            "reading metrics for {measure_code} ({} contracts)",
            contract_ids.len()
        );
        let code = measure_code.trim();
        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(contract_ids.len() + 2);
        bound.push(&code);
        bound.push(&max_year);
        for contract_id in contract_ids {
            bound.push(contract_id);
        }

        let mut statement = self
            .connection
            .prepare(&sql)
            .map_err(StoreError::query(context.clone()))?;

        statement
            .query_map(bound.as_slice(), |row| {
                Ok(MetricRow {
                    contract_id: row.get(0)?,
                    measure_code: row.get(1)?,
                    year: row.get(2)?,
                    rate_percent: row.get(3)?,
                    value_numeric: row.get(4)?,
                    value_unit: row.get(5)?,
                    star_rating: row.get(6)?,
                })
            })
            .and_then(|rows| rows.collect())
            .map_err(StoreError::query(context))
    }
}

fn enrollment_from_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentRow> {
    Ok(EnrollmentRow {
        contract_id: row.get(0)?,
        plan_id: row.get(1)?,
        report_year: row.get(2)?,
        report_month: row.get(3)?,
        enrollment: row.get(4)?,
        plan_type: row.get(5)?,
    })
}
