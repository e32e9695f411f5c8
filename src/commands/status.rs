use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::EnrollmentPeriod;
use crate::store::{Repository, SOURCE_TABLES, get_metadata};
use crate::util::write_json_stdout;

use super::{format_optional, open_repository};

#[derive(Debug, Serialize)]
struct StatusReport {
    db_path: String,
    db_schema_version: Option<String>,
    last_ingest_run_id: Option<String>,
    last_ingest_at: Option<String>,
    latest_enrollment_period: Option<EnrollmentPeriod>,
    table_counts: BTreeMap<&'static str, i64>,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.store.resolve_db_path();
    info!(cache_root = %args.store.cache_root.display(), "status requested");

    let repository = open_repository(&args.store)?;
    let connection = repository.connection();

    let mut table_counts = BTreeMap::new();
    for table in SOURCE_TABLES {
        let count = repository
            .count_rows(table)
            .with_context(|| format!("failed to count {table}"))?;
        table_counts.insert(table, count);
    }

    let latest_enrollment_period = repository
        .latest_enrollment_period()
        .context("failed to resolve latest enrollment period")?;
    if latest_enrollment_period.is_none() {
        warn!("store has no enrollment period with reported enrollment");
    }

    let report = StatusReport {
        db_path: db_path.display().to_string(),
        db_schema_version: get_metadata(connection, "db_schema_version")?,
        last_ingest_run_id: get_metadata(connection, "last_ingest_run_id")?,
        last_ingest_at: get_metadata(connection, "last_ingest_at")?,
        latest_enrollment_period,
        table_counts,
    };

    info!(
        path = %report.db_path,
        schema = %report.db_schema_version.as_deref().unwrap_or_default(),
        last_run = %report.last_ingest_run_id.as_deref().unwrap_or_default(),
        "database status"
    );

    if args.json {
        return write_json_stdout(&report, "status");
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Database: {}", report.db_path)?;
    writeln!(
        output,
        "Schema version: {}",
        format_optional(report.db_schema_version.as_deref())
    )?;
    writeln!(
        output,
        "Last ingest: {} at {}",
        format_optional(report.last_ingest_run_id.as_deref()),
        format_optional(report.last_ingest_at.as_deref())
    )?;
    writeln!(
        output,
        "Latest enrollment period: {}",
        format_optional(
            report
                .latest_enrollment_period
                .map(|period| format!("{}-{:02}", period.year, period.month))
        )
    )?;
    for (table, count) in &report.table_counts {
        writeln!(output, "\t{table}\t{count}")?;
    }
    output.flush()?;
    Ok(())
}
