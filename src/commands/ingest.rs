use std::fs;

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::model::{IngestCounts, IngestPaths, IngestRunManifest, SeedDocument};
use crate::store::{
    DB_SCHEMA_VERSION, Repository, SqliteRepository, clear_source_tables, configure_connection,
    ensure_schema, set_metadata,
};
use crate::util::{
    RunStamp, ensure_directory, ensure_parent_directory, seed_digest, timestamp_now,
    write_json_file,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started = RunStamp::now();
    let run_id = started.run_id();

    let cache_root = args.store.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;
    let db_path = args.store.resolve_db_path();
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("ingest_run_{}.json", started.compact()))
    });

    info!(seed = %args.seed.display(), db = %db_path.display(), run_id = %run_id, "starting ingest");

    let raw = fs::read(&args.seed)
        .with_context(|| format!("failed to read seed {}", args.seed.display()))?;
    let seed: SeedDocument = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse seed {}", args.seed.display()))?;
    let seed_sha256 = seed_digest(&raw);

    ensure_parent_directory(&db_path)?;
    let mut connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;

    let transaction = connection
        .transaction()
        .context("failed to start ingest transaction")?;
    if args.replace {
        clear_source_tables(&transaction)?;
        info!("cleared existing source tables");
    }
    let (counts, warnings) = load_seed(&transaction, &seed)?;
    set_metadata(&transaction, "last_ingest_run_id", &run_id)?;
    set_metadata(&transaction, "last_ingest_at", &timestamp_now())?;
    transaction
        .commit()
        .context("failed to commit ingest transaction")?;

    let repository = SqliteRepository::from_connection(connection);
    let latest_enrollment_period = repository
        .latest_enrollment_period()
        .context("failed to resolve latest enrollment period after ingest")?;

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at: started.rfc3339(),
        updated_at: timestamp_now(),
        seed_sha256,
        replaced_existing: args.replace,
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            seed_path: args.seed.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        counts,
        latest_enrollment_period,
        warnings,
    };
    write_json_file(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote ingest run manifest");
    info!(
        contracts = manifest.counts.contracts_inserted,
        plans = manifest.counts.plans_inserted,
        enrollment = manifest.counts.enrollment_inserted,
        measures = manifest.counts.measures_inserted,
        metrics = manifest.counts.metrics_inserted,
        rejected = manifest.counts.rows_rejected,
        duplicate_metrics = manifest.counts.duplicate_metrics_skipped,
        "ingest completed"
    );

    Ok(())
}

/// Writes seed rows with bound parameters. Rows with malformed keys are
/// rejected and reported instead of aborting the load. Rows that repeat a
/// stored natural key replace it, so loading the same seed twice is a no-op.
pub fn load_seed(
    connection: &Connection,
    seed: &SeedDocument,
) -> Result<(IngestCounts, Vec<String>)> {
    let contract_id_pattern =
        Regex::new(r"^[A-Z]\d{4}$").context("failed to compile contract id regex")?;
    let mut counts = IngestCounts::default();
    let mut warnings = Vec::new();

    let mut statement = connection.prepare(
        "INSERT OR REPLACE INTO contracts(
           contract_id, contract_name, marketing_name, parent_organization,
           snp_indicator, is_blue_cross_blue_shield
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in &seed.contracts {
        let Some(contract_id) = normalize_contract_id(&row.contract_id, &contract_id_pattern)
        else {
            reject(
                &mut warnings,
                &mut counts,
                format!("contract row with invalid contract id `{}`", row.contract_id),
            );
            continue;
        };
        statement
            .execute(params![
                contract_id,
                row.contract_name,
                row.marketing_name,
                row.parent_organization,
                row.snp_indicator,
                row.is_blue_cross_blue_shield,
            ])
            .with_context(|| format!("failed to insert contract {contract_id}"))?;
        counts.contracts_inserted += 1;
    }

    let mut statement = connection.prepare(
        "INSERT OR REPLACE INTO plan_landscape(
           contract_id, plan_id, state_abbreviation, special_needs_plan_indicator
         ) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for row in &seed.plans {
        let contract_id = normalize_contract_id(&row.contract_id, &contract_id_pattern);
        let plan_id = row.plan_id.trim();
        let (Some(contract_id), false) = (contract_id, plan_id.is_empty()) else {
            reject(
                &mut warnings,
                &mut counts,
                format!(
                    "plan row with invalid key `{}`/`{}`",
                    row.contract_id, row.plan_id
                ),
            );
            continue;
        };
        statement
            .execute(params![
                contract_id,
                plan_id,
                row.state_abbreviation,
                row.special_needs_plan_indicator,
            ])
            .with_context(|| format!("failed to insert plan {contract_id}-{plan_id}"))?;
        counts.plans_inserted += 1;
    }

    let mut statement = connection.prepare(
        "INSERT OR REPLACE INTO enrollment(
           contract_id, plan_id, report_year, report_month, enrollment, plan_type
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in &seed.enrollment {
        let contract_id = normalize_contract_id(&row.contract_id, &contract_id_pattern);
        let plan_id = row.plan_id.trim();
        let valid_month = (1..=12).contains(&row.report_month);
        let (Some(contract_id), false, true) = (contract_id, plan_id.is_empty(), valid_month)
        else {
            reject(
                &mut warnings,
                &mut counts,
                format!(
                    "enrollment row with invalid key `{}`/`{}` for {}-{}",
                    row.contract_id, row.plan_id, row.report_year, row.report_month
                ),
            );
            continue;
        };
        statement
            .execute(params![
                contract_id,
                plan_id,
                row.report_year,
                row.report_month,
                row.enrollment,
                row.plan_type,
            ])
            .with_context(|| format!("failed to insert enrollment for {contract_id}-{plan_id}"))?;
        counts.enrollment_inserted += 1;
    }

    let mut statement = connection.prepare(
        "INSERT OR REPLACE INTO measures(code, name, alias, domain, weight, year)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for row in &seed.measures {
        let code = row.code.trim().to_ascii_uppercase();
        if code.is_empty() || row.name.trim().is_empty() {
            reject(
                &mut warnings,
                &mut counts,
                format!("measure row with blank code or name for year {}", row.year),
            );
            continue;
        }
        statement
            .execute(params![
                code,
                row.name.trim(),
                row.alias,
                row.domain,
                row.weight,
                row.year,
            ])
            .with_context(|| format!("failed to insert measure {code}"))?;
        counts.measures_inserted += 1;
    }

    let mut statement = connection.prepare(
        "INSERT OR IGNORE INTO measure_metrics(
           contract_id, measure_code, year, rate_percent, value_numeric, value_unit, star_rating
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for row in &seed.metrics {
        let contract_id = normalize_contract_id(&row.contract_id, &contract_id_pattern);
        let code = row.measure_code.trim().to_ascii_uppercase();
        let (Some(contract_id), false) = (contract_id, code.is_empty()) else {
            reject(
                &mut warnings,
                &mut counts,
                format!(
                    "metric row with invalid key `{}`/`{}`",
                    row.contract_id, row.measure_code
                ),
            );
            continue;
        };
        let written = statement
            .execute(params![
                contract_id,
                code,
                row.year,
                row.rate_percent,
                row.value_numeric,
                row.value_unit,
                row.star_rating,
            ])
            .with_context(|| format!("failed to insert metric {code} for {contract_id}"))?;
        if written == 0 {
            counts.duplicate_metrics_skipped += 1;
        } else {
            counts.metrics_inserted += 1;
        }
    }

    Ok((counts, warnings))
}

fn reject(warnings: &mut Vec<String>, counts: &mut IngestCounts, message: String) {
    warn!(reason = %message, "rejected seed row");
    counts.rows_rejected += 1;
    warnings.push(message);
}

fn normalize_contract_id(raw: &str, pattern: &Regex) -> Option<String> {
    let normalized = raw.trim().to_ascii_uppercase();
    pattern.is_match(&normalized).then_some(normalized)
}

#[cfg(test)]
mod tests;
