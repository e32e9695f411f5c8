use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::landscape::load_landscape;
use crate::analytics::leaderboard::Direction;
use crate::analytics::measures::{MeasureDetails, resolve_measure};
use crate::analytics::statistics::{StatisticsSummary, summarize};
use crate::cli::MeasureArgs;
use crate::util::write_json_stdout;

use super::{format_optional, format_value, open_repository};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeasureReport {
    direction: Direction,
    data_year: i32,
    statistics: StatisticsSummary,
    details: MeasureDetails,
}

pub fn run(args: MeasureArgs) -> Result<()> {
    let repository = open_repository(&args.store)?;

    let contract_ids = if args.contracts.is_empty() {
        load_landscape(&repository, args.period.resolve())
            .context("failed to build enrollment landscape")?
            .map(|landscape| {
                landscape
                    .contracts
                    .into_iter()
                    .map(|contract| contract.contract_id)
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default()
    } else {
        args.contracts
            .iter()
            .map(|contract_id| contract_id.trim().to_ascii_uppercase())
            .filter(|contract_id| !contract_id.is_empty())
            .collect()
    };

    let Some(details) = resolve_measure(&repository, &args.code, &contract_ids, args.as_of_year)
        .with_context(|| format!("failed to resolve measure {}", args.code))?
    else {
        warn!(code = %args.code, as_of_year = ?args.as_of_year, "measure not found");
        return Ok(());
    };

    let data_year = details.latest_year;
    let current = details.values_for_year(data_year);
    let statistics = summarize(&current.values().copied().collect::<Vec<f64>>());
    info!(
        code = %details.code,
        contracts = contract_ids.len(),
        with_data = details.contracts_with_data,
        data_year,
        "measure resolved"
    );

    let report = MeasureReport {
        direction: Direction::for_measure(&details.code, &details.labels()),
        data_year,
        statistics,
        details,
    };

    if args.json {
        return write_json_stdout(&report, "measure");
    }
    write_text(&report)
}

fn write_text(report: &MeasureReport) -> Result<()> {
    let details = &report.details;
    let stats = &report.statistics;
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "{} {}", details.code, details.name)?;
    writeln!(
        output,
        "Domain: {}\tWeight: {}\tUnit: {}\tDirection: {:?}",
        format_optional(details.domain.as_deref()),
        format_optional(details.weight),
        if details.unit.is_empty() { "-" } else { details.unit.as_str() },
        report.direction,
    )?;
    writeln!(
        output,
        "Data year: {}\tContracts with data: {} ({} in {})",
        report.data_year,
        details.contracts_with_data,
        stats.count,
        report.data_year,
    )?;
    writeln!(
        output,
        "min={} q1={} median={} q3={} max={} mean={}",
        format_value(stats.min),
        format_value(stats.q1),
        format_value(stats.median),
        format_value(stats.q3),
        format_value(stats.max),
        format_value(stats.average),
    )?;

    for (contract_id, value) in &details.contract_values {
        writeln!(
            output,
            "\t{contract_id}\t{:.2}\t{}\t{}",
            value.value,
            value.year,
            value.value_type.as_str()
        )?;
    }
    output.flush()?;
    Ok(())
}
