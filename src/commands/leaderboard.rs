use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::analytics::leaderboard::{
    LeaderboardEntry, LeaderboardFilters, LeaderboardRequest, LeaderboardResponse,
    LeaderboardSection, STATE_SHARE_THRESHOLD, generate_leaderboard,
};
use crate::cli::LeaderboardArgs;
use crate::util::write_json_stdout;

use super::{format_optional, format_value, open_repository};

pub fn run(args: LeaderboardArgs) -> Result<()> {
    if args.limit == 0 {
        bail!("--limit must be at least 1");
    }

    let measure_codes = args
        .measures
        .iter()
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty())
        .collect::<Vec<String>>();
    if measure_codes.is_empty() {
        bail!("at least one non-blank --measure is required");
    }

    let request = LeaderboardRequest {
        mode: args.mode,
        filters: LeaderboardFilters {
            state: args.state.clone(),
            plan_type: args.plan_type,
            series: args.series,
            enrollment_level: args.enrollment_level,
            bcbs_only: args.bcbs_only,
        }
        .normalized(),
        measure_codes,
        as_of_year: args.as_of_year,
        period: args.period.resolve(),
        limit: args.limit,
    };

    let repository = open_repository(&args.store)?;
    let response =
        generate_leaderboard(&repository, &request).context("failed to generate leaderboard")?;
    info!(
        sections = response.sections.len(),
        eligible_contracts = response.eligible_contracts,
        "leaderboard generated"
    );

    if args.json {
        return write_json_stdout(&response, "leaderboard");
    }
    write_text(&response)
}

fn write_text(response: &LeaderboardResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let filters = &response.filters;

    writeln!(
        output,
        "Mode: {}\tEligible contracts: {}\tEnrollment period: {}",
        response.mode.as_str(),
        response.eligible_contracts,
        format_optional(
            response
                .enrollment_period
                .map(|period| format!("{}-{:02}", period.year, period.month))
        ),
    )?;
    writeln!(
        output,
        "Filters: state={} plan_type={:?} series={:?} enrollment={} bcbs_only={}",
        format_optional(filters.state.as_deref()),
        filters.plan_type,
        filters.series,
        filters.enrollment_level.label(),
        filters.bcbs_only,
    )?;
    if filters.state.is_some() {
        writeln!(
            output,
            "State boards include contracts with at least {:.0}% of enrollment in the state.",
            STATE_SHARE_THRESHOLD * 100.0
        )?;
    }

    for section in &response.sections {
        write_section(&mut output, section)?;
    }
    output.flush()?;
    Ok(())
}

fn write_section(output: &mut impl Write, section: &LeaderboardSection) -> Result<()> {
    writeln!(output)?;
    writeln!(
        output,
        "{} {} ({}, {:?} is better, {} vs {})",
        section.key,
        section.name,
        if section.unit.is_empty() { "-" } else { section.unit.as_str() },
        section.direction,
        section.data_year,
        section.prior_year,
    )?;
    writeln!(
        output,
        "n={} median={} mean={}",
        section.summary.count,
        format_value(section.summary.median),
        format_value(section.summary.average),
    )?;

    for (title, entries) in [
        ("Top performers", &section.top_performers),
        ("Biggest movers", &section.biggest_movers),
        ("Biggest decliners", &section.biggest_decliners),
    ] {
        writeln!(output, "{title}:")?;
        if entries.is_empty() {
            writeln!(output, "\t(none)")?;
        }
        for entry in entries {
            write_entry(output, entry)?;
        }
    }
    Ok(())
}

fn write_entry(output: &mut impl Write, entry: &LeaderboardEntry) -> Result<()> {
    writeln!(
        output,
        "{}.\t{}\t{}\t{:.2}\tprior={}\tdelta={}\t{}\t{}",
        entry.rank,
        entry.entity_id,
        entry.metadata.name,
        entry.value,
        format_value(entry.prior_value),
        format_value(entry.delta),
        entry.metadata.enrollment_label,
        format_optional(entry.dominant_state.as_deref()),
    )?;
    Ok(())
}
