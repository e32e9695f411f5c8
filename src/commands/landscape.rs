use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::analytics::buckets::{classify, format_enrollment};
use crate::analytics::landscape::{ContractLandscape, Landscape, load_landscape};
use crate::cli::LandscapeArgs;
use crate::util::write_json_stdout;

use super::{format_optional, open_repository};

pub fn run(args: LandscapeArgs) -> Result<()> {
    let repository = open_repository(&args.store)?;
    let period = args.period.resolve();

    let Some(mut landscape) =
        load_landscape(&repository, period).context("failed to build enrollment landscape")?
    else {
        warn!("no enrollment landscape available");
        return Ok(());
    };

    let requested = args
        .contracts
        .iter()
        .map(|contract_id| contract_id.trim().to_ascii_uppercase())
        .filter(|contract_id| !contract_id.is_empty())
        .collect::<BTreeSet<String>>();
    if !requested.is_empty() {
        landscape
            .contracts
            .retain(|contract| requested.contains(&contract.contract_id));
        info!(
            requested = requested.len(),
            matched = landscape.contracts.len(),
            "filtered landscape contracts"
        );
    }

    if args.json {
        return write_json_stdout(&landscape, "landscape");
    }
    write_text(&landscape)
}

fn write_text(landscape: &Landscape) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(
        output,
        "Enrollment period: {}-{:02}",
        landscape.period.year, landscape.period.month
    )?;
    writeln!(output, "Contracts: {}", landscape.contracts.len())?;

    for contract in &landscape.contracts {
        write_contract(&mut output, contract)?;
    }
    output.flush()?;
    Ok(())
}

fn write_contract(output: &mut impl Write, contract: &ContractLandscape) -> Result<()> {
    let groups = contract
        .plan_type_groups
        .iter()
        .map(|group| group.as_str())
        .collect::<Vec<&str>>()
        .join(",");
    let share = contract
        .dominant_share
        .map(|share| format!("{:.1}%", share * 100.0));

    writeln!(
        output,
        "{}\t{}\t{}\t{}\t{}\t{} ({})\t{}",
        contract.contract_id,
        contract.display_name(),
        format_enrollment(contract.total_enrollment),
        classify(contract.total_enrollment),
        if groups.is_empty() { "-" } else { groups.as_str() },
        format_optional(contract.dominant_state.as_deref()),
        format_optional(share),
        format_optional(contract.parent_org.as_deref()),
    )?;
    Ok(())
}
