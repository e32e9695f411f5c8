use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::analytics::buckets::EnrollmentBucket;
use crate::analytics::leaderboard::{ContractSeries, LeaderboardMode, PlanTypeFilter};
use crate::model::EnrollmentPeriod;

#[derive(Parser, Debug)]
#[command(
    name = "ma-landscape",
    version,
    about = "Medicare Advantage enrollment landscape and measure leaderboards"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Status(StatusArgs),
    Landscape(LandscapeArgs),
    Measure(MeasureArgs),
    Leaderboard(LeaderboardArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "ingest",
            Self::Status(_) => "status",
            Self::Landscape(_) => "landscape",
            Self::Measure(_) => "measure",
            Self::Leaderboard(_) => "leaderboard",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/ma-landscape")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("ma_landscape.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub seed: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// Clear existing source tables before loading.
    #[arg(long, default_value_t = false)]
    pub replace: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Explicit enrollment period; both halves or neither.
#[derive(Args, Debug, Clone)]
pub struct PeriodArgs {
    #[arg(long, requires = "month")]
    pub year: Option<i32>,

    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,
}

impl PeriodArgs {
    pub fn resolve(&self) -> Option<EnrollmentPeriod> {
        match (self.year, self.month) {
            (Some(year), Some(month)) => Some(EnrollmentPeriod { year, month }),
            _ => None,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct LandscapeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub period: PeriodArgs,

    #[arg(long = "contract")]
    pub contracts: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MeasureArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub code: String,

    #[arg(long)]
    pub as_of_year: Option<i32>,

    /// Restrict to these contracts instead of every landscape contract.
    #[arg(long = "contract")]
    pub contracts: Vec<String>,

    #[command(flatten)]
    pub period: PeriodArgs,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LeaderboardArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long = "measure", required = true)]
    pub measures: Vec<String>,

    #[arg(long, value_enum, default_value_t = LeaderboardMode::Contract)]
    pub mode: LeaderboardMode,

    #[arg(long)]
    pub state: Option<String>,

    #[arg(long, value_enum, default_value_t = PlanTypeFilter::All)]
    pub plan_type: PlanTypeFilter,

    #[arg(long, value_enum, default_value_t = ContractSeries::All)]
    pub series: ContractSeries,

    /// One of `<1k`, `1-10k`, `10-25k`, `25-100k`, `100-250k`, `>250k`, `null`, `all`.
    #[arg(long, default_value = "all")]
    pub enrollment_level: EnrollmentBucket,

    #[arg(long, default_value_t = false)]
    pub bcbs_only: bool,

    #[arg(long)]
    pub as_of_year: Option<i32>,

    #[command(flatten)]
    pub period: PeriodArgs,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
