use serde::{Deserialize, Serialize};

/// Reporting month selecting which enrollment rows participate in a landscape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnrollmentPeriod {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRow {
    pub contract_id: String,
    pub plan_id: String,
    pub report_year: i32,
    pub report_month: u32,
    #[serde(default)]
    pub enrollment: Option<i64>,
    #[serde(default)]
    pub plan_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanLandscapeRow {
    pub contract_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub state_abbreviation: Option<String>,
    #[serde(default)]
    pub special_needs_plan_indicator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRow {
    pub contract_id: String,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub marketing_name: Option<String>,
    #[serde(default)]
    pub parent_organization: Option<String>,
    #[serde(default)]
    pub snp_indicator: Option<String>,
    #[serde(default)]
    pub is_blue_cross_blue_shield: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureRow {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    pub year: i32,
}

impl MeasureRow {
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub contract_id: String,
    pub measure_code: String,
    pub year: i32,
    #[serde(default)]
    pub rate_percent: Option<f64>,
    #[serde(default)]
    pub value_numeric: Option<f64>,
    #[serde(default)]
    pub value_unit: Option<String>,
    #[serde(default)]
    pub star_rating: Option<String>,
}

/// Input document accepted by `ingest`; every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub contracts: Vec<ContractRow>,
    #[serde(default)]
    pub plans: Vec<PlanLandscapeRow>,
    #[serde(default)]
    pub enrollment: Vec<EnrollmentRow>,
    #[serde(default)]
    pub measures: Vec<MeasureRow>,
    #[serde(default)]
    pub metrics: Vec<MetricRow>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestCounts {
    pub contracts_inserted: usize,
    pub plans_inserted: usize,
    pub enrollment_inserted: usize,
    pub measures_inserted: usize,
    pub metrics_inserted: usize,
    pub duplicate_metrics_skipped: usize,
    pub rows_rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub seed_path: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub seed_sha256: String,
    pub replaced_existing: bool,
    pub paths: IngestPaths,
    pub counts: IngestCounts,
    pub latest_enrollment_period: Option<EnrollmentPeriod>,
    pub warnings: Vec<String>,
}
