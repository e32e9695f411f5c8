//! Read-only access to the relational store backing the landscape.
//!
//! Analytics code only sees the [`Repository`] trait; the SQLite adapter is
//! one implementation and tests run it against in-memory connections.

use thiserror::Error;

use crate::model::{
    ContractRow, EnrollmentPeriod, EnrollmentRow, MeasureRow, MetricRow, PlanLandscapeRow,
};

mod schema;
mod sqlite;
#[cfg(test)]
mod tests;

pub use schema::{
    DB_SCHEMA_VERSION, SOURCE_TABLES, clear_source_tables, configure_connection, ensure_schema,
    get_metadata, set_metadata,
};
pub use sqlite::SqliteRepository;

/// Largest contract-id batch sent in a single metric query.
pub const METRIC_FETCH_CHUNK: usize = 500;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is not configured: {0}")]
    Configuration(String),
    #[error("store query failed while {context}")]
    Query {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub(crate) fn query(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| Self::Query { context, source }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait Repository {
    /// Most recent period holding at least one non-negative enrollment value.
    fn latest_enrollment_period(&self) -> StoreResult<Option<EnrollmentPeriod>>;

    fn enrollment_rows(&self, period: EnrollmentPeriod) -> StoreResult<Vec<EnrollmentRow>>;

    fn plan_landscape_rows(&self) -> StoreResult<Vec<PlanLandscapeRow>>;

    fn contract_rows(&self) -> StoreResult<Vec<ContractRow>>;

    fn measure_rows(&self, code: &str) -> StoreResult<Vec<MeasureRow>>;

    /// Metric rows for one batch of contracts, optionally capped at `max_year`.
    /// Callers keep batches at or below [`METRIC_FETCH_CHUNK`].
    fn metric_rows(
        &self,
        measure_code: &str,
        contract_ids: &[String],
        max_year: Option<i32>,
    ) -> StoreResult<Vec<MetricRow>>;
}
