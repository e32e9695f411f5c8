pub mod ingest;
pub mod landscape;
pub mod leaderboard;
pub mod measure;
pub mod status;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::StoreArgs;
use crate::store::SqliteRepository;

pub(crate) fn open_repository(store: &StoreArgs) -> Result<SqliteRepository> {
    let db_path = store.resolve_db_path();
    let repository = SqliteRepository::open_read_only(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    info!(db = %db_path.display(), "opened store read-only");
    Ok(repository)
}

pub(crate) fn format_optional<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

pub(crate) fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| format!("{value:.2}"))
}
