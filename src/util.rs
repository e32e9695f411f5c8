use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One instant rendered the two ways ingest runs and reports need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    at: DateTime<Utc>,
}

impl RunStamp {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self { at }
    }

    pub fn rfc3339(&self) -> String {
        self.at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Filesystem-safe form used in run ids and manifest names.
    pub fn compact(&self) -> String {
        self.at.format("%Y%m%dT%H%M%SZ").to_string()
    }

    pub fn run_id(&self) -> String {
        format!("run-{}", self.compact())
    }
}

pub fn timestamp_now() -> String {
    RunStamp::now().rfc3339()
}

/// Hex SHA-256 of seed bytes already held in memory.
pub fn seed_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Creates the directory that will hold `path`. Bare file names need nothing.
pub fn ensure_parent_directory(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_directory(parent),
        _ => Ok(()),
    }
}

/// Pretty JSON followed by a trailing newline.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, value: &T, what: &str) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to serialize {what} json"))?;
    writeln!(writer).with_context(|| format!("failed to finalize {what} json"))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {what} json"))
}

pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_directory(path)?;
    let file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    write_json(BufWriter::new(file), value, &path.display().to_string())
}

pub fn write_json_stdout<T: Serialize>(value: &T, what: &str) -> Result<()> {
    write_json(BufWriter::new(io::stdout().lock()), value, what)
}
