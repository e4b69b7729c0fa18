use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{SourceMode, VideoVariant};
use crate::processor::SyncResult;

/// Timestamp format of `created_at`, local time to the second
const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What one run synced, for the upload and cleanup tooling that follows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub created_at: String,
    pub source_dir: PathBuf,
    pub source_mode: SourceMode,
    pub video_variant: VideoVariant,
    pub target_dir: PathBuf,
    pub synced_count: usize,
    pub synced_files: Vec<SyncResult>,
}

impl RunRecord {
    pub fn new(
        source_dir: &Path,
        source_mode: SourceMode,
        video_variant: VideoVariant,
        target_dir: &Path,
        synced_files: Vec<SyncResult>,
    ) -> Self {
        RunRecord {
            created_at: Local::now().format(CREATED_AT_FORMAT).to_string(),
            source_dir: source_dir.to_path_buf(),
            source_mode,
            video_variant,
            target_dir: target_dir.to_path_buf(),
            synced_count: synced_files.len(),
            synced_files,
        }
    }
}

/// Write the record as pretty JSON, replacing any earlier record at `path`
pub fn write_record(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create record directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(record).context("Failed to serialize run record")?;
    fs::write(path, json).with_context(|| format!("Failed to write run record {}", path.display()))
}

pub fn read_record(path: &Path) -> Result<RunRecord> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read run record {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse run record {}", path.display()))
}
