use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::{CoverStrategy, DateToken, SyncConfig, VideoVariant, DEFAULT_HASHTAG_LINE};

/// Sync the downloader's daily videos into the uploader's video folder
#[derive(Debug, Parser)]
#[command(name = "sora-sync", version)]
pub struct Args {
    /// Root folder of the downloader output; holds YYYYMMDD folders or a flat pool of mp4 files
    #[arg(long, env = "SORA_SYNC_SOURCE_ROOT", default_value = "downloads")]
    pub source_root: PathBuf,

    /// Date folder name YYYYMMDD, "latest", or root/flat/. for flat source-root mode
    #[arg(long, default_value = "latest")]
    pub date: String,

    /// Target folder the uploader scripts read from
    #[arg(long, env = "SORA_SYNC_TARGET_DIR", default_value = "videos")]
    pub target_dir: PathBuf,

    /// Where the list of synced files is written for follow-up upload/cleanup
    #[arg(long, env = "SORA_SYNC_RECORD_FILE", default_value = "videos/.sync_last.json")]
    pub record_file: PathBuf,

    /// Manifest to use instead of manifest.latest.json in the source folder
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Only sync the first N videos (0 = all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,

    /// Overwrite existing mp4/txt/cover files
    #[arg(long)]
    pub overwrite: bool,

    /// How covers are made: "auto" prefers a unique manifest thumbnail, else a frame from the mp4
    #[arg(long, value_enum, default_value_t = CoverStrategy::Auto)]
    pub cover_strategy: CoverStrategy,

    /// Frame covers are taken around this timestamp (falls back to the first frame)
    #[arg(long, default_value_t = 5.0)]
    pub cover_frame_seconds: f64,

    /// Which mp4 variant to sync (wm_only means no-watermark in this workflow)
    #[arg(long, value_enum, default_value_t = VideoVariant::All)]
    pub video_variant: VideoVariant,

    /// Second line of every sidecar
    #[arg(long, default_value = DEFAULT_HASHTAG_LINE)]
    pub hashtags: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Resolve into the settings the sync core runs on; relative paths become absolute
    pub fn into_config(self) -> Result<SyncConfig> {
        if !self.cover_frame_seconds.is_finite() || self.cover_frame_seconds < 0.0 {
            anyhow::bail!(
                "--cover-frame-seconds must be a non-negative number, got {}",
                self.cover_frame_seconds
            );
        }

        Ok(SyncConfig {
            source_root: absolute(&self.source_root)?,
            date: DateToken::parse(&self.date),
            target_dir: absolute(&self.target_dir)?,
            record_file: absolute(&self.record_file)?,
            manifest_file: self.manifest.as_deref().map(absolute).transpose()?,
            limit: self.limit,
            overwrite: self.overwrite,
            cover_strategy: self.cover_strategy,
            cover_frame_seconds: self.cover_frame_seconds,
            video_variant: self.video_variant,
            hashtag_line: self.hashtags,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}
