use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::cover::{resolve_cover, CoverRequest, CoverSource, CoverTools};
use crate::filename::{cover_path, sidecar_path};
use crate::manifest::ManifestIndex;
use crate::record::{write_record, RunRecord};
use crate::selector::{select_videos, VideoFile};
use crate::sidecar::write_sidecar;
use crate::source::{resolve_source, SourceLocation};

/// One synced video as written to the run record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub name: String,
    pub asset_id: String,
    pub mp4: PathBuf,
    pub txt: PathBuf,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub thumbnail_file: Option<PathBuf>,
    pub cover_source: Option<CoverSource>,
    pub cover_reason: Option<String>,
}

#[derive(Debug, Default)]
pub struct SyncStats {
    pub selected: usize,
    pub synced: usize,
    pub skipped: usize,
    pub manifest_covers: usize,
    pub frame_covers: usize,
    pub missing_covers: usize,
}

pub struct Processor<T: CoverTools> {
    config: SyncConfig,
    tools: T,
    stats: SyncStats,
}

impl<T: CoverTools> Processor<T> {
    pub fn new(config: SyncConfig, tools: T) -> Self {
        Processor {
            config,
            tools,
            stats: SyncStats::default(),
        }
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Resolve, select, sync and record. Nothing is touched when the source
    /// cannot be resolved.
    pub fn run(&mut self) -> Result<RunRecord> {
        let location = resolve_source(
            &self.config.source_root,
            &self.config.date,
            self.config.video_variant,
        )?;

        println!("source: {}", location.directory.display());
        println!("source mode: {}", location.mode);
        println!("video variant: {}", self.config.video_variant);
        println!("target: {}", self.config.target_dir.display());

        let manifest_file = self.config.manifest_path(&location.directory);
        let manifest = ManifestIndex::load(&manifest_file);
        if manifest.is_empty() {
            info!(
                "No manifest entries in {}; titles fall back to file names",
                manifest_file.display()
            );
        }
        let synced = self.sync_videos(&location, &manifest)?;

        let record = RunRecord::new(
            &location.directory,
            location.mode,
            self.config.video_variant,
            &self.config.target_dir,
            synced,
        );
        write_record(&self.config.record_file, &record)?;
        println!("record: {}", self.config.record_file.display());

        self.print_summary();
        Ok(record)
    }

    /// Copy every selected video that is not in the target yet, in selection order
    pub fn sync_videos(&mut self, location: &SourceLocation, manifest: &ManifestIndex) -> Result<Vec<SyncResult>> {
        let files = select_videos(
            location,
            &manifest.entries,
            self.config.limit,
            self.config.video_variant,
        );
        self.stats.selected = files.len();

        let target_dir = &self.config.target_dir;
        fs::create_dir_all(target_dir)
            .with_context(|| format!("Failed to create target directory: {}", target_dir.display()))?;

        let mut synced = Vec::with_capacity(files.len());
        for video in &files {
            match self.sync_one(video, manifest)? {
                Some(result) => {
                    println!("synced: {}", result.name);
                    synced.push(result);
                }
                None => {
                    self.stats.skipped += 1;
                    debug!("Skipped (already exists): {}", video.name);
                }
            }
        }

        Ok(synced)
    }

    /// Sync one video; `None` when it is already in the target and not overwriting
    fn sync_one(&mut self, video: &VideoFile, manifest: &ManifestIndex) -> Result<Option<SyncResult>> {
        let target_dir = &self.config.target_dir;
        let dst = target_dir.join(&video.name);
        if dst.exists() && !self.config.overwrite {
            return Ok(None);
        }

        copy_preserving_mtime(&video.path, &dst)?;

        let entry = manifest.get(&video.asset_id);
        let title = entry
            .and_then(|e| e.clean_title())
            .unwrap_or_else(|| video.stem.clone());

        let txt = sidecar_path(&dst);
        write_sidecar(&txt, &title, &self.config.hashtag_line)?;

        let thumbnail_url = entry.and_then(|e| e.thumbnail_url()).map(str::to_string);
        let is_duplicate_thumbnail = thumbnail_url
            .as_deref()
            .is_some_and(|url| manifest.is_duplicate_thumbnail(url));

        let cover_file = cover_path(target_dir, &video.stem);
        let cover = resolve_cover(
            &self.tools,
            &CoverRequest {
                video: &dst,
                cover_path: &cover_file,
                thumbnail_url: thumbnail_url.as_deref(),
                is_duplicate_thumbnail,
                strategy: self.config.cover_strategy,
                overwrite: self.config.overwrite,
                frame_seconds: self.config.cover_frame_seconds,
            },
        );

        match (&cover.file_path, cover.source) {
            (Some(path), Some(source)) => {
                let name = path.file_name().unwrap_or_default().to_string_lossy();
                println!("cover: {} ({})", name, source.as_str());
                match source {
                    CoverSource::Manifest => self.stats.manifest_covers += 1,
                    CoverSource::Frame => self.stats.frame_covers += 1,
                }
            }
            _ => {
                info!(
                    "No cover for {}: {}",
                    video.name,
                    cover.reason.as_deref().unwrap_or("unknown")
                );
                self.stats.missing_covers += 1;
            }
        }

        self.stats.synced += 1;

        Ok(Some(SyncResult {
            name: video.name.clone(),
            asset_id: video.asset_id.clone(),
            mp4: dst,
            txt,
            title,
            thumbnail_url,
            thumbnail_file: cover.file_path,
            cover_source: cover.source,
            cover_reason: cover.reason,
        }))
    }

    fn print_summary(&self) {
        let stats = &self.stats;

        println!();
        println!("=== SYNC COMPLETE ===");
        println!("Selected: {}", stats.selected);
        println!("Skipped (already exist): {}", stats.skipped);
        if stats.synced > 0 {
            println!("  - Manifest covers: {}", stats.manifest_covers);
            println!("  - Frame covers: {}", stats.frame_covers);
            println!("  - Without cover: {}", stats.missing_covers);
        }
        println!("done. synced files: {}", stats.synced);
    }
}

/// Copy `src` to `dst` and carry over the modification time.
/// Refuses to copy a file onto itself, which would truncate the source.
fn copy_preserving_mtime(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() && is_same_file(src, dst)? {
        anyhow::bail!(
            "Source and destination are the same file: {} (target directory must differ from the source)",
            src.display()
        );
    }

    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;

    let modified = fs::metadata(src)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", src.display()))?;

    File::options()
        .write(true)
        .open(dst)
        .and_then(|f| f.set_modified(modified))
        .with_context(|| format!("Failed to set modification time on {}", dst.display()))?;

    Ok(())
}

fn is_same_file(a: &Path, b: &Path) -> Result<bool> {
    let a = fs::canonicalize(a).with_context(|| format!("Failed to resolve {}", a.display()))?;
    let b = fs::canonicalize(b).with_context(|| format!("Failed to resolve {}", b.display()))?;
    Ok(a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoverStrategy, DateToken, SourceMode, VideoVariant};
    use crate::cover::tests::{png_bytes, FakeTools};
    use crate::cover::{REASON_DUPLICATED_THUMBNAIL, REASON_FRAME_STRATEGY};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Dirs {
        _root: TempDir,
        source: PathBuf,
        target: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = TempDir::new().unwrap();
        let source = root.path().join("source");
        let target = root.path().join("target");
        fs::create_dir_all(&source).unwrap();
        Dirs {
            _root: root,
            source,
            target,
        }
    }

    fn config(d: &Dirs) -> SyncConfig {
        SyncConfig {
            source_root: d.source.clone(),
            date: DateToken::FlatRoot,
            target_dir: d.target.clone(),
            record_file: d.target.join(".sync_last.json"),
            cover_strategy: CoverStrategy::Auto,
            ..Default::default()
        }
    }

    fn flat(d: &Dirs) -> SourceLocation {
        SourceLocation {
            directory: d.source.clone(),
            mode: SourceMode::Flat,
        }
    }

    #[test]
    fn test_sync_copies_writes_sidecar_and_cover() {
        let d = dirs();
        let src = d.source.join("gen_1_wm.mp4");
        fs::write(&src, b"video bytes").unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        File::options().write(true).open(&src).unwrap().set_modified(old).unwrap();

        let manifest = ManifestIndex::from_value(&serde_json::json!([
            {"asset_id": "gen_1", "title": " Neon\nrain ", "thumbnail": "http://u/1.png"}
        ]));
        let tools = FakeTools {
            thumbnail: Some(png_bytes()),
            ..Default::default()
        };

        let mut processor = Processor::new(config(&d), tools);
        let synced = processor.sync_videos(&flat(&d), &manifest).unwrap();

        assert_eq!(synced.len(), 1);
        let result = &synced[0];
        assert_eq!(result.asset_id, "gen_1");
        assert_eq!(result.title, "Neon rain");
        assert_eq!(result.mp4, d.target.join("gen_1_wm.mp4"));
        assert_eq!(result.thumbnail_url.as_deref(), Some("http://u/1.png"));
        assert_eq!(result.thumbnail_file, Some(d.target.join("gen_1_wm.png")));
        assert_eq!(result.cover_source, Some(CoverSource::Manifest));

        assert_eq!(fs::read(&result.mp4).unwrap(), b"video bytes");
        assert_eq!(fs::read_to_string(&result.txt).unwrap(), "Neon rain\n#sora\n");
        let copied_mtime = fs::metadata(&result.mp4).unwrap().modified().unwrap();
        assert_eq!(copied_mtime, fs::metadata(&src).unwrap().modified().unwrap());
        assert!(src.exists(), "source must never be removed");
    }

    #[test]
    fn test_duplicate_thumbnail_is_never_used() {
        let d = dirs();
        fs::write(d.source.join("x.mp4"), b"x").unwrap();
        fs::write(d.source.join("y.mp4"), b"y").unwrap();

        let manifest = ManifestIndex::from_value(&serde_json::json!([
            {"asset_id": "x", "thumbnail": "http://u/t.png"},
            {"asset_id": "y", "thumbnail": "http://u/t.png"}
        ]));
        let tools = FakeTools {
            thumbnail: Some(png_bytes()),
            frame_ok_at: vec![5.0],
            ..Default::default()
        };

        let mut processor = Processor::new(config(&d), tools);
        let synced = processor.sync_videos(&flat(&d), &manifest).unwrap();

        let names: Vec<_> = synced.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["x.mp4", "y.mp4"]);
        for result in &synced {
            assert_eq!(result.cover_source, Some(CoverSource::Frame));
            assert_eq!(result.cover_reason.as_deref(), Some(REASON_DUPLICATED_THUMBNAIL));
        }
        assert!(processor.tools.fetched.borrow().is_empty());
        assert_eq!(processor.stats().frame_covers, 2);
    }

    #[test]
    fn test_existing_destination_is_skipped() {
        let d = dirs();
        fs::write(d.source.join("a.mp4"), b"new").unwrap();
        fs::write(d.source.join("b.mp4"), b"b").unwrap();
        fs::create_dir_all(&d.target).unwrap();
        fs::write(d.target.join("a.mp4"), b"already synced").unwrap();

        let tools = FakeTools {
            frame_ok_at: vec![5.0],
            ..Default::default()
        };
        let mut processor = Processor::new(config(&d), tools);
        let synced = processor
            .sync_videos(&flat(&d), &ManifestIndex::default())
            .unwrap();

        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].name, "b.mp4");
        assert_eq!(synced[0].cover_reason.as_deref(), Some("no_thumbnail_url"));
        assert_eq!(fs::read(d.target.join("a.mp4")).unwrap(), b"already synced");
        assert!(!d.target.join("a.txt").exists());
        assert_eq!(processor.stats().skipped, 1);
    }

    #[test]
    fn test_overwrite_resyncs_existing_destination() {
        let d = dirs();
        fs::write(d.source.join("a.mp4"), b"new").unwrap();
        fs::create_dir_all(&d.target).unwrap();
        fs::write(d.target.join("a.mp4"), b"old").unwrap();

        let mut cfg = config(&d);
        cfg.overwrite = true;
        cfg.cover_strategy = CoverStrategy::Frame;
        let tools = FakeTools {
            frame_ok_at: vec![5.0],
            ..Default::default()
        };
        let mut processor = Processor::new(cfg, tools);
        let synced = processor
            .sync_videos(&flat(&d), &ManifestIndex::default())
            .unwrap();

        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].cover_reason.as_deref(), Some(REASON_FRAME_STRATEGY));
        assert_eq!(fs::read(d.target.join("a.mp4")).unwrap(), b"new");
    }

    #[test]
    fn test_overwrite_into_source_dir_keeps_source_intact() {
        let d = dirs();
        fs::write(d.source.join("a.mp4"), b"original video").unwrap();

        let mut cfg = config(&d);
        // same folder reached through a different spelling
        cfg.target_dir = d.source.join("..").join("source");
        cfg.overwrite = true;
        let mut processor = Processor::new(cfg, FakeTools::default());

        let err = processor
            .sync_videos(&flat(&d), &ManifestIndex::default())
            .unwrap_err();
        assert!(err.to_string().contains("same file"));
        assert_eq!(fs::read(d.source.join("a.mp4")).unwrap(), b"original video");
        assert!(!d.source.join("a.txt").exists());
    }

    #[test]
    fn test_run_fails_before_touching_target() {
        let d = dirs();
        let mut processor = Processor::new(config(&d), FakeTools::default());

        let err = processor.run().unwrap_err();
        assert!(err.to_string().contains("No syncable videos"));
        assert!(!d.target.exists());
    }

    #[test]
    fn test_run_writes_record_with_variant() {
        let d = dirs();
        fs::write(d.source.join("a.mp4"), b"a").unwrap();
        fs::write(d.source.join("a_wm.mp4"), b"a").unwrap();

        let mut cfg = config(&d);
        cfg.video_variant = VideoVariant::MainOnly;
        let record = Processor::new(cfg, FakeTools::default()).run().unwrap();

        assert_eq!(record.synced_count, 1);
        assert_eq!(record.source_mode, SourceMode::Flat);
        assert_eq!(record.video_variant, VideoVariant::MainOnly);
        assert_eq!(record.synced_files[0].cover_source, None);
        assert_eq!(
            record.synced_files[0].cover_reason.as_deref(),
            Some("no_thumbnail_url")
        );
        assert!(d.target.join(".sync_last.json").exists());
        assert!(!d.target.join("a_wm.mp4").exists());
    }
}
