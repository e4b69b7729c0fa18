use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{SourceMode, VideoVariant};
use crate::filename::{asset_id_from_stem, get_stem, has_marker_suffix, is_video_path, marker_preference};
use crate::manifest::ManifestEntry;
use crate::source::SourceLocation;

/// A video discovered directly under the source directory
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFile {
    pub path: PathBuf,
    /// File name including extension
    pub name: String,
    pub stem: String,
    /// The stem ends with the `_wm` marker
    pub is_marked_variant: bool,
    pub asset_id: String,
    pub modified: Option<SystemTime>,
}

impl VideoFile {
    pub fn from_path(path: &Path) -> Self {
        let stem = get_stem(path);
        let is_marked_variant = has_marker_suffix(&stem);
        let asset_id = asset_id_from_stem(&stem).to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        VideoFile {
            path: path.to_path_buf(),
            name,
            stem,
            is_marked_variant,
            asset_id,
            modified,
        }
    }
}

/// List videos directly under `dir` that pass the variant filter.
/// Order is unspecified; use [`select_videos`] for a deterministic order.
pub fn list_syncable_videos(dir: &Path, variant: VideoVariant) -> Vec<VideoFile> {
    let mut files = Vec::new();

    for entry_result in WalkDir::new(dir).max_depth(1).min_depth(1) {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                match err.path() {
                    Some(path) => warn!("Failed to access {}: {}", path.display(), err),
                    None => warn!("WalkDir error: {}", err),
                }
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !is_video_path(path) {
            continue;
        }

        // Skip AppleDouble files (._*)
        if entry.file_name().to_string_lossy().starts_with("._") {
            continue;
        }

        let video = VideoFile::from_path(path);
        if variant.accepts(video.is_marked_variant) {
            files.push(video);
        }
    }

    files
}

/// Pick and order the videos to sync.
///
/// Dated folders sort by file name. Flat pools follow the manifest order
/// (newest assets first), then append everything the manifest does not
/// mention, newest modification time first. `limit == 0` means no limit.
pub fn select_videos(
    location: &SourceLocation,
    manifest_entries: &[ManifestEntry],
    limit: usize,
    variant: VideoVariant,
) -> Vec<VideoFile> {
    let files = list_syncable_videos(&location.directory, variant);

    let mut selected = match location.mode {
        SourceMode::Dated => order_by_name(files),
        SourceMode::Flat => order_by_manifest(files, manifest_entries, variant),
    };

    if limit > 0 {
        selected.truncate(limit);
    }

    debug!(
        "Selected {} videos from {} ({} mode)",
        selected.len(),
        location.directory.display(),
        location.mode
    );

    selected
}

fn order_by_name(mut files: Vec<VideoFile>) -> Vec<VideoFile> {
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

fn order_by_manifest(
    files: Vec<VideoFile>,
    manifest_entries: &[ManifestEntry],
    variant: VideoVariant,
) -> Vec<VideoFile> {
    // Keyed like discovery: marker and extension case do not matter
    let mut by_asset: HashMap<(String, bool), Vec<VideoFile>> = HashMap::new();
    for f in files {
        by_asset
            .entry((f.asset_id.clone(), f.is_marked_variant))
            .or_default()
            .push(f);
    }

    let mut selected = Vec::new();
    let mut seen_assets: HashSet<&str> = HashSet::new();

    for entry in manifest_entries {
        let asset_id = entry.asset_id.trim();
        if asset_id.is_empty() || !seen_assets.insert(asset_id) {
            continue;
        }
        for &marked in marker_preference(variant) {
            // removing marks the files as used
            if let Some(videos) = by_asset.remove(&(asset_id.to_string(), marked)) {
                selected.extend(order_by_name(videos));
            }
        }
    }

    let mut remaining: Vec<VideoFile> = by_asset.into_values().flatten().collect();
    remaining.sort_by(|a, b| {
        let a_time = a.modified.unwrap_or(SystemTime::UNIX_EPOCH);
        let b_time = b.modified.unwrap_or(SystemTime::UNIX_EPOCH);
        Reverse(a_time).cmp(&Reverse(b_time)).then_with(|| a.name.cmp(&b.name))
    });
    selected.extend(remaining);

    selected
}
