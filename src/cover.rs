//! Cover image resolution for a synced video.
//!
//! Each strategy is a sequence of attempts. An attempt either resolves a cover
//! or is skipped with a reason; [`CoverState`] folds the attempts into the
//! [`CoverResult`] that ends up in the run record.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::CoverStrategy;
use crate::error::CoverError;
use crate::filename::image_temp_path;
use crate::media::{self, frame_timestamp};
use crate::thumbnail::{self, normalize_image, save_cover};

pub const REASON_NO_THUMBNAIL_URL: &str = "no_thumbnail_url";
pub const REASON_DUPLICATED_THUMBNAIL: &str = "thumbnail_url_duplicated_in_manifest";
pub const REASON_DOWNLOAD_FAILED: &str = "thumbnail_download_failed";
pub const REASON_FRAME_FAILED: &str = "frame_extract_failed";
pub const REASON_FRAME_STRATEGY: &str = "cover_strategy_frame";

/// The side effects cover resolution needs from the outside world
pub trait CoverTools {
    /// Fetch the raw bytes behind a thumbnail URL
    fn fetch_thumbnail(&self, url: &str, cover_path: &Path) -> Result<Vec<u8>, CoverError>;

    /// Duration of a video in seconds, `None` when unknown
    fn probe_duration(&self, video: &Path) -> Option<f64>;

    /// Write a single frame of `video` at `at_seconds` to `out`
    fn extract_frame(&self, video: &Path, out: &Path, at_seconds: f64) -> Result<(), CoverError>;
}

/// Network through reqwest/curl, frames through ffprobe/ffmpeg
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTools;

impl CoverTools for SystemTools {
    fn fetch_thumbnail(&self, url: &str, cover_path: &Path) -> Result<Vec<u8>, CoverError> {
        thumbnail::download(url, cover_path)
    }

    fn probe_duration(&self, video: &Path) -> Option<f64> {
        media::probe_duration(video)
    }

    fn extract_frame(&self, video: &Path, out: &Path, at_seconds: f64) -> Result<(), CoverError> {
        media::extract_frame(video, out, at_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverSource {
    Manifest,
    Frame,
}

impl CoverSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CoverSource::Manifest => "manifest",
            CoverSource::Frame => "frame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoverResult {
    pub file_path: Option<PathBuf>,
    pub source: Option<CoverSource>,
    /// Why a source was skipped, or how the cover was chosen
    pub reason: Option<String>,
}

/// Everything needed to resolve the cover of one video
#[derive(Debug, Clone)]
pub struct CoverRequest<'a> {
    /// The synced video, frames are taken from here
    pub video: &'a Path,
    pub cover_path: &'a Path,
    pub thumbnail_url: Option<&'a str>,
    pub is_duplicate_thumbnail: bool,
    pub strategy: CoverStrategy,
    pub overwrite: bool,
    pub frame_seconds: f64,
}

impl CoverRequest<'_> {
    /// An existing cover is kept unless overwriting
    fn reuse_existing(&self) -> bool {
        !self.overwrite && self.cover_path.exists()
    }
}

/// Outcome of a single strategy attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Resolved { source: CoverSource, path: PathBuf },
    Skipped { reason: String },
}

impl Attempt {
    fn skipped(reason: impl Into<String>) -> Self {
        Attempt::Skipped {
            reason: reason.into(),
        }
    }
}

/// Accumulates attempts; the first skip reason is the one that is kept
#[derive(Debug, Default)]
pub struct CoverState {
    result: CoverResult,
}

impl CoverState {
    /// Record an attempt, returns whether it produced a cover
    pub fn record(&mut self, attempt: Attempt) -> bool {
        match attempt {
            Attempt::Resolved { source, path } => {
                if source == CoverSource::Frame && self.result.reason.is_none() {
                    self.result.reason = Some(REASON_FRAME_STRATEGY.to_string());
                }
                self.result.file_path = Some(path);
                self.result.source = Some(source);
                true
            }
            Attempt::Skipped { reason } => {
                if self.result.reason.is_none() {
                    self.result.reason = Some(reason);
                }
                false
            }
        }
    }

    pub fn finish(self) -> CoverResult {
        self.result
    }
}

/// Resolve the cover for one video according to `request.strategy`
pub fn resolve_cover<T: CoverTools + ?Sized>(tools: &T, request: &CoverRequest<'_>) -> CoverResult {
    let mut state = CoverState::default();

    match request.strategy {
        CoverStrategy::Manifest => {
            state.record(manifest_cover(tools, request));
        }
        CoverStrategy::Frame => {
            state.record(frame_cover(tools, request));
        }
        CoverStrategy::Auto => {
            if !state.record(manifest_cover(tools, request)) {
                state.record(frame_cover(tools, request));
            }
        }
    }

    let result = state.finish();
    debug!(
        "Cover for {}: source={:?} reason={:?}",
        request.video.display(),
        result.source,
        result.reason
    );
    result
}

/// Reuse the manifest thumbnail, unless it is missing or shared with other assets
pub fn manifest_cover<T: CoverTools + ?Sized>(tools: &T, request: &CoverRequest<'_>) -> Attempt {
    let Some(url) = request.thumbnail_url.filter(|u| !u.is_empty()) else {
        return Attempt::skipped(REASON_NO_THUMBNAIL_URL);
    };

    // one thumbnail on several unrelated assets is a manifest error, never trust it
    if request.is_duplicate_thumbnail {
        return Attempt::skipped(REASON_DUPLICATED_THUMBNAIL);
    }

    let resolved = Attempt::Resolved {
        source: CoverSource::Manifest,
        path: request.cover_path.to_path_buf(),
    };

    if request.reuse_existing() {
        return resolved;
    }

    let fetched = tools
        .fetch_thumbnail(url, request.cover_path)
        .and_then(|bytes| normalize_image(&bytes))
        .and_then(|img| save_cover(&img, request.cover_path));

    match fetched {
        Ok(()) => resolved,
        Err(e) => {
            warn!("Thumbnail download failed for {}: {}", url, e);
            Attempt::skipped(format!("{}: {}", REASON_DOWNLOAD_FAILED, e))
        }
    }
}

/// Extract a still frame from the synced video
pub fn frame_cover<T: CoverTools + ?Sized>(tools: &T, request: &CoverRequest<'_>) -> Attempt {
    let resolved = Attempt::Resolved {
        source: CoverSource::Frame,
        path: request.cover_path.to_path_buf(),
    };

    if request.reuse_existing() {
        return resolved;
    }

    if let Some(parent) = request.cover_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create {}: {}", parent.display(), e);
            return Attempt::skipped(REASON_FRAME_FAILED);
        }
    }

    let duration = tools.probe_duration(request.video);
    let preferred = frame_timestamp(request.frame_seconds, duration);
    let tmp = image_temp_path(request.cover_path);

    // the preferred time first, then the very first frame
    for at in [preferred, 0.0] {
        match tools.extract_frame(request.video, &tmp, at) {
            Ok(()) if tmp.exists() => match fs::rename(&tmp, request.cover_path) {
                Ok(()) => return resolved,
                Err(e) => warn!("Failed to move frame into {}: {}", request.cover_path.display(), e),
            },
            Ok(()) => warn!("Frame extraction at {}s produced no file", at),
            Err(e) => warn!(
                "Frame extraction at {}s failed for {}: {}",
                at,
                request.video.display(),
                e
            ),
        }
    }

    let _ = fs::remove_file(&tmp);
    Attempt::skipped(REASON_FRAME_FAILED)
}
