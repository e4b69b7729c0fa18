use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{DateToken, SourceMode, VideoVariant};
use crate::error::SourceError;
use crate::selector::list_syncable_videos;

/// Where the videos for this run come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub directory: PathBuf,
    pub mode: SourceMode,
}

/// A `YYYYMMDD` folder name
pub fn is_date_stamp(name: &str) -> bool {
    name.len() == 8 && name.bytes().all(|b| b.is_ascii_digit())
}

/// Most recent `YYYYMMDD` folder directly under `root`
pub fn find_latest_dated_dir(root: &Path) -> Result<Option<PathBuf>, SourceError> {
    let read_dir = std::fs::read_dir(root).map_err(|source| SourceError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let latest = read_dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_date_stamp)
        })
        .max_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(latest)
}

/// Decide which directory to sync from and how it is laid out
pub fn resolve_source(
    root: &Path,
    date: &DateToken,
    variant: VideoVariant,
) -> Result<SourceLocation, SourceError> {
    let has_flat_videos = || !list_syncable_videos(root, variant).is_empty();

    match date {
        DateToken::FlatRoot => {
            if !has_flat_videos() {
                return Err(SourceError::NoSyncableFiles {
                    root: root.to_path_buf(),
                });
            }
            Ok(flat(root))
        }
        DateToken::Latest => {
            let latest = if root.is_dir() {
                find_latest_dated_dir(root)?
            } else {
                None
            };

            if let Some(directory) = latest {
                debug!("Latest dated folder: {}", directory.display());
                return Ok(SourceLocation {
                    directory,
                    mode: SourceMode::Dated,
                });
            }

            if has_flat_videos() {
                debug!("No dated folders under {}, using flat root", root.display());
                return Ok(flat(root));
            }

            Err(SourceError::NoSourceFound {
                root: root.to_path_buf(),
            })
        }
        DateToken::Named(name) => {
            let directory = root.join(name);
            if directory.is_dir() {
                return Ok(SourceLocation {
                    directory,
                    mode: SourceMode::Dated,
                });
            }
            Err(SourceError::DateFolderNotFound { path: directory })
        }
    }
}

fn flat(root: &Path) -> SourceLocation {
    SourceLocation {
        directory: root.to_path_buf(),
        mode: SourceMode::Flat,
    }
}
