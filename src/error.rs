use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions while locating the videos to sync.
///
/// These abort the run before anything is copied; each message tells the user
/// what to try next.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(
        "No syncable videos found under source root: {}. \
         Try: 1) run the downloader first; 2) switch --video-variant.",
        .root.display()
    )]
    NoSyncableFiles { root: PathBuf },

    #[error(
        "No daily folders like YYYYMMDD under: {}, and no syncable videos found under source root. \
         Try: 1) run the downloader first; 2) use --date root to force flat source-root mode.",
        .root.display()
    )]
    NoSourceFound { root: PathBuf },

    #[error(
        "Date folder not found: {}. \
         Try: 1) use --date latest; 2) use --date root for flat source-root mode.",
        .path.display()
    )]
    DateFolderNotFound { path: PathBuf },

    #[error("Failed to read source directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-file cover failures; these are recorded as a reason and never abort a run
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("{0}")]
    Download(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Extract(String),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoverError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_remediation() {
        let err = SourceError::NoSyncableFiles {
            root: PathBuf::from("/data/videos"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/videos"));
        assert!(msg.contains("run the downloader first"));

        let err = SourceError::DateFolderNotFound {
            path: PathBuf::from("/data/videos/20240101"),
        };
        assert!(err.to_string().contains("--date latest"));

        let err = SourceError::NoSourceFound {
            root: PathBuf::from("/data"),
        };
        assert!(err.to_string().contains("--date root"));
    }
}
