use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File name of the manifest the downloader writes next to its videos
pub const MANIFEST_FILE_NAME: &str = "manifest.latest.json";

/// Hashtag line written as the second line of every sidecar
pub const DEFAULT_HASHTAG_LINE: &str = "#sora";

/// Which rendering of each asset should be synced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VideoVariant {
    /// Both the primary file and the `_wm` variant
    #[default]
    All,
    /// Only files without the `_wm` marker
    #[value(name = "main_only")]
    MainOnly,
    /// Only `_wm` files (the no-watermark rendering in this workflow)
    #[value(name = "wm_only")]
    WmOnly,
}

impl VideoVariant {
    /// Whether a file with the given marker state passes this filter
    pub fn accepts(self, is_marked_variant: bool) -> bool {
        match self {
            VideoVariant::All => true,
            VideoVariant::MainOnly => !is_marked_variant,
            VideoVariant::WmOnly => is_marked_variant,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VideoVariant::All => "all",
            VideoVariant::MainOnly => "main_only",
            VideoVariant::WmOnly => "wm_only",
        }
    }
}

impl fmt::Display for VideoVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a cover image is obtained for each synced video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CoverStrategy {
    /// Manifest thumbnail when usable, otherwise a frame from the video
    #[default]
    Auto,
    /// Manifest thumbnail only
    Manifest,
    /// Frame extraction only
    Frame,
}

/// Layout of the resolved source directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Videos live under a `YYYYMMDD` folder
    Dated,
    /// Videos live directly under the source root
    Flat,
}

impl SourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMode::Dated => "dated",
            SourceMode::Flat => "flat",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user supplied `--date` value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateToken {
    /// Most recent dated folder, else the flat root
    #[default]
    Latest,
    /// Force the flat source root
    FlatRoot,
    /// An explicit folder name under the source root
    Named(String),
}

impl DateToken {
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();
        match value.to_lowercase().as_str() {
            "" | "latest" => DateToken::Latest,
            "root" | "flat" | "." => DateToken::FlatRoot,
            _ => DateToken::Named(value.to_string()),
        }
    }
}

/// Fully resolved settings for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of the downloader output (dated folders or a flat pool)
    pub source_root: PathBuf,
    pub date: DateToken,
    /// Input folder of the uploader
    pub target_dir: PathBuf,
    /// Where the run record is written
    pub record_file: PathBuf,
    /// Manifest override, `None` means `<source_dir>/manifest.latest.json`
    pub manifest_file: Option<PathBuf>,
    /// Sync at most this many videos, 0 means all
    pub limit: usize,
    pub overwrite: bool,
    pub cover_strategy: CoverStrategy,
    /// Preferred timestamp for frame covers, in seconds
    pub cover_frame_seconds: f64,
    pub video_variant: VideoVariant,
    pub hashtag_line: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source_root: PathBuf::from("downloads"),
            date: DateToken::Latest,
            target_dir: PathBuf::from("videos"),
            record_file: PathBuf::from("videos/.sync_last.json"),
            manifest_file: None,
            limit: 0,
            overwrite: false,
            cover_strategy: CoverStrategy::Auto,
            cover_frame_seconds: 5.0,
            video_variant: VideoVariant::All,
            hashtag_line: DEFAULT_HASHTAG_LINE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Manifest path for a resolved source directory
    pub fn manifest_path(&self, source_dir: &Path) -> PathBuf {
        self.manifest_file
            .clone()
            .unwrap_or_else(|| source_dir.join(MANIFEST_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_token_parse() {
        assert_eq!(DateToken::parse(""), DateToken::Latest);
        assert_eq!(DateToken::parse(" Latest "), DateToken::Latest);
        assert_eq!(DateToken::parse("ROOT"), DateToken::FlatRoot);
        assert_eq!(DateToken::parse("flat"), DateToken::FlatRoot);
        assert_eq!(DateToken::parse("."), DateToken::FlatRoot);
        assert_eq!(
            DateToken::parse(" 20250101 "),
            DateToken::Named("20250101".to_string())
        );
    }

    #[test]
    fn test_variant_filter() {
        assert!(VideoVariant::All.accepts(true));
        assert!(VideoVariant::All.accepts(false));
        assert!(VideoVariant::MainOnly.accepts(false));
        assert!(!VideoVariant::MainOnly.accepts(true));
        assert!(VideoVariant::WmOnly.accepts(true));
        assert!(!VideoVariant::WmOnly.accepts(false));
        assert_eq!(VideoVariant::MainOnly.to_string(), "main_only");
        assert_eq!(VideoVariant::WmOnly.to_string(), "wm_only");
    }

    #[test]
    fn test_manifest_path_default_and_override() {
        let mut config = SyncConfig::default();
        assert_eq!(
            config.manifest_path(Path::new("/src/20250101")),
            PathBuf::from("/src/20250101/manifest.latest.json")
        );

        config.manifest_file = Some(PathBuf::from("/tmp/m.json"));
        assert_eq!(
            config.manifest_path(Path::new("/src")),
            PathBuf::from("/tmp/m.json")
        );
    }
}
