use std::path::{Path, PathBuf};

use crate::config::VideoVariant;

/// Extension of the videos the downloader produces
pub const VIDEO_EXTENSION: &str = "mp4";

/// Stem suffix of the no-watermark rendering
pub const MARKER_SUFFIX: &str = "_wm";

/// Extension of cover images written next to synced videos
pub const COVER_EXTENSION: &str = "png";

/// Extension of the title/hashtag sidecar
pub const SIDECAR_EXTENSION: &str = "txt";

/// Get the file stem from a path
pub fn get_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Whether the path has the video extension (case-insensitive)
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Whether a stem carries the marker suffix (case-insensitive)
pub fn has_marker_suffix(stem: &str) -> bool {
    stem.len() >= MARKER_SUFFIX.len()
        && stem.is_char_boundary(stem.len() - MARKER_SUFFIX.len())
        && stem[stem.len() - MARKER_SUFFIX.len()..].eq_ignore_ascii_case(MARKER_SUFFIX)
}

/// Asset id for a stem: the stem with the marker suffix removed if present
pub fn asset_id_from_stem(stem: &str) -> &str {
    if has_marker_suffix(stem) {
        &stem[..stem.len() - MARKER_SUFFIX.len()]
    } else {
        stem
    }
}

/// Which renderings of an asset to take, in preference order (`true` = marked)
pub fn marker_preference(variant: VideoVariant) -> &'static [bool] {
    match variant {
        VideoVariant::MainOnly => &[false],
        VideoVariant::WmOnly => &[true],
        VideoVariant::All => &[false, true],
    }
}

/// Sidecar path for a synced video, same stem
pub fn sidecar_path(video: &Path) -> PathBuf {
    video.with_extension(SIDECAR_EXTENSION)
}

/// Cover path for a synced video, same stem so uploaders can pair them by name
pub fn cover_path(target_dir: &Path, video_stem: &str) -> PathBuf {
    target_dir.join(format!("{}.{}", video_stem, COVER_EXTENSION))
}

/// Append an extra suffix to the full file name (`a.png` -> `a.png.tmp`)
pub fn with_appended_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Temp path that keeps the image extension last (`a.png` -> `a.tmp.png`)
pub fn image_temp_path(path: &Path) -> PathBuf {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or(COVER_EXTENSION);
    path.with_extension(format!("tmp.{}", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_suffix() {
        assert!(has_marker_suffix("abc_wm"));
        assert!(has_marker_suffix("abc_WM"));
        assert!(!has_marker_suffix("abc"));
        assert!(!has_marker_suffix("wm"));
        assert!(has_marker_suffix("_wm"));
        assert!(!has_marker_suffix("中文"));
    }

    #[test]
    fn test_asset_id_from_stem() {
        assert_eq!(asset_id_from_stem("gen_01abc_wm"), "gen_01abc");
        assert_eq!(asset_id_from_stem("gen_01abc_WM"), "gen_01abc");
        assert_eq!(asset_id_from_stem("gen_01abc"), "gen_01abc");
        assert_eq!(asset_id_from_stem("_wm"), "");
    }

    #[test]
    fn test_marker_preference() {
        assert_eq!(marker_preference(VideoVariant::MainOnly), &[false]);
        assert_eq!(marker_preference(VideoVariant::WmOnly), &[true]);
        assert_eq!(marker_preference(VideoVariant::All), &[false, true]);
    }

    #[test]
    fn test_is_video_path() {
        assert!(is_video_path(Path::new("/a/b.mp4")));
        assert!(is_video_path(Path::new("/a/b.MP4")));
        assert!(!is_video_path(Path::new("/a/b.mov")));
        assert!(!is_video_path(Path::new("/a/mp4")));
    }

    #[test]
    fn test_derived_paths() {
        let video = Path::new("/t/clip_wm.mp4");
        assert_eq!(sidecar_path(video), PathBuf::from("/t/clip_wm.txt"));
        assert_eq!(
            cover_path(Path::new("/t"), "clip_wm"),
            PathBuf::from("/t/clip_wm.png")
        );
        assert_eq!(
            with_appended_suffix(Path::new("/t/c.png"), "tmp"),
            PathBuf::from("/t/c.png.tmp")
        );
        assert_eq!(
            image_temp_path(Path::new("/t/c.png")),
            PathBuf::from("/t/c.tmp.png")
        );
    }
}
