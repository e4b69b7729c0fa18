use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::filename::{get_stem, sidecar_path};

/// Write the uploader sidecar: title on the first line, hashtags on the second
pub fn write_sidecar(path: &Path, title: &str, hashtag_line: &str) -> Result<()> {
    fs::write(path, format!("{}\n{}\n", title, hashtag_line))
        .with_context(|| format!("Failed to write sidecar {}", path.display()))
}

/// Read the title and hashtags an uploader would use for `video`.
///
/// Falls back to the video stem (and no hashtags) when the sidecar is missing
/// or empty. Hashtags are space separated with the `#` removed.
pub fn read_sidecar(video: &Path) -> (String, Vec<String>) {
    let fallback = || (get_stem(video), Vec::new());

    let Ok(content) = fs::read_to_string(sidecar_path(video)) else {
        return fallback();
    };

    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(title) = lines.next() else {
        return fallback();
    };

    let hashtags = lines
        .next()
        .map(|line| {
            line.split(' ')
                .map(|tag| tag.replace('#', "").trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    (title.to_string(), hashtags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_written_sidecar_reads_back() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip.mp4");
        write_sidecar(&sidecar_path(&video), "A rainy neon street", "#sora #ai").unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("clip.txt")).unwrap(),
            "A rainy neon street\n#sora #ai\n"
        );

        let (title, tags) = read_sidecar(&video);
        assert_eq!(title, "A rainy neon street");
        assert_eq!(tags, vec!["sora", "ai"]);
    }

    #[test]
    fn test_missing_or_blank_sidecar_uses_stem() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("clip_wm.mp4");
        assert_eq!(read_sidecar(&video), ("clip_wm".to_string(), vec![]));

        fs::write(dir.path().join("clip_wm.txt"), "\n  \n").unwrap();
        assert_eq!(read_sidecar(&video), ("clip_wm".to_string(), vec![]));

        fs::write(dir.path().join("clip_wm.txt"), "\nOnly a title\n").unwrap();
        assert_eq!(read_sidecar(&video), ("Only a title".to_string(), vec![]));
    }
}
