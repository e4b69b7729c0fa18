use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// One asset described by the downloader's manifest
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ManifestEntry {
    pub asset_id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Fallback URLs, in manifest order
    pub candidates: Vec<String>,
}

impl ManifestEntry {
    /// Best-effort extraction from one manifest element.
    /// Returns `None` for non-objects and entries without an asset id.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let asset_id = match obj.get("asset_id")? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if asset_id.is_empty() {
            return None;
        }

        let string_field = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);

        let candidates = obj
            .get("candidates")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(ManifestEntry {
            asset_id,
            title: string_field("title"),
            thumbnail: string_field("thumbnail"),
            candidates,
        })
    }

    /// The thumbnail URL for this entry.
    ///
    /// The `thumbnail` field wins when non-blank; otherwise the first candidate
    /// that is an http(s) URL mentioning "thumbnail".
    pub fn thumbnail_url(&self) -> Option<&str> {
        if let Some(url) = self.thumbnail.as_deref().map(str::trim) {
            if !url.is_empty() {
                return Some(url);
            }
        }

        self.candidates
            .iter()
            .map(String::as_str)
            .find(|c| c.starts_with("http") && c.contains("thumbnail"))
    }

    /// Title with line breaks flattened, `None` when blank
    pub fn clean_title(&self) -> Option<String> {
        let title = self.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }
        Some(title.replace(['\r', '\n'], " ").trim().to_string())
    }
}

/// Lookup structures built once per run from the manifest file
#[derive(Debug, Clone, Default)]
pub struct ManifestIndex {
    /// Entries in manifest order (the downloader writes newest first)
    pub entries: Vec<ManifestEntry>,
    pub by_asset_id: HashMap<String, ManifestEntry>,
    /// How many distinct assets resolve to each thumbnail URL
    pub thumbnail_url_counts: HashMap<String, usize>,
}

impl ManifestIndex {
    /// Load the manifest at `path`.
    ///
    /// A missing, unreadable or malformed manifest yields an empty index;
    /// callers then fall back to file-name titles and frame covers.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No manifest at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read manifest {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!("Failed to parse manifest {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Build an index from an already parsed manifest document
    pub fn from_value(value: &Value) -> Self {
        let entries: Vec<ManifestEntry> = value
            .as_array()
            .map(|arr| arr.iter().filter_map(ManifestEntry::from_value).collect())
            .unwrap_or_default();

        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        let mut by_asset_id = HashMap::new();
        for entry in &entries {
            // later entries replace earlier ones with the same id
            by_asset_id.insert(entry.asset_id.clone(), entry.clone());
        }

        let mut thumbnail_url_counts: HashMap<String, usize> = HashMap::new();
        for entry in by_asset_id.values() {
            if let Some(url) = entry.thumbnail_url() {
                *thumbnail_url_counts.entry(url.to_string()).or_insert(0) += 1;
            }
        }

        debug!(
            "Manifest index: {} entries, {} assets, {} thumbnail urls",
            entries.len(),
            by_asset_id.len(),
            thumbnail_url_counts.len()
        );

        ManifestIndex {
            entries,
            by_asset_id,
            thumbnail_url_counts,
        }
    }

    pub fn get(&self, asset_id: &str) -> Option<&ManifestEntry> {
        self.by_asset_id.get(asset_id)
    }

    /// Whether a thumbnail URL is shared by more than one asset
    pub fn is_duplicate_thumbnail(&self, url: &str) -> bool {
        self.thumbnail_url_counts.get(url).copied().unwrap_or(0) > 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
