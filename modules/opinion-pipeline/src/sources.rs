//! Reading crawler dumps from disk.
//!
//! Crawlers write one JSON file per run under `raw/<platform>/`. A file may
//! hold a list of items, `{ "data": [...] }`, `{ "data": {...} }`, or a
//! single item object.

use std::path::{Path, PathBuf};

use opinion_common::{OpinionError, Platform, RawPost, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// A raw item tagged with the platform it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedPost {
    pub platform: Platform,
    pub post: RawPost,
}

#[derive(Debug, Default)]
pub struct SourceLoad {
    pub posts: Vec<SourcedPost>,
    pub files_read: usize,
    pub failed_files: Vec<PathBuf>,
}

impl SourceLoad {
    fn absorb(&mut self, path: &Path, fallback: &Platform) {
        match load_raw_file(path) {
            Ok(items) => {
                debug!(path = %path.display(), count = items.len(), "Loaded raw file");
                self.files_read += 1;
                self.posts.extend(items.into_iter().map(|post| SourcedPost {
                    platform: post.platform().unwrap_or_else(|| fallback.clone()),
                    post,
                }));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable raw file");
                self.failed_files.push(path.to_path_buf());
            }
        }
    }
}

/// Parse one crawler dump into its items. Non-object list entries are skipped.
pub fn load_raw_file(path: &Path) -> Result<Vec<RawPost>> {
    let content = std::fs::read_to_string(path).map_err(|e| OpinionError::io(path, e))?;
    let value: Value = serde_json::from_str(&content).map_err(|e| OpinionError::json(path, e))?;
    Ok(items_from_value(value))
}

fn items_from_value(value: Value) -> Vec<RawPost> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(RawPost(map)),
                _ => None,
            })
            .collect(),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items_from_value(Value::Array(items)),
            Some(Value::Object(item)) => vec![RawPost(item)],
            Some(other) => {
                map.insert("data".into(), other);
                vec![RawPost(map)]
            }
            None => vec![RawPost(map)],
        },
        _ => Vec::new(),
    }
}

/// Load every `*.json` under each platform subdirectory of `raw_dir`.
/// Files are visited in sorted order so runs are reproducible.
pub fn load_platform_dirs(raw_dir: &Path) -> Result<SourceLoad> {
    let mut load = SourceLoad::default();

    for dir in sorted_entries(raw_dir)?.into_iter().filter(|p| p.is_dir()) {
        let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let platform = Platform::from_dir_name(name);
        let before = load.posts.len();

        for file in sorted_entries(&dir)?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        {
            load.absorb(&file, &platform);
        }

        info!(
            platform = %platform,
            count = load.posts.len() - before,
            "Loaded platform directory"
        );
    }

    Ok(load)
}

/// Load an explicit list of files, tagging items with `platform` when they
/// carry no platform of their own.
pub fn load_files(paths: &[PathBuf], platform: &Platform) -> SourceLoad {
    let mut load = SourceLoad::default();
    for path in paths {
        load.absorb(path, platform);
    }
    load
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| OpinionError::io(dir, e))?;
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| OpinionError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}
