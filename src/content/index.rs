//! Audio index: loaded from the persisted manifest when it is usable,
//! otherwise rebuilt by scanning the game-calls tree.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::store::ContentRoot;

pub const MANIFEST_PATH: &[&str] = &["manifests", "audio-index.json"];
pub const GAME_CALLS_PATH: &[&str] = &["audio", "game-calls"];

/// Audio extensions picked up by the rebuild, in scan order.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3"];

/// Categories whose next path segment names the species.
const SPECIES_CATEGORIES: &[&str] = &["master", "processed"];

/// One audio file found by the rebuild scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexItem {
    pub id: String,
    pub ext: String,
    pub category: Option<String>,
    pub species: Option<String>,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannedIndex {
    pub count: usize,
    pub items: Vec<IndexItem>,
}

/// The audio index as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentIndex {
    /// The persisted manifest, passed through untouched.
    Manifest(Value),
    /// Rebuilt from the game-calls tree.
    Scanned(ScannedIndex),
}

impl ContentIndex {
    pub fn from_items(items: Vec<IndexItem>) -> Self {
        ContentIndex::Scanned(ScannedIndex {
            count: items.len(),
            items,
        })
    }

    /// Sorted, de-duplicated item ids. Manifest items without a string
    /// `id` are skipped.
    pub fn ids(&self) -> Vec<String> {
        let ids: BTreeSet<String> = match self {
            ContentIndex::Manifest(manifest) => manifest_items(manifest)
                .into_iter()
                .flatten()
                .filter_map(|item| item.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            ContentIndex::Scanned(scanned) => {
                scanned.items.iter().map(|item| item.id.clone()).collect()
            }
        };
        ids.into_iter().collect()
    }
}

fn manifest_items(manifest: &Value) -> Option<&Vec<Value>> {
    manifest.get("items").and_then(Value::as_array)
}

/// Parse a manifest, accepting any JSON object whose `items` is a
/// non-empty array. The items themselves are not inspected.
fn parse_manifest(bytes: &[u8]) -> Option<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(manifest) if manifest_items(&manifest).is_some_and(|items| !items.is_empty()) => {
            Some(manifest)
        }
        Ok(_) => {
            debug!("Audio manifest has no items, rebuilding index");
            None
        }
        Err(err) => {
            warn!("Ignoring unreadable audio manifest: {}", err);
            None
        }
    }
}

fn item_for(root: &ContentRoot, path: &Path, ext: &str) -> std::io::Result<IndexItem> {
    let relative = root.relative_path(path);
    let parts: Vec<&str> = relative.split('/').collect();

    // Expected layout: audio/game-calls/<category>/[species]/<file>
    let category = parts.get(2).map(|s| s.to_string());
    let species = match (&category, parts.get(3)) {
        (Some(category), Some(species)) if SPECIES_CATEGORIES.contains(&category.as_str()) => {
            Some(species.to_string())
        }
        _ => None,
    };

    Ok(IndexItem {
        id: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default(),
        ext: ext.to_string(),
        category,
        species,
        size: std::fs::metadata(path)?.len(),
        path: relative,
    })
}

/// Scan the game-calls tree. All `.wav` files come first, then `.mp3`,
/// each group in path order.
pub fn rebuild_index(root: &ContentRoot) -> std::io::Result<ContentIndex> {
    let base = root.join(GAME_CALLS_PATH);
    let mut items = Vec::new();
    if !base.is_dir() {
        return Ok(ContentIndex::from_items(items));
    }

    for ext in AUDIO_EXTENSIONS {
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let matches = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == *ext);
            if matches {
                items.push(item_for(root, entry.path(), ext)?);
            }
        }
    }

    debug!("Rebuilt audio index with {} items", items.len());
    Ok(ContentIndex::from_items(items))
}

/// Load the audio index, preferring a usable manifest over a rescan.
pub fn load_index(root: &ContentRoot) -> std::io::Result<ContentIndex> {
    let manifest = root.join(MANIFEST_PATH);
    match std::fs::read(&manifest) {
        Ok(bytes) => {
            if let Some(manifest) = parse_manifest(&bytes) {
                return Ok(ContentIndex::Manifest(manifest));
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("Could not read {}: {}", manifest.display(), err),
    }
    rebuild_index(root)
}
