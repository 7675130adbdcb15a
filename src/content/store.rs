//! Filesystem layers of the content store: the read-only content root and
//! the derived-artifact cache directory.

use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::{Builder, TempPath};
use walkdir::WalkDir;

use super::request::CacheKey;

const PARTIAL_PREFIX: &str = ".partial-";

/// A request-supplied path segment is usable only if it names a single
/// entry inside its parent directory.
pub fn is_safe_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.contains('/') || segment.contains('\\') {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

async fn existing_file(path: PathBuf) -> io::Result<Option<PathBuf>> {
    match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => Ok(Some(path)),
        Ok(_) => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Canonical content, owned by external ingestion.
#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
}

impl ContentRoot {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join<S: AsRef<str>>(&self, segments: &[S]) -> PathBuf {
        segments
            .iter()
            .fold(self.root.clone(), |path, segment| path.join(segment.as_ref()))
    }

    /// `Some(path)` when `path` exists and is a regular file.
    pub async fn file(&self, path: PathBuf) -> io::Result<Option<PathBuf>> {
        existing_file(path).await
    }

    /// Depth-first search under `subdir` for a file named exactly
    /// `file_name`. Entries are visited in file-name order.
    pub fn find_by_file_name(&self, subdir: &str, file_name: &str) -> Option<PathBuf> {
        let base = self.root.join(subdir);
        if !base.is_dir() {
            return None;
        }
        WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
            .map(|entry| entry.into_path())
    }

    /// Path relative to the root with `/` separators.
    pub fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Directory of derived artifacts, written only by this service.
#[derive(Debug, Clone)]
pub struct DerivedCache {
    dir: PathBuf,
}

impl DerivedCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    pub fn features_path(&self, audio_id: &str) -> PathBuf {
        self.dir
            .join("features")
            .join(format!("{}-features.npy", audio_id))
    }

    pub async fn file(&self, path: PathBuf) -> io::Result<Option<PathBuf>> {
        existing_file(path).await
    }

    /// Reserve a scratch path next to `dest`; persisting it renames it into
    /// place so readers never observe a partially written artifact.
    pub async fn scratch_path_for(&self, dest: &Path) -> io::Result<TempPath> {
        let parent = dest.parent().unwrap_or(self.dir.as_path()).to_path_buf();
        tokio::task::spawn_blocking(move || -> io::Result<TempPath> {
            std::fs::create_dir_all(&parent)?;
            Ok(Builder::new()
                .prefix(PARTIAL_PREFIX)
                .tempfile_in(&parent)?
                .into_temp_path())
        })
        .await
        .map_err(io::Error::other)?
    }

    /// Write `bytes` to `dest` atomically. Concurrent writers of the same
    /// destination race; the last rename wins.
    pub async fn write_atomic(&self, dest: PathBuf, bytes: Vec<u8>) -> io::Result<()> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let parent = dest.parent().unwrap_or(cache.dir.as_path()).to_path_buf();
            std::fs::create_dir_all(&parent)?;
            let mut file = Builder::new().prefix(PARTIAL_PREFIX).tempfile_in(&parent)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&dest).map_err(|err| err.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)?
    }
}
