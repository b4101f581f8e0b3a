//! File manifests: which paths exist and how large they are
//!
//! A manifest is a snapshot, either of a local archive tree (`local_manifest`) or of what the
//! remote archival tier holds for one upload (see `listing`). Keys are full paths rooted at the
//! archive directory, so both sides can be compared directly.

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{Error, Result};

/// One file and its size in bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Mapping from path to size, keys are unique and iterate in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<PathBuf, u64>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the previous size if the path was already present
    pub fn insert(&mut self, path: impl Into<PathBuf>, size_bytes: u64) -> Option<u64> {
        self.entries.insert(path.into(), size_bytes)
    }

    pub fn get(&self, path: &Path) -> Option<u64> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = ManifestEntry> + '_ {
        self.entries.iter().map(|(path, &size_bytes)| ManifestEntry {
            path: path.clone(),
            size_bytes,
        })
    }

    /// Total number of bytes across all entries
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().sum()
    }
}

impl<P: Into<PathBuf>> FromIterator<(P, u64)> for Manifest {
    fn from_iter<T: IntoIterator<Item = (P, u64)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(path, size)| (path.into(), size))
                .collect(),
        }
    }
}

/// Enumerate every regular file below `root` with its size.
///
/// Symlinks to files are followed and the size of their target is recorded; symlinks to
/// directories are listed by the walk but not descended into. Fails with `EmptyResult` when the
/// tree holds no files at all.
#[instrument]
pub async fn local_manifest(root: &Path) -> Result<Manifest> {
    info!("generating local filelist for {:?}", root);
    let mut manifest = Manifest::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot open directory {:?} for reading", &dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {:?}", &dir))?
        {
            let entry_path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("failed reading file type of {:?}", &entry_path))?;
            if file_type.is_dir() {
                pending.push(entry_path);
                continue;
            }
            // follows symlinks, a dangling one is an error
            let metadata = tokio::fs::metadata(&entry_path)
                .await
                .with_context(|| format!("failed reading metadata from {:?}", &entry_path))?;
            if metadata.is_dir() {
                debug!("not descending into linked directory {:?}", &entry_path);
                continue;
            }
            if metadata.is_file() {
                manifest.insert(entry_path, metadata.len());
            }
        }
    }
    if manifest.is_empty() {
        return Err(Error::EmptyResult(format!(
            "error when generating local filelist, no files found for {:?}",
            root
        )));
    }
    debug!(
        "local files for the archive: {} ({})",
        manifest.len(),
        bytesize::ByteSize(manifest.total_bytes())
    );
    Ok(manifest)
}
