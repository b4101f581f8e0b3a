//! Building the archive tree of a runfolder
//!
//! The archive tree mirrors the runfolder with real directories and symbolic links (absolute
//! targets) to every other entry, so nothing is copied. Directories named in `excluded_dirs` and
//! files whose extension is in `excluded_extensions` are left out. Two strategies produce the same
//! tree:
//!
//! - `LinkForest` links everything first (like `cp -as`) and then deletes what is excluded
//! - `MaterializingWalk` never creates excluded entries in the first place

use anyhow::Context;
use async_recursion::async_recursion;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::rm;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    LinkForest,
    #[default]
    MaterializingWalk,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// directory names pruned at any depth
    pub excluded_dirs: Vec<String>,
    /// file extensions pruned, with or without the leading dot
    pub excluded_extensions: Vec<String>,
    /// subdirectories the source must have
    pub required_dirs: Vec<String>,
    /// remove an existing destination instead of failing
    pub remove: bool,
    pub strategy: Strategy,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub directories_created: usize,
    pub symlinks_created: usize,
    pub directories_pruned: usize,
    pub files_pruned: usize,
    /// removal of a stale destination and, for `LinkForest`, of excluded entries
    pub rm_summary: rm::Summary,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            directories_created: self.directories_created + other.directories_created,
            symlinks_created: self.symlinks_created + other.symlinks_created,
            directories_pruned: self.directories_pruned + other.directories_pruned,
            files_pruned: self.files_pruned + other.files_pruned,
            rm_summary: self.rm_summary + other.rm_summary,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "directories created: {}\n\
            symlinks created: {}\n\
            directories pruned: {}\n\
            files pruned: {}\n\
            {}",
            self.directories_created,
            self.symlinks_created,
            self.directories_pruned,
            self.files_pruned,
            &self.rm_summary
        )
    }
}

/// Exclusions compiled for lookups during the walk
#[derive(Debug)]
struct Exclusions {
    dirs: HashSet<String>,
    extensions: HashSet<String>,
}

/// `.ext` form of a configured extension
pub fn normalize_extension(extension: &str) -> String {
    let extension = extension.trim();
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{}", extension)
    }
}

impl Exclusions {
    fn new(settings: &Settings) -> Self {
        Self {
            dirs: settings
                .excluded_dirs
                .iter()
                .map(|dir| dir.trim().to_string())
                .filter(|dir| !dir.is_empty())
                .collect(),
            extensions: settings
                .excluded_extensions
                .iter()
                .filter(|ext| !ext.trim().is_empty())
                .map(|ext| normalize_extension(ext))
                .collect(),
        }
    }

    fn excludes_dir(&self, name: &std::ffi::OsStr) -> bool {
        self.dirs.contains(name.to_string_lossy().as_ref())
    }

    fn excludes_file(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.extensions
                .contains(&format!(".{}", ext.to_string_lossy()))
        })
    }
}

/// Whether `path` is a directory once symlinks are resolved; dangling links are not
async fn resolves_to_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|md| md.is_dir())
        .unwrap_or(false)
}

/// Fails with `SourceIncomplete` unless `source/required` resolves to a directory
#[instrument]
pub async fn verify_required_dir(source: &Path, required: &str) -> Result<()> {
    debug!("validating presence of {}", required);
    let path = source.join(required);
    let is_dir = match tokio::fs::canonicalize(&path).await {
        Ok(resolved) => resolves_to_dir(&resolved).await,
        Err(_) => false,
    };
    if !is_dir {
        info!("expected directory {:?} doesn't exist, aborting", &path);
        return Err(Error::SourceIncomplete {
            source_tree: source.to_path_buf(),
            required: required.to_string(),
        });
    }
    Ok(())
}

/// Make sure nothing is at `dest`, removing it when `remove` is set
#[instrument]
pub async fn verify_dest(dest: &Path, remove: bool) -> Result<rm::Summary> {
    debug!("checking to see if {:?} exists", dest);
    match tokio::fs::symlink_metadata(dest).await {
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Default::default()),
        Err(error) => Err(anyhow::Error::from(error)
            .context(format!("failed reading metadata from {:?}", dest))
            .into()),
        Ok(_) if remove => {
            info!("archive directory {:?} already exists, removing it", dest);
            Ok(rm::rm(dest).await?)
        }
        Ok(_) => Err(Error::DestinationExists(dest.to_path_buf())),
    }
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir(path)
        .await
        .with_context(|| format!("cannot create directory {:?}", path))?;
    Ok(())
}

async fn symlink(target: &Path, link: &Path) -> Result<()> {
    tokio::fs::symlink(target, link)
        .await
        .with_context(|| format!("failed creating symlink {:?} -> {:?}", link, target))?;
    Ok(())
}

/// Mirror `source` into `dest`, linking every non-directory entry
#[async_recursion]
async fn link_all(source: &Path, dest: &Path) -> Result<Summary> {
    create_dir(dest).await?;
    let mut summary = Summary {
        directories_created: 1,
        ..Default::default()
    };
    let mut entries = tokio::fs::read_dir(source)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", source))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", source))?
    {
        let entry_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("failed reading file type of {:?}", &entry_path))?;
        if file_type.is_dir() {
            summary = summary + link_all(&entry_path, &dest_path).await?;
        } else {
            symlink(&entry_path, &dest_path).await?;
            summary.symlinks_created += 1;
        }
    }
    Ok(summary)
}

/// Delete excluded directories and files from an already linked tree
async fn prune(dest: &Path, exclusions: &Exclusions) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut pending = vec![dest.to_path_buf()];
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
            if resolves_to_dir(&entry_path).await {
                if exclusions.excludes_dir(&entry.file_name()) {
                    debug!("pruning directory {:?}", &entry_path);
                    summary.rm_summary = summary.rm_summary + rm::rm(&entry_path).await?;
                    summary.directories_pruned += 1;
                } else if entry
                    .file_type()
                    .await
                    .with_context(|| format!("failed reading file type of {:?}", &entry_path))?
                    .is_dir()
                {
                    pending.push(entry_path);
                }
            } else if exclusions.excludes_file(&entry_path) {
                debug!("pruning file {:?}", &entry_path);
                summary.rm_summary = summary.rm_summary + rm::rm(&entry_path).await?;
                summary.files_pruned += 1;
            }
        }
    }
    Ok(summary)
}

/// Mirror `source` into `dest`, skipping excluded entries as they are met
#[async_recursion]
async fn materialize(source: &Path, dest: &Path, exclusions: &Exclusions) -> Result<Summary> {
    create_dir(dest).await?;
    let mut summary = Summary {
        directories_created: 1,
        ..Default::default()
    };
    let mut entries = tokio::fs::read_dir(source)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", source))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", source))?
    {
        let entry_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if resolves_to_dir(&entry_path).await {
            if exclusions.excludes_dir(&entry.file_name()) {
                debug!("skipping directory {:?}", &entry_path);
                summary.directories_pruned += 1;
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("failed reading file type of {:?}", &entry_path))?;
            if file_type.is_dir() {
                summary = summary + materialize(&entry_path, &dest_path, exclusions).await?;
                continue;
            }
        } else if exclusions.excludes_file(&entry_path) {
            debug!("skipping file {:?}", &entry_path);
            summary.files_pruned += 1;
            continue;
        }
        symlink(&entry_path, &dest_path).await?;
        summary.symlinks_created += 1;
    }
    Ok(summary)
}

/// Build the archive tree `dest` from the runfolder `source`.
///
/// Required directories are checked first (`SourceIncomplete`), then the destination
/// (`DestinationExists` unless `settings.remove`). Link targets are absolute, derived from the
/// absolute form of `source`.
#[instrument]
pub async fn build(source: &Path, dest: &Path, settings: &Settings) -> Result<Summary> {
    let source: PathBuf = std::path::absolute(source)
        .with_context(|| format!("cannot make {:?} absolute", source))?;
    for required in &settings.required_dirs {
        verify_required_dir(&source, required).await?;
    }
    let rm_summary = verify_dest(dest, settings.remove).await?;
    info!("creating a new archive {:?}", dest);
    let exclusions = Exclusions::new(settings);
    let summary = match settings.strategy {
        Strategy::LinkForest => {
            let linked = link_all(&source, dest).await?;
            linked + prune(dest, &exclusions).await?
        }
        Strategy::MaterializingWalk => materialize(&source, dest, &exclusions).await?,
    };
    let summary = Summary {
        rm_summary: summary.rm_summary + rm_summary,
        ..summary
    };
    debug!("archive tree {:?} built:\n{}", dest, &summary);
    Ok(summary)
}
