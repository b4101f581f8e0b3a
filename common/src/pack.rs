//! Folding an archive tree into a single gzip tarball
//!
//! `pack` writes `<root>/<basename(root)>.tar.gz` holding every entry of the tree except the
//! exclusions, following symlinks so the tarball carries file contents rather than links.
//! `prune` then deletes from disk whatever the tarball holds, leaving only the excluded paths and
//! the tarball itself.

use anyhow::{Context, anyhow};
use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::{Component, Path, PathBuf};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::filter::ExclusionSet;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub members: usize,
    pub container_bytes: u64,
    pub files_removed: usize,
    pub directories_removed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            members: self.members + other.members,
            container_bytes: self.container_bytes + other.container_bytes,
            files_removed: self.files_removed + other.files_removed,
            directories_removed: self.directories_removed + other.directories_removed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "container members: {}\n\
            container size: {}\n\
            files removed: {}\n\
            directories removed: {}\n",
            self.members,
            bytesize::ByteSize(self.container_bytes),
            self.files_removed,
            self.directories_removed
        )
    }
}

/// `<root>/<basename(root)>.tar.gz`
pub fn container_path(archive_root: &Path) -> Result<PathBuf> {
    let name = archive_root
        .file_name()
        .ok_or_else(|| anyhow!("archive root {:?} has no name", archive_root))?;
    Ok(archive_root.join(format!("{}.tar.gz", name.to_string_lossy())))
}

/// Shell command running `compress` through the `pack` subcommand of `packer`
pub fn pack_command(packer: &str, archive_root: &Path, exclusions: &[String]) -> String {
    let mut command = format!("{} -v pack '{}'", packer, archive_root.display());
    for pattern in exclusions {
        command.push_str(&format!(" --exclude='{}'", pattern));
    }
    command
}

/// Member path without `./` prefixes, `None` for the archive root itself
fn normalize_member(path: &Path) -> Option<PathBuf> {
    let normalized: PathBuf = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Sorted entries of `dir` as (absolute, relative) pairs
fn sorted_entries(dir: &Path, relative: &Path) -> anyhow::Result<Vec<(PathBuf, PathBuf)>> {
    let read_dir = std::fs::read_dir(dir)
        .with_context(|| format!("cannot open directory {:?} for reading", dir))?;
    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.with_context(|| format!("failed traversing directory {:?}", dir))?;
        entries.push((entry.path(), relative.join(entry.file_name())));
    }
    entries.sort();
    Ok(entries)
}

/// Walk step of `write_container`: visit an entry, or leave the directory entered last
enum Step {
    Enter(PathBuf, PathBuf),
    Leave,
}

/// Write the tarball; runs on the blocking pool
fn write_container(
    file: std::fs::File,
    archive_root: &Path,
    container_name: &Path,
    exclusions: &ExclusionSet,
) -> anyhow::Result<usize> {
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(true);
    let root_metadata = std::fs::metadata(archive_root)
        .with_context(|| format!("failed reading metadata from {:?}", archive_root))?;
    // (dev, ino) of the directories on the current path, root first
    let mut ancestors = vec![(root_metadata.dev(), root_metadata.ino())];
    let mut members = 0;
    let mut pending: Vec<Step> = sorted_entries(archive_root, Path::new(""))?
        .into_iter()
        .rev()
        .map(|(path, relative)| Step::Enter(path, relative))
        .collect();
    while let Some(step) = pending.pop() {
        let (path, relative) = match step {
            Step::Enter(path, relative) => (path, relative),
            Step::Leave => {
                ancestors.pop();
                continue;
            }
        };
        if relative == container_name {
            continue;
        }
        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("failed reading metadata from {:?}", &path))?;
        if let Some(pattern) = exclusions.matching_pattern(&relative, metadata.is_dir()) {
            debug!("excluding {:?} (matches '{}')", &relative, &pattern.original);
            continue;
        }
        if metadata.is_dir() {
            let key = (metadata.dev(), metadata.ino());
            if ancestors.contains(&key) {
                warn!("{:?} loops back to one of its parents, skipping", &path);
                continue;
            }
            builder
                .append_dir(&relative, &path)
                .with_context(|| format!("failed adding directory {:?}", &path))?;
            ancestors.push(key);
            pending.push(Step::Leave);
            pending.extend(
                sorted_entries(&path, &relative)?
                    .into_iter()
                    .rev()
                    .map(|(path, relative)| Step::Enter(path, relative)),
            );
        } else if metadata.is_file() {
            builder
                .append_path_with_name(&path, &relative)
                .with_context(|| format!("failed adding {:?}", &path))?;
        } else {
            warn!("{:?} is not a regular file or directory, skipping", &path);
            continue;
        }
        members += 1;
    }
    let encoder = builder
        .into_inner()
        .context("failed finishing tar stream")?;
    let file = encoder.finish().context("failed finishing gzip stream")?;
    file.sync_all().context("failed syncing container")?;
    Ok(members)
}

/// Create the container of `archive_root`, holding everything but `exclusions`.
///
/// Fails with `ContainerExists` when the container is already there. A container left behind by a
/// failed pack is removed.
#[instrument(skip(exclusions))]
pub async fn pack(archive_root: &Path, exclusions: &ExclusionSet) -> Result<PathBuf> {
    let container = container_path(archive_root)?;
    debug!("checking to see if {:?} exists", &container);
    let file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&container)
    {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(Error::ContainerExists(container));
        }
        Err(error) => {
            return Err(anyhow::Error::from(error)
                .context(format!("cannot create container {:?}", &container))
                .into());
        }
    };
    info!("creating container {:?}", &container);
    let root = archive_root.to_path_buf();
    let container_name = PathBuf::from(
        container
            .file_name()
            .ok_or_else(|| anyhow!("container {:?} has no name", &container))?,
    );
    let exclusions = exclusions.clone();
    let result = tokio::task::spawn_blocking(move || {
        write_container(file, &root, &container_name, &exclusions)
    })
    .await
    .context("packing task failed")
    .and_then(|result| result);
    match result {
        Ok(members) => {
            info!("container {:?} holds {} members", &container, members);
            Ok(container)
        }
        Err(error) => {
            if let Err(rm_error) = tokio::fs::remove_file(&container).await {
                error!(
                    "failed removing partial container {:?}: {}",
                    &container,
                    rm_error
                );
            }
            Err(error
                .context(format!("failed packing {:?}", archive_root))
                .into())
        }
    }
}

/// Member paths of `container`, relative and without `./`, read without extracting
#[instrument]
pub async fn list_members(container: &Path) -> Result<Vec<PathBuf>> {
    let path = container.to_path_buf();
    let members = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<PathBuf>> {
        let file = std::fs::File::open(&path)
            .with_context(|| format!("cannot open container {:?}", &path))?;
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
        let mut members = Vec::new();
        for entry in archive
            .entries()
            .with_context(|| format!("cannot read container {:?}", &path))?
        {
            let entry = entry.with_context(|| format!("corrupt entry in {:?}", &path))?;
            let member = entry
                .path()
                .with_context(|| format!("bad member name in {:?}", &path))?;
            if let Some(member) = normalize_member(&member) {
                members.push(member);
            }
        }
        Ok(members)
    })
    .await
    .context("listing task failed")??;
    Ok(members)
}

/// Every path below `root` as (relative path, is real directory), links are not followed
async fn disk_paths(root: &Path) -> Result<Vec<(PathBuf, bool)>> {
    let mut paths = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let dir = root.join(&relative);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot open directory {:?} for reading", &dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {:?}", &dir))?
        {
            let entry_relative = relative.join(entry.file_name());
            let is_dir = entry
                .file_type()
                .await
                .with_context(|| format!("failed reading file type of {:?}", entry.path()))?
                .is_dir();
            if is_dir {
                pending.push(entry_relative.clone());
            }
            paths.push((entry_relative, is_dir));
        }
    }
    Ok(paths)
}

/// Paths present both in `container` and on disk below `archive_root`, deepest first
#[instrument]
pub async fn duplicated_paths(container: &Path, archive_root: &Path) -> Result<Vec<PathBuf>> {
    let members: HashSet<PathBuf> = list_members(container).await?.into_iter().collect();
    let mut duplicated: Vec<PathBuf> = disk_paths(archive_root)
        .await?
        .into_iter()
        .filter(|(relative, _)| members.contains(relative))
        .map(|(relative, _)| archive_root.join(relative))
        .collect();
    duplicated.sort_by(|a, b| b.cmp(a));
    Ok(duplicated)
}

/// Delete from disk every path folded into `container`: non-directories first, then member
/// directories that are empty, children before parents.
#[instrument]
pub async fn prune(archive_root: &Path, container: &Path) -> Result<Summary> {
    let members: HashSet<PathBuf> = list_members(container).await?.into_iter().collect();
    let mut summary = Summary {
        members: members.len(),
        ..Default::default()
    };
    for (relative, is_dir) in disk_paths(archive_root).await? {
        if is_dir || !members.contains(&relative) {
            continue;
        }
        let path = archive_root.join(&relative);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("failed removing {:?}", &path))?;
        summary.files_removed += 1;
    }
    // post-order over real directories: (relative path, children already visited)
    let mut pending = vec![(PathBuf::new(), false)];
    while let Some((relative, expanded)) = pending.pop() {
        let dir = archive_root.join(&relative);
        if !expanded {
            pending.push((relative.clone(), true));
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("cannot open directory {:?} for reading", &dir))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .with_context(|| format!("failed traversing directory {:?}", &dir))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .with_context(|| format!("failed reading file type of {:?}", entry.path()))?;
                if file_type.is_dir() {
                    pending.push((relative.join(entry.file_name()), false));
                }
            }
            continue;
        }
        if relative.as_os_str().is_empty() || !members.contains(&relative) {
            continue;
        }
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot open directory {:?} for reading", &dir))?;
        let is_empty = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {:?}", &dir))?
            .is_none();
        if is_empty {
            tokio::fs::remove_dir(&dir)
                .await
                .with_context(|| format!("failed removing directory {:?}", &dir))?;
            summary.directories_removed += 1;
        } else {
            debug!("keeping non-empty directory {:?}", &dir);
        }
    }
    Ok(summary)
}

/// Pack `archive_root` and prune what went into the container
#[instrument(skip(exclusions))]
pub async fn compress(archive_root: &Path, exclusions: &ExclusionSet) -> Result<(PathBuf, Summary)> {
    let container = pack(archive_root, exclusions).await?;
    let mut summary = prune(archive_root, &container).await?;
    summary.container_bytes = tokio::fs::metadata(&container)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &container))?
        .len();
    info!("compressed {:?}:\n{}", archive_root, &summary);
    Ok((container, summary))
}
