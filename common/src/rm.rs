use anyhow::Context;
use async_recursion::async_recursion;
use tracing::instrument;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_removed: usize,
    pub symlinks_removed: usize,
    pub directories_removed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_removed: self.files_removed + other.files_removed,
            symlinks_removed: self.symlinks_removed + other.symlinks_removed,
            directories_removed: self.directories_removed + other.directories_removed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files removed: {}\n\
            symlinks removed: {}\n\
            directories removed: {}\n",
            self.files_removed, self.symlinks_removed, self.directories_removed
        )
    }
}

/// Remove `path` and, if it is a directory, everything below it. Symlinks are removed, never
/// followed.
#[instrument]
#[async_recursion]
pub async fn rm(path: &std::path::Path) -> anyhow::Result<Summary> {
    debug!("remove: {:?}", path);
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .with_context(|| format!("failed reading metadata from {:?}", &path))?;
    if !metadata.is_dir() {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed removing {:?}", &path))?;
        return Ok(if metadata.file_type().is_symlink() {
            Summary {
                symlinks_removed: 1,
                ..Default::default()
            }
        } else {
            Summary {
                files_removed: 1,
                ..Default::default()
            }
        });
    }
    let mut summary = Summary::default();
    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("cannot open directory {:?} for reading", path))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {:?}", &path))?
    {
        summary = summary + rm(&entry.path()).await?;
    }
    tokio::fs::remove_dir(path)
        .await
        .with_context(|| format!("failed removing directory {:?}", &path))?;
    summary.directories_removed += 1;
    debug!("remove: {:?} succeeded!", path);
    Ok(summary)
}
