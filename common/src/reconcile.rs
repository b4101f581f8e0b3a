//! Comparing local and remote manifests and re-sending the difference
//!
//! Only sizes are compared: a file is re-sent when it is missing remotely or when the remote copy
//! has a different number of bytes. Entries present only remotely (directories, files deleted
//! locally since the upload) never cause a transmission.

use anyhow::Context;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::dispatch::{CommandDispatcher, JobId, JobRequest};
use crate::dsmc::{self, Dsmc};
use crate::error::{Error, Result};
use crate::listing::ArchiveDescriptor;
use crate::manifest::Manifest;

const REUPLOAD_FILE_PREFIX: &str = "archive-upload-reupload-";

/// Paths that have to be transmitted again, in path order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReuploadSet {
    paths: Vec<PathBuf>,
}

impl ReuploadSet {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Local entries that are absent remotely or whose remote size differs
pub fn reconcile(local: &Manifest, remote: &Manifest) -> ReuploadSet {
    let mut paths = Vec::new();
    for entry in local.iter() {
        match remote.get(&entry.path) {
            Some(size) if size == entry.size_bytes => {
                trace!("{:?} already uploaded", &entry.path);
            }
            Some(size) => {
                info!(
                    "local size {} does not match remote size {} for {:?}",
                    entry.size_bytes,
                    size,
                    &entry.path
                );
                paths.push(entry.path);
            }
            None => {
                info!("{:?} has not been uploaded", &entry.path);
                paths.push(entry.path);
            }
        }
    }
    ReuploadSet { paths }
}

/// Write the set to a fresh file in `dir`, one double-quoted path per line.
///
/// Paths are written as raw bytes. The file outlives this call since dsmc reads it later; on a
/// write error it is removed.
pub fn write_reupload_file(set: &ReuploadSet, dir: &Path) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix(REUPLOAD_FILE_PREFIX)
        .tempfile_in(dir)
        .with_context(|| format!("cannot create reupload file in {:?}", dir))?;
    for path in set.paths() {
        file.write_all(b"\"")
            .and_then(|_| file.write_all(path.as_os_str().as_bytes()))
            .and_then(|_| file.write_all(b"\"\n"))
            .with_context(|| format!("failed writing reupload file {:?}", file.path()))?;
    }
    file.flush()
        .with_context(|| format!("failed writing reupload file {:?}", file.path()))?;
    let (_, path) = file
        .keep()
        .context("cannot keep reupload file")?;
    debug!("written files to reupload to {:?}", &path);
    Ok(path)
}

/// Start a dsmc job sending the files in `set` under the existing `descriptor`
///
/// The filelist is written to `filelist_dir` and removed again if the job cannot be started.
#[instrument(skip(set, dsmc, dispatcher), fields(files = set.len()))]
pub async fn reupload(
    set: &ReuploadSet,
    descriptor: &ArchiveDescriptor,
    log_dir: &Path,
    filelist_dir: &Path,
    dsmc: &Dsmc,
    dispatcher: &dyn CommandDispatcher,
) -> Result<JobId> {
    if set.is_empty() {
        return Err(Error::EmptyResult("nothing to reupload".to_string()));
    }
    info!("will now reupload {} files", set.len());
    let output = dsmc::rotate_output(log_dir).await?;
    let filelist = write_reupload_file(set, filelist_dir)?;
    let command = dsmc.archive_filelist_command(log_dir, &filelist, descriptor);
    debug!("running command {}", &command);
    match dispatcher.start(JobRequest::new(command, log_dir, output)) {
        Ok(job_id) => Ok(job_id),
        Err(error) => {
            if let Err(remove_error) = tokio::fs::remove_file(&filelist).await {
                warn!(
                    "failed removing reupload file {:?}: {}",
                    &filelist,
                    remove_error
                );
            }
            Err(error)
        }
    }
}
