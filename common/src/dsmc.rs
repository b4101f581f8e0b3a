//! dsmc command lines and remote archive queries
//!
//! Every interaction with the archival tier goes through the `dsmc` client. Long-running
//! commands (`dsmc archive`) are only built here and handed to a `CommandDispatcher`; short
//! queries (`dsmc q ar`) are run directly and their output parsed by `listing`.

use anyhow::Context;
use std::path::Path;
use tracing::instrument;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::listing::{self, ArchiveDescriptor, RemoteListing};

/// Name of the checksum file written into the archive before upload
pub const CHECKSUM_FILE: &str = "checksums_prior_to_pdc.md5";

/// File in the per-archive log directory receiving dsmc stdout and stderr
pub const OUTPUT_FILE: &str = "dsmc_output";

/// dsmc arguments in command line order, `None` values render as bare flags
pub type DsmcArgs = Vec<(String, Option<String>)>;

/// Render arguments as `-key='value'` for valued keys followed by `-key` for flags
pub fn render_args(args: &[(String, Option<String>)]) -> String {
    let valued = args
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|value| format!("-{}='{}'", key, value)));
    let flags = args
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| format!("-{}", key));
    valued.chain(flags).collect::<Vec<_>>().join(" ")
}

/// Command generating md5 checksums of every file below `archive`
pub fn checksum_command(archive: &Path) -> String {
    format!(
        "cd {} && /usr/bin/find -L . -type f ! -path './{}' -exec /usr/bin/md5sum {{}} + > {}",
        archive.display(),
        CHECKSUM_FILE,
        CHECKSUM_FILE
    )
}

/// Move an existing `dsmc_output` in `log_dir` aside and return the path for the next run.
///
/// The old file is renamed to `dsmc_output.<mtime>`, its modification time in seconds since the
/// epoch, so repeated uploads of one archive keep every log.
#[instrument]
pub async fn rotate_output(log_dir: &Path) -> Result<std::path::PathBuf> {
    let output = log_dir.join(OUTPUT_FILE);
    let metadata = match tokio::fs::metadata(&output).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(output),
        Err(error) => {
            return Err(anyhow::Error::from(error)
                .context(format!("failed reading metadata from {:?}", &output))
                .into());
        }
    };
    if !metadata.is_file() {
        return Ok(output);
    }
    let mtime = metadata
        .modified()
        .with_context(|| format!("no modification time for {:?}", &output))?
        .duration_since(std::time::UNIX_EPOCH)
        .context("modification time before the epoch")?;
    let rotated = log_dir.join(format!("{}.{}", OUTPUT_FILE, mtime.as_secs_f64()));
    debug!("rotating {:?} to {:?}", &output, &rotated);
    tokio::fs::rename(&output, &rotated)
        .await
        .with_context(|| format!("failed renaming {:?} to {:?}", &output, &rotated))?;
    Ok(output)
}

/// Client for the `dsmc` program with the arguments appended to every invocation
#[derive(Debug, Clone)]
pub struct Dsmc {
    binary: String,
    extra_args: DsmcArgs,
}

impl Dsmc {
    pub fn new(binary: impl Into<String>, extra_args: DsmcArgs) -> Self {
        Self {
            binary: binary.into(),
            extra_args,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.dsmc_binary.clone(), config.dsmc_args())
    }

    /// Merge per-command arguments with the configured extra ones and render them.
    ///
    /// Configured arguments override per-command arguments of the same name.
    pub fn args(&self, base: &[(&str, Option<String>)]) -> String {
        let mut merged: DsmcArgs = base
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        for (key, value) in &self.extra_args {
            match merged.iter_mut().find(|(existing, _)| existing == key) {
                Some(slot) => slot.1 = value.clone(),
                None => merged.push((key.clone(), value.clone())),
            }
        }
        render_args(&merged)
    }

    fn command(&self, log_dir: &Path, operation: &str, args: String) -> String {
        let command = format!(
            "export DSM_LOG={} && {} {} {}",
            log_dir.display(),
            self.binary,
            operation,
            args
        );
        command.trim_end().to_string()
    }

    /// `dsmc q ar` over every uploaded version of `archive`
    pub fn query_versions_command(&self, log_dir: &Path, archive: &Path) -> String {
        self.command(
            log_dir,
            &format!("q ar {}", archive.display()),
            self.args(&[]),
        )
    }

    /// `dsmc q ar` over the files of one upload of `archive`
    pub fn query_files_command(
        &self,
        log_dir: &Path,
        archive: &Path,
        descriptor: &ArchiveDescriptor,
    ) -> String {
        self.command(
            log_dir,
            &format!("q ar {}/", archive.display()),
            self.args(&[
                ("subdir", Some("yes".to_string())),
                ("description", Some(descriptor.to_string())),
            ]),
        )
    }

    /// `dsmc archive` of the whole `archive` tree
    pub fn archive_command(
        &self,
        log_dir: &Path,
        archive: &Path,
        descriptor: &ArchiveDescriptor,
    ) -> String {
        self.command(
            log_dir,
            &format!("archive {}/", archive.display()),
            self.args(&[
                ("subdir", Some("yes".to_string())),
                ("description", Some(descriptor.to_string())),
            ]),
        )
    }

    /// `dsmc archive` of the paths listed in `filelist`
    pub fn archive_filelist_command(
        &self,
        log_dir: &Path,
        filelist: &Path,
        descriptor: &ArchiveDescriptor,
    ) -> String {
        self.command(
            log_dir,
            "archive",
            self.args(&[
                ("filelist", Some(filelist.display().to_string())),
                ("description", Some(descriptor.to_string())),
            ]),
        )
    }

    /// Run a short query through the shell and return its combined output
    #[instrument(skip(self))]
    pub async fn run_query(&self, command: &str) -> Result<String> {
        debug!("running: {}", command);
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {:?}", command))?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(Error::TransportError {
                message: "dsmc returned a non-zero exit status".to_string(),
                status: output.status.code(),
                output: text,
            });
        }
        trace!("raw output from dsmc: {}", &text);
        Ok(text)
    }

    /// Descriptor of the most recent upload of `archive`
    #[instrument(skip(self))]
    pub async fn latest_descriptor(
        &self,
        archive: &Path,
        log_dir: &Path,
    ) -> Result<ArchiveDescriptor> {
        info!("fetching archive description for {:?}", archive);
        let command = self.query_versions_command(log_dir, archive);
        let output = self
            .run_query(&command)
            .await
            .map_err(|error| with_message(error, "error when getting description"))?;
        listing::latest_descriptor(&output, &archive.display().to_string())
    }

    /// Files and sizes the archival tier holds for the upload labelled `descriptor`
    #[instrument(skip(self))]
    pub async fn remote_manifest(
        &self,
        archive: &Path,
        descriptor: &ArchiveDescriptor,
        log_dir: &Path,
    ) -> Result<RemoteListing> {
        info!("fetching remote filelist for {:?}", archive);
        let command = self.query_files_command(log_dir, archive, descriptor);
        let output = self
            .run_query(&command)
            .await
            .map_err(|error| with_message(error, "error when getting filelist"))?;
        listing::parse_listing(&output, &archive.display().to_string())
    }
}

fn with_message(error: Error, message: &str) -> Error {
    match error {
        Error::TransportError { status, output, .. } => Error::TransportError {
            message: message.to_string(),
            status,
            output,
        },
        other => other,
    }
}
