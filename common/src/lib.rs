//! Common library for archive-upload, the service moving sequencing runfolders to tape-backed
//! long-term storage.
//!
//! A runfolder goes through these steps:
//! 1. **create_dir** ([`tree`]): build `<archive root>/<runfolder>_archive`, a tree of symlinks
//!    into the runfolder with unwanted directories and file extensions left out.
//! 2. **compress** ([`pack`]): fold most of the archive tree into one gzip'd tar container and
//!    delete what went into it, keeping selected entries uncompressed next to it.
//! 3. **gen_checksums** ([`dsmc::checksum_command`]): record md5 sums of every archived file.
//! 4. **upload** ([`dsmc::Dsmc::archive_command`]): send the tree to the archival tier under a
//!    fresh [`listing::ArchiveDescriptor`].
//! 5. **reupload** ([`reconcile`]): compare the local tree ([`manifest`]) with what the archival
//!    tier holds ([`listing`]) and send only missing or size-mismatched files.
//!
//! Long running steps are handed to a [`dispatch::CommandDispatcher`] and polled by job id.
//! [`service::ArchiveService`] wires the steps to a [`config::ServiceConfig`].
//!
//! # Error Handling
//! Every operation returns [`Result`] with the [`Error`] taxonomy; see [`error`] for the mapping
//! onto client and server failures.

#[macro_use]
extern crate tracing;

pub mod config;
pub mod dispatch;
pub mod dsmc;
pub mod error;
pub mod filter;
pub mod listing;
pub mod logging;
pub mod manifest;
pub mod pack;
pub mod reconcile;
pub mod rm;
pub mod service;
pub mod tree;
pub mod version;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RuntimeConfig};
pub use error::{Error, Result};

/// Build a tokio runtime per `runtime`, set up logging and run `func` to completion.
///
/// Errors are logged (and printed unless `output.quiet`); `None` signals failure to the caller.
pub fn run<Fut, T>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<T>
where
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    logging::init(&output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let tokio_runtime = match builder.build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => {
            error!("failed to start the runtime: {:#}", &error);
            if !output.quiet {
                eprintln!("failed to start the runtime: {:#}", &error);
            }
            return None;
        }
    };
    match tokio_runtime.block_on(func()) {
        Ok(value) => Some(value),
        Err(error) => {
            error!("{:#}", &error);
            if !output.quiet {
                eprintln!("{:#}", &error);
            }
            None
        }
    }
}
