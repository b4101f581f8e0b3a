#[macro_use]
extern crate tracing;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "archive-upload",
    version,
    about = "Archive sequencing runfolders - build the archive tree, pack it and upload it with dsmc",
    long_about = "`archive-upload` moves runfolders into tape-backed long-term storage.

EXAMPLE:
    # Build the archive tree, pack it, checksum it and send it
    archive-upload --config app.toml create-dir 150415_D00457_0088_AC6DLHANXX
    archive-upload --config app.toml compress 150415_D00457_0088_AC6DLHANXX_archive
    archive-upload --config app.toml gen-checksums 150415_D00457_0088_AC6DLHANXX_archive
    archive-upload --config app.toml upload 150415_D00457_0088_AC6DLHANXX_archive

    # Send again only what the last upload is missing
    archive-upload --config app.toml reupload 150415_D00457_0088_AC6DLHANXX_archive

Every command prints a JSON response on stdout; logs go to stderr."
)]
struct Args {
    /// Service configuration file (TOML)
    #[arg(short = 'c', long, value_name = "PATH", help_heading = "Configuration")]
    config: Option<std::path::PathBuf>,

    /// Delay between job status checks while waiting for dsmc and checksum jobs
    ///
    /// This option accepts a human readable duration, e.g. "200ms", "10s", "5min" etc.
    #[arg(
        long,
        default_value = "1s",
        value_name = "DELAY",
        help_heading = "Configuration"
    )]
    poll_interval: String,

    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
enum Command {
    /// Build `<archive root>/<RUNFOLDER>_archive` as a tree of symlinks into the runfolder
    CreateDir {
        /// Runfolder name, a directory directly below the monitored directory
        runfolder: String,

        /// Replace an existing archive tree
        #[arg(long, help_heading = "Archive tree")]
        remove: bool,

        /// Comma separated subdirectories the runfolder must have (default: from config)
        #[arg(long, value_name = "LIST", help_heading = "Archive tree")]
        required_dirs: Option<String>,

        /// Comma separated directory names left out of the tree (default: from config)
        #[arg(long, value_name = "LIST", help_heading = "Archive tree")]
        exclude_dirs: Option<String>,

        /// Comma separated file extensions left out of the tree (default: from config)
        #[arg(long, value_name = "LIST", help_heading = "Archive tree")]
        exclude_extensions: Option<String>,

        /// How the tree is built; both yield the same tree
        #[arg(long, value_enum, default_value_t = StrategyArg::MaterializingWalk, help_heading = "Archive tree")]
        strategy: StrategyArg,
    },
    /// Pack an archive tree into `<ARCHIVE>.tar.gz` and delete what went into it
    Compress {
        /// Archive name, a directory directly below the archive root
        archive: String,
    },
    /// Write md5 checksums of every file in the archive
    GenChecksums {
        /// Archive name, a directory directly below the archive root
        archive: String,
    },
    /// Upload the archive under a fresh description
    Upload {
        /// Archive name, a directory directly below the archive root
        archive: String,
    },
    /// Upload again the files the latest upload is missing or holds with another size
    Reupload {
        /// Archive name, a directory directly below the archive root
        archive: String,
    },
    /// Print version information as JSON
    Version,
    /// Pack and prune an archive tree in this process; what `compress` jobs run
    #[command(hide = true)]
    Pack {
        /// Archive tree to fold into its container
        archive_path: std::path::PathBuf,

        /// Entry kept out of the container, may be repeated
        #[arg(long, value_name = "PATTERN")]
        exclude: Vec<String>,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyArg {
    /// Link everything, then delete excluded entries
    LinkForest,
    /// Skip excluded entries while walking the runfolder
    MaterializingWalk,
}

impl From<StrategyArg> for common::tree::Strategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::LinkForest => common::tree::Strategy::LinkForest,
            StrategyArg::MaterializingWalk => common::tree::Strategy::MaterializingWalk,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize response")?;
    println!("{}", json);
    Ok(())
}

/// Wait for a dispatched job and fold its final state into the response
async fn finish(
    service: &common::service::ArchiveService,
    mut response: common::service::Response,
    poll_interval: std::time::Duration,
) -> common::Result<common::service::Response> {
    let job_id = response
        .job_id
        .ok_or_else(|| anyhow!("dispatched operation returned no job id"))?;
    info!("waiting for job {}", job_id);
    response.state = common::dispatch::wait_for(service.dispatcher(), job_id, poll_interval).await?;
    info!("job {} finished: {}", job_id, response.state);
    Ok(response)
}

fn build_service(config_path: Option<&std::path::Path>) -> Result<common::service::ArchiveService> {
    let config_path =
        config_path.ok_or_else(|| anyhow!("--config is required for this command"))?;
    let config = common::config::ServiceConfig::from_file(config_path)?;
    let dispatcher = Arc::new(common::dispatch::LocalDispatcher::new(
        config.cores,
        config.whitelisted_warnings.clone(),
    ));
    common::service::ArchiveService::new(config, dispatcher).map_err(Into::into)
}

#[instrument(skip(service))]
async fn operation(
    service: &common::service::ArchiveService,
    command: Command,
    poll_interval: std::time::Duration,
) -> common::Result<common::service::Response> {
    match command {
        Command::CreateDir {
            runfolder,
            remove,
            required_dirs,
            exclude_dirs,
            exclude_extensions,
            strategy,
        } => {
            let options = common::service::CreateDirOptions {
                remove,
                required_dirs: required_dirs.as_deref().map(common::service::split_list),
                exclude_dirs: exclude_dirs.as_deref().map(common::service::split_list),
                exclude_extensions: exclude_extensions
                    .as_deref()
                    .map(common::service::split_list),
                strategy: strategy.into(),
            };
            service.create_dir(&runfolder, &options).await
        }
        Command::Compress { archive } => {
            let response = service.compress(&archive).await?;
            finish(service, response, poll_interval).await
        }
        Command::GenChecksums { archive } => {
            let response = service.gen_checksums(&archive).await?;
            finish(service, response, poll_interval).await
        }
        Command::Upload { archive } => {
            let response = service.upload(&archive).await?;
            finish(service, response, poll_interval).await
        }
        Command::Reupload { archive } => {
            let response = service.reupload(&archive).await?;
            finish(service, response, poll_interval).await
        }
        Command::Version | Command::Pack { .. } => {
            Err(anyhow!("{:?} does not use the archive service", command).into())
        }
    }
}

#[instrument]
async fn async_main(args: Args) -> Result<bool> {
    let poll_interval = humantime::parse_duration(&args.poll_interval)
        .with_context(|| format!("invalid --poll-interval {:?}", &args.poll_interval))?;
    match &args.command {
        Command::Version => {
            print_json(&common::version::ServiceVersion::current())?;
            return Ok(true);
        }
        Command::Pack {
            archive_path,
            exclude,
        } => {
            let exclusions = common::filter::ExclusionSet::new(exclude)?;
            let (container, summary) = common::pack::compress(archive_path, &exclusions).await?;
            println!("packed {:?}\n{}", container, summary);
            return Ok(true);
        }
        _ => {}
    }
    let service = build_service(args.config.as_deref())?;
    let response = match operation(&service, args.command, poll_interval).await {
        Ok(response) => response,
        Err(error) => {
            error!("{:#}", &error);
            common::service::Response::error(&error)
        }
    };
    print_json(&response)?;
    Ok(response.state != common::dispatch::JobState::Error)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    match common::run(output, runtime, func) {
        Some(true) => Ok(()),
        _ => std::process::exit(1),
    }
}
