//! Archive service operations
//!
//! Each operation validates its input against the configured roots, then either runs in-process
//! (`create_dir`) or builds a command and hands it to the dispatcher (`compress`, `upload`,
//! `reupload`, `gen_checksums`). Every operation answers with a `Response` that serializes to the
//! JSON the service prints; failures become a `Response::error`.

use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

use crate::config::ServiceConfig;
use crate::dispatch::{CommandDispatcher, JobId, JobRequest, JobState};
use crate::dsmc::{self, Dsmc};
use crate::error::{Error, Result};
use crate::filter::ExclusionSet;
use crate::listing::ArchiveDescriptor;
use crate::manifest;
use crate::pack;
use crate::reconcile;
use crate::tree;
use crate::version::ServiceVersion;

const CHECKSUM_LOG: &str = "checksum.log";
const COMPRESS_LOG: &str = "compress_archive.log";
const ARCHIVE_SUFFIX: &str = "_archive";

/// JSON answer of every service operation
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub service_version: ServiceVersion,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_description: Option<ArchiveDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsmc_log_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(rename = "msg", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Response {
    fn new(state: JobState) -> Self {
        Self {
            service_version: ServiceVersion::current(),
            state,
            job_id: None,
            archive_description: None,
            dsmc_log_dir: None,
            archive_path: None,
            archive_host: None,
            message: None,
            http_code: None,
            error_message: None,
        }
    }

    /// Answer for a failed operation, carrying the status code of `error`
    pub fn error(error: &Error) -> Self {
        Self {
            http_code: Some(error.http_status()),
            error_message: Some(format!("{:#}", error)),
            ..Self::new(JobState::Error)
        }
    }

    fn started(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::new(JobState::Started)
        }
    }
}

/// Options of `create_dir`; `None` falls back to the configured defaults
#[derive(Debug, Clone, Default)]
pub struct CreateDirOptions {
    pub remove: bool,
    pub required_dirs: Option<Vec<String>>,
    pub exclude_dirs: Option<Vec<String>>,
    pub exclude_extensions: Option<Vec<String>>,
    pub strategy: tree::Strategy,
}

/// Split a comma separated list, dropping empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// True when `name` is a directory directly below `root`
pub async fn validate_runfolder_exists(name: &str, root: &Path) -> bool {
    let mut components = Path::new(name).components();
    let is_plain_name = matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    );
    if !is_plain_name {
        return false;
    }
    let is_dir = |path: PathBuf| async move {
        tokio::fs::metadata(path)
            .await
            .map(|md| md.is_dir())
            .unwrap_or(false)
    };
    is_dir(root.to_path_buf()).await && is_dir(root.join(name)).await
}

/// `root/name`, or `RunfolderNotFound`
pub async fn require_runfolder(name: &str, root: &Path) -> Result<PathBuf> {
    if !validate_runfolder_exists(name, root).await {
        return Err(Error::RunfolderNotFound {
            name: name.to_string(),
            root: root.to_path_buf(),
        });
    }
    Ok(root.join(name))
}

/// Create (if needed) and return `<log_root>/dsmc_<archive>`
#[instrument]
pub async fn prepare_log_dir(log_root: &Path, archive: &str) -> Result<PathBuf> {
    let is_dir = tokio::fs::metadata(log_root)
        .await
        .map(|md| md.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(Error::InvalidLogDir(log_root.to_path_buf()));
    }
    let log_dir = log_root.join(format!("dsmc_{}", archive));
    tokio::fs::create_dir_all(&log_dir)
        .await
        .with_context(|| format!("cannot create log directory {:?}", &log_dir))?;
    Ok(log_dir)
}

fn hostname() -> Option<String> {
    match nix::unistd::gethostname() {
        Ok(name) => Some(name.to_string_lossy().into_owned()),
        Err(error) => {
            warn!("cannot determine host name: {}", error);
            None
        }
    }
}

/// Configured packer, or the running executable quoted for the shell
fn packer(config: &ServiceConfig) -> Result<String> {
    if let Some(packer) = &config.packer_binary {
        return Ok(packer.clone());
    }
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    Ok(format!("'{}'", exe.display()))
}

/// The archive service: configuration, the dsmc client and a dispatcher for long jobs
pub struct ArchiveService {
    config: ServiceConfig,
    dsmc: Dsmc,
    packer: String,
    dispatcher: Arc<dyn CommandDispatcher>,
}

impl std::fmt::Debug for ArchiveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveService")
            .field("config", &self.config)
            .field("dsmc", &self.dsmc)
            .field("packer", &self.packer)
            .finish_non_exhaustive()
    }
}

impl ArchiveService {
    /// Service over `config`; relative roots are resolved against the current directory
    pub fn new(mut config: ServiceConfig, dispatcher: Arc<dyn CommandDispatcher>) -> Result<Self> {
        config.validate()?;
        for path in [
            &mut config.monitored_directory,
            &mut config.path_to_archive_root,
            &mut config.log_directory,
        ] {
            *path = std::path::absolute(&*path)
                .with_context(|| format!("cannot make {:?} absolute", path))?;
        }
        Ok(Self {
            dsmc: Dsmc::from_config(&config),
            packer: packer(&config)?,
            config,
            dispatcher,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &dyn CommandDispatcher {
        self.dispatcher.as_ref()
    }

    /// Start uploading `archive` under a fresh descriptor
    #[instrument(skip(self))]
    pub async fn upload(&self, archive: &str) -> Result<Response> {
        let archive_path = require_runfolder(archive, &self.config.path_to_archive_root).await?;
        let log_dir = prepare_log_dir(&self.config.log_directory, archive).await?;
        let output = dsmc::rotate_output(&log_dir).await?;
        let descriptor = ArchiveDescriptor::generate();
        info!("uploading {:?} with description {}", &archive_path, &descriptor);
        let command = self.dsmc.archive_command(&log_dir, &archive_path, &descriptor);
        let job_id = self
            .dispatcher
            .start(JobRequest::new(command, &log_dir, output))?;
        Ok(Response {
            archive_description: Some(descriptor),
            dsmc_log_dir: Some(log_dir),
            archive_path: Some(archive_path),
            archive_host: hostname(),
            ..Response::started(job_id)
        })
    }

    /// Send again whatever the latest upload of `archive` is missing
    #[instrument(skip(self))]
    pub async fn reupload(&self, archive: &str) -> Result<Response> {
        let archive_path = require_runfolder(archive, &self.config.path_to_archive_root).await?;
        let log_dir = prepare_log_dir(&self.config.log_directory, archive).await?;
        let descriptor = self.dsmc.latest_descriptor(&archive_path, &log_dir).await?;
        let remote = self
            .dsmc
            .remote_manifest(&archive_path, &descriptor, &log_dir)
            .await?;
        let local = manifest::local_manifest(&archive_path).await?;
        let set = reconcile::reconcile(&local, &remote.manifest);
        if set.is_empty() {
            info!("nothing to do, everything already uploaded");
        }
        let job_id = reconcile::reupload(
            &set,
            &descriptor,
            &log_dir,
            &std::env::temp_dir(),
            &self.dsmc,
            self.dispatcher.as_ref(),
        )
        .await?;
        Ok(Response {
            archive_description: Some(descriptor),
            dsmc_log_dir: Some(log_dir),
            archive_path: Some(archive_path),
            archive_host: hostname(),
            message: Some(format!("reuploading {} files", set.len())),
            ..Response::started(job_id)
        })
    }

    /// Start writing md5 checksums of every file in `archive`
    #[instrument(skip(self))]
    pub async fn gen_checksums(&self, archive: &str) -> Result<Response> {
        let archive_path = require_runfolder(archive, &self.config.path_to_archive_root).await?;
        let log_dir = &self.config.log_directory;
        info!("generating checksums for {:?}", &archive_path);
        let command = dsmc::checksum_command(&archive_path);
        let job_id = self.dispatcher.start(JobRequest::new(
            command,
            log_dir,
            log_dir.join(CHECKSUM_LOG),
        ))?;
        Ok(Response {
            archive_path: Some(archive_path),
            ..Response::started(job_id)
        })
    }

    /// Build the archive tree `<archive root>/<runfolder>_archive`
    #[instrument(skip(self))]
    pub async fn create_dir(&self, runfolder: &str, options: &CreateDirOptions) -> Result<Response> {
        let source = require_runfolder(runfolder, &self.config.monitored_directory).await?;
        let dest = self
            .config
            .path_to_archive_root
            .join(format!("{}{}", runfolder, ARCHIVE_SUFFIX));
        let settings = tree::Settings {
            excluded_dirs: options
                .exclude_dirs
                .clone()
                .unwrap_or_else(|| self.config.exclude_dirs.clone()),
            excluded_extensions: options
                .exclude_extensions
                .clone()
                .unwrap_or_else(|| self.config.exclude_extensions.clone()),
            required_dirs: options
                .required_dirs
                .clone()
                .unwrap_or_else(|| self.config.required_dirs.clone()),
            remove: options.remove,
            strategy: options.strategy,
        };
        let summary = tree::build(&source, &dest, &settings).await?;
        Ok(Response {
            archive_path: Some(dest),
            message: Some(summary.to_string()),
            ..Response::new(JobState::Done)
        })
    }

    /// Start folding `archive` into its container, keeping the configured exclusions on disk
    #[instrument(skip(self))]
    pub async fn compress(&self, archive: &str) -> Result<Response> {
        let archive_path = require_runfolder(archive, &self.config.path_to_archive_root).await?;
        let container = pack::container_path(&archive_path)?;
        if tokio::fs::symlink_metadata(&container).await.is_ok() {
            return Err(Error::ContainerExists(container));
        }
        ExclusionSet::new(&self.config.exclude_from_tarball)
            .context("invalid exclude_from_tarball pattern")?;
        let log_dir = &self.config.log_directory;
        info!(
            "creating container {:?}, then removing what went into it",
            &container
        );
        let command =
            pack::pack_command(&self.packer, &archive_path, &self.config.exclude_from_tarball);
        let job_id = self.dispatcher.start(JobRequest::new(
            command,
            log_dir,
            log_dir.join(COMPRESS_LOG),
        ))?;
        Ok(Response {
            archive_path: Some(container),
            ..Response::started(job_id)
        })
    }

    /// State of a dispatched job
    pub fn status(&self, job_id: JobId) -> Result<Response> {
        let state = self.dispatcher.status(job_id)?;
        Ok(Response {
            job_id: Some(job_id),
            ..Response::new(state)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{self, RecordingDispatcher};
    use tracing_test::traced_test;

    struct Fixture {
        tmp_dir: PathBuf,
        dispatcher: Arc<RecordingDispatcher>,
        service: ArchiveService,
    }

    async fn fixture(configure: impl FnOnce(&mut ServiceConfig)) -> anyhow::Result<Fixture> {
        let tmp_dir = testutils::create_temp_dir().await?;
        for dir in ["runfolders", "archives", "logs"] {
            tokio::fs::create_dir(tmp_dir.join(dir)).await?;
        }
        let mut config = ServiceConfig::new(
            tmp_dir.join("runfolders"),
            tmp_dir.join("archives"),
            tmp_dir.join("logs"),
        );
        configure(&mut config);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let service = ArchiveService::new(config, dispatcher.clone())?;
        Ok(Fixture {
            tmp_dir,
            dispatcher,
            service,
        })
    }

    #[tokio::test]
    async fn runfolder_must_be_direct_subdirectory() -> anyhow::Result<()> {
        let tmp_dir = testutils::create_temp_dir().await?;
        testutils::setup_runfolder(&tmp_dir).await?;
        tokio::fs::write(tmp_dir.join("file.txt"), "f").await?;
        assert!(validate_runfolder_exists("runfolder", &tmp_dir).await);
        for name in ["file.txt", "missing", "runfolder/Data", "..", ".", ""] {
            assert!(!validate_runfolder_exists(name, &tmp_dir).await, "{:?}", name);
        }
        assert!(!validate_runfolder_exists("runfolder", &tmp_dir.join("nope")).await);
        match require_runfolder("missing", &tmp_dir).await {
            Err(error @ Error::RunfolderNotFound { .. }) => assert_eq!(error.http_status(), 400),
            other => panic!("expected RunfolderNotFound, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn log_dir_is_created_below_valid_root() -> anyhow::Result<()> {
        let tmp_dir = testutils::create_temp_dir().await?;
        let log_dir = prepare_log_dir(&tmp_dir, "foo_archive").await?;
        assert_eq!(log_dir, tmp_dir.join("dsmc_foo_archive"));
        assert!(log_dir.is_dir());
        assert_eq!(prepare_log_dir(&tmp_dir, "foo_archive").await?, log_dir);
        tokio::fs::write(tmp_dir.join("not_a_dir"), "").await?;
        assert!(matches!(
            prepare_log_dir(&tmp_dir.join("not_a_dir"), "foo_archive").await,
            Err(Error::InvalidLogDir(_))
        ));
        Ok(())
    }

    #[test]
    fn comma_separated_lists() {
        assert_eq!(split_list("Data, Logs ,,Config"), vec!["Data", "Logs", "Config"]);
        assert!(split_list("").is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn upload_dispatches_archive_with_fresh_description() -> anyhow::Result<()> {
        let fixture = fixture(|_| {}).await?;
        let archive = fixture.tmp_dir.join("archives").join("foo_archive");
        tokio::fs::create_dir(&archive).await?;
        let log_dir = fixture.tmp_dir.join("logs").join("dsmc_foo_archive");
        tokio::fs::create_dir(&log_dir).await?;
        tokio::fs::write(log_dir.join("dsmc_output"), "old").await?;
        let response = fixture.service.upload("foo_archive").await?;
        assert_eq!(response.state, JobState::Started);
        assert_eq!(response.job_id, Some(JobId(1)));
        assert_eq!(response.archive_path.as_deref(), Some(archive.as_path()));
        assert_eq!(response.dsmc_log_dir.as_deref(), Some(log_dir.as_path()));
        let descriptor = response.archive_description.clone().unwrap();
        let requests = fixture.dispatcher.requests();
        assert_eq!(
            requests[0].command,
            format!(
                "export DSM_LOG={} && dsmc archive {}/ -subdir='yes' -description='{}'",
                log_dir.display(),
                archive.display(),
                descriptor
            )
        );
        assert_eq!(requests[0].stdout, log_dir.join("dsmc_output"));
        assert!(!log_dir.join("dsmc_output").exists());
        let json = serde_json::to_value(&response)?;
        assert_eq!(json["state"], "started");
        assert_eq!(json["job_id"], 1);
        assert!(json.get("message").is_none());
        // a second upload gets its own description
        let again = fixture.service.upload("foo_archive").await?;
        assert_ne!(again.archive_description, Some(descriptor));
        Ok(())
    }

    #[tokio::test]
    async fn upload_of_unknown_archive_is_rejected() -> anyhow::Result<()> {
        let fixture = fixture(|_| {}).await?;
        assert!(matches!(
            fixture.service.upload("nope").await,
            Err(Error::RunfolderNotFound { .. })
        ));
        assert!(fixture.dispatcher.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reupload_sends_missing_and_changed_files() -> anyhow::Result<()> {
        let mut fixture = fixture(|_| {}).await?;
        let archive = fixture.tmp_dir.join("archives").join("foo_archive");
        tokio::fs::create_dir(&archive).await?;
        let script = testutils::fake_dsmc(
            &fixture.tmp_dir,
            &format!(
                "echo '         4,096  B  2017-10-01 16.47.24    {a} Never e374bd6b'\n\
                 echo '             1  B  2017-10-01 16.47.24    {a}/a.txt Never e374bd6b'\n\
                 echo '             5  B  2017-10-01 16.47.24    {a}/b.txt Never e374bd6b'",
                a = archive.display()
            ),
        )
        .await?;
        let mut config = fixture.service.config().clone();
        config.dsmc_binary = script;
        fixture.service = ArchiveService::new(config, fixture.dispatcher.clone())?;
        tokio::fs::write(archive.join("a.txt"), "a").await?;
        tokio::fs::write(archive.join("b.txt"), "bb").await?;
        tokio::fs::write(archive.join("c.txt"), "ccc").await?;
        let response = fixture.service.reupload("foo_archive").await?;
        assert_eq!(response.state, JobState::Started);
        assert_eq!(
            response.archive_description,
            Some(ArchiveDescriptor::new("e374bd6b"))
        );
        let requests = fixture.dispatcher.requests();
        let filelist = requests[0]
            .command
            .split("-filelist='")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .unwrap()
            .to_string();
        assert_eq!(
            std::fs::read_to_string(&filelist)?,
            format!(
                "\"{}\"\n\"{}\"\n",
                archive.join("b.txt").display(),
                archive.join("c.txt").display()
            )
        );
        std::fs::remove_file(&filelist)?;
        // once sizes agree there is nothing left to send
        tokio::fs::write(archive.join("b.txt"), "bbbbb").await?;
        tokio::fs::remove_file(archive.join("c.txt")).await?;
        match fixture.service.reupload("foo_archive").await {
            Err(error @ Error::EmptyResult(_)) => assert_eq!(error.http_status(), 400),
            other => panic!("expected EmptyResult, got {:?}", other),
        }
        assert_eq!(fixture.dispatcher.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn checksums_run_in_log_directory() -> anyhow::Result<()> {
        let fixture = fixture(|_| {}).await?;
        let archive = fixture.tmp_dir.join("archives").join("foo_archive");
        tokio::fs::create_dir(&archive).await?;
        let response = fixture.service.gen_checksums("foo_archive").await?;
        assert_eq!(response.state, JobState::Started);
        let request = &fixture.dispatcher.requests()[0];
        assert_eq!(request.command, dsmc::checksum_command(&archive));
        assert_eq!(request.run_dir, fixture.tmp_dir.join("logs"));
        assert_eq!(request.stdout, fixture.tmp_dir.join("logs").join("checksum.log"));
        assert_eq!(fixture.service.status(JobId(1))?.state, JobState::Queued);
        assert!(matches!(
            fixture.service.status(JobId(9)),
            Err(Error::UnknownJob(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn create_dir_then_compress() -> anyhow::Result<()> {
        let fixture = fixture(|config| {
            config.exclude_dirs = vec!["Thumbnail_Images".to_string()];
            config.exclude_extensions = vec![".cif".to_string()];
            config.exclude_from_tarball = vec!["RunInfo.xml".to_string(), "Config".to_string()];
            config.packer_binary = Some("archive-upload".to_string());
        })
        .await?;
        testutils::setup_runfolder(&fixture.tmp_dir.join("runfolders")).await?;
        let response = fixture
            .service
            .create_dir("runfolder", &CreateDirOptions::default())
            .await?;
        let archive = fixture.tmp_dir.join("archives").join("runfolder_archive");
        assert_eq!(response.state, JobState::Done);
        assert_eq!(response.archive_path.as_deref(), Some(archive.as_path()));
        assert!(!archive.join("Data/Thumbnail_Images").exists());
        assert!(!archive.join("Data/Intensities/s_1.cif").exists());
        assert!(matches!(
            fixture
                .service
                .create_dir("runfolder", &CreateDirOptions::default())
                .await,
            Err(Error::DestinationExists(_))
        ));
        let response = fixture.service.compress("runfolder_archive").await?;
        let container = archive.join("runfolder_archive.tar.gz");
        assert_eq!(response.state, JobState::Started);
        assert_eq!(response.job_id, Some(JobId(1)));
        assert_eq!(response.archive_path.as_deref(), Some(container.as_path()));
        let request = &fixture.dispatcher.requests()[0];
        assert_eq!(
            request.command,
            format!(
                "archive-upload -v pack '{}' --exclude='RunInfo.xml' --exclude='Config'",
                archive.display()
            )
        );
        assert_eq!(request.run_dir, fixture.tmp_dir.join("logs"));
        assert_eq!(
            request.stdout,
            fixture.tmp_dir.join("logs").join("compress_archive.log")
        );
        // the tree is untouched until the job runs
        assert!(archive.join("Data").is_dir());
        tokio::fs::write(&container, "").await?;
        match fixture.service.compress("runfolder_archive").await {
            Err(error @ Error::ContainerExists(_)) => assert_eq!(error.http_status(), 400),
            other => panic!("expected ContainerExists, got {:?}", other),
        }
        assert_eq!(fixture.dispatcher.requests().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn compress_rejects_invalid_exclusions() -> anyhow::Result<()> {
        let fixture = fixture(|config| {
            config.exclude_from_tarball = vec!["[".to_string()];
            config.packer_binary = Some("archive-upload".to_string());
        })
        .await?;
        tokio::fs::create_dir(fixture.tmp_dir.join("archives").join("foo_archive")).await?;
        let error = fixture.service.compress("foo_archive").await.unwrap_err();
        assert_eq!(error.http_status(), 500);
        assert!(fixture.dispatcher.requests().is_empty());
        Ok(())
    }

    #[test]
    fn errors_render_code_and_message() -> anyhow::Result<()> {
        let error = Error::EmptyResult("nothing to reupload".to_string());
        let json = serde_json::to_value(Response::error(&error))?;
        assert_eq!(json["state"], "error");
        assert_eq!(json["http_code"], 400);
        assert_eq!(json["msg"], "nothing to reupload");
        assert!(json.get("job_id").is_none());
        let error = Error::SourceIncomplete {
            source_tree: PathBuf::from("/data/runfolder"),
            required: "Unaligned".to_string(),
        };
        let json = serde_json::to_value(Response::error(&error))?;
        assert_eq!(json["http_code"], 500);
        assert!(json["msg"].as_str().unwrap().contains("Unaligned"));
        let json = serde_json::to_value(Response::new(JobState::Done))?;
        assert!(json.get("http_code").is_none());
        assert!(json.get("msg").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn create_dir_options_override_defaults() -> anyhow::Result<()> {
        let fixture = fixture(|config| {
            config.required_dirs = vec!["Unaligned".to_string()];
        })
        .await?;
        testutils::setup_runfolder(&fixture.tmp_dir.join("runfolders")).await?;
        assert!(matches!(
            fixture
                .service
                .create_dir("runfolder", &CreateDirOptions::default())
                .await,
            Err(Error::SourceIncomplete { .. })
        ));
        let options = CreateDirOptions {
            required_dirs: Some(split_list("Data,Logs")),
            exclude_dirs: Some(split_list("Logs")),
            ..Default::default()
        };
        fixture.service.create_dir("runfolder", &options).await?;
        let archive = fixture.tmp_dir.join("archives").join("runfolder_archive");
        assert!(archive.join("Data/Thumbnail_Images/a.jpg").exists());
        assert!(!archive.join("Logs").exists());
        Ok(())
    }
}
