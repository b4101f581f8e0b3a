//! Running long jobs in the background
//!
//! The engine never waits on an upload itself: it builds a command, hands it to a
//! `CommandDispatcher` and keeps the returned `JobId` for later status polling.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::instrument;

use crate::error::{Error, Result};

/// Opaque identifier of a dispatched job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse()
            .map(JobId)
            .map_err(|_| Error::UnknownJob(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Started,
    Done,
    Error,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Queued => "queued",
            JobState::Started => "started",
            JobState::Done => "done",
            JobState::Error => "error",
        };
        f.write_str(name)
    }
}

/// A shell command plus where it runs and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub command: String,
    pub cores: usize,
    pub run_dir: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl JobRequest {
    /// Single core job writing stdout and stderr to the same file
    pub fn new(
        command: impl Into<String>,
        run_dir: impl Into<PathBuf>,
        log: impl Into<PathBuf>,
    ) -> Self {
        let log = log.into();
        Self {
            command: command.into(),
            cores: 1,
            run_dir: run_dir.into(),
            stdout: log.clone(),
            stderr: log,
        }
    }
}

/// Something that runs commands asynchronously and reports on them
pub trait CommandDispatcher: Send + Sync {
    /// Submit a job, returning immediately
    fn start(&self, request: JobRequest) -> Result<JobId>;
    /// Current state of a previously started job
    fn status(&self, id: JobId) -> Result<JobState>;
}

/// Poll `dispatcher` until the job finishes
pub async fn wait_for(
    dispatcher: &dyn CommandDispatcher,
    id: JobId,
    interval: std::time::Duration,
) -> Result<JobState> {
    loop {
        let state = dispatcher.status(id)?;
        if state.is_finished() {
            return Ok(state);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Warning codes (`ANSnnnnW`) printed by dsmc in `output`, each once, in order of appearance
pub fn warning_codes(output: &str) -> Result<Vec<String>> {
    let pattern = regex::Regex::new(r"\bANS[0-9]{4}W\b")
        .context("invalid warning code pattern")?;
    let mut codes: Vec<String> = Vec::new();
    for code in pattern.find_iter(output) {
        if !codes.iter().any(|seen| seen == code.as_str()) {
            codes.push(code.as_str().to_string());
        }
    }
    Ok(codes)
}

/// Final state of a finished process: success, or failure made of whitelisted warnings only
pub fn final_state(
    success: bool,
    output: &str,
    whitelisted_warnings: &[String],
) -> Result<JobState> {
    if success {
        return Ok(JobState::Done);
    }
    let codes = warning_codes(output)?;
    if !codes.is_empty()
        && codes
            .iter()
            .all(|code| whitelisted_warnings.iter().any(|allowed| allowed == code))
    {
        info!("only whitelisted warnings found: {:?}", codes);
        return Ok(JobState::Done);
    }
    Ok(JobState::Error)
}

type JobTable = Arc<std::sync::Mutex<HashMap<JobId, JobState>>>;

/// Runs jobs as local `sh -c` processes, at most `cores` cores at a time
#[derive(Debug)]
pub struct LocalDispatcher {
    jobs: JobTable,
    next_id: AtomicU64,
    cores: usize,
    semaphore: Arc<tokio::sync::Semaphore>,
    whitelisted_warnings: Arc<Vec<String>>,
}

impl LocalDispatcher {
    pub fn new(cores: usize, whitelisted_warnings: Vec<String>) -> Self {
        Self {
            jobs: Default::default(),
            next_id: AtomicU64::new(1),
            cores,
            semaphore: Arc::new(tokio::sync::Semaphore::new(cores)),
            whitelisted_warnings: Arc::new(whitelisted_warnings),
        }
    }

    /// State of every job started so far
    pub fn status_all(&self) -> Result<HashMap<JobId, JobState>> {
        Ok(lock(&self.jobs)?.clone())
    }
}

fn lock(jobs: &JobTable) -> Result<std::sync::MutexGuard<'_, HashMap<JobId, JobState>>> {
    jobs.lock()
        .map_err(|_| Error::Io(anyhow!("job table lock poisoned")))
}

fn set_state(jobs: &JobTable, id: JobId, state: JobState) {
    match lock(jobs) {
        Ok(mut table) => {
            table.insert(id, state);
        }
        Err(error) => error!("cannot record state of job {}: {:#}", id, &error),
    }
}

fn open_log(path: &Path) -> anyhow::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open job output {:?}", path))
}

/// Output appended to `paths` since they had the recorded lengths
async fn new_output(paths: &[(PathBuf, u64)]) -> String {
    let mut output = String::new();
    for (path, offset) in paths {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let start = usize::try_from(*offset).unwrap_or(0).min(bytes.len());
                output.push_str(&String::from_utf8_lossy(&bytes[start..]));
            }
            Err(error) => warn!("cannot read job output {:?}: {}", path, error),
        }
    }
    output
}

#[instrument(skip(semaphore, whitelisted_warnings, jobs))]
async fn run_job(
    request: JobRequest,
    permits: u32,
    semaphore: Arc<tokio::sync::Semaphore>,
    whitelisted_warnings: Arc<Vec<String>>,
    jobs: JobTable,
    id: JobId,
) -> anyhow::Result<JobState> {
    let _permit = semaphore
        .acquire_many_owned(permits)
        .await
        .map_err(|_| anyhow!("dispatcher closed"))?;
    set_state(&jobs, id, JobState::Started);
    let mut logs = vec![(request.stdout.clone(), 0)];
    if request.stderr != request.stdout {
        logs.push((request.stderr.clone(), 0));
    }
    for (path, offset) in &mut logs {
        *offset = tokio::fs::metadata(path.as_path()).await.map(|md| md.len()).unwrap_or(0);
    }
    let stdout = open_log(&request.stdout)?;
    let stderr = open_log(&request.stderr)?;
    info!("running job {}: {}", id, &request.command);
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&request.command)
        .current_dir(&request.run_dir)
        .stdin(std::process::Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .await
        .with_context(|| format!("failed to run job {}", id))?;
    if status.success() {
        return Ok(JobState::Done);
    }
    warn!("job {} exited with {}", id, status);
    let output = new_output(&logs).await;
    Ok(final_state(false, &output, &whitelisted_warnings)?)
}

impl CommandDispatcher for LocalDispatcher {
    fn start(&self, request: JobRequest) -> Result<JobId> {
        if request.cores == 0 || request.cores > self.cores {
            return Err(Error::Io(anyhow!(
                "job asks for {} cores, dispatcher has {}",
                request.cores,
                self.cores
            )));
        }
        let permits = u32::try_from(request.cores).context("core count out of range")?;
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.jobs)?.insert(id, JobState::Queued);
        let semaphore = self.semaphore.clone();
        let whitelisted_warnings = self.whitelisted_warnings.clone();
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            let state = match run_job(
                request,
                permits,
                semaphore,
                whitelisted_warnings,
                jobs.clone(),
                id,
            )
            .await
            {
                Ok(state) => state,
                Err(error) => {
                    error!("job {} failed: {:#}", id, &error);
                    JobState::Error
                }
            };
            info!("job {} finished: {}", id, state);
            set_state(&jobs, id, state);
        });
        Ok(id)
    }

    fn status(&self, id: JobId) -> Result<JobState> {
        lock(&self.jobs)?
            .get(&id)
            .copied()
            .ok_or_else(|| Error::UnknownJob(id.to_string()))
    }
}
