//! Configuration types for the archive service and its runtime

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

/// Runtime configuration for tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

fn default_dsmc_binary() -> String {
    "dsmc".to_string()
}

fn default_cores() -> usize {
    1
}

/// Service configuration, usually read from a TOML file
///
/// # File Format
/// ```toml
/// monitored_directory = "/data/runfolders"
/// path_to_archive_root = "/data/archives"
/// log_directory = "/var/log/archive-upload"
/// exclude_from_tarball = ["Config", "SampleSheet.csv"]
/// whitelisted_warnings = ["ANS1809W", "ANS2000W"]
///
/// [dsmc_extra_args]
/// servername = "pdc"
/// quiet = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Root directory holding the source runfolders
    pub monitored_directory: std::path::PathBuf,
    /// Root directory where archive trees are constructed
    pub path_to_archive_root: std::path::PathBuf,
    /// Root directory for job output and dsmc logs
    pub log_directory: std::path::PathBuf,
    /// Names kept uncompressed next to the container
    #[serde(default)]
    pub exclude_from_tarball: Vec<String>,
    /// Default directory names pruned when building an archive tree
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    /// Default file extensions pruned when building an archive tree
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    /// Default subdirectories that must exist in a runfolder before it is archived
    #[serde(default)]
    pub required_dirs: Vec<String>,
    /// Extra dsmc arguments; `true` renders a bare flag, `false` omits the key
    #[serde(default)]
    pub dsmc_extra_args: std::collections::BTreeMap<String, DsmcArgValue>,
    /// dsmc warning codes that do not turn a finished job into an error
    #[serde(default)]
    pub whitelisted_warnings: Vec<String>,
    /// Program invoked for every dsmc command
    #[serde(default = "default_dsmc_binary")]
    pub dsmc_binary: String,
    /// Number of cores the local dispatcher may hand out concurrently
    #[serde(default = "default_cores")]
    pub cores: usize,
    /// Program whose `pack` subcommand builds containers; unset means the running executable
    #[serde(default)]
    pub packer_binary: Option<String>,
}

/// Value of a single dsmc argument as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DsmcArgValue {
    Flag(bool),
    Value(String),
}

impl ServiceConfig {
    /// Configuration with the given roots and every optional key at its default
    pub fn new(
        monitored_directory: impl Into<std::path::PathBuf>,
        path_to_archive_root: impl Into<std::path::PathBuf>,
        log_directory: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            monitored_directory: monitored_directory.into(),
            path_to_archive_root: path_to_archive_root.into(),
            log_directory: log_directory.into(),
            exclude_from_tarball: Vec::new(),
            exclude_dirs: Vec::new(),
            exclude_extensions: Vec::new(),
            required_dirs: Vec::new(),
            dsmc_extra_args: Default::default(),
            whitelisted_warnings: Vec::new(),
            dsmc_binary: default_dsmc_binary(),
            cores: default_cores(),
            packer_binary: None,
        }
    }

    /// Parse configuration from TOML text
    pub fn parse_content(content: &str) -> Result<Self, anyhow::Error> {
        let config: Self = toml::from_str(content).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {:?}", path))?;
        Self::parse_content(&content).with_context(|| format!("in config file {:?}", path))
    }

    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (key, path) in [
            ("monitored_directory", &self.monitored_directory),
            ("path_to_archive_root", &self.path_to_archive_root),
            ("log_directory", &self.log_directory),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("{} must not be empty", key));
            }
        }
        if self.cores == 0 {
            return Err(anyhow!("cores must be at least 1"));
        }
        if self.dsmc_binary.trim().is_empty() {
            return Err(anyhow!("dsmc_binary must not be empty"));
        }
        if self
            .packer_binary
            .as_ref()
            .is_some_and(|packer| packer.trim().is_empty())
        {
            return Err(anyhow!("packer_binary must not be empty"));
        }
        Ok(())
    }

    /// dsmc extra arguments as the `(key, value)` pairs the command builders take
    pub fn dsmc_args(&self) -> Vec<(String, Option<String>)> {
        self.dsmc_extra_args
            .iter()
            .filter_map(|(key, value)| match value {
                DsmcArgValue::Flag(true) => Some((key.clone(), None)),
                DsmcArgValue::Flag(false) => None,
                DsmcArgValue::Value(value) => Some((key.clone(), Some(value.clone()))),
            })
            .collect()
    }
}
