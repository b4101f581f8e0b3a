// version information reported with every service response

use serde::{Deserialize, Serialize};

/// Service version information
///
/// The semantic version identifies the release, while git information provides additional
/// debugging context for whoever reads the response of a long-running archive job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceVersion {
    /// Semantic version from Cargo.toml (e.g., "0.4.0")
    pub semantic: String,

    /// Git describe output (e.g., "v0.3.1-7-g644da27")
    ///
    /// Optional. Absent when the build was done without git available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_describe: Option<String>,

    /// Full git commit hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
}

impl ServiceVersion {
    /// Get the current service version
    ///
    /// Reads version information from environment variables set at compile time by build.rs.
    pub fn current() -> Self {
        Self {
            semantic: env!("CARGO_PKG_VERSION").to_string(),
            git_describe: option_env!("ARCHIVE_UPLOAD_GIT_DESCRIBE").map(String::from),
            git_hash: option_env!("ARCHIVE_UPLOAD_GIT_HASH").map(String::from),
        }
    }

    /// Get a human-readable version string
    ///
    /// # Examples
    ///
    /// ```
    /// use common::version::ServiceVersion;
    ///
    /// let v = ServiceVersion {
    ///     semantic: "0.4.0".to_string(),
    ///     git_describe: Some("v0.3.1-7-g644da27".to_string()),
    ///     git_hash: None,
    /// };
    ///
    /// assert_eq!(v.display(), "0.4.0 (v0.3.1-7-g644da27)");
    /// ```
    pub fn display(&self) -> String {
        if let Some(ref git_describe) = self.git_describe {
            format!("{} ({})", self.semantic, git_describe)
        } else {
            self.semantic.clone()
        }
    }
}

impl std::fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version() {
        let version = ServiceVersion::current();
        assert_eq!(version.semantic, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_display_without_git() {
        let v = ServiceVersion {
            semantic: "0.4.0".to_string(),
            git_describe: None,
            git_hash: None,
        };
        assert_eq!(v.display(), "0.4.0");
        assert_eq!(v.to_string(), "0.4.0");
    }

    #[test]
    fn test_json_skips_missing_git_fields() {
        let v = ServiceVersion {
            semantic: "0.4.0".to_string(),
            git_describe: None,
            git_hash: None,
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"semantic":"0.4.0"}"#);
    }
}
