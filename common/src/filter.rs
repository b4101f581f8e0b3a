//! Exclusion patterns for container packing
//!
//! Paths listed in `exclude_from_tarball` stay on disk next to the container instead of being
//! folded into it. A pattern is compared against the basename of every entry and against its
//! path relative to the archive root, the way GNU tar treats `--exclude`. Excluding a directory
//! excludes everything below it.
//!
//! # Pattern Syntax
//!
//! - a plain name (`SampleSheet.csv`) matches that name at any depth
//! - `*`, `?` and `[...]` are glob wildcards that never cross `/`
//! - a pattern containing `/` (`Data/Intensities`) must match the full relative path
//! - a leading `/` anchors the pattern to the archive root
//! - a trailing `/` matches only directories
//!
//! # Examples
//!
//! ```
//! use common::filter::ExclusionSet;
//! use std::path::Path;
//!
//! let exclusions = ExclusionSet::new(["Config", "*.csv"]).unwrap();
//! assert!(exclusions.is_excluded(Path::new("Config"), true));
//! assert!(exclusions.is_excluded(Path::new("Data/SampleSheet.csv"), false));
//! assert!(!exclusions.is_excluded(Path::new("RunInfo.xml"), false));
//! ```

use anyhow::{Context, anyhow};
use std::path::Path;

/// A compiled exclusion pattern with metadata about its original form
#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    /// original pattern string, used in log messages
    pub original: String,
    /// compiled glob matcher
    matcher: globset::GlobMatcher,
    /// pattern ends with / (matches only directories)
    pub dir_only: bool,
    /// pattern starts with / (anchored to root)
    pub anchored: bool,
}

impl ExclusionPattern {
    /// Parse a pattern string into an ExclusionPattern
    pub fn parse(pattern: &str) -> Result<Self, anyhow::Error> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(anyhow!("empty pattern is not allowed"));
        }
        let original = pattern.to_string();
        let dir_only = pattern.ends_with('/');
        let anchored = pattern.starts_with('/');
        // strip leading/trailing markers for glob compilation
        let pattern_str = pattern.trim_start_matches('/').trim_end_matches('/');
        if pattern_str.is_empty() {
            return Err(anyhow!(
                "pattern '{}' results in empty glob after stripping / markers",
                pattern
            ));
        }
        let glob = globset::GlobBuilder::new(pattern_str)
            .literal_separator(true) // * doesn't match /
            .build()
            .with_context(|| format!("invalid exclusion pattern: {}", pattern))?;
        Ok(Self {
            original,
            matcher: glob.compile_matcher(),
            dir_only,
            anchored,
        })
    }

    /// Path patterns (with a `/` other than the markers) require a full relative path match
    fn is_path_pattern(&self) -> bool {
        self.original
            .trim_start_matches('/')
            .trim_end_matches('/')
            .contains('/')
    }

    /// Check if this pattern matches the given path, relative to the archive root
    pub fn matches(&self, relative_path: &Path, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        if self.matcher.is_match(relative_path) {
            return true;
        }
        if self.anchored || self.is_path_pattern() {
            return false;
        }
        relative_path
            .file_name()
            .is_some_and(|name| self.matcher.is_match(Path::new(name)))
    }
}

/// The set of patterns excluded from the container
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    pub patterns: Vec<ExclusionPattern>,
}

impl ExclusionSet {
    /// Compile every pattern, failing on the first invalid one
    pub fn new<I, S>(patterns: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| ExclusionPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the pattern excluding `relative_path`, if any.
    ///
    /// Only the entry itself is checked; callers walking a tree stop descending into excluded
    /// directories, which is what excludes the entries below them. The top-level component is
    /// checked as well so that a lone nested path is still excluded when its first directory is.
    pub fn matching_pattern(&self, relative_path: &Path, is_dir: bool) -> Option<&ExclusionPattern> {
        let top_level = relative_path
            .components()
            .next()
            .map(|c| Path::new(c.as_os_str()));
        self.patterns.iter().find(|pattern| {
            if pattern.matches(relative_path, is_dir) {
                return true;
            }
            match top_level {
                Some(top) if top != relative_path => pattern.matches(top, true),
                _ => false,
            }
        })
    }

    pub fn is_excluded(&self, relative_path: &Path, is_dir: bool) -> bool {
        self.matching_pattern(relative_path, is_dir).is_some()
    }
}
