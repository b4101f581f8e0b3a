//! Parsing of `dsmc q ar` listings
//!
//! The remote archival tier only answers in human oriented text. Every relevant line looks like
//!
//! ```text
//!          4,096  B  2017-10-01 16.47.24    /data/runfolders/foo_archive/Config Never e374bd6b-...
//! ```
//!
//! i.e. `<size> B <timestamp> <path> Never <description>`. Size grouping and timestamp format
//! depend on the locale of the dsmc client, so the parser only relies on the ` B ` and ` Never `
//! markers and on the archive path prefix. Lines not mentioning the prefix (banners, headers,
//! totals) are ignored.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::manifest::Manifest;

const SIZE_MARKER: &str = " B ";
const NEVER_MARKER: &str = " Never ";

/// Opaque label attached to one archival transmission
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ArchiveDescriptor(String);

impl ArchiveDescriptor {
    /// A fresh descriptor for a brand-new upload
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(descriptor: impl Into<String>) -> Self {
        Self(descriptor.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArchiveDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Manifest recovered from a listing plus the paths that were listed more than once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteListing {
    pub manifest: Manifest,
    pub duplicates: Vec<PathBuf>,
}

/// Trimmed lines of `output` containing `prefix`, in their original order
fn matching_lines<'a>(output: &'a str, prefix: &'a str) -> impl DoubleEndedIterator<Item = &'a str> + 'a {
    output
        .lines()
        .filter(move |line| line.contains(prefix))
        .map(str::trim)
}

/// Parse a size token, dropping thousands separators (`,`, space and no-break spaces)
pub fn parse_size(token: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    let digits: String = token
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    digits.parse()
}

fn malformed(line: &str, reason: impl Into<String>) -> Error {
    Error::MalformedListing {
        line: line.to_string(),
        reason: reason.into(),
    }
}

/// Extract path and size from a single (already trimmed) listing line
pub fn parse_line(line: &str, prefix: &str, name_pattern: &regex::Regex) -> Result<(PathBuf, u64)> {
    let (size_token, _) = line
        .split_once(SIZE_MARKER)
        .ok_or_else(|| malformed(line, format!("missing {:?} size marker", SIZE_MARKER.trim())))?;
    let size = parse_size(size_token)
        .map_err(|error| malformed(line, format!("size {:?}: {}", size_token, error)))?;
    let captures = name_pattern
        .captures(line)
        .ok_or_else(|| malformed(line, format!("missing {:?} marker", NEVER_MARKER.trim())))?;
    let name = format!("{}{}", prefix, &captures[1]);
    Ok((PathBuf::from(name.trim()), size))
}

fn name_pattern(prefix: &str) -> Result<regex::Regex> {
    let pattern = format!("{}(.*){}", regex::escape(prefix), NEVER_MARKER);
    regex::Regex::new(&pattern).map_err(|error| Error::Io(error.into()))
}

/// Descriptor of the most recent upload of `prefix`: the last token of the last matching line
pub fn latest_descriptor(output: &str, prefix: &str) -> Result<ArchiveDescriptor> {
    let last = matching_lines(output, prefix).next_back().ok_or_else(|| {
        Error::EmptyResult(format!(
            "no archive description found for {} in dsmc output",
            prefix
        ))
    })?;
    let token = last
        .split_whitespace()
        .next_back()
        .ok_or_else(|| malformed(last, "no description token"))?;
    debug!("latest archive description for {}: {}", prefix, token);
    Ok(ArchiveDescriptor::new(token))
}

/// Build the manifest of everything listed under `prefix`.
///
/// When a path shows up more than once the last line wins; the repeated paths are logged and
/// returned next to the manifest.
pub fn parse_listing(output: &str, prefix: &str) -> Result<RemoteListing> {
    let pattern = name_pattern(prefix)?;
    let mut listing = RemoteListing::default();
    let mut seen_any = false;
    for line in matching_lines(output, prefix) {
        seen_any = true;
        let (path, size) = parse_line(line, prefix, &pattern)?;
        if let Some(previous) = listing.manifest.insert(path.clone(), size) {
            warn!(
                "{:?} listed more than once (sizes {} and {}), keeping the last one",
                &path,
                previous,
                size
            );
            listing.duplicates.push(path);
        }
    }
    if !seen_any {
        return Err(Error::EmptyResult(format!(
            "no files found for {} in dsmc output",
            prefix
        )));
    }
    debug!(
        "remote files for {}: {} ({} duplicates)",
        prefix,
        listing.manifest.len(),
        listing.duplicates.len()
    );
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tracing_test::traced_test;

    const ARCHIVE: &str = "/data/mm-xart002/runfolders/johanhe_test_0809_001-AG2UJ_archive";

    #[test]
    fn size_tokens() {
        let cases = [
            ("4,096", 4096),
            ("4 096", 4096),
            ("4\u{a0}096", 4096),
            ("1\u{202f}048\u{202f}576", 1_048_576),
            ("1,048,576,000", 1_048_576_000),
            ("  682 ", 682),
            ("0", 0),
        ];
        for (token, expected) in cases {
            assert_eq!(parse_size(token).unwrap(), expected, "token {:?}", token);
        }
        assert!(parse_size("4.096").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn parse_single_lines() {
        let prefix = "/data/mm-xart002/runfolders/johanhe_test_0809_001-AG2UJ_archive/";
        let pattern = name_pattern(prefix).unwrap();
        let cases = [
            (
                "4,096  B  2017-07-27 17.48.34    /data/mm-xart002/runfolders/johanhe_test_0809_001-AG2UJ_archive/Config Never e374bd6b-ab36-4f41-94d3-f4eaea9f30d4",
                "Config",
                4096,
            ),
            (
                "4 096  B  27/07/2017 17:48:34    /data/mm-xart002/runfolders/johanhe_test_0809_001-AG2UJ_archive/Data Never e374bd6b-ab36-4f41-94d3-f4eaea9f30d4",
                "Data",
                4096,
            ),
            (
                "16  B  07/27/2017 05:48:34 PM    /data/mm-xart002/runfolders/johanhe_test_0809_001-AG2UJ_archive/file with spaces.txt Never e374bd6b",
                "file with spaces.txt",
                16,
            ),
        ];
        for (line, name, size) in cases {
            let (path, parsed) = parse_line(line, prefix, &pattern).unwrap();
            assert_eq!(path, Path::new(prefix).join(name), "line {:?}", line);
            assert_eq!(parsed, size, "line {:?}", line);
        }
    }

    #[test]
    fn malformed_lines_are_errors() {
        let prefix = "/archive/";
        let pattern = name_pattern(prefix).unwrap();
        for line in [
            "4,096  2017-07-27 17.48.34    /archive/Config Never abc",
            "four  B  2017-07-27 17.48.34    /archive/Config Never abc",
            "4,096  B  2017-07-27 17.48.34    /archive/Config",
        ] {
            match parse_line(line, prefix, &pattern) {
                Err(Error::MalformedListing { line: reported, .. }) => assert_eq!(reported, line),
                other => panic!("expected MalformedListing for {:?}, got {:?}", line, other),
            }
        }
    }

    #[test]
    fn latest_descriptor_is_last_matching_line() {
        let output = include_str!("../testdata/dsmc_descr.txt");
        let descriptor = latest_descriptor(output, ARCHIVE).unwrap();
        assert_eq!(descriptor.as_str(), "e374bd6b-ab36-4f41-94d3-f4eaea9f30d4");
    }

    #[test]
    fn latest_descriptor_without_matches() {
        let output = include_str!("../testdata/dsmc_descr.txt");
        assert!(matches!(
            latest_descriptor(output, "/data/other_archive"),
            Err(Error::EmptyResult(_))
        ));
    }

    #[test]
    #[traced_test]
    fn parse_captured_listing() {
        let output = include_str!("../testdata/dsmc_pdc_filelist.txt");
        let listing = parse_listing(output, &format!("{}/", ARCHIVE)).unwrap();
        let expected: Manifest = include_str!("../testdata/dsmc_pdc_converted_filelist.txt")
            .lines()
            .map(|line| {
                let (size, path) = line.split_once(' ').unwrap();
                (PathBuf::from(path), size.parse::<u64>().unwrap())
            })
            .collect();
        assert_eq!(listing.manifest, expected);
        assert_eq!(
            listing.duplicates,
            vec![PathBuf::from(format!("{}/RunInfo.xml", ARCHIVE))]
        );
        assert!(logs_contain("listed more than once"));
    }

    #[test]
    fn listing_without_prefix_lines_is_empty_result() {
        let output = "IBM Tivoli Storage Manager\nANS1092W No files matching search criteria were found\n";
        assert!(matches!(
            parse_listing(output, "/data/archive/"),
            Err(Error::EmptyResult(_))
        ));
    }

    #[test]
    fn prefix_with_regex_metacharacters() {
        let prefix = "/data/run+folder (1)/";
        let output = "  12  B  2017-07-27 17.48.34    /data/run+folder (1)/a.txt Never abc\n";
        let listing = parse_listing(output, prefix).unwrap();
        assert_eq!(
            listing.manifest.get(Path::new("/data/run+folder (1)/a.txt")),
            Some(12)
        );
    }

    #[test]
    fn generated_descriptors_are_unique() {
        let a = ArchiveDescriptor::generate();
        let b = ArchiveDescriptor::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
