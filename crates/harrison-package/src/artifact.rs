use crate::commit::ResolvedCommit;
use chrono::{DateTime, Utc};
use harrison_remote::shell;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Archive extension appended to every artifact name.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Name of the packaged archive: `<YYYYMMDDHHMMSS>-<sha>`.
///
/// Built once per run so the archive step and the download step agree on
/// the file name even when the clock ticks over in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    name: String,
}

impl Artifact {
    pub fn new(started_at: DateTime<Utc>, commit: &ResolvedCommit) -> Self {
        Self {
            name: format!("{}-{}", started_at.format("%Y%m%d%H%M%S"), commit.short_sha()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<name>.tar.gz`
    pub fn file_name(&self) -> String {
        format!("{}.{ARCHIVE_EXTENSION}", self.name)
    }

    /// Destination of the downloaded archive.
    pub fn local_path(&self, local_package_dir: &Path) -> PathBuf {
        local_package_dir.join(self.file_name())
    }

    /// Command run from the base dir: drop a stale archive of the same
    /// name, then tar the commit build dir into `../<name>.tar.gz`.
    pub fn archive_command(&self, commit: &ResolvedCommit, exclude_patterns: &[String]) -> String {
        let file_name = self.file_name();
        let excludes = exclude_flags(exclude_patterns);
        let tar = if excludes.is_empty() {
            format!("tar -czf ../{file_name} .")
        } else {
            format!("tar {excludes} -czf ../{file_name} .")
        };
        format!(
            "rm -f {file_name} && cd {} && {tar}",
            commit.short_sha()
        )
    }
}

/// Render one `--exclude '<pattern>'` per pattern, in order, without
/// deduplication. An empty list renders as an empty string.
pub fn exclude_flags(patterns: &[String]) -> String {
    patterns
        .iter()
        .map(|p| format!("--exclude {}", shell::quote_literal(p)))
        .collect::<Vec<_>>()
        .join(" ")
}
