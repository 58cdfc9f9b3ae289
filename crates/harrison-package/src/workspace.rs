use crate::commit::ResolvedCommit;
use harrison_remote::shell;

/// Directory holding the persistent working copy, relative to the base dir.
pub const CACHED_DIR: &str = "cached";

/// Last path component of the base dir; purge removes it from its parent.
pub const PACKAGE_DIR: &str = "package";

/// Directory layout of one project on the build host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWorkspace {
    base_dir: String,
}

impl RemoteWorkspace {
    pub fn new(remote_work_dir: &str, project_name: &str) -> Self {
        Self {
            base_dir: format!(
                "{}/{project_name}/{PACKAGE_DIR}",
                remote_work_dir.trim_end_matches('/')
            ),
        }
    }

    /// `<remote_work_dir>/<project>/package`
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn cached_checkout_dir(&self) -> String {
        format!("{}/{CACHED_DIR}", self.base_dir)
    }

    pub fn commit_build_dir(&self, commit: &ResolvedCommit) -> String {
        format!("{}/{}", self.base_dir, commit.short_sha())
    }

    /// Prefix `command` so it runs from the base dir.
    pub fn in_base(&self, command: &str) -> String {
        format!("cd {} && {command}", shell::quote_path(&self.base_dir))
    }

    /// Prefix `command` so it runs from the commit build dir.
    pub fn in_commit_dir(&self, commit: &ResolvedCommit, command: &str) -> String {
        format!(
            "cd {} && {command}",
            shell::quote_path(&self.commit_build_dir(commit))
        )
    }
}
