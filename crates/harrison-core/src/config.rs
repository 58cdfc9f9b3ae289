use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name harrison looks for in the project directory.
pub const CONFIG_FILE_NAME: &str = "harrison.toml";

/// harrison.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarrisonConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used as the remote directory name
    pub name: Option<String>,
    /// Repository URL cloned on the build host
    /// (defaults to the local `remote.origin.url`)
    pub git_src: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Build host
    pub host: Option<String>,
    /// Commit to package; anything `git rev-parse` understands
    #[serde(default = "default_commit")]
    pub commit: String,
    /// Remove the remote package directory when finished
    #[serde(default)]
    pub purge: bool,
    /// Local folder to save packages to
    #[serde(default = "default_pkg_dir")]
    pub pkg_dir: String,
    /// Remote working folder
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
    /// tar exclude patterns, applied in order
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Shell commands run inside the commit build directory before archiving
    #[serde(default)]
    pub build: Vec<String>,
    /// Where the commit reference is resolved
    #[serde(default)]
    pub resolve: ResolveFrom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Login user (ssh picks its own default when unset)
    pub user: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Private key passed as `-i`; `~` is expanded locally
    pub identity_file: Option<String>,
    /// Seconds before an unreachable host is reported as a failed command
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

/// Which checkout answers `git rev-parse --short <commit>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveFrom {
    /// The cached checkout on the build host
    #[default]
    Remote,
    /// The local working copy harrison is run from
    Local,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            host: None,
            commit: default_commit(),
            purge: false,
            pkg_dir: default_pkg_dir(),
            remote_dir: default_remote_dir(),
            exclude: Vec::new(),
            build: Vec::new(),
            resolve: ResolveFrom::default(),
        }
    }
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: None,
            port: default_ssh_port(),
            identity_file: None,
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Values given on the command line; each one wins over harrison.toml.
#[derive(Debug, Clone, Default)]
pub struct PackageOverrides {
    pub host: Option<String>,
    pub commit: Option<String>,
    pub purge: bool,
    pub pkg_dir: Option<String>,
    pub remote_dir: Option<String>,
    /// Replaces the configured list when non-empty
    pub exclude: Vec<String>,
}

/// Fully resolved parameters for one packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub host: String,
    pub commit_ref: String,
    pub purge: bool,
    pub local_package_dir: PathBuf,
    /// Remote path; may start with `~`, which the remote shell expands
    pub remote_work_dir: String,
    pub exclude_patterns: Vec<String>,
    pub project_name: String,
    pub repository_url: String,
    pub resolve_from: ResolveFrom,
}

impl HarrisonConfig {
    /// Load from harrison.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Merge command-line overrides and validate the result.
    pub fn resolve(&self, overrides: &PackageOverrides) -> crate::Result<PipelineConfig> {
        let project_name = non_empty(self.project.name.as_deref(), "project.name")?;
        let repository_url = non_empty(self.project.git_src.as_deref(), "project.git_src")?;
        let host = non_empty(
            overrides.host.as_deref().or(self.package.host.as_deref()),
            "package.host",
        )?;

        let commit_ref = overridden(overrides.commit.as_deref(), &self.package.commit).trim();
        if commit_ref.is_empty() {
            return Err(crate::Error::InvalidSetting {
                key: "package.commit",
                reason: "commit reference must not be empty",
            });
        }
        if project_name.contains('/') {
            return Err(crate::Error::InvalidSetting {
                key: "project.name",
                reason: "project name is used as a directory name and must not contain '/'",
            });
        }

        let pkg_dir = overridden(overrides.pkg_dir.as_deref(), &self.package.pkg_dir);
        let remote_dir =
            overridden(overrides.remote_dir.as_deref(), &self.package.remote_dir)
                .trim_end_matches('/');
        if remote_dir.is_empty() {
            return Err(crate::Error::InvalidSetting {
                key: "package.remote_dir",
                reason: "remote working folder must not be empty or '/'",
            });
        }

        let exclude_patterns = if overrides.exclude.is_empty() {
            self.package.exclude.clone()
        } else {
            overrides.exclude.clone()
        };

        Ok(PipelineConfig {
            host,
            commit_ref: commit_ref.to_owned(),
            purge: overrides.purge || self.package.purge,
            local_package_dir: PathBuf::from(shellexpand::tilde(pkg_dir).as_ref()),
            remote_work_dir: remote_dir.to_owned(),
            exclude_patterns,
            project_name,
            repository_url,
            resolve_from: self.package.resolve,
        })
    }

    /// Write a commented starter harrison.toml into `project_dir`.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_starter(
        project_dir: &Path,
        name: &str,
        host: Option<&str>,
    ) -> crate::Result<PathBuf> {
        let path = project_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Err(crate::Error::ConfigExists(path));
        }

        let host_line = match host {
            Some(h) => format!("host = \"{h}\""),
            None => "# host = \"build.example.com\"".to_owned(),
        };
        let content = format!(
            r#"[project]
name = "{name}"
# git_src = "git@github.com:you/{name}.git"

[package]
{host_line}
# commit = "HEAD"
# purge = false
# pkg_dir = "pkg"
# remote_dir = "~/.harrison"
# exclude = [".git"]
# build = []
# resolve = "remote"

[ssh]
# user = "deploy"
# port = 22
# identity_file = "~/.ssh/id_ed25519"
"#
        );

        std::fs::write(&path, content).map_err(|e| crate::Error::ConfigWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

fn non_empty(value: Option<&str>, key: &'static str) -> crate::Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(crate::Error::MissingSetting(key)),
    }
}

/// The CLI value when one was given, otherwise the configured one.
fn overridden<'a>(cli: Option<&'a str>, configured: &'a str) -> &'a str {
    match cli {
        Some(value) => value,
        None => configured,
    }
}

fn default_commit() -> String {
    "HEAD".to_owned()
}

fn default_pkg_dir() -> String {
    "pkg".to_owned()
}

fn default_remote_dir() -> String {
    "~/.harrison".to_owned()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    10
}
