use crate::error::RemoteError;
use crate::shell;
use crate::ssh::{SshTarget, is_local_host};
use harrison_core::SshConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Captured result of one command on the build host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            // no code when the process was killed by a signal
            exit_code: match output.status.code() {
                Some(code) => code,
                None => -1,
            },
        }
    }
}

/// Abstraction over the build host for testability.
///
/// Production code uses [`HostExecutor`], tests use mockall-generated mocks.
/// A command that runs and exits non-zero is *not* an `Err`; callers inspect
/// [`CommandOutput::exit_code`]. `Err` is reserved for transport failures.
#[allow(async_fn_in_trait)]
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command line on the host and capture its output.
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Create `path` and its parents on the host if missing.
    async fn ensure_dir(&self, path: &str) -> Result<(), RemoteError>;

    /// Copy the absolute `remote_path` from the host to `local_path`.
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError>;
}

// ── ssh ──

/// Runs commands through the `ssh` binary and downloads with `scp`.
pub struct SshExecutor {
    target: SshTarget,
}

impl SshExecutor {
    pub fn new(target: SshTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }
}

impl RemoteExecutor for SshExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        tracing::debug!(host = %self.target.host, %command, "ssh exec");

        let output = tokio::process::Command::new("ssh")
            .args(self.target.ssh_args(command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RemoteError::Spawn {
                program: "ssh",
                source: e,
            })?;

        Ok(CommandOutput::from_output(output))
    }

    async fn ensure_dir(&self, path: &str) -> Result<(), RemoteError> {
        let output = self
            .exec(&format!("mkdir -p {}", shell::quote_path(path)))
            .await?;

        if output.success() {
            Ok(())
        } else {
            Err(RemoteError::EnsureDir {
                path: path.to_owned(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError> {
        let local = local_path.to_string_lossy();
        tracing::debug!(host = %self.target.host, %remote_path, local = %local, "scp download");

        let output = tokio::process::Command::new("scp")
            .args(self.target.scp_args(remote_path, &local))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RemoteError::Spawn {
                program: "scp",
                source: e,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(RemoteError::Download {
                remote_path: remote_path.to_owned(),
                local_path: local_path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

// ── localhost ──

/// Treats this machine as the build host: commands run under `sh -c` and
/// downloads are plain file copies.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl RemoteExecutor for LocalExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        tracing::debug!(%command, "local exec");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RemoteError::Spawn {
                program: "sh",
                source: e,
            })?;

        Ok(CommandOutput::from_output(output))
    }

    async fn ensure_dir(&self, path: &str) -> Result<(), RemoteError> {
        let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
        tokio::fs::create_dir_all(&expanded)
            .await
            .map_err(|e| RemoteError::LocalIo {
                path: expanded,
                source: e,
            })
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError> {
        tracing::debug!(%remote_path, local = %local_path.display(), "local copy");

        tokio::fs::copy(remote_path, local_path)
            .await
            .map(|_| ())
            .map_err(|e| RemoteError::Download {
                remote_path: remote_path.to_owned(),
                local_path: local_path.to_path_buf(),
                stderr: e.to_string(),
            })
    }
}

// ── dispatch ──

/// Executor picked from the configured host name.
pub enum HostExecutor {
    Ssh(SshExecutor),
    Local(LocalExecutor),
}

impl HostExecutor {
    /// `localhost`-style hosts run locally, everything else goes over ssh.
    pub fn for_host(host: &str, config: &SshConfig) -> Self {
        if is_local_host(host) {
            tracing::info!(%host, "host is local, running commands without ssh");
            Self::Local(LocalExecutor)
        } else {
            Self::Ssh(SshExecutor::new(SshTarget::new(host, config)))
        }
    }
}

impl RemoteExecutor for HostExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        match self {
            Self::Ssh(e) => e.exec(command).await,
            Self::Local(e) => e.exec(command).await,
        }
    }

    async fn ensure_dir(&self, path: &str) -> Result<(), RemoteError> {
        match self {
            Self::Ssh(e) => e.ensure_dir(path).await,
            Self::Local(e) => e.ensure_dir(path).await,
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), RemoteError> {
        match self {
            Self::Ssh(e) => e.download(remote_path, local_path).await,
            Self::Local(e) => e.download(remote_path, local_path).await,
        }
    }
}
