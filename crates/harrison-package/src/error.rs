use harrison_remote::RemoteError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("could not resolve commit '{commit_ref}' on {host}: {detail}")]
    CommitResolution {
        commit_ref: String,
        host: String,
        detail: String,
    },

    #[error("command failed on {host} (exit {exit_status}): {command}\n{output}")]
    RemoteCommand {
        host: String,
        command: String,
        exit_status: i32,
        output: String,
    },

    #[error("could not reach {host}")]
    Transport { host: String, source: RemoteError },

    #[error("failed to download {remote_path} to {local_path}")]
    Transfer {
        remote_path: String,
        local_path: PathBuf,
        source: RemoteError,
    },

    #[error("local filesystem error at {path}")]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    /// The remote command that failed, if this error came from one.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::RemoteCommand { command, .. } => Some(command.as_str()),
            _ => None,
        }
    }
}
