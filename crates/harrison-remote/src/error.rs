use std::path::PathBuf;

/// Failures of the transport itself, as opposed to a command that ran and
/// exited non-zero (that is reported through [`crate::CommandOutput`]).
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("failed to launch {program}; is it installed and on PATH?")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("could not create remote directory {path} (exit {exit_code})\n{stderr}")]
    EnsureDir {
        path: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to download {remote_path} to {local_path}\n{stderr}")]
    Download {
        remote_path: String,
        local_path: PathBuf,
        stderr: String,
    },

    #[error("local file operation failed on {path}")]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },
}
