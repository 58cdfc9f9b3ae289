pub mod error;
pub mod executor;
pub mod shell;
pub mod ssh;

pub use error::RemoteError;
pub use executor::{CommandOutput, HostExecutor, LocalExecutor, RemoteExecutor, SshExecutor};
pub use ssh::{SshTarget, is_local_host};
