use crate::commit::ResolvedCommit;
use crate::error::PipelineError;
use crate::workspace::RemoteWorkspace;
use harrison_remote::{CommandOutput, RemoteExecutor};

/// User-supplied build code, run after the commit build dir is materialized
/// and before it is archived.
///
/// The pipeline does not look at what the step does; any error aborts the
/// run before the archive is created.
#[allow(async_fn_in_trait)]
pub trait BuildStep {
    async fn build<E: RemoteExecutor>(&self, ctx: &BuildContext<'_, E>)
    -> Result<(), PipelineError>;
}

/// Handle given to a [`BuildStep`]: commands issued through it run with the
/// commit build dir as working directory.
pub struct BuildContext<'a, E: RemoteExecutor> {
    executor: &'a E,
    host: &'a str,
    workspace: &'a RemoteWorkspace,
    commit: &'a ResolvedCommit,
}

impl<'a, E: RemoteExecutor> BuildContext<'a, E> {
    pub(crate) fn new(
        executor: &'a E,
        host: &'a str,
        workspace: &'a RemoteWorkspace,
        commit: &'a ResolvedCommit,
    ) -> Self {
        Self {
            executor,
            host,
            workspace,
            commit,
        }
    }

    pub fn commit(&self) -> &ResolvedCommit {
        self.commit
    }

    /// Remote path of the directory the build runs in.
    pub fn build_dir(&self) -> String {
        self.workspace.commit_build_dir(self.commit)
    }

    /// Run `command` in the build dir; a non-zero exit is an error.
    pub async fn run(&self, command: &str) -> Result<CommandOutput, PipelineError> {
        let full = self.workspace.in_commit_dir(self.commit, command);
        tracing::debug!(host = %self.host, command = %full, "build step");

        let output = self
            .executor
            .exec(&full)
            .await
            .map_err(|e| PipelineError::Transport {
                host: self.host.to_owned(),
                source: e,
            })?;

        if output.success() {
            Ok(output)
        } else {
            Err(PipelineError::RemoteCommand {
                host: self.host.to_owned(),
                command: full,
                exit_status: output.exit_code,
                output: failure_output(&output),
            })
        }
    }
}

/// Build step that does nothing; the checkout is archived as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuild;

impl BuildStep for NoBuild {
    async fn build<E: RemoteExecutor>(
        &self,
        _ctx: &BuildContext<'_, E>,
    ) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Runs a fixed list of shell commands, in order, stopping at the first
/// failure.
#[derive(Debug, Default, Clone)]
pub struct ShellBuild {
    commands: Vec<String>,
}

impl ShellBuild {
    pub fn new(commands: Vec<String>) -> Self {
        Self { commands }
    }
}

impl BuildStep for ShellBuild {
    async fn build<E: RemoteExecutor>(
        &self,
        ctx: &BuildContext<'_, E>,
    ) -> Result<(), PipelineError> {
        for command in &self.commands {
            tracing::info!(%command, "running build command");
            ctx.run(command).await?;
        }
        Ok(())
    }
}

/// stderr when present, otherwise stdout, for error reports.
pub(crate) fn failure_output(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_owned()
    } else {
        stderr.to_owned()
    }
}
