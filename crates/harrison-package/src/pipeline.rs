use crate::artifact::Artifact;
use crate::build::{BuildContext, BuildStep, failure_output};
use crate::commit::{self, LocalResolution, ResolvedCommit};
use crate::error::PipelineError;
use crate::workspace::{CACHED_DIR, PACKAGE_DIR, RemoteWorkspace};
use chrono::{DateTime, Utc};
use harrison_core::{PipelineConfig, ResolveFrom};
use harrison_remote::{CommandOutput, RemoteError, RemoteExecutor, shell};
use serde::Serialize;
use std::path::PathBuf;

/// Result of a successful packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct PackageOutcome {
    pub project: String,
    pub host: String,
    pub commit: ResolvedCommit,
    pub artifact: Artifact,
    /// Absolute path of the archive on the build host.
    pub remote_path: String,
    /// Where the archive was saved locally.
    pub local_path: PathBuf,
    /// Whether the remote package dir was removed afterwards.
    pub purged: bool,
}

/// Packages one commit on a build host, parameterized over the executor for
/// testability.
pub struct Pipeline<E: RemoteExecutor> {
    executor: E,
    config: PipelineConfig,
    workspace: RemoteWorkspace,
    local_repo: PathBuf,
}

impl<E: RemoteExecutor> Pipeline<E> {
    pub fn new(config: PipelineConfig, executor: E) -> Self {
        let workspace = RemoteWorkspace::new(&config.remote_work_dir, &config.project_name);
        Self {
            executor,
            config,
            workspace,
            local_repo: PathBuf::from("."),
        }
    }

    /// Working copy used when the commit is resolved locally.
    pub fn with_local_repo(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_repo = dir.into();
        self
    }

    /// Run the full pipeline, stamping the artifact with the current UTC time.
    pub async fn run<B: BuildStep>(&self, build: &B) -> Result<PackageOutcome, PipelineError> {
        self.run_at(build, Utc::now()).await
    }

    /// Run the full pipeline with an explicit start time.
    ///
    /// Steps run strictly in order and the first failure aborts the run;
    /// nothing is retried and purge never runs after a failure.
    pub async fn run_at<B: BuildStep>(
        &self,
        build: &B,
        started_at: DateTime<Utc>,
    ) -> Result<PackageOutcome, PipelineError> {
        if self.config.commit_ref.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "commit reference must not be empty",
            ));
        }

        // 1. Resolve commit ref to a short SHA
        let commit = self.resolve_commit().await?;
        let artifact = Artifact::new(started_at, &commit);

        tracing::info!(
            "Packaging {commit} for \"{}\" on {}...",
            self.config.project_name,
            self.config.host
        );

        // 2. Local destination
        self.ensure_local_dir().await?;

        // 3. Fetch or clone the cached checkout
        self.update_cache().await?;

        // 4. Check out the target commit
        self.checkout(&commit).await?;

        // 5. Fresh build dir for this commit
        self.materialize(&commit).await?;

        // 6. User supplied build
        let ctx = BuildContext::new(
            &self.executor,
            &self.config.host,
            &self.workspace,
            &commit,
        );
        build.build(&ctx).await?;

        // 7. Archive
        tracing::info!(artifact = %artifact.file_name(), "creating archive");
        self.exec_in_base(&artifact.archive_command(&commit, &self.config.exclude_patterns))
            .await?;

        // 8. Download (remote path expanded since scp does not expand ~)
        let (remote_path, local_path) = self.download(&artifact).await?;

        // 9. Purge
        if self.config.purge {
            tracing::info!(dir = %self.workspace.base_dir(), "purging remote package directory");
            self.exec_in_base(&format!("cd .. && rm -rf {PACKAGE_DIR}"))
                .await?;
        }

        tracing::info!(
            "Successfully packaged {commit} to {}",
            local_path.display()
        );

        Ok(PackageOutcome {
            project: self.config.project_name.clone(),
            host: self.config.host.clone(),
            commit,
            artifact,
            remote_path,
            local_path,
            purged: self.config.purge,
        })
    }

    // ── Steps ──

    async fn resolve_commit(&self) -> Result<ResolvedCommit, PipelineError> {
        let commit_ref = &self.config.commit_ref;

        match self.config.resolve_from {
            ResolveFrom::Remote => {
                let command = commit::remote_resolve_command(
                    &self.workspace.cached_checkout_dir(),
                    commit_ref,
                );
                tracing::debug!(host = %self.config.host, %command, "resolving commit");

                let output = self.exec_raw(&command).await?;
                if !output.success() {
                    let mut detail = format!(
                        "`{command}` exited with {}: {}",
                        output.exit_code,
                        failure_output(&output)
                    );
                    if !self.cache_exists().await? {
                        detail.push_str(&format!(
                            "\nhint: {} has not been cloned yet; package once with \
                             `resolve = \"local\"` under [package] to create it",
                            self.workspace.cached_checkout_dir()
                        ));
                    }
                    return Err(self.resolution_error(&self.config.host, detail));
                }
                ResolvedCommit::parse(&output.stdout).ok_or_else(|| {
                    self.resolution_error(
                        &self.config.host,
                        format!("unexpected rev-parse output: {:?}", output.trimmed()),
                    )
                })
            }
            ResolveFrom::Local => {
                let resolution = commit::resolve_local(&self.local_repo, commit_ref)
                    .await
                    .map_err(|e| PipelineError::LocalIo {
                        path: self.local_repo.clone(),
                        source: e,
                    })?;
                match resolution {
                    LocalResolution::Resolved(commit) => Ok(commit),
                    LocalResolution::Failed(detail) => Err(self.resolution_error(
                        &self.local_repo.display().to_string(),
                        detail,
                    )),
                }
            }
        }
    }

    async fn ensure_local_dir(&self) -> Result<(), PipelineError> {
        let dir = &self.config.local_package_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| PipelineError::LocalIo {
                path: dir.clone(),
                source: e,
            })
    }

    async fn update_cache(&self) -> Result<(), PipelineError> {
        self.executor
            .ensure_dir(self.workspace.base_dir())
            .await
            .map_err(|e| match e {
                RemoteError::EnsureDir {
                    path,
                    exit_code,
                    stderr,
                } => PipelineError::RemoteCommand {
                    host: self.config.host.clone(),
                    command: format!("mkdir -p {}", shell::quote_path(&path)),
                    exit_status: exit_code,
                    output: stderr.trim().to_owned(),
                },
                other => self.transport(other),
            })?;

        tracing::info!(repo = %self.config.repository_url, "updating cached checkout");
        self.exec_in_base(&format!(
            "if [ -d {CACHED_DIR} ] ; then cd {CACHED_DIR} && git fetch origin --prune ; \
             else git clone {} {CACHED_DIR} ; fi",
            shell::quote_arg(&self.config.repository_url)
        ))
        .await?;
        Ok(())
    }

    async fn checkout(&self, commit: &ResolvedCommit) -> Result<(), PipelineError> {
        self.exec_in_base(&format!(
            "cd {CACHED_DIR} && git checkout --quiet --force --detach {commit} && \
             git reset --hard {commit} && git clean -f -d -x"
        ))
        .await?;
        Ok(())
    }

    async fn materialize(&self, commit: &ResolvedCommit) -> Result<(), PipelineError> {
        self.exec_in_base(&format!(
            "rm -rf {commit} && cp -a {CACHED_DIR} {commit}"
        ))
        .await?;
        Ok(())
    }

    async fn download(&self, artifact: &Artifact) -> Result<(String, PathBuf), PipelineError> {
        let output = self
            .exec_in_base(&format!("readlink -m {}", artifact.file_name()))
            .await?;
        let remote_path = output.trimmed().to_owned();
        let local_path = artifact.local_path(&self.config.local_package_dir);

        tracing::info!(%remote_path, local = %local_path.display(), "downloading archive");
        self.executor
            .download(&remote_path, &local_path)
            .await
            .map_err(|e| PipelineError::Transfer {
                remote_path: remote_path.clone(),
                local_path: local_path.clone(),
                source: e,
            })?;

        Ok((remote_path, local_path))
    }

    // ── Helpers ──

    /// Run `command` from the base dir; a non-zero exit is an error.
    async fn exec_in_base(&self, command: &str) -> Result<CommandOutput, PipelineError> {
        let full = self.workspace.in_base(command);
        tracing::debug!(host = %self.config.host, command = %full, "remote exec");

        let output = self.exec_raw(&full).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(PipelineError::RemoteCommand {
                host: self.config.host.clone(),
                command: full,
                exit_status: output.exit_code,
                output: failure_output(&output),
            })
        }
    }

    async fn cache_exists(&self) -> Result<bool, PipelineError> {
        let check = commit::cache_check_command(&self.workspace.cached_checkout_dir());
        Ok(self.exec_raw(&check).await?.success())
    }

    async fn exec_raw(&self, command: &str) -> Result<CommandOutput, PipelineError> {
        self.executor
            .exec(command)
            .await
            .map_err(|e| self.transport(e))
    }

    fn transport(&self, source: RemoteError) -> PipelineError {
        PipelineError::Transport {
            host: self.config.host.clone(),
            source,
        }
    }

    fn resolution_error(&self, location: &str, detail: String) -> PipelineError {
        PipelineError::CommitResolution {
            commit_ref: self.config.commit_ref.clone(),
            host: location.to_owned(),
            detail,
        }
    }
}
