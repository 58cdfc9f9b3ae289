use clap::Args;
use harrison_core::{HarrisonConfig, PackageOverrides};
use harrison_package::{Pipeline, ShellBuild};
use harrison_remote::HostExecutor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

#[derive(Args)]
pub struct PackageArgs {
    /// Build host (overrides [package].host)
    #[arg(long)]
    pub host: Option<String>,
    /// Commit to package; accepts anything `git rev-parse` understands
    #[arg(long)]
    pub commit: Option<String>,
    /// Remove the remote package directory and cached checkout when finished
    #[arg(long)]
    pub purge: bool,
    /// Local folder to save the package to
    #[arg(long)]
    pub pkg_dir: Option<String>,
    /// Remote working folder
    #[arg(long)]
    pub remote_dir: Option<String>,
    /// Pattern excluded from the archive; repeat for more (replaces [package].exclude)
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,
    /// Print the outcome as JSON instead of the artifact path
    #[arg(long)]
    pub json: bool,
}

/// Run the packaging pipeline for the project in the current directory.
pub async fn package(args: PackageArgs) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");

    let mut config = HarrisonConfig::load(&project_dir)?;
    if config.project.git_src.is_none() {
        config.project.git_src = local_origin_url(&project_dir).await;
    }

    let overrides = PackageOverrides {
        host: args.host,
        commit: args.commit,
        purge: args.purge,
        pkg_dir: args.pkg_dir,
        remote_dir: args.remote_dir,
        exclude: args.exclude,
    };
    let pipeline_config = config.resolve(&overrides)?;

    let executor = HostExecutor::for_host(&pipeline_config.host, &config.ssh);
    let build = ShellBuild::new(config.package.build.clone());

    let outcome = Pipeline::new(pipeline_config, executor)
        .with_local_repo(&project_dir)
        .run(&build)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.local_path.display());
    }

    Ok(())
}

/// `remote.origin.url` of the local checkout, if there is one.
async fn local_origin_url(project_dir: &Path) -> Option<String> {
    let output = tokio::process::Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let url = String::from_utf8_lossy(&out.stdout).trim().to_owned();
            (!url.is_empty()).then_some(url)
        }
        Ok(out) => {
            tracing::debug!(status = %out.status, "no origin remote configured");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "could not run git to find the origin remote");
            None
        }
    }
}
