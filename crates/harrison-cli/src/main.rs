mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "harrison",
    about = "Package a git commit into a tarball on a remote build host"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and package a commit on the build host, then download it
    Package(commands::PackageArgs),
    /// Write a starter harrison.toml in the current directory
    Init {
        /// Project name (defaults to the current directory name)
        #[arg(long)]
        name: Option<String>,
        /// Build host
        #[arg(long)]
        host: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // arch-lint: allow(no-silent-result-drop) reason="unset or malformed RUST_LOG falls back to the info level"
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Package(args) => commands::package(args).await?,
        Commands::Init { name, host } => commands::init(name, host).await?,
    }

    Ok(())
}
