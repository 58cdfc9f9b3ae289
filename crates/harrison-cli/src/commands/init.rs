use harrison_core::HarrisonConfig;
use std::path::PathBuf;

/// Write a starter harrison.toml into the current directory.
pub async fn init(name: Option<String>, host: Option<String>) -> anyhow::Result<()> {
    let project_dir = PathBuf::from(".");

    let name = match name {
        Some(n) => n,
        None => std::env::current_dir()?
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("cannot infer a project name; pass --name"))?,
    };

    let path = HarrisonConfig::write_starter(&project_dir, &name, host.as_deref())?;

    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!();
    println!("  1. Set [package].host and, if this is not a git checkout");
    println!("     with an origin remote, [project].git_src");
    println!();
    println!("  2. Package the current HEAD:");
    println!("     harrison package");

    Ok(())
}
