use harrison_remote::shell;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;

/// Abbreviated SHA of the commit being packaged.
///
/// Resolved once per run; every path and the artifact name derive from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCommit {
    short_sha: String,
}

impl ResolvedCommit {
    pub fn new(short_sha: &str) -> Self {
        Self {
            short_sha: short_sha.to_owned(),
        }
    }

    /// Validate `git rev-parse --short` output.
    ///
    /// Returns `None` unless the trimmed output is a single hex SHA of at
    /// least four characters.
    pub fn parse(output: &str) -> Option<Self> {
        let sha = output.trim();
        let valid =
            (4..=40).contains(&sha.len()) && sha.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Self::new(&sha.to_ascii_lowercase()))
    }

    pub fn short_sha(&self) -> &str {
        &self.short_sha
    }
}

impl std::fmt::Display for ResolvedCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_sha)
    }
}

/// Remote command resolving `commit_ref` inside the cached checkout.
///
/// Fetches first, then tries the remote-tracking `origin/<ref>` before the
/// ref as given. Branch names (and `HEAD`) therefore follow upstream instead
/// of whatever the cache last checked out, while tags and SHAs fall through
/// to the plain lookup. Fails (non-zero) when `cached_dir` does not exist yet.
pub fn remote_resolve_command(cached_dir: &str, commit_ref: &str) -> String {
    let upstream = shell::quote_literal(&format!("origin/{commit_ref}^{{commit}}"));
    let as_given = shell::quote_literal(&format!("{commit_ref}^{{commit}}"));
    format!(
        "cd {} && git fetch origin --prune --quiet && \
         {{ git rev-parse --verify --quiet --short {upstream} || \
         git rev-parse --verify --short {as_given} ; }}",
        shell::quote_path(cached_dir),
    )
}

/// Exits zero when the cached checkout exists on the host.
pub(crate) fn cache_check_command(cached_dir: &str) -> String {
    format!("test -d {}", shell::quote_path(cached_dir))
}

/// Outcome of resolving against a local working copy.
pub(crate) enum LocalResolution {
    Resolved(ResolvedCommit),
    Failed(String),
}

/// Run `git rev-parse --short <commit_ref>` in `repo_dir` on this machine.
pub(crate) async fn resolve_local(
    repo_dir: &Path,
    commit_ref: &str,
) -> Result<LocalResolution, std::io::Error> {
    tracing::debug!(repo = %repo_dir.display(), %commit_ref, "resolving commit locally");

    let output = tokio::process::Command::new("git")
        .args(["rev-parse", "--short", commit_ref])
        .current_dir(repo_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Ok(LocalResolution::Failed(format!(
            "git rev-parse exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(match ResolvedCommit::parse(&stdout) {
        Some(commit) => LocalResolution::Resolved(commit),
        None => LocalResolution::Failed(format!(
            "unexpected rev-parse output: {:?}",
            stdout.trim()
        )),
    })
}
