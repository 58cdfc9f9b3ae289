//! Remote build-and-package pipeline for harrison.
//!
//! # Pipeline
//!
//! ```text
//! harrison package
//!   1. Resolve     ── git rev-parse origin/<commit> || <commit>   (cached/, after a fetch)
//!                     or git rev-parse <commit> in the local checkout
//!   2. Local dir   ── mkdir -p <pkg_dir>
//!   3. Cache       ── git fetch origin --prune  |  git clone <git_src> cached
//!   4. Checkout    ── git checkout --detach <sha>, reset --hard, clean -f -d -x
//!   5. Build dir   ── rm -rf <sha> && cp -a cached <sha>
//!   6. Build step  ── BuildStep::build() inside <sha>/
//!   7. Archive     ── tar --exclude ... -czf ../<stamp>-<sha>.tar.gz .
//!   8. Download    ── readlink -m, then scp to <pkg_dir>/
//!   9. Purge       ── rm -rf package   (only with purge = true)
//! ```
//!
//! # Remote layout
//!
//! ```text
//! <remote_dir>/<project>/package/
//!   cached/                        persistent working copy on a detached HEAD
//!   <sha>/                         rebuilt from cached/ on every run
//!   <stamp>-<sha>.tar.gz           archive, picked up by the download step
//! ```
//!
//! Runs against the same host and project are not coordinated; two
//! concurrent runs can race on `cached/` and `<sha>/`.

pub mod artifact;
pub mod build;
pub mod commit;
pub mod error;
pub mod pipeline;
pub mod workspace;

pub use artifact::Artifact;
pub use build::{BuildContext, BuildStep, NoBuild, ShellBuild};
pub use commit::ResolvedCommit;
pub use error::PipelineError;
pub use pipeline::{PackageOutcome, Pipeline};
pub use workspace::RemoteWorkspace;
