mod init;
mod package;

pub use init::init;
pub use package::{PackageArgs, package};
