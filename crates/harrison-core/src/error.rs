use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write config to {path}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} already exists; edit it directly or delete it to start over")]
    ConfigExists(PathBuf),

    // ── Resolution ──
    #[error("`{0}` is not set; add it to harrison.toml or pass it on the command line")]
    MissingSetting(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    InvalidSetting {
        key: &'static str,
        reason: &'static str,
    },
}
