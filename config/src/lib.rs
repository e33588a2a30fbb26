//! Configuration loading and layering for perl6-ls.
//!
//! Raw, `Option`-laden settings live here; they are resolved into
//! [`perl6_ls_types::CompilerSettings`] before any validation run sees them.

mod file;
mod settings;

use std::path::{Path, PathBuf};

pub use file::{
    CONFIG_PATH_ENV, CompilerSection, FileConfig, TraceSection, config_path, expand_env_vars,
};
pub use settings::{RawSettings, SETTINGS_SECTION};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid editor settings: {0}")]
    Lsp(serde_json::Error),
}

impl ConfigError {
    /// Config file involved, if the error came from one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Lsp(_) => None,
        }
    }
}
