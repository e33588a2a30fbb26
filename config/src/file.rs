//! Optional TOML config file.
//!
//! ```toml
//! [compiler]
//! path = "/opt/rakudo/bin/perl6"
//! libs = ["${HOME}/src/my-dist/lib"]
//!
//! [trace]
//! server = "messages"
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::ConfigError;
use crate::settings::RawSettings;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PERL6_LS_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub compiler: Option<CompilerSection>,
    pub trace: Option<TraceSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerSection {
    pub path: Option<String>,
    pub libs: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceSection {
    pub server: Option<String>,
}

impl FileConfig {
    /// Load the config file from its default location.
    ///
    /// A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Flatten into the settings layer; `${VAR}` references are expanded.
    #[must_use]
    pub fn into_raw(self) -> RawSettings {
        let (path, libs) = match self.compiler {
            Some(section) => (section.path, section.libs),
            None => (None, None),
        };
        RawSettings {
            path: path.map(|p| expand_env_vars(&p)),
            libs: libs.map(|libs| libs.iter().map(|l| expand_env_vars(l)).collect()),
            trace: self.trace.and_then(|t| t.server),
        }
    }
}

/// `$PERL6_LS_CONFIG`, else `~/.perl6-ls/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".perl6-ls").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
