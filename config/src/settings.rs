//! Layered settings: defaults < config file < command line < editor.

use perl6_ls_types::{CompilerSettings, SettingsError, TraceLevel};
use serde::Deserialize;

use crate::ConfigError;

/// Key the editor nests our settings under.
pub const SETTINGS_SECTION: &str = "perl6";

/// One layer of unresolved settings. `None` defers to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    pub path: Option<String>,
    pub libs: Option<Vec<String>>,
    pub trace: Option<String>,
}

#[derive(Deserialize)]
struct LspSettings {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    libs: Option<Vec<String>>,
    #[serde(default)]
    trace: Option<LspTrace>,
}

#[derive(Deserialize)]
struct LspTrace {
    #[serde(default)]
    server: Option<String>,
}

impl RawSettings {
    /// Layer holding only a compiler override, e.g. from `--compiler`.
    #[must_use]
    pub fn with_compiler(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse editor settings (`initializationOptions` or the `settings` of
    /// `workspace/didChangeConfiguration`).
    ///
    /// Accepts `{"perl6": {...}}` or the inner object directly. `null`
    /// yields an empty layer.
    pub fn from_lsp(value: &serde_json::Value) -> Result<Self, ConfigError> {
        let section = match value.get(SETTINGS_SECTION) {
            Some(inner) => inner,
            None => value,
        };
        if section.is_null() {
            return Ok(Self::default());
        }

        let parsed: LspSettings =
            serde_json::from_value(section.clone()).map_err(ConfigError::Lsp)?;
        Ok(Self {
            path: parsed.path,
            libs: parsed.libs,
            trace: parsed.trace.and_then(|t| t.server),
        })
    }

    /// Stack `higher` on top of `self`; blank strings in `higher` do not
    /// override.
    #[must_use]
    pub fn overlay(self, higher: Self) -> Self {
        Self {
            path: non_blank(higher.path).or(self.path),
            libs: higher.libs.or(self.libs),
            trace: non_blank(higher.trace).or(self.trace),
        }
    }

    /// Resolve against built-in defaults.
    ///
    /// An unknown trace value is logged and treated as `off`; blank library
    /// entries are dropped.
    pub fn resolve(&self) -> Result<CompilerSettings, SettingsError> {
        let defaults = CompilerSettings::default();
        let compiler = non_blank(self.path.clone()).unwrap_or_else(|| defaults.compiler().into());
        let libs = self
            .libs
            .iter()
            .flatten()
            .filter(|lib| !lib.trim().is_empty())
            .cloned()
            .collect();
        let trace = match self.trace.as_deref() {
            None => TraceLevel::Off,
            Some(raw) => TraceLevel::parse(raw).unwrap_or_else(|| {
                tracing::warn!(value = raw, "Unknown trace level, using off");
                TraceLevel::Off
            }),
        };
        CompilerSettings::new(compiler, libs, trace)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
