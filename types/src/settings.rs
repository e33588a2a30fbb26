//! Resolved configuration types shared across crates.
//!
//! These types represent fully-validated, resolved configuration state.
//! Raw deserialization structs (with `Option` fields) stay private in
//! `perl6-ls-config`, which resolves them into these types at the parse
//! boundary.

use serde::Deserialize;

/// Compiler command used when nothing else is configured.
pub const DEFAULT_COMPILER: &str = "perl6";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("compiler path must not be empty")]
    EmptyCompiler,
    #[error("library path must not be empty")]
    EmptyLibrary,
}

/// Protocol tracing verbosity requested by the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    #[default]
    Off,
    Messages,
    Verbose,
}

impl TraceLevel {
    /// Lenient parse used for `$/setTrace` values; unknown strings yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "messages" => Some(Self::Messages),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

/// Settings one validation run needs.
///
/// Invariant: `compiler` and every entry of `libs` are non-empty after
/// trimming. The value is cloned into each run, never shared mutably.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSettings {
    compiler: String,
    libs: Vec<String>,
    trace: TraceLevel,
}

impl CompilerSettings {
    pub fn new(
        compiler: impl Into<String>,
        libs: Vec<String>,
        trace: TraceLevel,
    ) -> Result<Self, SettingsError> {
        let compiler = compiler.into();
        if compiler.trim().is_empty() {
            return Err(SettingsError::EmptyCompiler);
        }
        if libs.iter().any(|lib| lib.trim().is_empty()) {
            return Err(SettingsError::EmptyLibrary);
        }
        Ok(Self {
            compiler: compiler.trim().to_string(),
            libs,
            trace,
        })
    }

    /// Compiler executable: a bare command name or a path.
    #[must_use]
    pub fn compiler(&self) -> &str {
        &self.compiler
    }

    /// Extra module search paths, passed to the compiler as `-I` options.
    #[must_use]
    pub fn libs(&self) -> &[String] {
        &self.libs
    }

    #[must_use]
    pub fn trace(&self) -> TraceLevel {
        self.trace
    }
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            compiler: DEFAULT_COMPILER.to_string(),
            libs: Vec::new(),
            trace: TraceLevel::Off,
        }
    }
}
