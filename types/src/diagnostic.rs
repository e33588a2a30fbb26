//! Diagnostic records produced from compiler output.

use std::fmt;

/// Source tag attached to every diagnostic produced by the extractor.
pub const DIAGNOSTIC_SOURCE: &str = "perl6";

/// End character used for whole-line ranges.
///
/// The largest value that fits an LSP `uinteger`; editors clamp it to the
/// end of the line.
pub const LINE_END_CHARACTER: u32 = 2_147_483_647;

/// Severity level for a diagnostic.
///
/// The compiler check only ever fails, so errors are the one level produced.
/// Discriminants are the LSP numeric severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    Error = 1,
}

impl DiagnosticSeverity {
    /// LSP numeric severity for the wire.
    #[must_use]
    pub fn to_lsp(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
        }
    }
}

/// A single compiler-reported problem, anchored to one line of a document.
///
/// Fields are private; external consumers read via accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    /// 0-indexed line number.
    line: u32,
    /// 0-indexed start column.
    col_start: u32,
    /// 0-indexed end column (exclusive).
    col_end: u32,
    message: String,
    source: &'static str,
}

impl Diagnostic {
    /// An error spanning the whole of `line`.
    #[must_use]
    pub fn error(line: u32, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            line,
            col_start: 0,
            col_end: LINE_END_CHARACTER,
            message: message.into(),
            source: DIAGNOSTIC_SOURCE,
        }
    }

    /// An error at the 1-indexed line reported by the compiler.
    ///
    /// Line 0 (or anything the compiler could not place) maps to the first line.
    #[must_use]
    pub fn error_at_reported_line(reported: u32, message: impl Into<String>) -> Self {
        Self::error(reported.saturating_sub(1), message)
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub fn col_start(&self) -> u32 {
        self.col_start
    }

    #[must_use]
    pub fn col_end(&self) -> u32 {
        self.col_end
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn source(&self) -> &'static str {
        self.source
    }
}

impl fmt::Display for Diagnostic {
    /// Formats as `line: severity: [source] message` (1-indexed for display).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: [{}] {}",
            self.line + 1,
            self.severity.label(),
            self.source,
            self.message
        )
    }
}

/// Diagnostics from one validation run, in the order they were found.
///
/// No deduplication; may be empty (which clears a document's diagnostics).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticBatch {
    items: Vec<Diagnostic>,
}

impl DiagnosticBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }
}

impl From<Vec<Diagnostic>> for DiagnosticBatch {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

impl FromIterator<Diagnostic> for DiagnosticBatch {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DiagnosticBatch {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiagnosticBatch {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
