//! Diagnostic extraction from Rakudo compiler error output.
//!
//! `perl6 -c` reports problems as free-form text on stderr. The text comes in
//! a handful of shapes depending on the failure kind; [`extract`] recognises
//! them in priority order and turns each into [`Diagnostic`]s.
//!
//! | Priority | Shape                | Example head                        |
//! |----------|----------------------|-------------------------------------|
//! | 1        | missing library      | `Could not find Foo at line 1 in:`  |
//! | 2        | undeclared names     | `Undeclared names:`                 |
//! | 2        | undeclared routines  | `Undeclared routine:`               |
//! | 3        | generic block(s)     | `<finding>\nat <file>:<N>\n------>` |
//!
//! Shapes sharing a priority may all contribute to the same batch. The
//! generic shape always yields at least one diagnostic for non-blank text.

mod patterns;
mod shapes;

use perl6_ls_types::{Diagnostic, DiagnosticBatch};

pub use shapes::{
    generic, generic_blocks, missing_library, strip_sorry_banner, undeclared_names,
    undeclared_routines,
};

/// A recognised shape of compiler error output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    MissingLibrary,
    UndeclaredNames,
    UndeclaredRoutines,
    Generic,
}

impl Shape {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MissingLibrary => "missing-library",
            Self::UndeclaredNames => "undeclared-names",
            Self::UndeclaredRoutines => "undeclared-routines",
            Self::Generic => "generic",
        }
    }

    /// Whether the text carries this shape's marker.
    #[must_use]
    pub fn matches(self, text: &str) -> bool {
        let p = patterns::patterns();
        match self {
            Self::MissingLibrary => p.missing_library.is_match(text),
            Self::UndeclaredNames => p.undeclared_names_header.is_match(text),
            Self::UndeclaredRoutines => p.undeclared_routines_header.is_match(text),
            Self::Generic => !text.trim().is_empty(),
        }
    }

    /// Diagnostics for this shape; empty when the marker is present but
    /// nothing under it parses.
    #[must_use]
    pub fn extract(self, text: &str) -> Vec<Diagnostic> {
        match self {
            Self::MissingLibrary => missing_library(text).into_iter().collect(),
            Self::UndeclaredNames => undeclared_names(text),
            Self::UndeclaredRoutines => undeclared_routines(text),
            Self::Generic => generic(text).into_iter().collect(),
        }
    }
}

/// Shapes grouped by priority, highest first.
///
/// The first group that produces any diagnostic wins; every shape inside
/// that group contributes, in table order.
pub const SHAPE_PRIORITY: &[&[Shape]] = &[
    &[Shape::MissingLibrary],
    &[Shape::UndeclaredNames, Shape::UndeclaredRoutines],
    &[Shape::Generic],
];

/// Turn raw compiler stderr into diagnostics.
///
/// Pure: the same input always yields the same batch. Blank input yields an
/// empty batch; any other input yields at least one diagnostic.
#[must_use]
pub fn extract(stderr: &str) -> DiagnosticBatch {
    for group in SHAPE_PRIORITY {
        let mut batch = DiagnosticBatch::new();
        for shape in *group {
            if shape.matches(stderr) {
                let found = shape.extract(stderr);
                tracing::trace!(shape = shape.label(), count = found.len(), "Shape matched");
                batch.extend(found);
            }
        }
        if !batch.is_empty() {
            return batch;
        }
    }
    DiagnosticBatch::new()
}
