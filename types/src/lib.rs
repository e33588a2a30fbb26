//! Core domain types for perl6-ls.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the server.

#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod diagnostic;
mod settings;

pub use diagnostic::{
    DIAGNOSTIC_SOURCE, Diagnostic, DiagnosticBatch, DiagnosticSeverity, LINE_END_CHARACTER,
};
pub use settings::{CompilerSettings, DEFAULT_COMPILER, SettingsError, TraceLevel};
