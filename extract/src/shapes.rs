//! Per-shape extractors.
//!
//! Each function is pure and recognises exactly one shape of compiler
//! output. [`crate::extract`] decides which of them apply.

use perl6_ls_types::{Diagnostic, DiagnosticBatch};
use regex::Regex;

use crate::patterns::patterns;

/// Parse a compiler-reported line number.
///
/// Values that do not fit map to line 0 rather than failing the run.
fn reported_line(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}

/// `Could not find Foo::Bar at line 3 in:\n<search paths>`.
///
/// Yields one diagnostic at the `use` line; the message keeps the search
/// path listing verbatim.
#[must_use]
pub fn missing_library(text: &str) -> Option<Diagnostic> {
    let caps = patterns().missing_library.captures(text)?;
    let message = format!("Could not find {} in:\n{}", &caps[1], &caps[3]);
    Some(Diagnostic::error_at_reported_line(
        reported_line(&caps[2]),
        message,
    ))
}

/// Entries of an `Undeclared name(s):` list.
#[must_use]
pub fn undeclared_names(text: &str) -> Vec<Diagnostic> {
    undeclared_list(text, &patterns().undeclared_names_header, "name")
}

/// Entries of an `Undeclared routine(s):` list.
#[must_use]
pub fn undeclared_routines(text: &str) -> Vec<Diagnostic> {
    undeclared_list(text, &patterns().undeclared_routines_header, "routine")
}

/// Walk the list that follows `header`, one entry per line.
///
/// The list is contiguous: the first line that is not an entry ends it.
fn undeclared_list(text: &str, header: &Regex, kind: &str) -> Vec<Diagnostic> {
    let Some(found) = header.find(text) else {
        return Vec::new();
    };

    let entry = &patterns().undeclared_entry;
    let mut diagnostics = Vec::new();
    for line in text[found.end()..].lines() {
        let Some(caps) = entry.captures(line) else {
            break;
        };
        let advice = caps[3].trim_end();
        diagnostics.push(Diagnostic::error_at_reported_line(
            reported_line(&caps[2]),
            format!("{kind} {} is not declared{advice}", &caps[1]),
        ));
    }
    diagnostics
}

/// Drop a leading `===SORRY!===` banner line, if any.
#[must_use]
pub fn strip_sorry_banner(text: &str) -> &str {
    match patterns().sorry_banner.find(text) {
        Some(banner) => &text[banner.end()..],
        None => text,
    }
}

/// Every `<finding>\nat <file>:<N>\n------> <context>` block, in order.
///
/// The caret context line is not part of the message.
#[must_use]
pub fn generic_blocks(text: &str) -> Vec<Diagnostic> {
    patterns()
        .generic_block
        .captures_iter(text)
        .filter_map(|caps| {
            let finding = caps[1].trim();
            if finding.is_empty() {
                return None;
            }
            Some(Diagnostic::error_at_reported_line(
                reported_line(&caps[3]),
                finding,
            ))
        })
        .collect()
}

/// Generic shape with its whole-text fallback.
///
/// Text without any recognisable block becomes one diagnostic on the first
/// line, so a failed compile is never hidden.
#[must_use]
pub fn generic(text: &str) -> DiagnosticBatch {
    let body = strip_sorry_banner(text);
    let blocks = generic_blocks(body);
    if blocks.is_empty() {
        return DiagnosticBatch::from(vec![Diagnostic::error(0, body)]);
    }
    DiagnosticBatch::from(blocks)
}
