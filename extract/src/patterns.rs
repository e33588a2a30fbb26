//! Compiled regexes for the known shapes of Rakudo error output.
//!
//! Patterns are compiled once and cached in a `OnceLock`.

use std::sync::OnceLock;

use regex::Regex;

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

pub(crate) fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(Patterns::new)
}

#[derive(Debug)]
pub(crate) struct Patterns {
    /// `Could not find <module> at line <N> in:\n<search paths...>`
    pub missing_library: Regex,

    // Undeclared symbol lists
    pub undeclared_names_header: Regex,
    pub undeclared_routines_header: Regex,
    /// `  <identifier> used at line <N><advice>`; for `lines <N>, <M>` the first line is kept.
    pub undeclared_entry: Regex,

    /// Leading `===SORRY!=== Error while compiling ...` line.
    pub sorry_banner: Regex,
    /// `<finding>\nat <file>:<N>\n------> <context>` plus indented continuation lines.
    pub generic_block: Regex,
}

impl Patterns {
    fn new() -> Self {
        Self {
            missing_library: Regex::new(r"(?s)Could not find ([^\n]+?) at line (\d+) in:\r?\n(.*)")
                .expect("valid missing library regex"),

            undeclared_names_header: Regex::new(r"Undeclared names?:\r?\n")
                .expect("valid undeclared names regex"),
            undeclared_routines_header: Regex::new(r"Undeclared routines?:\r?\n")
                .expect("valid undeclared routines regex"),
            undeclared_entry: Regex::new(r"^\s+(\S+) used at lines? (\d+)(?:, \d+)*(.*)$")
                .expect("valid undeclared entry regex"),

            sorry_banner: Regex::new(r"\A===SORRY[^\n]*\n").expect("valid banner regex"),
            generic_block: Regex::new(
                r"(?s)(.+?)\r?\nat ([^\r\n]+):(\d+)\r?\n------>([^\r\n]*)(?:\r?\n[ \t]+[^\r\n]*)*",
            )
            .expect("valid generic block regex"),
        }
    }
}
