//! Real-world compiler output through the extractor.

use perl6_ls_extract::extract;
use perl6_ls_types::{DiagnosticBatch, DiagnosticSeverity};

fn lines_and_messages(batch: &DiagnosticBatch) -> Vec<(u32, String)> {
    batch
        .iter()
        .map(|d| (d.line(), d.message().to_string()))
        .collect()
}

#[test]
fn test_two_terms_with_expectations() {
    let stderr = "\
===SORRY!=== Error while compiling /tmp/perl6-ls-x1.p6
Two terms in a row
at /tmp/perl6-ls-x1.p6:4
------> say 1\u{23CF} 2
    expecting any of:
        infix
        infix stopper
        statement end
";
    assert_eq!(
        lines_and_messages(&extract(stderr)),
        vec![(3, "Two terms in a row".to_string())]
    );
}

#[test]
fn test_multiple_sorry_blocks() {
    let stderr = "\
===SORRY!===
Unsupported use of $#array; in Perl 6 please use @array.end
at /tmp/perl6-ls-x2.p6:2
------> say $#\u{23CF}array;
Variable '$y' is not declared
at /tmp/perl6-ls-x2.p6:7
------> say \u{23CF}$y;
";
    assert_eq!(
        lines_and_messages(&extract(stderr)),
        vec![
            (
                1,
                "Unsupported use of $#array; in Perl 6 please use @array.end".to_string()
            ),
            (6, "Variable '$y' is not declared".to_string()),
        ]
    );
}

#[test]
fn test_windows_path_locator() {
    let stderr = "===SORRY!===\nMissing block\nat C:\\Users\\u\\AppData\\Local\\Temp\\perl6-ls-x3.p6:12\n------> if True\u{23CF}<EOL>\n";
    assert_eq!(
        lines_and_messages(&extract(stderr)),
        vec![(11, "Missing block".to_string())]
    );
}

#[test]
fn test_undeclared_routine_with_suggestion() {
    let stderr = "\
===SORRY!=== Error while compiling /tmp/perl6-ls-x4.p6
Undeclared routine:
    sya used at line 1. Did you mean 'say'?

";
    assert_eq!(
        lines_and_messages(&extract(stderr)),
        vec![(0, "routine sya is not declared. Did you mean 'say'?".to_string())]
    );
}

#[test]
fn test_undeclared_routine_used_on_several_lines() {
    let stderr = "\
===SORRY!=== Error while compiling /tmp/perl6-ls-x5.p6
Undeclared routine:
    frob used at lines 3, 5

";
    assert_eq!(
        lines_and_messages(&extract(stderr)),
        vec![(2, "routine frob is not declared".to_string())]
    );
}

#[test]
fn test_runtime_style_failure_falls_back_to_whole_text() {
    let stderr = "Cannot find method 'new' on object of type Foo\n  in block <unit> at -e line 1\n";
    let batch = extract(stderr);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.items()[0].line(), 0);
    assert_eq!(batch.items()[0].message(), stderr);
}

#[test]
fn test_every_diagnostic_is_a_whole_line_error() {
    let stderr = "Undeclared names:\n    $a used at line 2\n    $b used at line 3\n";
    for diag in &extract(stderr) {
        assert_eq!(diag.severity(), DiagnosticSeverity::Error);
        assert_eq!(diag.col_start(), 0);
        assert_eq!(diag.col_end(), perl6_ls_types::LINE_END_CHARACTER);
        assert_eq!(diag.source(), perl6_ls_types::DIAGNOSTIC_SOURCE);
    }
}
