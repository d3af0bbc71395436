use std::path::PathBuf;

use serde::Serialize;

use crate::tree::Location;

/// Verdict state of a mutant. `Untested` until the coordinator classifies it;
/// every other state is written exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MutantStatus {
    Untested,
    Killed,
    Survived,
    TimedOut,
    Error,
}

/// One candidate syntactic change to one source file, plus its verdict.
/// Everything except `status` and `covering_tests` is fixed at generation
/// time; the coordinator alone moves the status off `Untested`.
#[derive(Debug, Clone)]
pub struct Mutant {
    pub id: usize,
    pub mutator: &'static str,
    pub path: PathBuf,
    /// Span of the substituted text in the ORIGINAL file.
    pub location: Location,
    /// The replacement text spliced in at `location`.
    pub replacement: String,
    /// The original line(s) covered by `location`, joined verbatim.
    pub original_line: String,
    /// The single line the span collapses to after substitution.
    pub mutated_line: String,
    /// Full mutated source, differing from the original only within `location`.
    pub mutated_code: String,
    pub status: MutantStatus,
    /// Tests that can possibly observe this mutant, in baseline-run order.
    /// Empty until matching runs; with matching off, every test qualifies.
    pub covering_tests: Vec<String>,
}

impl Mutant {
    pub fn new(
        id: usize,
        mutator: &'static str,
        path: PathBuf,
        original_code: &str,
        replacement: String,
        location: Location,
    ) -> Mutant {
        let splice = splice_substitute(original_code, location, &replacement);
        Mutant {
            id,
            mutator,
            path,
            location,
            replacement,
            original_line: splice.original_line,
            mutated_line: splice.mutated_line,
            mutated_code: splice.mutated_code,
            status: MutantStatus::Untested,
            covering_tests: Vec::new(),
        }
    }
}

pub struct Splice {
    pub original_line: String,
    pub mutated_line: String,
    pub mutated_code: String,
}

/// Splice `substitute` over `location` in `original`. When the span covers
/// several lines, the whole span collapses onto the first line and the
/// remaining lines are blanked, not removed: line numbers of surrounding code
/// must stay stable because downstream comparisons key on them.
pub fn splice_substitute(original: &str, location: Location, substitute: &str) -> Splice {
    let mut lines: Vec<String> = original.split('\n').map(str::to_string).collect();
    let first = location.start.line - 1;
    let last = location.end.line - 1;

    let original_line = lines[first..=last].join("\n");
    let mutated_line = format!(
        "{}{}{}",
        &lines[first][..location.start.column],
        substitute,
        &lines[last][location.end.column..],
    );

    for line in &mut lines[first + 1..=last] {
        line.clear();
    }
    lines[first] = mutated_line.clone();

    Splice { original_line, mutated_line, mutated_code: lines.join("\n") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Position;

    fn loc(start: (usize, usize), end: (usize, usize)) -> Location {
        Location {
            start: Position { line: start.0, column: start.1 },
            end: Position { line: end.0, column: end.1 },
        }
    }

    #[test]
    fn single_line_substitution() {
        let splice = splice_substitute("var i = 1 + 2;", loc((1, 8), (1, 13)), "1 - 2");
        assert_eq!(splice.original_line, "var i = 1 + 2;");
        assert_eq!(splice.mutated_line, "var i = 1 - 2;");
        assert_eq!(splice.mutated_code, "var i = 1 - 2;");
    }

    #[test]
    fn substitution_leaves_other_lines_alone() {
        let source = "var a = 1;\nvar i = 1 + 2;\nvar b = 2;";
        let splice = splice_substitute(source, loc((2, 8), (2, 13)), "1 - 2");
        assert_eq!(splice.mutated_code, "var a = 1;\nvar i = 1 - 2;\nvar b = 2;");
    }

    #[test]
    fn multi_line_span_blanks_intervening_lines() {
        let source = "if (x) {\n  a();\n  b();\n}\nafter();";
        // Replace the whole block `{ ... }` with `{}`.
        let splice = splice_substitute(source, loc((1, 7), (4, 1)), "{}");
        assert_eq!(splice.mutated_code, "if (x) {}\n\n\n\nafter();");
        assert_eq!(splice.mutated_line, "if (x) {}");
        assert_eq!(splice.original_line, "if (x) {\n  a();\n  b();\n}");
        // Surrounding code keeps its line number.
        assert_eq!(splice.mutated_code.split('\n').nth(4).unwrap(), "after();");
    }

    #[test]
    fn round_trips_back_to_original() {
        let source = "var a = 1;\nvar i = 1 + 2;";
        let location = loc((2, 8), (2, 13));
        let forward = splice_substitute(source, location, "1 - 2");
        // The inverse substitution over the mutated span recovers the input.
        let inverse_loc = loc((2, 8), (2, 13));
        let back = splice_substitute(&forward.mutated_code, inverse_loc, "1 + 2");
        assert_eq!(back.mutated_code, source);
    }
}
