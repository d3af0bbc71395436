use std::path::PathBuf;

use mutiny::SourceFile;
use mutiny::generate::generate_mutants;
use mutiny::mutant::MutantStatus;
use mutiny::mutators::{Mutator, MutatorRegistry};

fn source(path: &str, content: &str) -> SourceFile {
    SourceFile { path: PathBuf::from(path), content: content.to_string() }
}

fn only(mutator: Mutator) -> MutatorRegistry {
    let mut registry = MutatorRegistry::new();
    registry.register(mutator.name(), mutator);
    registry
}

#[test]
fn single_binary_expression_yields_exactly_one_mutant() {
    let files = [source("file.js", "var i = 1 + 2;")];
    let mutants = generate_mutants(&files, &only(Mutator::BinaryOperator)).unwrap();

    assert_eq!(mutants.len(), 1);
    assert_eq!(mutants[0].id, 1);
    assert_eq!(mutants[0].mutator, "BinaryOperator");
    assert_eq!(mutants[0].mutated_code, "var i = 1 - 2;");
    assert_eq!(mutants[0].original_line, "var i = 1 + 2;");
    assert_eq!(mutants[0].mutated_line, "var i = 1 - 2;");
    assert_eq!(mutants[0].status, MutantStatus::Untested);
    assert!(mutants[0].covering_tests.is_empty());
}

#[test]
fn leading_blank_lines_keep_the_location_honest() {
    let files = [source("file.js", "\n\nvar i = 1 + 2;")];
    let mutants = generate_mutants(&files, &only(Mutator::BinaryOperator)).unwrap();

    assert_eq!(mutants.len(), 1);
    assert_eq!(mutants[0].location.start.line, 3);
    assert_eq!(mutants[0].mutated_code, "\n\nvar i = 1 - 2;");
}

#[test]
fn empty_source_yields_no_mutants() {
    let files = [source("file.js", "")];
    let mutants = generate_mutants(&files, &MutatorRegistry::with_defaults()).unwrap();
    assert!(mutants.is_empty());
}

#[test]
fn total_is_the_sum_of_alternatives() {
    // `<` has two alternatives, `&&` one, `true` one.
    let files = [source("file.js", "var x = a < b && true;")];
    let mutants = generate_mutants(&files, &MutatorRegistry::with_defaults()).unwrap();
    assert_eq!(mutants.len(), 4);
}

#[test]
fn each_alternative_is_an_independent_mutant() {
    let files = [source("file.js", "if (a < b) { c(); }")];
    let mutants = generate_mutants(&files, &MutatorRegistry::with_defaults()).unwrap();

    // RemoveConditionals (false, true) at the if node, BinaryOperator
    // (<=, >=) at the comparison, BlockStatement at the body.
    let names: Vec<&str> = mutants.iter().map(|m| m.mutator).collect();
    assert_eq!(
        names,
        vec![
            "RemoveConditionals",
            "RemoveConditionals",
            "BinaryOperator",
            "BinaryOperator",
            "BlockStatement",
        ]
    );
    let replacements: Vec<&str> = mutants.iter().map(|m| m.replacement.as_str()).collect();
    assert_eq!(replacements, vec!["false", "true", "a <= b", "a >= b", "{}"]);
}

#[test]
fn ids_are_sequential_across_files() {
    let files = [
        source("a.js", "var i = 1 + 2;"),
        source("b.js", "var j = 3 - 4;"),
    ];
    let mutants = generate_mutants(&files, &only(Mutator::BinaryOperator)).unwrap();

    assert_eq!(mutants.len(), 2);
    assert_eq!(mutants[0].id, 1);
    assert_eq!(mutants[0].path, PathBuf::from("a.js"));
    assert_eq!(mutants[1].id, 2);
    assert_eq!(mutants[1].path, PathBuf::from("b.js"));
}

#[test]
fn generation_is_deterministic() {
    let files = [
        source("a.js", "if (a < b) { c(); } else { d(); }"),
        source("b.js", "var x = !y;"),
    ];
    let registry = MutatorRegistry::with_defaults();

    let first = generate_mutants(&files, &registry).unwrap();
    let second = generate_mutants(&files, &registry).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.mutator, b.mutator);
        assert_eq!(a.location, b.location);
        assert_eq!(a.mutated_code, b.mutated_code);
    }
}

#[test]
fn mutated_code_differs_only_within_the_location() {
    let content = "var a = 1;\nvar i = 1 + 2;\nvar b = 2;";
    let files = [source("file.js", content)];
    let mutants = generate_mutants(&files, &only(Mutator::BinaryOperator)).unwrap();

    let mutant = &mutants[0];
    let original_lines: Vec<&str> = content.split('\n').collect();
    let mutated_lines: Vec<&str> = mutant.mutated_code.split('\n').collect();
    assert_eq!(original_lines.len(), mutated_lines.len());
    for (i, (orig, muta)) in original_lines.iter().zip(&mutated_lines).enumerate() {
        let line_number = i + 1;
        if line_number == mutant.location.start.line {
            assert_ne!(orig, muta);
        } else {
            assert_eq!(orig, muta);
        }
    }
}

#[test]
fn multi_line_deletion_blanks_lines_instead_of_removing_them() {
    let content = "function f() {\n  a();\n  b();\n}\nafter();";
    let files = [source("file.js", content)];
    let mutants = generate_mutants(&files, &only(Mutator::BlockStatement)).unwrap();

    assert_eq!(mutants.len(), 1);
    let mutant = &mutants[0];
    assert_eq!(mutant.mutated_code, "function f() {}\n\n\n\nafter();");
    // `after()` keeps line 5.
    assert_eq!(mutant.mutated_code.split('\n').count(), content.split('\n').count());
}

#[test]
fn round_trip_recovers_the_original() {
    let content = "var a = 1;\nvar i = 1 + 2;";
    let files = [source("file.js", content)];
    let mutants = generate_mutants(&files, &only(Mutator::BinaryOperator)).unwrap();

    let mutant = &mutants[0];
    // Forward: splicing the mutated line at its location reproduces the
    // mutated source.
    let forward = mutiny::mutant::splice_substitute(content, mutant.location, &mutant.replacement);
    assert_eq!(forward.mutated_code, mutant.mutated_code);
    // Inverse: substituting the original snippet back recovers the input.
    let original_snippet = &content
        [byte_offset(content, mutant.location.start) ..byte_offset(content, mutant.location.end)];
    let back = mutiny::mutant::splice_substitute(&mutant.mutated_code, mutant.location, original_snippet);
    assert_eq!(back.mutated_code, content);
}

fn byte_offset(text: &str, pos: mutiny::tree::Position) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(pos.line - 1)
        .map(str::len)
        .sum();
    line_start + pos.column
}

#[test]
fn unparseable_source_aborts_the_whole_run() {
    let files = [
        source("good.js", "var i = 1 + 2;"),
        source("bad.js", "var i = ;;;("),
    ];
    let err = generate_mutants(&files, &MutatorRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, mutiny::error::Error::Parse { .. }));
}
