use std::path::Path;

use console::Style;
use serde::Serialize;

use crate::SourceFile;
use crate::events::Reporter;
use crate::mutant::{Mutant, MutantStatus};
use crate::tree::Location;

/// Aggregate of one finished run. Survivors carry enough context to act on
/// without re-running.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub score: f64,
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timed_out: usize,
    pub errored: usize,
    pub survivors: Vec<SurvivedMutant>,
}

#[derive(Debug, Serialize)]
pub struct SurvivedMutant {
    pub id: usize,
    pub file: String,
    pub mutator: String,
    pub location: Location,
    pub original: String,
    pub replacement: String,
    pub diff: String,
}

impl RunSummary {
    pub fn from_mutants(mutants: &[Mutant]) -> RunSummary {
        let count = |status| mutants.iter().filter(|m| m.status == status).count();
        let killed = count(MutantStatus::Killed);
        let survived = count(MutantStatus::Survived);
        let timed_out = count(MutantStatus::TimedOut);
        let errored = count(MutantStatus::Error);
        let testable = mutants.len() - errored;
        let score = if testable > 0 {
            (killed + timed_out) as f64 / testable as f64
        } else {
            1.0
        };

        let survivors = mutants
            .iter()
            .filter(|m| m.status == MutantStatus::Survived)
            .map(|m| SurvivedMutant {
                id: m.id,
                file: m.path.display().to_string(),
                mutator: m.mutator.to_string(),
                location: m.location,
                original: m.original_line.clone(),
                replacement: m.mutated_line.clone(),
                diff: generate_diff(&m.original_line, &m.mutated_line),
            })
            .collect();

        RunSummary { score, total: mutants.len(), killed, survived, timed_out, errored, survivors }
    }
}

/// Minimal unified diff of the substituted span, for reporting.
pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// Console subscriber for the engine's lifecycle events.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> ConsoleReporter {
        ConsoleReporter { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn on_source_file_read(&self, file: &SourceFile) {
        if self.verbose {
            let dim = Style::new().dim();
            println!("  {} read {}", dim.apply_to("·"), file.path.display());
        }
    }

    fn on_all_source_files_read(&self, files: &[SourceFile]) {
        if self.verbose {
            let dim = Style::new().dim();
            println!("  {} {} file(s) to mutate", dim.apply_to("·"), files.len());
        }
    }

    fn on_mutant_tested(&self, mutant: &Mutant) {
        if !self.verbose {
            return;
        }
        let (mark, style) = match mutant.status {
            MutantStatus::Killed => ("✓", Style::new().green()),
            MutantStatus::Survived => ("!", Style::new().yellow().bold()),
            MutantStatus::TimedOut => ("⏱", Style::new().dim()),
            MutantStatus::Error | MutantStatus::Untested => ("?", Style::new().red()),
        };
        println!(
            "  {} {}:{} [{}] {} → {}",
            style.apply_to(mark),
            mutant.path.display(),
            mutant.location.start.line,
            mutant.mutator,
            mutant.original_line.trim(),
            mutant.mutated_line.trim(),
        );
    }
}

pub fn print_summary(summary: &RunSummary, file: &Path, duration_secs: f64) {
    let score_pct = summary.score * 100.0;

    if summary.survived == 0 {
        let style = Style::new().green().bold();
        println!(
            "{} {}: {} mutants, all killed ({:.1}%) in {:.1}s",
            style.apply_to("✓"),
            file.display(),
            summary.total,
            score_pct,
            duration_secs,
        );
        return;
    }

    let style = Style::new().yellow().bold();
    println!(
        "{} {}: {} survived / {} mutants ({:.1}% killed) in {:.1}s",
        style.apply_to("!"),
        file.display(),
        summary.survived,
        summary.total,
        score_pct,
        duration_secs,
    );

    if summary.errored > 0 {
        let dim = Style::new().dim();
        println!("  {} {} mutants errored", dim.apply_to("·"), summary.errored);
    }
    if summary.timed_out > 0 {
        let dim = Style::new().dim();
        println!("  {} {} mutants timed out", dim.apply_to("·"), summary.timed_out);
    }

    println!();
    for m in &summary.survivors {
        let id_style = Style::new().cyan().bold();
        let loc_style = Style::new().dim();
        let op_style = Style::new().magenta();

        println!(
            "  {} {}:{} {} {} → {}",
            id_style.apply_to(format!("#{}", m.id)),
            m.file,
            m.location.start.line,
            loc_style.apply_to(format!("[{}]", m.mutator)),
            op_style.apply_to(m.original.trim()),
            op_style.apply_to(m.replacement.trim()),
        );
    }
}
