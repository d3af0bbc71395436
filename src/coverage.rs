use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;
use crate::mutant::Mutant;
use crate::tree::Position;

/// How coverage is attributed during the baseline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageMode {
    /// No matching: every mutant runs against the whole test set.
    Off,
    /// Run-level attribution: any test that ran is a candidate for any mutant
    /// whose code executed at least once.
    All,
    /// Per-test attribution via the runner's per-test instrumentation hook.
    PerTest,
}

impl FromStr for CoverageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<CoverageMode, Error> {
        match s {
            "off" => Ok(CoverageMode::Off),
            "all" => Ok(CoverageMode::All),
            "perTest" | "per-test" => Ok(CoverageMode::PerTest),
            other => Err(Error::Configuration(format!(
                "unknown coverage mode '{other}', expected off, all or perTest"
            ))),
        }
    }
}

/// A statement interval executed in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub file: PathBuf,
    pub start: Position,
    pub end: Position,
}

impl Interval {
    /// Whether this interval fully or partially contains `pos` in `file`.
    fn contains(&self, file: &Path, pos: Position) -> bool {
        self.file == file && self.start <= pos && pos <= self.end
    }
}

/// Statement intervals recorded during the one baseline run. Per-test entries
/// keep the baseline execution order; run-level intervals back the `all`
/// mode. Read-only after capture.
#[derive(Debug, Clone, Default)]
pub struct CoverageMap {
    per_test: Vec<(String, Vec<Interval>)>,
    run_level: Vec<Interval>,
}

impl CoverageMap {
    pub fn new() -> CoverageMap {
        CoverageMap::default()
    }

    pub fn record_test(&mut self, test: &str, intervals: Vec<Interval>) {
        self.run_level.extend(intervals.iter().cloned());
        match self.per_test.iter_mut().find(|(id, _)| id == test) {
            Some((_, existing)) => existing.extend(intervals),
            None => self.per_test.push((test.to_string(), intervals)),
        }
    }

    pub fn record_run(&mut self, intervals: Vec<Interval>) {
        self.run_level.extend(intervals);
    }

    pub fn has_per_test_data(&self) -> bool {
        !self.per_test.is_empty()
    }

    /// Tests whose recorded intervals contain `pos`, in baseline-run order.
    fn tests_covering(&self, file: &Path, pos: Position) -> Vec<String> {
        self.per_test
            .iter()
            .filter(|(_, intervals)| intervals.iter().any(|i| i.contains(file, pos)))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn run_covers(&self, file: &Path, pos: Position) -> bool {
        self.run_level.iter().any(|i| i.contains(file, pos))
    }
}

/// Compute each mutant's covering test set. Containment of the mutant
/// location's start position is the only criterion; mutator name and text
/// never participate. An empty set with matching enabled means no test can
/// observe the mutant — the coordinator skips it as Survived.
pub fn match_tests(
    mutants: &mut [Mutant],
    mode: CoverageMode,
    coverage: Option<&CoverageMap>,
    all_tests: &[String],
) {
    for mutant in mutants {
        mutant.covering_tests = covering_tests(mutant, mode, coverage, all_tests);
    }
}

fn covering_tests(
    mutant: &Mutant,
    mode: CoverageMode,
    coverage: Option<&CoverageMap>,
    all_tests: &[String],
) -> Vec<String> {
    let effective = effective_mode(mode, coverage);
    match (effective, coverage) {
        (CoverageMode::Off, _) | (_, None) => all_tests.to_vec(),
        (CoverageMode::All, Some(map)) => {
            if map.run_covers(&mutant.path, mutant.location.start) {
                all_tests.to_vec()
            } else {
                Vec::new()
            }
        }
        (CoverageMode::PerTest, Some(map)) => {
            let mut tests = map.tests_covering(&mutant.path, mutant.location.start);
            tests.dedup();
            tests
        }
    }
}

/// A runner without the capability the configured mode needs degrades
/// gracefully rather than failing: perTest without per-test data falls back
/// to all, and any mode without coverage at all falls back to off.
pub fn effective_mode(mode: CoverageMode, coverage: Option<&CoverageMap>) -> CoverageMode {
    match (mode, coverage) {
        (_, None) => CoverageMode::Off,
        (CoverageMode::PerTest, Some(map)) if !map.has_per_test_data() => CoverageMode::All,
        (mode, _) => mode,
    }
}
