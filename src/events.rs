use crate::SourceFile;
use crate::mutant::Mutant;

/// Lifecycle event sink. The engine core emits these and does no formatting
/// itself; a reporting pipeline subscribes by implementing this trait.
/// Mutant events carry the final result: status, location, mutator and the
/// original/mutated text are all on the [`Mutant`].
pub trait Reporter {
    fn on_source_file_read(&self, _file: &SourceFile) {}
    fn on_all_source_files_read(&self, _files: &[SourceFile]) {}
    fn on_mutant_tested(&self, _mutant: &Mutant) {}
    fn on_all_mutants_tested(&self, _mutants: &[Mutant]) {}
}

/// Discards every event.
pub struct NullReporter;

impl Reporter for NullReporter {}
