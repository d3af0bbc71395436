use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::coverage::{CoverageMap, CoverageMode, effective_mode};
use crate::error::{Error, Result};
use crate::events::Reporter;
use crate::mutant::{Mutant, MutantStatus};
use crate::runner::{RunOutcome, RunStatus, RunnerFactory, TestResult, TestStatus};

/// Directory entries never copied into a sandbox: version control, package
/// caches and build output have no business inside the private file copy.
const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "coverage",
    ".nyc_output",
    "target",
    "dist",
    "build",
];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name)
}

/// Walk up from `source_file` looking for a project marker; the directory
/// that carries one is what gets copied into each sandbox.
pub fn find_project_root(source_file: &Path) -> PathBuf {
    let markers = &["package.json", "Cargo.toml", "pyproject.toml", ".git"];
    let mut dir = source_file.parent().unwrap_or(source_file);
    loop {
        for marker in markers {
            if dir.join(marker).exists() {
                return dir.to_path_buf();
            }
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    source_file.parent().unwrap_or(source_file).to_path_buf()
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if should_skip(&name.to_string_lossy()) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let ft = entry.file_type()?;
        if ft.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else if ft.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
        // Skip symlinks and other special files
    }
    Ok(())
}

/// Scoped staging of mutated content over a file inside a sandbox. The
/// original bytes come back on drop, on every exit path, so a crash never
/// leaks a stale mutated file into a later run.
pub struct StagedFile {
    path: PathBuf,
    original: String,
}

impl StagedFile {
    pub fn stage(path: &Path, content: &str) -> std::io::Result<StagedFile> {
        let original = fs::read_to_string(path)?;
        fs::write(path, content)?;
        Ok(StagedFile { path: path.to_path_buf(), original })
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = fs::write(&self.path, &self.original);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Idle,
    Running,
    Destroyed,
}

/// One isolated execution context: a private copy of the full file set in a
/// temp directory, exclusively owned by whichever worker holds it.
pub struct Sandbox {
    id: usize,
    state: SandboxState,
    project_root: PathBuf,
    root: PathBuf,
    _temp: tempfile::TempDir,
}

impl Sandbox {
    pub fn create(id: usize, session: &str, project_root: &Path) -> Result<Sandbox> {
        let temp = tempfile::Builder::new()
            .prefix(&format!("mutiny-{session}-{id}-"))
            .tempdir()
            .map_err(|e| Error::io(project_root, e))?;
        copy_dir_filtered(project_root, temp.path()).map_err(|e| Error::io(project_root, e))?;
        Ok(Sandbox {
            id,
            state: SandboxState::Idle,
            project_root: project_root.to_path_buf(),
            root: temp.path().to_path_buf(),
            _temp: temp,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> SandboxState {
        self.state
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a path from the original project into this sandbox's copy.
    pub fn path_of(&self, original: &Path) -> PathBuf {
        match original.strip_prefix(&self.project_root) {
            Ok(rel) => self.root.join(rel),
            Err(_) => self.root.join(original),
        }
    }

    pub fn destroy(&mut self) {
        self.state = SandboxState::Destroyed;
    }
}

/// Result of the single, strictly sequential baseline run.
#[derive(Debug)]
pub struct BaselineOutcome {
    pub tests: Vec<TestResult>,
    pub coverage: Option<CoverageMap>,
    pub elapsed: Duration,
}

impl BaselineOutcome {
    /// Test ids in baseline-run order.
    pub fn test_ids(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.id.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Sandbox count; the bound on concurrent mutant executions.
    pub concurrency: usize,
    pub coverage: CoverageMode,
    /// Per-mutant timeout = baseline elapsed * multiplier + overhead.
    pub timeout_multiplier: f64,
    pub timeout_overhead_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            concurrency: 1,
            coverage: CoverageMode::Off,
            timeout_multiplier: 3.0,
            timeout_overhead_ms: 2000,
        }
    }
}

/// Owns the sandbox pool, runs the baseline, and drives every mutant through
/// an isolated execution. The coordinator is the only writer of mutant
/// statuses.
pub struct SandboxCoordinator<'f> {
    config: CoordinatorConfig,
    project_root: PathBuf,
    session: String,
    sandboxes: Vec<Sandbox>,
    factory: &'f dyn RunnerFactory,
}

impl<'f> SandboxCoordinator<'f> {
    pub fn new(
        project_root: &Path,
        config: CoordinatorConfig,
        factory: &'f dyn RunnerFactory,
    ) -> Result<SandboxCoordinator<'f>> {
        if config.concurrency == 0 {
            return Err(Error::Configuration("concurrency must be at least 1".into()));
        }
        let session = format!("{:08x}", fastrand::u32(..));
        let sandboxes = (0..config.concurrency)
            .map(|id| Sandbox::create(id, &session, project_root))
            .collect::<Result<Vec<_>>>()?;
        Ok(SandboxCoordinator {
            config,
            project_root: project_root.to_path_buf(),
            session,
            sandboxes,
            factory,
        })
    }

    pub fn sandboxes(&self) -> &[Sandbox] {
        &self.sandboxes
    }

    /// Run the full suite once, unmutated, in one sandbox, capturing coverage
    /// per the configured mode. Anything short of a fully passing Complete
    /// run aborts the session: kill/survive classification is only
    /// trustworthy against a clean baseline.
    pub fn initial_run(&mut self) -> Result<BaselineOutcome> {
        let sandbox = &mut self.sandboxes[0];
        sandbox.state = SandboxState::Running;
        let mut runner = self.factory.create(sandbox.root());
        let outcome = runner.run(None, None, self.config.coverage);
        sandbox.state = SandboxState::Idle;

        match outcome.status {
            RunStatus::Complete => {
                let failed: Vec<&TestResult> = outcome.failed_tests().collect();
                if failed.is_empty() {
                    Ok(BaselineOutcome {
                        tests: outcome.tests.clone(),
                        coverage: outcome.coverage,
                        elapsed: outcome.elapsed,
                    })
                } else {
                    Err(Error::Baseline { diagnostics: failed_diagnostics(&failed) })
                }
            }
            RunStatus::Error => Err(Error::Baseline {
                diagnostics: format!(
                    "one or more tests errored in the initial test run:\n\t{}",
                    outcome.error_messages.join("\n\t")
                ),
            }),
            RunStatus::Timeout => Err(Error::Baseline {
                diagnostics: timeout_diagnostics(&outcome),
            }),
        }
    }

    /// Execute every mutant against its covering tests, at most
    /// `concurrency` at a time, and classify each. Mutants with an empty
    /// covering set while matching is enabled never reach a sandbox: no test
    /// can observe them, so they are Survived by definition.
    pub fn run_mutants(
        &mut self,
        mutants: Vec<Mutant>,
        baseline: &BaselineOutcome,
        reporter: &dyn Reporter,
    ) -> Vec<Mutant> {
        let matching = effective_mode(self.config.coverage, baseline.coverage.as_ref());
        let timeout = self.mutant_timeout(baseline);

        let mut finished = Vec::with_capacity(mutants.len());
        let mut to_run = Vec::new();
        for mut mutant in mutants {
            if matching != CoverageMode::Off && mutant.covering_tests.is_empty() {
                mutant.status = MutantStatus::Survived;
                reporter.on_mutant_tested(&mutant);
                finished.push(mutant);
            } else {
                to_run.push(mutant);
            }
        }

        if !to_run.is_empty() {
            let pending = to_run.len();
            let (work_tx, work_rx) = mpsc::channel::<Mutant>();
            let work_rx = Mutex::new(work_rx);
            let (done_tx, done_rx) = mpsc::channel::<Mutant>();
            let (pool_tx, pool_rx) = mpsc::channel::<Sandbox>();
            for mutant in to_run {
                work_tx.send(mutant).expect("work queue open");
            }
            drop(work_tx);

            let factory = self.factory;
            let session = self.session.clone();
            let project_root = self.project_root.clone();
            let run_whole_suite = matching == CoverageMode::Off;

            thread::scope(|scope| {
                for mut sandbox in self.sandboxes.drain(..) {
                    let work_rx = &work_rx;
                    let done_tx = done_tx.clone();
                    let pool_tx = pool_tx.clone();
                    let session = session.clone();
                    let project_root = project_root.clone();
                    scope.spawn(move || {
                        loop {
                            let mutant = {
                                let rx = work_rx.lock().expect("work queue lock");
                                rx.recv()
                            };
                            let Ok(mut mutant) = mutant else { break };
                            // A failed recycle leaves the sandbox destroyed;
                            // nothing may run in its dirty copy.
                            if sandbox.state() == SandboxState::Destroyed {
                                mutant.status = MutantStatus::Error;
                            } else {
                                execute_one(
                                    &mut sandbox,
                                    &mut mutant,
                                    factory,
                                    timeout,
                                    run_whole_suite,
                                    &session,
                                    &project_root,
                                );
                            }
                            if done_tx.send(mutant).is_err() {
                                break;
                            }
                        }
                        let _ = pool_tx.send(sandbox);
                    });
                }
                drop(done_tx);
                drop(pool_tx);

                for mutant in done_rx.iter().take(pending) {
                    reporter.on_mutant_tested(&mutant);
                    finished.push(mutant);
                }
            });

            let mut recovered: Vec<Sandbox> = pool_rx.try_iter().collect();
            recovered.sort_by_key(|s| s.id);
            self.sandboxes = recovered;
        }

        finished.sort_by_key(|m| m.id);
        reporter.on_all_mutants_tested(&finished);
        finished
    }

    fn mutant_timeout(&self, baseline: &BaselineOutcome) -> Duration {
        let base = baseline.elapsed.as_millis() as f64 * self.config.timeout_multiplier;
        Duration::from_millis(base as u64 + self.config.timeout_overhead_ms)
    }

    pub fn shutdown(&mut self) {
        for sandbox in &mut self.sandboxes {
            sandbox.destroy();
        }
        self.sandboxes.clear();
    }
}

/// Run one mutant end-to-end in one sandbox: stage the mutated file, run the
/// matched subset, classify, restore. A panic inside the runner classifies
/// this mutant as Error and recycles the sandbox; sibling executions never
/// notice.
fn execute_one(
    sandbox: &mut Sandbox,
    mutant: &mut Mutant,
    factory: &dyn RunnerFactory,
    timeout: Duration,
    run_whole_suite: bool,
    session: &str,
    project_root: &Path,
) {
    sandbox.state = SandboxState::Running;
    let target = sandbox.path_of(&mutant.path);

    let staged = match StagedFile::stage(&target, &mutant.mutated_code) {
        Ok(staged) => staged,
        Err(_) => {
            mutant.status = MutantStatus::Error;
            sandbox.state = SandboxState::Idle;
            return;
        }
    };

    let subset: Option<&[String]> =
        if run_whole_suite { None } else { Some(&mutant.covering_tests) };
    let mut runner = factory.create(sandbox.root());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        runner.run(subset, Some(timeout), CoverageMode::Off)
    }));
    drop(staged);

    match outcome {
        Ok(outcome) => {
            mutant.status = classify(&outcome);
            sandbox.state = SandboxState::Idle;
        }
        Err(_) => {
            mutant.status = MutantStatus::Error;
            // The sandbox may hold arbitrary leftovers from the crashed run;
            // discard it and start the replacement from a clean copy.
            sandbox.destroy();
            if let Ok(fresh) = Sandbox::create(sandbox.id, session, project_root) {
                *sandbox = fresh;
            }
        }
    }
}

fn classify(outcome: &RunOutcome) -> MutantStatus {
    match outcome.status {
        RunStatus::Timeout => MutantStatus::TimedOut,
        RunStatus::Error => MutantStatus::Error,
        RunStatus::Complete => {
            if outcome.tests.iter().any(|t| t.status == TestStatus::Failed) {
                MutantStatus::Killed
            } else {
                MutantStatus::Survived
            }
        }
    }
}

fn failed_diagnostics(failed: &[&TestResult]) -> String {
    let mut message = String::from("one or more tests failed in the initial test run:");
    for test in failed {
        message.push_str(&format!("\n\t{}", test.id));
        for failure in &test.failure_messages {
            message.push_str(&format!("\n\t{failure}"));
        }
    }
    message
}

fn timeout_diagnostics(outcome: &RunOutcome) -> String {
    let mut message = String::from("initial test run timed out; tests run before the timeout:");
    for test in &outcome.tests {
        message.push_str(&format!("\n\t{}", test.id));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_skip_filters_vcs_and_build_dirs() {
        assert!(should_skip(".git"));
        assert!(should_skip("node_modules"));
        assert!(should_skip("target"));
        assert!(!should_skip("src"));
        assert!(!should_skip("package.json"));
    }

    #[test]
    fn staged_file_restores_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "original").unwrap();
        {
            let _staged = StagedFile::stage(&file, "mutated").unwrap();
            assert_eq!(fs::read_to_string(&file).unwrap(), "mutated");
        }
        assert_eq!(fs::read_to_string(&file).unwrap(), "original");
    }

    #[test]
    fn sandbox_copies_files_and_skips_git() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "var x = 1;").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref").unwrap();

        let sandbox = Sandbox::create(0, "test", dir.path()).unwrap();
        assert!(sandbox.path_of(&dir.path().join("a.js")).exists());
        assert!(!sandbox.root().join(".git").exists());
        assert_eq!(sandbox.state(), SandboxState::Idle);
    }

    #[test]
    fn path_of_maps_into_the_copy() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src").join("a.js"), "var x = 1;").unwrap();

        let sandbox = Sandbox::create(0, "test", dir.path()).unwrap();
        let mapped = sandbox.path_of(&dir.path().join("src").join("a.js"));
        assert_eq!(mapped, sandbox.root().join("src").join("a.js"));
        assert_eq!(fs::read_to_string(mapped).unwrap(), "var x = 1;");
    }
}
