use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::coverage::{CoverageMap, CoverageMode};

/// Outcome of one whole runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Complete,
    Error,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TestResult {
    pub id: String,
    pub status: TestStatus,
    pub failure_messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub tests: Vec<TestResult>,
    pub error_messages: Vec<String>,
    /// Captured only when the baseline asks for it and the runner supports
    /// the requested granularity.
    pub coverage: Option<CoverageMap>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn failed_tests(&self) -> impl Iterator<Item = &TestResult> {
        self.tests.iter().filter(|t| t.status == TestStatus::Failed)
    }
}

/// The test-runner adapter: a black box that executes a test subset inside
/// one sandbox and reports per-test verdicts. Implementations live outside
/// the engine core; the coordinator only consumes this protocol.
pub trait TestRunner: Send {
    /// Run `subset` (or the whole suite when `None`) under `timeout`.
    /// `coverage` asks the runner to capture execution intervals; a runner
    /// without that capability returns `coverage: None`.
    fn run(
        &mut self,
        subset: Option<&[String]>,
        timeout: Option<Duration>,
        coverage: CoverageMode,
    ) -> RunOutcome;
}

/// Creates one runner per sandbox, bound to that sandbox's private file copy.
pub trait RunnerFactory: Send + Sync {
    fn create(&self, sandbox_root: &Path) -> Box<dyn TestRunner>;
}

/// Process-spawning runner: executes a configured command in the sandbox and
/// maps its exit status to one synthetic test result. No per-test reporting
/// and no coverage capture, so matching degrades to `off`.
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandRunner {
    pub fn new(command: &str, working_dir: &Path) -> CommandRunner {
        let (program, args) = parse_test_cmd(command);
        CommandRunner { program, args, working_dir: working_dir.to_path_buf() }
    }
}

pub fn parse_test_cmd(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    match parts.split_first() {
        Some((program, rest)) => (program.to_string(), rest.iter().map(|s| s.to_string()).collect()),
        None => (cmd.to_string(), Vec::new()),
    }
}

/// Read a child pipe to completion on its own thread. A pipe left full blocks
/// the child on write, which would stall the poll loop below.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

impl TestRunner for CommandRunner {
    fn run(
        &mut self,
        _subset: Option<&[String]>,
        timeout: Option<Duration>,
        _coverage: CoverageMode,
    ) -> RunOutcome {
        let start = Instant::now();
        let child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome {
                    status: RunStatus::Error,
                    tests: Vec::new(),
                    error_messages: vec![format!("failed to run {}: {}", self.program, e)],
                    coverage: None,
                    elapsed: start.elapsed(),
                };
            }
        };

        let stdout_pipe = drain_pipe(child.stdout.take());
        let stderr_pipe = drain_pipe(child.stderr.take());

        loop {
            match child.try_wait() {
                Ok(Some(exit_status)) => {
                    let _ = stdout_pipe.join();
                    let stderr = stderr_pipe.join().unwrap_or_default();

                    let test = if exit_status.success() {
                        TestResult {
                            id: self.program.clone(),
                            status: TestStatus::Success,
                            failure_messages: Vec::new(),
                        }
                    } else {
                        TestResult {
                            id: self.program.clone(),
                            status: TestStatus::Failed,
                            failure_messages: vec![stderr],
                        }
                    };
                    return RunOutcome {
                        status: RunStatus::Complete,
                        tests: vec![test],
                        error_messages: Vec::new(),
                        coverage: None,
                        elapsed: start.elapsed(),
                    };
                }
                Ok(None) => {
                    if let Some(limit) = timeout {
                        if start.elapsed() > limit {
                            let _ = child.kill();
                            let _ = child.wait();
                            let _ = stdout_pipe.join();
                            let _ = stderr_pipe.join();
                            return RunOutcome {
                                status: RunStatus::Timeout,
                                tests: Vec::new(),
                                error_messages: Vec::new(),
                                coverage: None,
                                elapsed: start.elapsed(),
                            };
                        }
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    return RunOutcome {
                        status: RunStatus::Error,
                        tests: Vec::new(),
                        error_messages: vec![format!("failed to wait for {}: {}", self.program, e)],
                        coverage: None,
                        elapsed: start.elapsed(),
                    };
                }
            }
        }
    }
}

/// Factory for [`CommandRunner`]s, one per sandbox.
pub struct CommandRunnerFactory {
    command: String,
}

impl CommandRunnerFactory {
    pub fn new(command: &str) -> CommandRunnerFactory {
        CommandRunnerFactory { command: command.to_string() }
    }
}

impl RunnerFactory for CommandRunnerFactory {
    fn create(&self, sandbox_root: &Path) -> Box<dyn TestRunner> {
        Box::new(CommandRunner::new(&self.command, sandbox_root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_test_cmd_splits_program_and_args() {
        let (program, args) = parse_test_cmd("node --test suite.test.js");
        assert_eq!(program, "node");
        assert_eq!(args, vec!["--test", "suite.test.js"]);
    }

    #[test]
    fn parse_test_cmd_bare_program() {
        let (program, args) = parse_test_cmd("pytest");
        assert_eq!(program, "pytest");
        assert!(args.is_empty());
    }

    #[test]
    fn chatty_command_is_drained_and_completes() {
        // Writes well past the pipe buffer; without draining, the child
        // blocks on write and the poll loop never sees it exit.
        let dir = tempfile::TempDir::new().unwrap();
        let mut runner = CommandRunner::new("head -c 200000 /dev/zero", dir.path());
        let outcome = runner.run(None, Some(Duration::from_secs(2)), CoverageMode::Off);
        assert_eq!(outcome.status, RunStatus::Complete);
        assert_eq!(outcome.tests[0].status, TestStatus::Success);
    }

    #[test]
    fn slow_command_still_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut runner = CommandRunner::new("sleep 5", dir.path());
        let outcome = runner.run(None, Some(Duration::from_millis(100)), CoverageMode::Off);
        assert_eq!(outcome.status, RunStatus::Timeout);
    }
}
