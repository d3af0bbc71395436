use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};

use mutiny::coverage::{CoverageMode, match_tests};
use mutiny::error::Error;
use mutiny::generate::generate_mutants;
use mutiny::mutators::MutatorRegistry;
use mutiny::output::{self, ConsoleReporter, RunSummary};
use mutiny::runner::CommandRunnerFactory;
use mutiny::sandbox::{CoordinatorConfig, SandboxCoordinator, find_project_root};

#[derive(Parser)]
#[command(name = "mutiny", version, about = "Coverage-guided mutation testing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation testing over one or more source files
    Run {
        /// Source files to mutate
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Test command executed inside each sandbox
        #[arg(long, default_value = "npm test")]
        test_cmd: String,
        /// Number of sandboxes running concurrently
        #[arg(short, long, default_value = "4")]
        concurrency: usize,
        /// Coverage analysis: off, all or perTest
        #[arg(long, default_value = "off")]
        coverage: String,
        /// Mutators to apply (default: all registered)
        #[arg(long)]
        mutators: Vec<String>,
        /// Timeout multiplier over the baseline duration
        #[arg(long, default_value = "3")]
        timeout_mult: f64,
        /// Fixed timeout overhead in milliseconds
        #[arg(long, default_value = "2000")]
        timeout_overhead: u64,
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Exit code only, no output
        #[arg(short, long)]
        quiet: bool,
    },
    /// List the registered mutators
    Mutators,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Run {
            files,
            test_cmd,
            concurrency,
            coverage,
            mutators,
            timeout_mult,
            timeout_overhead,
            json,
            quiet,
        } => cmd_run(
            files,
            test_cmd,
            concurrency,
            coverage,
            mutators,
            timeout_mult,
            timeout_overhead,
            json,
            quiet,
        ),
        Commands::Mutators => cmd_mutators(),
    };

    process::exit(exit_code);
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    files: Vec<PathBuf>,
    test_cmd: String,
    concurrency: usize,
    coverage: String,
    mutator_names: Vec<String>,
    timeout_mult: f64,
    timeout_overhead: u64,
    json_mode: bool,
    quiet: bool,
) -> i32 {
    let start = Instant::now();

    let coverage: CoverageMode = match coverage.parse() {
        Ok(mode) => mode,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };

    let registry = match build_registry(&mutator_names) {
        Ok(registry) => registry,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let files: Vec<PathBuf> = files
        .into_iter()
        .map(|f| if f.is_absolute() { f } else { cwd.join(f) })
        .collect();
    for file in &files {
        if !file.exists() {
            output::print_error(&format!(
                "source file not found: {}. Check the path and try again.",
                file.display()
            ));
            return 2;
        }
    }
    let display_file = files[0].clone();
    let project_root = find_project_root(&files[0]);

    let reporter = ConsoleReporter::new(!quiet && !json_mode);

    let sources = match mutiny::read_source_files(&files, &reporter) {
        Ok(sources) => sources,
        Err(e) => {
            output::print_error(&e.to_string());
            return 3;
        }
    };

    let mutants = match generate_mutants(&sources, &registry) {
        Ok(mutants) => mutants,
        Err(e) => {
            output::print_error(&e.to_string());
            return 3;
        }
    };
    if mutants.is_empty() {
        if !quiet {
            if json_mode {
                let summary = RunSummary::from_mutants(&[]);
                println!("{}", serde_json::to_string(&summary).expect("summary is serializable"));
            } else {
                output::print_success("No mutable code found.");
            }
        }
        return 0;
    }

    let config = CoordinatorConfig {
        concurrency,
        coverage,
        timeout_multiplier: timeout_mult,
        timeout_overhead_ms: timeout_overhead,
    };
    let factory = CommandRunnerFactory::new(&test_cmd);
    let mut coordinator = match SandboxCoordinator::new(&project_root, config, &factory) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            output::print_error(&format!("failed to set up sandboxes: {e}"));
            return 3;
        }
    };

    let baseline = match coordinator.initial_run() {
        Ok(baseline) => baseline,
        Err(e) => {
            output::print_error(&format!("{e}\nFix failing tests first."));
            return 3;
        }
    };

    let mut mutants = mutants;
    match_tests(&mut mutants, coverage, baseline.coverage.as_ref(), &baseline.test_ids());

    let finished = coordinator.run_mutants(mutants, &baseline, &reporter);
    coordinator.shutdown();

    let summary = RunSummary::from_mutants(&finished);
    if quiet {
        return if summary.survived > 0 { 1 } else { 0 };
    }
    if json_mode {
        println!("{}", serde_json::to_string(&summary).expect("summary is serializable"));
    } else {
        output::print_summary(&summary, &display_file, start.elapsed().as_secs_f64());
    }

    if summary.survived > 0 { 1 } else { 0 }
}

/// Build the registry from `--mutators` names, or all defaults when none are
/// given. Unknown names fail before anything runs.
fn build_registry(names: &[String]) -> Result<MutatorRegistry, Error> {
    let defaults = MutatorRegistry::with_defaults();
    if names.is_empty() {
        return Ok(defaults);
    }
    let mut registry = MutatorRegistry::new();
    for name in names {
        registry.register(name, defaults.create(name)?);
    }
    Ok(registry)
}

fn cmd_mutators() -> i32 {
    let registry = MutatorRegistry::with_defaults();
    for name in registry.known_names() {
        println!("{name}");
    }
    0
}
