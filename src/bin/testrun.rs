//! testrun CLI
//!
//! Run the cases of a JSON profile one at a time.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use testrun::{ConsoleReporter, Interrupt, JsonReporter, Profile, Reporter, RunError, RunnerBuilder};

#[derive(Parser, Debug)]
#[command(name = "testrun")]
#[command(version)]
#[command(about = "A general test runner for external test-case programs")]
struct Cli {
    /// Profile file defining the test cases
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Port for server mode
    #[arg(short, long)]
    serve: Option<String>,

    /// Restore a previous run
    #[arg(long)]
    restore: bool,

    /// Don't run any tests, just show what will be done
    #[arg(long)]
    dry_run: bool,

    /// Directory holding the case files [default: <install root>/test-case]
    #[arg(long)]
    case_dir: Option<PathBuf>,

    /// Seconds a case gets to exit after being asked to stop
    #[arg(long, default_value_t = 10.0)]
    grace: f64,

    /// Interpreter for .py cases
    #[arg(long, default_value = "python3")]
    python: String,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Console)]
    format: Format,

    /// Verbose diagnostics on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Console,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.serve.is_some() {
        return Err(RunError::Unsupported("server").into());
    }
    if cli.restore {
        return Err(RunError::Unsupported("restore").into());
    }
    let Some(profile_path) = cli.profile else {
        return Ok(());
    };

    let grace = Duration::try_from_secs_f64(cli.grace)
        .with_context(|| format!("--grace must be a non-negative number of seconds, got {}", cli.grace))?;

    let profile = Profile::from_path(&profile_path)
        .with_context(|| format!("loading profile {}", profile_path.display()))?;

    let batch = RunnerBuilder::new(cli.case_dir.unwrap_or_else(testrun::default_case_dir))
        .dry_run(cli.dry_run)
        .grace_period(grace)
        .python(cli.python)
        .interrupt(Interrupt::install_sigint())
        .build();

    let mut reporter: Box<dyn Reporter> = match cli.format {
        Format::Console => Box::new(ConsoleReporter::stdio()),
        Format::Json => Box::new(JsonReporter::new(std::io::stdout())),
    };

    batch.run_profile(&profile, reporter.as_mut())?;
    Ok(())
}
