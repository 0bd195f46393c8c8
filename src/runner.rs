//! Batch driver
//!
//! Runs a list of cases strictly one after another through a
//! [`CaseRunner`], keeping the runner status accurate for the whole batch.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{CaseDescriptor, CaseRunner};
use crate::error::{Result, RunError};
use crate::interrupt::Interrupt;
use crate::profile::Profile;
use crate::report::Reporter;
use crate::state::{StatusCell, StatusHandle};

/// Configuration shared by every case of a batch
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Directory holding the case files; also the children's working directory
    pub case_dir: PathBuf,
    /// Report what would run without creating any process
    pub dry_run: bool,
    /// How long a child gets to exit after SIGTERM
    pub grace_period: Duration,
    /// Granularity of deadline, interrupt and exit checks
    pub poll_interval: Duration,
    /// Interpreter for `.py` cases
    pub python: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            case_dir: default_case_dir(),
            dry_run: false,
            grace_period: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            python: "python3".into(),
        }
    }
}

/// `<install root>/test-case`, where the install root is the parent of the
/// directory holding the running executable.
pub fn default_case_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent()?.parent().map(|root| root.join("test-case")))
        .unwrap_or_else(|| PathBuf::from("test-case"))
}

/// Runs batches of cases.
pub struct Batch {
    runner: CaseRunner,
    status: StatusCell,
}

impl Batch {
    pub fn new(config: RunnerConfig, interrupt: Interrupt) -> Self {
        Self {
            runner: CaseRunner::new(config, interrupt),
            status: StatusCell::default(),
        }
    }

    /// Read-only view of the runner status
    pub fn status(&self) -> StatusHandle {
        self.status.handle()
    }

    pub fn case_runner(&self) -> &CaseRunner {
        &self.runner
    }

    /// Run every case in order. Case failures are reported, not returned;
    /// the only error is an interrupt that arrived while no case was
    /// running, which stops the remaining cases.
    pub fn run(&self, cases: &[CaseDescriptor], reporter: &mut dyn Reporter) -> Result<()> {
        let _running = self.status.enter();
        info!(
            cases = cases.len(),
            case_dir = %self.runner.config().case_dir.display(),
            dry_run = self.runner.config().dry_run,
            "batch started"
        );

        for case in cases {
            if self.runner.interrupt().take() {
                warn!(next = %case.name, "interrupted between cases, stopping batch");
                return Err(RunError::Interrupted);
            }
            self.runner.run_case(case, reporter);
        }

        info!("batch finished");
        Ok(())
    }

    /// Run the cases of a loaded profile
    pub fn run_profile(&self, profile: &Profile, reporter: &mut dyn Reporter) -> Result<()> {
        self.run(&profile.descriptors(), reporter)
    }
}

/// Builder API for convenient runner construction
pub struct RunnerBuilder {
    config: RunnerConfig,
    interrupt: Interrupt,
}

impl RunnerBuilder {
    /// Start building a runner for the given case directory
    pub fn new(case_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: RunnerConfig {
                case_dir: case_dir.into(),
                ..Default::default()
            },
            interrupt: Interrupt::new(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn grace_period(mut self, grace: Duration) -> Self {
        self.config.grace_period = grace;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn python(mut self, python: impl Into<String>) -> Self {
        self.config.python = python.into();
        self
    }

    /// Use `interrupt` instead of a private flag
    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn build(self) -> Batch {
        Batch::new(self.config, self.interrupt)
    }

    /// Build a bare single-case runner
    pub fn build_case_runner(self) -> CaseRunner {
        CaseRunner::new(self.config, self.interrupt)
    }
}
