//! Case execution engine
//!
//! Runs one case to completion: resolve, spawn, stream the merged output,
//! race the deadline and operator interrupts, then report exactly one
//! terminal outcome. All failures are reported, never returned.
//!
//! A single control loop owns the child, the deadline and the interrupt
//! check. The only other thread per case is the line reader, which
//! forwards lines over a channel. Because no other party can conclude the
//! run, at most one terminal outcome exists per case, and the deadline
//! stops mattering the moment the loop exits.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, PipeReader};
use std::os::unix::process::ExitStatusExt;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Child, Command, ExitStatus};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, RunError};
use crate::interrupt::Interrupt;
use crate::report::Reporter;
use crate::resolver::{Invocation, Resolution, Resolver};
use crate::runner::RunnerConfig;

/// One case of a batch. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseDescriptor {
    /// File name inside the case directory
    pub name: String,
    /// Appended verbatim to the command string
    pub arguments: String,
    /// Complete environment of the child
    pub environment: BTreeMap<String, String>,
    /// `0` or non-finite means no timeout
    pub timeout_seconds: f64,
    pub skip: bool,
    pub skip_reason: String,
}

impl CaseDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: String::new(),
            environment: BTreeMap::new(),
            timeout_seconds: 0.0,
            skip: false,
            skip_reason: String::new(),
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.arguments = args.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn skipped(mut self, reason: impl Into<String>) -> Self {
        self.skip = true;
        self.skip_reason = reason.into();
        self
    }

    /// The effective timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds.is_finite() && self.timeout_seconds > 0.0 {
            Duration::try_from_secs_f64(self.timeout_seconds).ok()
        } else {
            None
        }
    }
}

/// Terminal outcome of a case that resolved and was not skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The child exited on its own. Signal deaths are reported as the
    /// negated signal number.
    Exited { code: i32 },
    /// The deadline passed while the child was alive
    TimedOut { after_seconds: f64 },
    /// An operator interrupt arrived; `code` is `None` when the child did
    /// not exit within the grace period
    Interrupted { code: Option<i32> },
    /// The child could not be created, or managing it failed
    SpawnOrRuntimeError { detail: String },
}

/// Executes single cases.
pub struct CaseRunner {
    config: RunnerConfig,
    resolver: Resolver,
    interrupt: Interrupt,
}

impl CaseRunner {
    pub fn new(config: RunnerConfig, interrupt: Interrupt) -> Self {
        let resolver = Resolver::new(config.python.clone());
        Self { config, resolver, interrupt }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Run one case, reporting everything through `reporter`.
    pub fn run_case(&self, case: &CaseDescriptor, reporter: &mut dyn Reporter) {
        if case.skip {
            debug!(case = %case.name, reason = %case.skip_reason, "skipping case");
            reporter.skipped(&case.name, &case.skip_reason);
            return;
        }

        let path = self.config.case_dir.join(&case.name);
        let invocation = match self.resolver.resolve(&path, &case.name, &case.arguments) {
            Resolution::Runnable(invocation) => invocation,
            Resolution::Unresolvable => {
                debug!(case = %case.name, path = %path.display(), "case did not resolve");
                reporter.unknown_case(&path);
                return;
            }
        };

        self.run_resolved(case, &invocation, reporter);
    }

    fn run_resolved(&self, case: &CaseDescriptor, invocation: &Invocation, reporter: &mut dyn Reporter) {
        reporter.before_run(invocation);

        if self.config.dry_run {
            reporter.outcome(&RunOutcome::Exited { code: 0 });
            reporter.after_run(invocation);
            return;
        }

        let mut child: Option<ChildGuard> = None;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(case, invocation, reporter, &mut child)
        })) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => RunOutcome::SpawnOrRuntimeError { detail: e.to_string() },
            Err(payload) => RunOutcome::SpawnOrRuntimeError {
                detail: RunError::Panic(panic_message(payload.as_ref())).to_string(),
            },
        };

        reporter.outcome(&outcome);
        // Reap (or hand off) whatever is left of the child before the
        // post-run hook.
        drop(child.take());
        reporter.after_run(invocation);
    }

    /// Spawn and supervise the child. The live child is parked in `slot`
    /// so the caller can emit the outcome before cleanup waits on it.
    fn execute(
        &self,
        case: &CaseDescriptor,
        invocation: &Invocation,
        reporter: &mut dyn Reporter,
        slot: &mut Option<ChildGuard>,
    ) -> Result<RunOutcome> {
        let (reader, writer) = io::pipe()?;

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .env_clear()
            .envs(&case.environment)
            .current_dir(&self.config.case_dir)
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let spawned = command.spawn().map_err(|source| RunError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        // `command` still holds the write ends; the reader only sees EOF
        // once every copy is closed.
        drop(command);

        debug!(case = %case.name, pid = spawned.id(), "spawned case");
        let guard = slot.insert(ChildGuard::new(spawned, self.config.grace_period, self.config.poll_interval));
        let lines = spawn_reader(reader);

        let deadline = case.timeout().and_then(|t| {
            let deadline = Instant::now().checked_add(t);
            match deadline {
                Some(_) => debug!(case = %case.name, timeout = ?t, "deadline armed"),
                None => debug!(case = %case.name, timeout = ?t, "timeout beyond clock range, no deadline"),
            }
            deadline
        });

        let tick = self.config.poll_interval;
        let mut stream_open = true;

        let status = loop {
            if self.interrupt.take() {
                info!(case = %case.name, "interrupt received");
                debug!(case = %case.name, "leaving output reader behind");
                return interrupted(guard);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline && guard.try_wait()?.is_none() {
                    info!(case = %case.name, after = case.timeout_seconds, "case timed out");
                    guard.terminate()?;
                    debug!(case = %case.name, "leaving output reader behind");
                    return Ok(RunOutcome::TimedOut { after_seconds: case.timeout_seconds });
                }
            }

            if stream_open {
                let wait = match deadline {
                    Some(d) => tick.min(d.saturating_duration_since(Instant::now())),
                    None => tick,
                };
                match lines.recv_timeout(wait) {
                    Ok(line) => reporter.output_line(&line?),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stream_open = false,
                }
            } else if let Some(status) = guard.try_wait()? {
                break status;
            } else {
                thread::sleep(tick);
            }
        };

        debug!(case = %case.name, ?status, "case exited");
        Ok(RunOutcome::Exited { code: exit_code(status) })
    }
}

fn interrupted(guard: &mut ChildGuard) -> Result<RunOutcome> {
    guard.terminate()?;
    match guard.wait_for_exit()? {
        Some(status) => Ok(RunOutcome::Interrupted { code: Some(exit_code(status)) }),
        None => {
            warn!(pid = guard.pid(), "child still running after grace period");
            guard.detach();
            Ok(RunOutcome::Interrupted { code: None })
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| status.signal().map_or(-1, |signal| -signal))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Forward lines of `reader` over a channel until EOF or until the
/// receiving side goes away. Invalid UTF-8 is replaced, not rejected.
fn spawn_reader(reader: PipeReader) -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(Ok(line)).is_err() {
                        debug!("output reader abandoned, discarding remaining output");
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

// ──────────────────────────────────────────────────────────
// ChildGuard — exclusive owner of a running case process
// ──────────────────────────────────────────────────────────

/// Owns the child for one run. Dropping the guard terminates a child that
/// is still alive, waits out the grace period, and hands anything left
/// to a reaper thread so the runner never blocks indefinitely.
struct ChildGuard {
    child: Option<Child>,
    terminated: bool,
    grace: Duration,
    tick: Duration,
}

impl ChildGuard {
    fn new(child: Child, grace: Duration, tick: Duration) -> Self {
        Self { child: Some(child), terminated: false, grace, tick }
    }

    fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }

    /// Ask the child to stop with SIGTERM. A no-op when it already exited,
    /// was already asked, or was handed off.
    fn terminate(&mut self) -> io::Result<()> {
        if self.terminated || self.try_wait()?.is_some() {
            return Ok(());
        }
        let Some(pid) = self.pid() else {
            return Ok(());
        };
        debug!(pid, "sending SIGTERM");
        // SAFETY: the child has not been reaped, so its pid cannot have
        // been reused by another process.
        if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                return Err(err);
            }
        }
        self.terminated = true;
        Ok(())
    }

    /// Poll for exit for at most the grace period.
    fn wait_for_exit(&mut self) -> io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() >= self.grace {
                return Ok(None);
            }
            thread::sleep(self.tick.min(self.grace.saturating_sub(start.elapsed())));
        }
    }

    /// Give up ownership; a background thread reaps the child whenever it
    /// finally exits. The output reader thread of the case stays blocked
    /// until the last holder of the pipe's write end (the child or one of
    /// its descendants) closes it.
    fn detach(&mut self) {
        if let Some(mut child) = self.child.take() {
            debug!(pid = child.id(), "handing child to reaper");
            thread::spawn(move || {
                let _ = child.wait();
            });
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        match self.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if self.child.is_some() => {}
            _ => {
                self.detach();
                return;
            }
        }
        if let Err(e) = self.terminate() {
            warn!(error = %e, "failed to terminate child");
        }
        match self.wait_for_exit() {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(pid = self.pid(), "child ignored SIGTERM for the grace period");
                self.detach();
            }
            Err(e) => {
                warn!(error = %e, "failed to wait for child");
                self.detach();
            }
        }
    }
}
