//! Reporting hooks
//!
//! The engine never prints. Everything a case run produces (skip notices,
//! unknown cases, the command about to run, raw output lines and the
//! terminal outcome) is delivered to a [`Reporter`]. Three implementations
//! ship with the crate:
//!
//! - [`ConsoleReporter`]: delimited text blocks on stderr, raw output on stdout
//! - [`JsonReporter`]: one JSON object per event, one per line
//! - [`EventLog`]: records events in memory

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::engine::RunOutcome;
use crate::resolver::Invocation;

const RULE: &str = "====================";

/// Receives the events of a batch, in order.
///
/// For a case that resolves and is not skipped the sequence is always
/// `before_run`, any number of `output_line`, exactly one `outcome`,
/// then `after_run`.
pub trait Reporter {
    /// A case was skipped without touching the filesystem
    fn skipped(&mut self, name: &str, reason: &str);

    /// A case name did not resolve to a runnable file
    fn unknown_case(&mut self, path: &Path);

    /// Called before any spawn attempt, dry runs included
    fn before_run(&mut self, invocation: &Invocation);

    /// One line of merged stdout/stderr, without its line terminator
    fn output_line(&mut self, line: &str);

    /// The terminal outcome of the case
    fn outcome(&mut self, outcome: &RunOutcome);

    /// Called after cleanup, on every path that called `before_run`
    fn after_run(&mut self, _invocation: &Invocation) {}
}

/// A structured reporting event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Skipped { name: String, reason: String },
    UnknownCase { path: PathBuf },
    BeforeRun { command: Vec<String> },
    Output { line: String },
    Outcome { outcome: RunOutcome },
    AfterRun { command: Vec<String> },
}

fn command_tokens(invocation: &Invocation) -> Vec<String> {
    invocation.tokens().map(str::to_string).collect()
}

// ──────────────────────────────────────────────────────────
// Console
// ──────────────────────────────────────────────────────────

/// Human-readable reporter.
pub struct ConsoleReporter<O: Write, E: Write> {
    out: O,
    err: E,
}

impl ConsoleReporter<std::io::Stdout, std::io::Stderr> {
    /// Report to the process stdout/stderr
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleReporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    /// Consume the reporter and hand back its writers
    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn block(&mut self, body: &[String]) {
        let _ = writeln!(self.err, "{}", RULE);
        for line in body {
            let _ = writeln!(self.err, "{}", line);
        }
        let _ = writeln!(self.err, "{}", RULE);
        let _ = self.err.flush();
    }
}

impl<O: Write, E: Write> Reporter for ConsoleReporter<O, E> {
    fn skipped(&mut self, name: &str, reason: &str) {
        self.block(&[format!("Skip {} : {}", name, reason)]);
    }

    fn unknown_case(&mut self, path: &Path) {
        self.block(&[format!("Unknown cases: {}", path.display())]);
    }

    fn before_run(&mut self, invocation: &Invocation) {
        self.block(&[format!("cmd: {}", invocation)]);
    }

    fn output_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    fn outcome(&mut self, outcome: &RunOutcome) {
        let body = match outcome {
            RunOutcome::Exited { code: 0 } => Vec::new(),
            RunOutcome::Exited { code } => vec![format!("Exit code: {}", code)],
            RunOutcome::TimedOut { after_seconds } => {
                vec![format!("Test timed out after {} seconds", after_seconds)]
            }
            RunOutcome::Interrupted { code } => {
                let mut body = vec!["Test has been interrupted!".to_string()];
                if let Some(code) = code.filter(|c| *c != 0) {
                    body.push(format!("Exit code: {}", code));
                }
                body
            }
            RunOutcome::SpawnOrRuntimeError { detail } => {
                vec![format!("Unknown exception: {}", detail)]
            }
        };
        self.block(&body);
    }
}

// ──────────────────────────────────────────────────────────
// JSON lines
// ──────────────────────────────────────────────────────────

/// Machine-readable reporter: every event is written as a single JSON
/// object followed by a newline.
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: Event) {
        if let Err(e) = serde_json::to_writer(&mut self.out, &event) {
            tracing::warn!(error = %e, "failed to write event");
            return;
        }
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn skipped(&mut self, name: &str, reason: &str) {
        self.emit(Event::Skipped { name: name.into(), reason: reason.into() });
    }

    fn unknown_case(&mut self, path: &Path) {
        self.emit(Event::UnknownCase { path: path.to_path_buf() });
    }

    fn before_run(&mut self, invocation: &Invocation) {
        self.emit(Event::BeforeRun { command: command_tokens(invocation) });
    }

    fn output_line(&mut self, line: &str) {
        self.emit(Event::Output { line: line.into() });
    }

    fn outcome(&mut self, outcome: &RunOutcome) {
        self.emit(Event::Outcome { outcome: outcome.clone() });
    }

    fn after_run(&mut self, invocation: &Invocation) {
        self.emit(Event::AfterRun { command: command_tokens(invocation) });
    }
}

// ──────────────────────────────────────────────────────────
// In-memory log
// ──────────────────────────────────────────────────────────

/// Records every event. Clones share the same log, so one clone can be
/// handed to a batch while another is inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Only the terminal outcomes, in order
    pub fn outcomes(&self) -> Vec<RunOutcome> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Outcome { outcome } => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Only the output lines, in order
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Output { line } => Some(line),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl Reporter for EventLog {
    fn skipped(&mut self, name: &str, reason: &str) {
        self.push(Event::Skipped { name: name.into(), reason: reason.into() });
    }

    fn unknown_case(&mut self, path: &Path) {
        self.push(Event::UnknownCase { path: path.to_path_buf() });
    }

    fn before_run(&mut self, invocation: &Invocation) {
        self.push(Event::BeforeRun { command: command_tokens(invocation) });
    }

    fn output_line(&mut self, line: &str) {
        self.push(Event::Output { line: line.into() });
    }

    fn outcome(&mut self, outcome: &RunOutcome) {
        self.push(Event::Outcome { outcome: outcome.clone() });
    }

    fn after_run(&mut self, invocation: &Invocation) {
        self.push(Event::AfterRun { command: command_tokens(invocation) });
    }
}
