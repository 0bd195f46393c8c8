//! testrun: a sequential runner for external test-case programs
//!
//! Cases are files in a case directory, described by a JSON profile. Each
//! case is resolved to a command line by its extension, spawned with a
//! fully specified environment, and supervised until it reaches exactly
//! one terminal outcome.
//!
//! # Profile
//!
//! ```json
//! {
//!   "env": { "PATH": "/usr/bin:/bin" },
//!   "cases": [
//!     { "name": "smoke.sh", "args": "--fast", "timeout": 60 },
//!     { "name": "stress.py", "env": { "ROUNDS": "10" } },
//!     { "name": "flaky.sh", "skip": "tracked upstream" }
//!   ]
//! }
//! ```
//!
//! # Outcomes
//!
//! | Event | Meaning |
//! |-------|---------|
//! | `Skipped` | Case marked `skip`; nothing looked up or spawned |
//! | `UnknownCase` | Name does not resolve to a runnable file |
//! | `Exited` | Child exited on its own |
//! | `TimedOut` | Deadline passed, child was sent SIGTERM |
//! | `Interrupted` | Operator interrupt (SIGINT) during the case |
//! | `SpawnOrRuntimeError` | Child could not be created or managed |

mod engine;
mod error;
mod interrupt;
mod profile;
mod report;
mod resolver;
mod runner;
mod state;

pub use engine::{CaseDescriptor, CaseRunner, RunOutcome};
pub use error::{Result, RunError};
pub use interrupt::Interrupt;
pub use profile::{CaseEntry, Profile, Skip, DEFAULT_SKIP_REASON};
pub use report::{ConsoleReporter, Event, EventLog, JsonReporter, Reporter};
pub use resolver::{InterpreterKind, Invocation, Resolution, Resolver};
pub use runner::{default_case_dir, Batch, RunnerBuilder, RunnerConfig};
pub use state::{RunnerStatus, StatusHandle};
