//! Case command resolution
//!
//! Maps a case file to the command line that runs it. Resolution only
//! looks at the filesystem to check that the file exists and is regular;
//! it never creates processes.

use std::fmt;
use std::path::Path;

/// How a case file is executed, chosen by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterKind {
    /// `.sh` / `.bash`: run the combined command string through `bash -c`
    ShellScript,
    /// `.py`: run the file with the configured Python interpreter
    PythonScript,
}

impl InterpreterKind {
    /// Map a file extension to an interpreter. Unknown extensions have no
    /// interpreter at all; there is no fallback.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sh") | Some("bash") => Some(Self::ShellScript),
            Some("py") => Some(Self::PythonScript),
            _ => None,
        }
    }
}

/// A resolved command line: program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// All tokens, program first.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.tokens().collect();
        write!(f, "{}", tokens.join(" "))
    }
}

/// Result of resolving a case file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Runnable(Invocation),
    Unresolvable,
}

/// Resolves case files to invocations.
#[derive(Debug, Clone)]
pub struct Resolver {
    python: String,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl Resolver {
    /// Create a resolver that launches Python cases with `python`.
    pub fn new(python: impl Into<String>) -> Self {
        Self { python: python.into() }
    }

    /// Resolve `path` as the file for case `name`, appending `args`
    /// verbatim to the command string.
    ///
    /// The last segment of `path` must equal `name` exactly, so a name
    /// carrying `..` or separators cannot point outside the case
    /// directory under a different identity.
    pub fn resolve(&self, path: &Path, name: &str, args: &str) -> Resolution {
        if path.file_name().and_then(|n| n.to_str()) != Some(name) {
            return Resolution::Unresolvable;
        }
        if !path.is_file() {
            return Resolution::Unresolvable;
        }
        let Some(kind) = InterpreterKind::from_path(path) else {
            return Resolution::Unresolvable;
        };

        let command = format!("{} {}", path.to_string_lossy(), args);
        let script = match kind {
            InterpreterKind::ShellScript => command,
            InterpreterKind::PythonScript => format!("{} {}", self.python, command),
        };

        Resolution::Runnable(Invocation {
            program: "bash".into(),
            args: vec!["-c".into(), script],
        })
    }
}
