//! Runner errors

use std::path::PathBuf;

/// Errors that can leave the library.
///
/// Per-case failures never show up here: the engine converts them into a
/// [`RunOutcome`](crate::RunOutcome) and keeps going. What remains are
/// driver-level failures and the internal faults the engine maps to
/// outcomes.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The profile file could not be read
    #[error("failed to read profile {}: {source}", path.display())]
    ProfileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profile is not valid JSON or does not match the expected shape
    #[error("invalid profile: {0}")]
    ProfileFormat(#[from] serde_json::Error),

    /// The child process could not be created
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while managing a running child
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A panic was caught inside a case run
    #[error("panic during case run: {0}")]
    Panic(String),

    /// An interrupt arrived while no case was running
    #[error("batch interrupted")]
    Interrupted,

    /// A mode that exists on the command line but has no implementation
    #[error("{0} mode is not implemented")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_spawn() {
        let err = RunError::Spawn {
            program: "bash".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to spawn 'bash': no such file");
    }

    #[test]
    fn display_unsupported() {
        assert_eq!(RunError::Unsupported("server").to_string(), "server mode is not implemented");
    }

    #[test]
    fn profile_format_from_serde() {
        let err: RunError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, RunError::ProfileFormat(_)));
        assert!(err.to_string().starts_with("invalid profile:"));
    }
}
