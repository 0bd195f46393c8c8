//! Batch profiles
//!
//! A profile is a flat JSON document:
//!
//! ```json
//! {
//!   "env": { "PATH": "/usr/bin:/bin" },
//!   "cases": [
//!     { "name": "boot.sh", "args": "--quick", "timeout": 30 },
//!     { "name": "dsp.py", "env": { "DSP": "1" } },
//!     { "name": "flaky.sh", "skip": "tracked upstream" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::engine::CaseDescriptor;
use crate::error::{Result, RunError};

/// Skip reason used when `skip` is set to anything but a string
pub const DEFAULT_SKIP_REASON: &str = "Skipped";

/// A batch as loaded from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Environment shared by every case
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub cases: Vec<CaseEntry>,
}

/// One entry of the `cases` list.
#[derive(Debug, Clone, Deserialize)]
pub struct CaseEntry {
    pub name: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub timeout: f64,
    /// Overrides on top of the profile-wide `env`
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub skip: Skip,
}

/// Value of a case's `skip` field. `false` (or absent) runs the case, a
/// string skips it with that reason, any other value skips it with
/// [`DEFAULT_SKIP_REASON`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Skip {
    #[default]
    Run,
    Skipped(String),
}

impl<'de> Deserialize<'de> for Skip {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Bool(false) => Skip::Run,
            serde_json::Value::String(reason) => Skip::Skipped(reason),
            _ => Skip::Skipped(DEFAULT_SKIP_REASON.to_string()),
        })
    }
}

impl Profile {
    /// Read and parse a profile file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| RunError::ProfileIo {
            path: path.to_path_buf(),
            source,
        })?;
        data.parse()
    }

    /// Build one descriptor per case, in order. Per-case `env` entries win
    /// over profile-wide ones.
    pub fn descriptors(&self) -> Vec<CaseDescriptor> {
        self.cases.iter().map(|entry| entry.descriptor(&self.env)).collect()
    }
}

impl FromStr for Profile {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl CaseEntry {
    fn descriptor(&self, global_env: &BTreeMap<String, String>) -> CaseDescriptor {
        let mut environment = global_env.clone();
        environment.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        let (skip, skip_reason) = match &self.skip {
            Skip::Run => (false, String::new()),
            Skip::Skipped(reason) => (true, reason.clone()),
        };

        CaseDescriptor {
            name: self.name.clone(),
            arguments: self.args.clone(),
            environment,
            timeout_seconds: self.timeout,
            skip,
            skip_reason,
        }
    }
}
