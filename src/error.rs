use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal harness outcomes. Every variant ends the run with exit status 1.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The requested program is not in the catalogue. Raised before the
    /// device is touched; this is a harness configuration problem, not a
    /// device defect.
    #[error("unknown +prog option: {0}")]
    UnknownProgram(String),

    #[error("timeout waiting for done ({program}, {half_cycles} half-cycles)")]
    Timeout { program: String, half_cycles: u64 },

    #[error("{program}: {reason}")]
    Oracle { program: String, reason: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HarnessError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HarnessError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
