use std::path::PathBuf;
use thiserror::Error;

/// Fatal session errors. Per-mutant failures (runner crashes, timeouts) are
/// not errors at this level; they are recorded on the mutant itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown mutator name or otherwise invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file marked for mutation could not be parsed. Aborts the whole run:
    /// partial mutant coverage across files would silently under-test.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The initial, unmutated test run did not complete cleanly. Kill/survive
    /// classification is meaningless against a broken suite.
    #[error("baseline test run failed:\n{diagnostics}")]
    Baseline { diagnostics: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
