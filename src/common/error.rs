use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration could not be read. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("{}:{line}: {message}", path.display())]
    Csv { path: PathBuf, line: usize, message: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
}
