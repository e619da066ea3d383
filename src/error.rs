use std::path::PathBuf;

use gpm_admx::AdmxError;
use gpm_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum GpmError {
    #[error(transparent)]
    Admx(#[from] AdmxError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no policy named '{0}'")]
    PolicyNotFound(String),
    #[error("failed to install log subscriber: {0}")]
    Logging(String),
    #[error("{failed} of {total} batch commands failed")]
    BatchFailed { failed: usize, total: usize },
}

pub type GpmResult<T> = Result<T, GpmError>;
