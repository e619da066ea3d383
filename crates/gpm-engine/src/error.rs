//! Engine error types.

use gpm_admx::PolicyClass;
use std::path::PathBuf;

/// Failures of the underlying policy store. Propagated as-is, never retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt policy file {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },
    #[error("registry key not found: {0}")]
    KeyNotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Invariant violations raised by the engine.
///
/// Ambiguous registry contents are not errors; they surface as
/// `PolicyState::Suspect`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("policy class Both must be narrowed to Machine or User")]
    InvalidClass,
    #[error("policy {policy} does not apply to the {class} class")]
    ClassNotApplicable { policy: String, class: PolicyClass },
    #[error("element '{element}' of {policy} requires a value")]
    MissingElementValue { policy: String, element: String },
    #[error("element '{element}' expects a {expected} value")]
    WrongValueType { element: String, expected: &'static str },
    #[error("value for element '{element}' is out of range: {detail}")]
    OutOfRange { element: String, detail: String },
    #[error("registry key not found: {0}")]
    KeyNotFound(String),
    #[error("registry key {0} has subkeys")]
    KeyHasSubkeys(String),
    #[error("registry key {0} is not open for writing")]
    KeyNotWritable(String),
    #[error("set action on {key}\\{name} carries no value")]
    MissingValue { key: String, name: String },
    #[error("policy has no element '{0}'")]
    UnknownElement(String),
    #[error("invalid command-line token '{token}': {detail}")]
    InvalidToken { token: String, detail: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("policy session thread is not running")]
    SessionClosed,
    #[error("failed to start policy session thread: {0}")]
    SessionStart(#[source] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) fn out_of_range(element: &str, detail: impl Into<String>) -> Self {
        Self::OutOfRange {
            element: element.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn wrong_type(element: &str, expected: &'static str) -> Self {
        Self::WrongValueType {
            element: element.to_string(),
            expected,
        }
    }

    pub(crate) fn invalid_token(token: &str, detail: impl Into<String>) -> Self {
        Self::InvalidToken {
            token: token.to_string(),
            detail: detail.into(),
        }
    }
}
