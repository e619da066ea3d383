//! Error types for definition parsing and loading.

use std::path::PathBuf;

/// Everything that can go wrong while reading one ADMX/ADML content unit.
///
/// These are schema defects: they are fatal for the unit being parsed but
/// never for its siblings. Dangling category references are not errors at
/// all; the catalog rehomes them.
#[derive(Debug, thiserror::Error)]
pub enum AdmxError {
    /// File could not be read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Malformed XML.
    #[error("XML parse error: {0}")]
    Xml(String),
    /// A required attribute is absent.
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },
    /// A required child element is absent.
    #[error("<{element}> is missing required child <{child}>")]
    MissingElement { element: String, child: String },
    /// An attribute or value union could not be interpreted.
    #[error("invalid value in <{element}>: {detail}")]
    InvalidValue { element: String, detail: String },
    /// The document root is not what the file extension promised.
    #[error("unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot { expected: String, found: String },
    /// A background parse task failed to complete.
    #[error("parse task failed: {0}")]
    Task(String),
}

pub type AdmxResult<T> = Result<T, AdmxError>;

impl AdmxError {
    pub(crate) fn missing_attr(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid(element: &str, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            element: element.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<quick_xml::Error> for AdmxError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for AdmxError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(e.to_string())
    }
}
