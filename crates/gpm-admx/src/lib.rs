//! Group Policy definition (ADMX/ADML) parser and schema model.

pub mod adml;
pub mod admx;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod types;
pub mod values;
pub mod xml;

pub use catalog::{CategoryId, LgpCategory, LgpPolicy, PolicyCatalog, PolicyId};
pub use error::{AdmxError, AdmxResult};
pub use loader::{load_directory, reload_language, LoadFailure, LoadReport};
pub use types::*;
pub use values::{ValueBase, ValueItem};
