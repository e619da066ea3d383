//! Policy state and action engine.
//!
//! Reads and writes the registry footprint of parsed policies through a
//! [`PolicySource`], and classifies what it finds as Enabled, Disabled,
//! Not Configured or Suspect.

pub mod action;
pub mod apartment;
pub mod cmdline;
pub mod context;
pub mod error;
mod jobs;
pub mod session;
pub mod state;
pub mod store;
pub mod values;

pub use apartment::PolicyApartment;
pub use cmdline::{join_command_line, parse_command_line, split_command_line, to_command_line};
pub use context::GpoContext;
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use jobs::PolicyJob;
pub use session::{PolicyAction, PolicySession};
pub use state::PolicyState;
pub use store::{MemoryPolicySource, PolFile, PolicySource, RegistryData, RegistryValueKind};
pub use values::{ElementValue, ElementValues, ValueSource};
