//! Local Group Policy editor: definition catalog, policy stores and the
//! batch driver, shared by the `gpm` binary and its tests.

pub mod batch;
pub mod error;
pub mod logging;
pub mod settings;
pub mod workspace;

pub use batch::{load_batch, run_batch, BatchCommand, BatchOutcome, BatchReport, BatchVerb};
pub use error::{GpmError, GpmResult};
pub use settings::Settings;
pub use workspace::{PolicyDetails, PolicySummary, Workspace};
