//! Batch driver: apply a list of policy commands in one session and save
//! once at the end.

use gpm_admx::{LgpPolicy, PolicyCatalog, PolicyClass};
use gpm_engine::{parse_command_line, ElementValues, PolicyAction, PolicySession, PolicyState};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{GpmError, GpmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchVerb {
    Enable,
    Disable,
    NotConfigure,
}

/// One entry of a batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommand {
    /// `prefix:name`
    pub policy: String,
    pub class: PolicyClass,
    pub action: BatchVerb,
    /// Element values in command-line form. Enabling without values uses
    /// the presentation defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub index: usize,
    pub policy: String,
    pub class: PolicyClass,
    /// State read back after the command, when it succeeded.
    pub state: Option<PolicyState>,
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    /// Commands never attempted because an earlier one failed.
    pub skipped: usize,
    pub saved: bool,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

pub fn load_batch(path: &Path) -> GpmResult<Vec<BatchCommand>> {
    let text = fs::read_to_string(path).map_err(|source| GpmError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| GpmError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a command against the catalog into an engine action.
pub fn resolve_action<'c>(
    catalog: &'c PolicyCatalog,
    command: &BatchCommand,
) -> GpmResult<(&'c LgpPolicy, PolicyAction)> {
    let entry = catalog
        .find_policy(&command.policy)
        .ok_or_else(|| GpmError::PolicyNotFound(command.policy.clone()))?;
    let action = match command.action {
        BatchVerb::Disable => PolicyAction::Disable,
        BatchVerb::NotConfigure => PolicyAction::NotConfigure,
        BatchVerb::Enable => PolicyAction::Enable(match &command.values {
            Some(line) => parse_command_line(&entry.policy, command.class, line)?,
            None => {
                ElementValues::defaults(&entry.policy, command.class, catalog.presentation(entry))
            }
        }),
    };
    Ok((entry, action))
}

fn run_one(
    session: &mut PolicySession,
    catalog: &PolicyCatalog,
    command: &BatchCommand,
) -> GpmResult<PolicyState> {
    let (entry, action) = resolve_action(catalog, command)?;
    session.apply(&entry.policy, command.class, &action)?;
    Ok(session.get_state(&entry.policy, command.class)?)
}

/// Run `commands` in order against one session.
///
/// With `stop_on_first_failure` the batch aborts at the first error and
/// every change it made is discarded; otherwise every command is attempted and the
/// successful ones are saved.
pub fn run_batch(
    session: &mut PolicySession,
    catalog: &PolicyCatalog,
    commands: &[BatchCommand],
    stop_on_first_failure: bool,
) -> GpmResult<BatchReport> {
    let mut outcomes = Vec::with_capacity(commands.len());
    for (index, command) in commands.iter().enumerate() {
        let outcome = match run_one(session, catalog, command) {
            Ok(state) => BatchOutcome {
                index,
                policy: command.policy.clone(),
                class: command.class,
                state: Some(state),
                error: None,
            },
            Err(e) => {
                warn!("Batch command {} ({}) failed: {}", index, command.policy, e);
                BatchOutcome {
                    index,
                    policy: command.policy.clone(),
                    class: command.class,
                    state: None,
                    error: Some(e.to_string()),
                }
            }
        };
        let failed = !outcome.succeeded();
        outcomes.push(outcome);
        if failed && stop_on_first_failure {
            break;
        }
    }

    let skipped = commands.len() - outcomes.len();
    let aborted = stop_on_first_failure && outcomes.iter().any(|o| !o.succeeded());
    let saved = !aborted;
    if saved {
        session.save()?;
    } else {
        session.discard()?;
    }
    let report = BatchReport {
        outcomes,
        skipped,
        saved,
    };
    info!(
        "Batch finished: {} commands, {} failed, {} skipped, saved={}",
        commands.len(),
        report.failures(),
        report.skipped,
        report.saved
    );
    Ok(report)
}
