//! A pair of policy stores, one per class, and the operations on them.

use gpm_admx::{Policy, PolicyClass};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::jobs::PolicyJob;
use crate::state::PolicyState;
use crate::store::{MemoryPolicySource, PolFile, PolicySource};
use crate::values::ElementValues;

/// A requested change to one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "values", rename_all = "camelCase")]
pub enum PolicyAction {
    Enable(ElementValues),
    Disable,
    NotConfigure,
}

pub struct PolicySession {
    machine: Box<dyn PolicySource>,
    user: Box<dyn PolicySource>,
    dry_run: bool,
}

impl PolicySession {
    pub fn new(machine: Box<dyn PolicySource>, user: Box<dyn PolicySource>, dry_run: bool) -> Self {
        Self { machine, user, dry_run }
    }

    /// Session over two `Registry.pol` files. Missing files start empty.
    pub fn open_pol_files(
        machine: impl Into<PathBuf>,
        user: impl Into<PathBuf>,
        dry_run: bool,
    ) -> EngineResult<Self> {
        Ok(Self::new(
            Box::new(PolFile::open(machine)?),
            Box::new(PolFile::open(user)?),
            dry_run,
        ))
    }

    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryPolicySource::new()),
            Box::new(MemoryPolicySource::new()),
            false,
        )
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn source(&self, class: PolicyClass) -> EngineResult<&dyn PolicySource> {
        match class {
            PolicyClass::Machine => Ok(self.machine.as_ref()),
            PolicyClass::User => Ok(self.user.as_ref()),
            PolicyClass::Both => Err(EngineError::InvalidClass),
        }
    }

    fn source_mut(&mut self, class: PolicyClass) -> EngineResult<&mut dyn PolicySource> {
        match class {
            PolicyClass::Machine => Ok(self.machine.as_mut()),
            PolicyClass::User => Ok(self.user.as_mut()),
            PolicyClass::Both => Err(EngineError::InvalidClass),
        }
    }

    fn with_job<R>(
        &mut self,
        policy: &Policy,
        class: PolicyClass,
        f: impl FnOnce(&PolicyJob<'_>, &mut GpoContext<'_>) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let job = PolicyJob::new(policy, class)?;
        let dry_run = self.dry_run;
        let mut ctx = GpoContext::new(self.source_mut(class)?, class, dry_run)?;
        f(&job, &mut ctx)
    }

    pub fn get_state(&mut self, policy: &Policy, class: PolicyClass) -> EngineResult<PolicyState> {
        self.with_job(policy, class, |job, ctx| job.state(ctx))
    }

    pub fn get_values(
        &mut self,
        policy: &Policy,
        class: PolicyClass,
    ) -> EngineResult<ElementValues> {
        self.with_job(policy, class, |job, ctx| job.values(ctx))
    }

    pub fn enable(
        &mut self,
        policy: &Policy,
        class: PolicyClass,
        values: &ElementValues,
    ) -> EngineResult<()> {
        self.with_job(policy, class, |job, ctx| job.enable(ctx, values))
    }

    pub fn disable(&mut self, policy: &Policy, class: PolicyClass) -> EngineResult<()> {
        self.with_job(policy, class, |job, ctx| job.disable(ctx))
    }

    pub fn not_configure(&mut self, policy: &Policy, class: PolicyClass) -> EngineResult<()> {
        self.with_job(policy, class, |job, ctx| job.not_configure(ctx))
    }

    pub fn apply(
        &mut self,
        policy: &Policy,
        class: PolicyClass,
        action: &PolicyAction,
    ) -> EngineResult<()> {
        match action {
            PolicyAction::Enable(values) => self.enable(policy, class, values),
            PolicyAction::Disable => self.disable(policy, class),
            PolicyAction::NotConfigure => self.not_configure(policy, class),
        }
    }

    /// Persist both stores. A dry run persists nothing.
    pub fn save(&mut self) -> EngineResult<()> {
        if self.dry_run {
            info!("Dry run: nothing saved");
            return Ok(());
        }
        self.machine.save()?;
        self.user.save()?;
        info!("Policy stores saved");
        Ok(())
    }

    /// Throw away unsaved changes in both stores.
    pub fn discard(&mut self) -> EngineResult<()> {
        self.machine.discard()?;
        self.user.discard()?;
        info!("Unsaved policy changes discarded");
        Ok(())
    }
}
