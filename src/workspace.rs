//! Loaded definitions plus an open policy session: what every subcommand
//! works against.

use gpm_admx::{load_directory, CategoryId, LgpPolicy, PolicyCatalog, PolicyClass};
use gpm_engine::{
    parse_command_line, to_command_line, ElementValues, PolicyAction, PolicyApartment,
    PolicySession, PolicyState,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::{run_batch, BatchCommand, BatchReport};
use crate::error::{GpmError, GpmResult};
use crate::settings::Settings;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub unique_id: String,
    pub display_name: String,
    pub class: PolicyClass,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub id: String,
    pub kind: &'static str,
    pub registry_key: String,
    pub value_name: String,
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDetails {
    pub unique_id: String,
    pub display_name: String,
    pub explain_text: Option<String>,
    pub class: PolicyClass,
    pub category_path: Vec<String>,
    pub supported_on: Option<String>,
    pub registry_key: String,
    pub value_name: Option<String>,
    pub elements: Vec<ElementSummary>,
}

pub struct Workspace {
    settings: Settings,
    catalog: Arc<PolicyCatalog>,
    apartment: PolicyApartment,
}

impl Workspace {
    /// Load definitions and open the `Registry.pol` pair from `settings`.
    pub async fn open(settings: Settings) -> GpmResult<Self> {
        let report = load_directory(&settings.definitions_dir, &settings.language).await?;
        for failure in &report.failures {
            warn!("{}: {}", failure.path.display(), failure.error);
        }
        info!(
            "Loaded {} policies from {}",
            report.catalog.policies().count(),
            settings.definitions_dir.display()
        );

        let machine = settings.machine_pol.clone();
        let user = settings.user_pol.clone();
        let dry_run = settings.dry_run;
        let apartment = PolicyApartment::start(move || {
            PolicySession::open_pol_files(machine, user, dry_run)
        })
        .await?;
        Ok(Self::with_parts(settings, report.catalog, apartment))
    }

    pub fn with_parts(
        settings: Settings,
        catalog: PolicyCatalog,
        apartment: PolicyApartment,
    ) -> Self {
        Self {
            settings,
            catalog: Arc::new(catalog),
            apartment,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &PolicyCatalog {
        &self.catalog
    }

    fn find(&self, id: &str) -> GpmResult<&LgpPolicy> {
        self.catalog
            .find_policy(id)
            .ok_or_else(|| GpmError::PolicyNotFound(id.to_string()))
    }

    fn category_path(&self, mut id: CategoryId) -> Vec<String> {
        let mut path = Vec::new();
        while let Some(cat) = self.catalog.category(id) {
            let Some(parent) = cat.parent else { break };
            path.push(self.catalog.category_display_name(id));
            id = parent;
        }
        path.reverse();
        path
    }

    /// Policies whose id or display name contains `filter`, optionally
    /// restricted to those applying to `class`.
    pub fn list(&self, filter: Option<&str>, class: Option<PolicyClass>) -> Vec<PolicySummary> {
        let needle = filter.map(str::to_lowercase);
        let mut out: Vec<PolicySummary> = self
            .catalog
            .policies()
            .filter(|p| class.map_or(true, |c| p.policy.class.applies_to(c)))
            .map(|p| PolicySummary {
                unique_id: p.unique_id.clone(),
                display_name: self.catalog.display_name(p),
                class: p.policy.class,
                category: self.catalog.category_display_name(p.category),
            })
            .filter(|s| {
                needle.as_deref().map_or(true, |n| {
                    s.unique_id.to_lowercase().contains(n)
                        || s.display_name.to_lowercase().contains(n)
                })
            })
            .collect();
        out.sort_by(|a, b| a.unique_id.cmp(&b.unique_id));
        out
    }

    pub fn show(&self, id: &str) -> GpmResult<PolicyDetails> {
        let entry = self.find(id)?;
        let policy = &entry.policy;
        Ok(PolicyDetails {
            unique_id: entry.unique_id.clone(),
            display_name: self.catalog.display_name(entry),
            explain_text: self.catalog.explain_text(entry),
            class: policy.class,
            category_path: self.category_path(entry.category),
            supported_on: self.catalog.supported_on_display(entry),
            registry_key: policy.registry_key.clone(),
            value_name: policy.value_name.clone(),
            elements: policy
                .elements
                .iter()
                .map(|e| ElementSummary {
                    id: e.id.clone(),
                    kind: e.kind_name(),
                    registry_key: e.resolved_key(policy).to_string(),
                    value_name: e.resolved_value_name(policy).to_string(),
                    optional: e.is_optional(),
                })
                .collect(),
        })
    }

    /// The classes to operate on: the requested one, or every class the
    /// policy applies to.
    fn classes(&self, entry: &LgpPolicy, requested: Option<PolicyClass>) -> Vec<PolicyClass> {
        match requested {
            Some(class) => vec![class],
            None => [PolicyClass::Machine, PolicyClass::User]
                .into_iter()
                .filter(|c| entry.policy.class.applies_to(*c))
                .collect(),
        }
    }

    pub async fn state(
        &self,
        id: &str,
        class: Option<PolicyClass>,
    ) -> GpmResult<Vec<(PolicyClass, PolicyState)>> {
        let entry = self.find(id)?;
        let classes = self.classes(entry, class);
        let policy = entry.policy.clone();
        let states: Vec<(PolicyClass, PolicyState)> = self
            .apartment
            .run(move |s| {
                classes
                    .into_iter()
                    .map(|c| s.get_state(&policy, c).map(|state| (c, state)))
                    .collect()
            })
            .await?;
        Ok(states)
    }

    /// Current element values of the policy in command-line form.
    pub async fn values(&self, id: &str, class: PolicyClass) -> GpmResult<String> {
        let entry = self.find(id)?;
        let policy = entry.policy.clone();
        let values = self.apartment.run(move |s| s.get_values(&policy, class)).await?;
        Ok(to_command_line(&entry.policy, &values))
    }

    async fn apply(
        &self,
        id: &str,
        class: PolicyClass,
        action: PolicyAction,
    ) -> GpmResult<PolicyState> {
        let policy = self.find(id)?.policy.clone();
        let state = self
            .apartment
            .run(move |s| {
                s.apply(&policy, class, &action)?;
                s.save()?;
                s.get_state(&policy, class)
            })
            .await?;
        Ok(state)
    }

    /// Enable with values in command-line form, or the presentation
    /// defaults when `values` is `None`.
    pub async fn enable(
        &self,
        id: &str,
        class: PolicyClass,
        values: Option<&str>,
    ) -> GpmResult<PolicyState> {
        let entry = self.find(id)?;
        let values = match values {
            Some(line) => parse_command_line(&entry.policy, class, line)?,
            None => ElementValues::defaults(&entry.policy, class, self.catalog.presentation(entry)),
        };
        self.apply(id, class, PolicyAction::Enable(values)).await
    }

    pub async fn disable(&self, id: &str, class: PolicyClass) -> GpmResult<PolicyState> {
        self.apply(id, class, PolicyAction::Disable).await
    }

    pub async fn not_configure(&self, id: &str, class: PolicyClass) -> GpmResult<PolicyState> {
        self.apply(id, class, PolicyAction::NotConfigure).await
    }

    pub async fn batch(&self, commands: Vec<BatchCommand>) -> GpmResult<BatchReport> {
        let catalog = Arc::clone(&self.catalog);
        let stop = self.settings.stop_on_first_failure;
        self.apartment
            .run(move |s| Ok(run_batch(s, &catalog, &commands, stop)))
            .await?
    }

    /// Stop the session thread without blocking the runtime.
    pub async fn close(self) -> GpmResult<()> {
        self.apartment.shutdown().await?;
        Ok(())
    }
}
