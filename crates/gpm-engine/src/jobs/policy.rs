use gpm_admx::{Policy, PolicyClass, ValueItem};
use log::{debug, info};

use super::AnyElementJob;
use crate::action::{
    apply, clear_slots, compile_all, evaluate, not_configured_probes, PolicyValueAction,
    PolicyValueDeleteType, Quantifier,
};
use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::state::{classify, combine, only, PolicyState};
use crate::values::{validate, ElementValues, ValueSource};

/// State and mutations of one policy in one class.
///
/// Every mutation starts from a clean slate: the policy's full footprint is
/// cleared before the new state is written.
pub struct PolicyJob<'p> {
    policy: &'p Policy,
    class: PolicyClass,
    elements: Vec<AnyElementJob<'p>>,
}

impl<'p> PolicyJob<'p> {
    pub fn new(policy: &'p Policy, class: PolicyClass) -> EngineResult<Self> {
        if class == PolicyClass::Both {
            return Err(EngineError::InvalidClass);
        }
        if !policy.class.applies_to(class) {
            return Err(EngineError::ClassNotApplicable {
                policy: policy.unique_id(),
                class,
            });
        }
        Ok(Self {
            policy,
            class,
            elements: policy.elements.iter().map(|e| AnyElementJob::new(policy, e)).collect(),
        })
    }

    pub fn policy(&self) -> &'p Policy {
        self.policy
    }

    pub fn class(&self) -> PolicyClass {
        self.class
    }

    fn check_context(&self, ctx: &GpoContext<'_>) -> EngineResult<()> {
        if ctx.class() != self.class {
            return Err(EngineError::ClassNotApplicable {
                policy: self.policy.unique_id(),
                class: ctx.class(),
            });
        }
        Ok(())
    }

    fn all_items(&self) -> Vec<ValueItem> {
        self.policy
            .enabled_list
            .iter()
            .chain(&self.policy.disabled_list)
            .cloned()
            .collect()
    }

    fn write_items(&self, items: &[ValueItem], ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(
            &compile_all(items, PolicyValueAction::SetValue, PolicyValueDeleteType::Value),
            ctx,
        )
    }

    /// `All` over a non-empty list; an empty list never matches.
    fn items_present(&self, items: &[ValueItem], ctx: &mut GpoContext<'_>) -> EngineResult<bool> {
        if items.is_empty() {
            return Ok(false);
        }
        evaluate(
            &compile_all(items, PolicyValueAction::ValueShouldExist, PolicyValueDeleteType::Value),
            Quantifier::All,
            ctx,
        )
    }

    /// Validate `values`, clear the footprint, then write the enabled list
    /// and every element.
    pub fn enable(&self, ctx: &mut GpoContext<'_>, values: &ElementValues) -> EngineResult<()> {
        self.check_context(ctx)?;
        if let Some(element) = values.first_missing(self.policy) {
            return Err(EngineError::MissingElementValue {
                policy: self.policy.unique_id(),
                element: element.id.clone(),
            });
        }
        for element in &self.policy.elements {
            if let Some(value) = values.get(&element.id) {
                validate(element, value)?;
            }
        }

        info!("Enabling {} ({})", self.policy.unique_id(), self.class);
        self.clear(ctx)?;
        self.write_items(&self.policy.enabled_list, ctx)?;
        for job in &self.elements {
            job.job().enable(ctx, values.get(job.id()))?;
        }
        Ok(())
    }

    pub fn disable(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        self.check_context(ctx)?;
        info!("Disabling {} ({})", self.policy.unique_id(), self.class);
        self.clear(ctx)?;
        self.write_items(&self.policy.disabled_list, ctx)?;
        for job in &self.elements {
            job.job().disable(ctx)?;
        }
        Ok(())
    }

    pub fn not_configure(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        self.check_context(ctx)?;
        info!("Resetting {} ({}) to not configured", self.policy.unique_id(), self.class);
        self.clear(ctx)
    }

    fn clear(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(&clear_slots(&self.all_items()), ctx)?;
        for job in &self.elements {
            job.job().not_configured(ctx)?;
        }
        Ok(())
    }

    /// Verdict of the policy's own enabled and disabled lists.
    fn items_state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<PolicyState>> {
        if !self.policy.has_simple_items() {
            return Ok(None);
        }
        let enabled = self.items_present(&self.policy.enabled_list, ctx)?;
        let disabled = self.items_present(&self.policy.disabled_list, ctx)?;
        let clean = evaluate(&not_configured_probes(&self.all_items()), Quantifier::All, ctx)?;
        Ok(Some(classify(enabled, disabled, clean)))
    }

    pub fn state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<PolicyState> {
        self.check_context(ctx)?;
        let items = self.items_state(ctx)?;
        let mut element_states = Vec::with_capacity(self.elements.len());
        for job in &self.elements {
            let states = job.job().state(ctx)?;
            debug!("{}.{} -> {:?}", self.policy.unique_id(), job.id(), states);
            element_states.push(states);
        }

        // An optional element left blank has no footprint of its own.
        let blank = only(PolicyState::NotConfigured);
        let configured = items.is_some_and(|s| s != PolicyState::NotConfigured)
            || element_states.iter().any(|s| *s != blank);
        if configured {
            element_states = self
                .elements
                .iter()
                .zip(element_states)
                .filter(|(job, states)| !(job.is_optional() && *states == blank))
                .map(|(_, states)| states)
                .collect();
        }

        let state = combine(items, &element_states);
        debug!("{} ({}) items={:?} -> {}", self.policy.unique_id(), self.class, items, state);
        Ok(state)
    }

    /// Element values currently stored. Elements whose footprint does not
    /// decode are left empty.
    pub fn values(&self, ctx: &mut GpoContext<'_>) -> EngineResult<ElementValues> {
        self.check_context(ctx)?;
        let mut values = ElementValues::new(self.policy, self.class, ValueSource::CurrentOnSystem);
        for job in &self.elements {
            let value = job.job().value(ctx)?;
            values.put(job.id(), value);
        }
        Ok(values)
    }
}
