use gpm_admx::{BooleanElement, ValueItem};

use super::{ElementJob, ElementSlot};
use crate::action::{
    apply, clear_slots, compile_all, evaluate, not_configured_probes, PolicyValueAction,
    PolicyValueDeleteType, Quantifier,
};
use crate::context::GpoContext;
use crate::error::EngineResult;
use crate::state::{enabled_or_disabled, only, PolicyState, PossibleStates};
use crate::values::ElementValue;

/// Checkbox element: writes its true list or its false list.
///
/// Disabling writes the false list, so a false footprint cannot tell
/// "enabled, unchecked" from "disabled".
pub(crate) struct BooleanJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p BooleanElement,
}

impl<'p> BooleanJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p BooleanElement) -> Self {
        Self { slot, element }
    }

    fn footprint(&self, items: &[ValueItem], ctx: &mut GpoContext<'_>) -> EngineResult<bool> {
        let probes =
            compile_all(items, PolicyValueAction::ValueShouldExist, PolicyValueDeleteType::Value);
        evaluate(&probes, Quantifier::All, ctx)
    }

    fn write(&self, items: &[ValueItem], ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(
            &compile_all(items, PolicyValueAction::SetValue, PolicyValueDeleteType::Value),
            ctx,
        )
    }

    fn all_slots(&self) -> Vec<ValueItem> {
        self.element
            .true_values
            .iter()
            .chain(&self.element.false_values)
            .cloned()
            .collect()
    }
}

impl<'p> ElementJob<'p> for BooleanJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        match value {
            Some(ElementValue::Boolean(true)) => self.write(&self.element.true_values, ctx),
            Some(ElementValue::Boolean(false)) => self.write(&self.element.false_values, ctx),
            Some(_) => Err(self.slot.wrong_type("boolean")),
            None => Err(self.slot.missing()),
        }
    }

    fn disable(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        self.write(&self.element.false_values, ctx)
    }

    fn not_configured(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(&clear_slots(&self.all_slots()), ctx)
    }

    fn state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<PossibleStates> {
        let on = self.footprint(&self.element.true_values, ctx)?;
        let off = self.footprint(&self.element.false_values, ctx)?;
        Ok(match (on, off) {
            (true, true) => only(PolicyState::Suspect),
            (true, false) => only(PolicyState::Enabled),
            (false, true) => enabled_or_disabled(),
            (false, false) => {
                let clean =
                    evaluate(&not_configured_probes(&self.all_slots()), Quantifier::All, ctx)?;
                only(if clean { PolicyState::NotConfigured } else { PolicyState::Suspect })
            }
        })
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        let on = self.footprint(&self.element.true_values, ctx)?;
        let off = self.footprint(&self.element.false_values, ctx)?;
        Ok(match (on, off) {
            (true, false) => Some(ElementValue::Boolean(true)),
            (false, true) => Some(ElementValue::Boolean(false)),
            _ => None,
        })
    }
}
