use gpm_admx::{EnumElement, ValueItem};

use super::{ElementJob, ElementSlot};
use crate::action::{
    apply, clear_slots, compile_all, evaluate, not_configured_probes, PolicyValueAction,
    PolicyValueDeleteType, Quantifier,
};
use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::state::{classify, enabled_or_disabled, only, PolicyState, PossibleStates};
use crate::values::ElementValue;

/// Dropdown element. Each item owns a full set of values: the item value
/// at the element's slot, followed by the item's value list.
pub(crate) struct EnumJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p EnumElement,
}

impl<'p> EnumJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p EnumElement) -> Self {
        Self { slot, element }
    }

    /// Every slot any item writes, plus the element's own.
    fn all_slots(&self) -> Vec<ValueItem> {
        let mut slots: Vec<ValueItem> = self
            .element
            .items
            .iter()
            .flat_map(|item| item.values.iter().cloned())
            .collect();
        slots.push(self.slot.delete_item());
        slots
    }

    /// Indexes of the items whose values are all present.
    fn matching_items(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Vec<usize>> {
        let mut matches = Vec::new();
        for (i, item) in self.element.items.iter().enumerate() {
            if item.values.is_empty() {
                continue;
            }
            let probes = compile_all(
                &item.values,
                PolicyValueAction::ValueShouldExist,
                PolicyValueDeleteType::Value,
            );
            if evaluate(&probes, Quantifier::All, ctx)? {
                matches.push(i);
            }
        }
        Ok(matches)
    }
}

impl<'p> ElementJob<'p> for EnumJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let index = match value {
            Some(ElementValue::Enum(i)) => *i,
            Some(_) => return Err(self.slot.wrong_type("enum")),
            None if self.element.required => return Err(self.slot.missing()),
            None => return Ok(()),
        };
        let item = self.element.items.get(index).ok_or_else(|| {
            let count = self.element.items.len();
            EngineError::out_of_range(&self.slot.element.id, format!("item {index} of {count}"))
        })?;
        apply(
            &compile_all(&item.values, PolicyValueAction::SetValue, PolicyValueDeleteType::Value),
            ctx,
        )
    }

    fn not_configured(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(&clear_slots(&self.all_slots()), ctx)
    }

    fn state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<PossibleStates> {
        let matches = self.matching_items(ctx)?;
        match matches.as_slice() {
            [i] => {
                // An item that deletes its slot writes the same marker disable does.
                let deletes = self.element.items[*i]
                    .values
                    .first()
                    .is_some_and(|v| v.value.is_delete());
                if deletes {
                    Ok(enabled_or_disabled())
                } else if self.slot.marker_present(ctx)? {
                    Ok(only(PolicyState::Suspect))
                } else {
                    Ok(only(PolicyState::Enabled))
                }
            }
            [] => {
                let disabled = self.slot.marker_present(ctx)?;
                let clean =
                    evaluate(&not_configured_probes(&self.all_slots()), Quantifier::All, ctx)?;
                Ok(only(classify(false, disabled, clean)))
            }
            _ => Ok(only(PolicyState::Suspect)),
        }
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        Ok(match self.matching_items(ctx)?.as_slice() {
            [i] => Some(ElementValue::Enum(*i)),
            _ => None,
        })
    }
}
