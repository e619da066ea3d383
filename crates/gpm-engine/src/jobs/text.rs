use gpm_admx::{MultiTextElement, TextElement};

use super::{ElementJob, ElementSlot};
use crate::context::GpoContext;
use crate::error::EngineResult;
use crate::store::{RegistryData, RegistryValueKind};
use crate::values::ElementValue;

/// `REG_SZ`, or `REG_EXPAND_SZ` when expandable. An optional element
/// without a value writes an empty string.
pub(crate) struct TextJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p TextElement,
}

impl<'p> TextJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p TextElement) -> Self {
        Self { slot, element }
    }
}

impl<'p> ElementJob<'p> for TextJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn value_kinds(&self) -> &'static [RegistryValueKind] {
        &[RegistryValueKind::String, RegistryValueKind::ExpandString]
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let text = match value {
            Some(ElementValue::Text(s)) => s.clone(),
            Some(_) => return Err(self.slot.wrong_type("text")),
            None if self.element.required => return Err(self.slot.missing()),
            None => String::new(),
        };
        let data = if self.element.expandable {
            RegistryData::ExpandString(text)
        } else {
            RegistryData::String(text)
        };
        self.slot.set(ctx, data)
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        Ok(self
            .slot
            .read(ctx)?
            .and_then(|d| d.as_str().map(|s| ElementValue::Text(s.to_string()))))
    }
}

/// `REG_MULTI_SZ`.
pub(crate) struct MultiTextJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p MultiTextElement,
}

impl<'p> MultiTextJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p MultiTextElement) -> Self {
        Self { slot, element }
    }
}

impl<'p> ElementJob<'p> for MultiTextJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn value_kinds(&self) -> &'static [RegistryValueKind] {
        &[RegistryValueKind::MultiString]
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let lines = match value {
            Some(ElementValue::MultiText(lines)) => lines.clone(),
            Some(_) => return Err(self.slot.wrong_type("multi-text")),
            None if self.element.required => return Err(self.slot.missing()),
            None => Vec::new(),
        };
        self.slot.set(ctx, RegistryData::MultiString(lines))
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        Ok(match self.slot.read(ctx)? {
            Some(RegistryData::MultiString(lines)) => Some(ElementValue::MultiText(lines)),
            _ => None,
        })
    }
}
