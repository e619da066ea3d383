use gpm_admx::{DecimalElement, LongDecimalElement};

use super::{ElementJob, ElementSlot};
use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::store::{RegistryData, RegistryValueKind};
use crate::values::ElementValue;

/// `REG_DWORD`, or decimal text when `storeAsText`.
pub(crate) struct DecimalJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p DecimalElement,
}

impl<'p> DecimalJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p DecimalElement) -> Self {
        Self { slot, element }
    }
}

impl<'p> ElementJob<'p> for DecimalJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn value_kinds(&self) -> &'static [RegistryValueKind] {
        if self.element.store_as_text {
            &[RegistryValueKind::String]
        } else {
            &[RegistryValueKind::DWord]
        }
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let n = match value {
            Some(ElementValue::Decimal(n)) => *n,
            Some(_) => return Err(self.slot.wrong_type("decimal")),
            None if self.element.required => return Err(self.slot.missing()),
            None => return Ok(()),
        };
        if !(self.element.min_value..=self.element.max_value).contains(&n) {
            return Err(EngineError::out_of_range(
                &self.slot.element.id,
                format!("{n} not in {}..={}", self.element.min_value, self.element.max_value),
            ));
        }
        let data = if self.element.store_as_text {
            RegistryData::String(n.to_string())
        } else {
            RegistryData::DWord(n)
        };
        self.slot.set(ctx, data)
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        Ok(match self.slot.read(ctx)? {
            Some(RegistryData::DWord(n)) => Some(ElementValue::Decimal(n)),
            Some(RegistryData::String(s)) => s.trim().parse().ok().map(ElementValue::Decimal),
            _ => None,
        })
    }
}

/// `REG_QWORD`, or decimal text when `storeAsText`.
pub(crate) struct LongDecimalJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p LongDecimalElement,
}

impl<'p> LongDecimalJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p LongDecimalElement) -> Self {
        Self { slot, element }
    }
}

impl<'p> ElementJob<'p> for LongDecimalJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn value_kinds(&self) -> &'static [RegistryValueKind] {
        if self.element.store_as_text {
            &[RegistryValueKind::String]
        } else {
            &[RegistryValueKind::QWord]
        }
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let n = match value {
            Some(ElementValue::LongDecimal(n)) => *n,
            Some(_) => return Err(self.slot.wrong_type("long decimal")),
            None if self.element.required => return Err(self.slot.missing()),
            None => return Ok(()),
        };
        if !(self.element.min_value..=self.element.max_value).contains(&n) {
            return Err(EngineError::out_of_range(
                &self.slot.element.id,
                format!("{n} not in {}..={}", self.element.min_value, self.element.max_value),
            ));
        }
        let data = if self.element.store_as_text {
            RegistryData::String(n.to_string())
        } else {
            RegistryData::QWord(n)
        };
        self.slot.set(ctx, data)
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        Ok(match self.slot.read(ctx)? {
            Some(RegistryData::QWord(n)) => Some(ElementValue::LongDecimal(n)),
            Some(RegistryData::String(s)) => s.trim().parse().ok().map(ElementValue::LongDecimal),
            _ => None,
        })
    }
}
