//! Per-element jobs and the policy-level orchestration.
//!
//! Every element kind has one job type. Jobs share the default behavior of
//! [`ElementJob`]: enable writes the typed value, disable writes the delete
//! marker, not-configured removes both, and the state comes from the
//! three-probe classifier. Kinds with richer footprints override it.

mod boolean;
mod enumeration;
mod list;
mod numeric;
mod policy;
mod text;

pub use policy::PolicyJob;

use gpm_admx::{ElementKind, Policy, PolicyElement, ValueBase, ValueItem};

use crate::action::{
    apply, clear_slots, delete_marker, evaluate, marker_payload, not_configured_probes,
    PolicyValueAction, PolicyValueItemAction, Quantifier,
};
use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::state::{classify, only, PossibleStates};
use crate::store::{RegistryData, RegistryValueKind};
use crate::values::ElementValue;

use self::boolean::BooleanJob;
use self::enumeration::EnumJob;
use self::list::ListJob;
use self::numeric::{DecimalJob, LongDecimalJob};
use self::text::{MultiTextJob, TextJob};

/// An element resolved against its policy: final key and value name.
pub(crate) struct ElementSlot<'p> {
    pub policy: &'p Policy,
    pub element: &'p PolicyElement,
    pub key: &'p str,
    pub value_name: &'p str,
}

impl<'p> ElementSlot<'p> {
    fn new(policy: &'p Policy, element: &'p PolicyElement) -> Self {
        Self {
            policy,
            element,
            key: element.resolved_key(policy),
            value_name: element.resolved_value_name(policy),
        }
    }

    /// The slot as a delete template.
    pub fn delete_item(&self) -> ValueItem {
        ValueItem::new(self.key, self.value_name, ValueBase::Delete)
    }

    pub fn set(&self, ctx: &mut GpoContext<'_>, data: RegistryData) -> EngineResult<()> {
        PolicyValueItemAction::new(
            PolicyValueAction::SetValue,
            self.key,
            Some(self.value_name.to_string()),
            Some(data),
        )
        .execute(ctx)?;
        Ok(())
    }

    pub fn read(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<RegistryData>> {
        let scope = ctx.switch_to_key(self.key, false)?;
        if !scope.key_exists()? {
            return Ok(None);
        }
        scope.get_value(self.value_name)
    }

    pub fn marker_present(&self, ctx: &mut GpoContext<'_>) -> EngineResult<bool> {
        PolicyValueItemAction::new(
            PolicyValueAction::ValueShouldExist,
            self.key,
            Some(delete_marker(self.value_name)),
            None,
        )
        .execute(ctx)
    }

    pub fn missing(&self) -> EngineError {
        EngineError::MissingElementValue {
            policy: self.policy.unique_id(),
            element: self.element.id.clone(),
        }
    }

    pub fn wrong_type(&self, expected: &'static str) -> EngineError {
        EngineError::wrong_type(&self.element.id, expected)
    }
}

/// Behavior shared by all element kinds.
pub(crate) trait ElementJob<'p> {
    fn slot(&self) -> &ElementSlot<'p>;

    /// Registry kinds that count as this element being set.
    fn value_kinds(&self) -> &'static [RegistryValueKind] {
        &[]
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()>;

    fn disable(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        let slot = self.slot();
        PolicyValueItemAction::new(
            PolicyValueAction::SetValue,
            slot.key,
            Some(delete_marker(slot.value_name)),
            Some(marker_payload()),
        )
        .execute(ctx)?;
        Ok(())
    }

    fn not_configured(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        apply(&clear_slots(&[self.slot().delete_item()]), ctx)
    }

    fn state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<PossibleStates> {
        let slot = self.slot();
        let kinds = self.value_kinds();
        let present: Vec<_> = if kinds.is_empty() {
            vec![PolicyValueItemAction::new(
                PolicyValueAction::ValueShouldExist,
                slot.key,
                Some(slot.value_name.to_string()),
                None,
            )]
        } else {
            kinds
                .iter()
                .map(|k| {
                    PolicyValueItemAction::new(
                        PolicyValueAction::ValueShouldExist,
                        slot.key,
                        Some(slot.value_name.to_string()),
                        None,
                    )
                    .with_kind(*k)
                })
                .collect()
        };
        let enabled = evaluate(&present, Quantifier::Any, ctx)?;
        let disabled = slot.marker_present(ctx)?;
        let not_configured =
            evaluate(&not_configured_probes(&[slot.delete_item()]), Quantifier::All, ctx)?;
        Ok(only(classify(enabled, disabled, not_configured)))
    }

    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>>;
}

/// Closed set of element jobs, built once per policy job.
pub(crate) enum AnyElementJob<'p> {
    Boolean(BooleanJob<'p>),
    Decimal(DecimalJob<'p>),
    LongDecimal(LongDecimalJob<'p>),
    Text(TextJob<'p>),
    MultiText(MultiTextJob<'p>),
    Enum(EnumJob<'p>),
    List(ListJob<'p>),
}

impl<'p> AnyElementJob<'p> {
    pub fn new(policy: &'p Policy, element: &'p PolicyElement) -> Self {
        let slot = ElementSlot::new(policy, element);
        match &element.kind {
            ElementKind::Boolean(b) => Self::Boolean(BooleanJob::new(slot, b)),
            ElementKind::Decimal(d) => Self::Decimal(DecimalJob::new(slot, d)),
            ElementKind::LongDecimal(d) => Self::LongDecimal(LongDecimalJob::new(slot, d)),
            ElementKind::Text(t) => Self::Text(TextJob::new(slot, t)),
            ElementKind::MultiText(m) => Self::MultiText(MultiTextJob::new(slot, m)),
            ElementKind::Enum(e) => Self::Enum(EnumJob::new(slot, e)),
            ElementKind::List(l) => Self::List(ListJob::new(slot, l)),
        }
    }

    pub fn job(&self) -> &dyn ElementJob<'p> {
        match self {
            Self::Boolean(j) => j,
            Self::Decimal(j) => j,
            Self::LongDecimal(j) => j,
            Self::Text(j) => j,
            Self::MultiText(j) => j,
            Self::Enum(j) => j,
            Self::List(j) => j,
        }
    }

    pub fn id(&self) -> &'p str {
        let element: &'p PolicyElement = self.job().slot().element;
        &element.id
    }

    pub fn is_optional(&self) -> bool {
        self.job().slot().element.is_optional()
    }
}

/// Render registry data as the string an element value carries.
pub(crate) fn data_to_string(data: &RegistryData) -> String {
    match data {
        RegistryData::String(s) | RegistryData::ExpandString(s) => s.clone(),
        RegistryData::DWord(v) => v.to_string(),
        RegistryData::QWord(v) => v.to_string(),
        RegistryData::MultiString(v) => v.join(","),
        other => other.to_string(),
    }
}
