//! Compilation of value templates into registry probes and writes.
//!
//! Deletions are never performed as plain deletes. They are recorded as
//! marker values the policy client acts upon:
//! - `**del.<name>` removes `<name>`
//! - `**delvals.` removes every value of the key
//!
//! Both carry a single-space `REG_SZ` payload, so "effectively deleted" is
//! probed exactly like "effectively set".

use gpm_admx::{ValueBase, ValueItem};
use log::debug;

use crate::context::GpoContext;
use crate::error::{EngineError, EngineResult};
use crate::store::{RegistryData, RegistryValueKind};

pub const DELETE_VALUE_PREFIX: &str = "**del.";
pub const DELETE_ALL_VALUES: &str = "**delvals.";
pub const MARKER_PAYLOAD: &str = " ";

pub fn delete_marker(value_name: &str) -> String {
    format!("{DELETE_VALUE_PREFIX}{value_name}")
}

/// True for `**del.*` and `**delvals.` names.
pub fn is_marker(value_name: &str) -> bool {
    value_name.starts_with("**")
        && (value_name.eq_ignore_ascii_case(DELETE_ALL_VALUES)
            || value_name
                .get(..DELETE_VALUE_PREFIX.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(DELETE_VALUE_PREFIX)))
}

pub fn marker_payload() -> RegistryData {
    RegistryData::String(MARKER_PAYLOAD.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyValueAction {
    /// Key exists, value present, data (and kind) equal when requested.
    ValueShouldExist,
    /// As `ValueShouldExist`, and it is the key's only value.
    SingleValueShouldExist,
    ValueShouldNotExist,
    NoValueShouldExist,
    AnyValueShouldExist,
    SetValue,
    RemoveValue,
    RemoveValues,
}

impl PolicyValueAction {
    pub fn is_probe(&self) -> bool {
        !matches!(self, Self::SetValue | Self::RemoveValue | Self::RemoveValues)
    }
}

/// How a `Delete` template is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyValueDeleteType {
    /// `**del.<name>`
    Value,
    /// `**delvals.`
    AllValues,
}

/// Cache and de-duplication key of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionIdentity {
    action: PolicyValueAction,
    key: String,
    value_name: Option<String>,
    kind: Option<RegistryValueKind>,
    value: Option<RegistryData>,
}

/// One concrete registry operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyValueItemAction {
    pub action: PolicyValueAction,
    pub key: String,
    pub value_name: Option<String>,
    pub kind: Option<RegistryValueKind>,
    pub value: Option<RegistryData>,
}

impl PolicyValueItemAction {
    pub fn new(
        action: PolicyValueAction,
        key: impl Into<String>,
        value_name: Option<String>,
        value: Option<RegistryData>,
    ) -> Self {
        Self {
            action,
            key: key.into(),
            value_name,
            kind: None,
            value,
        }
    }

    pub fn with_kind(mut self, kind: RegistryValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Compile a value template. `Delete` becomes its marker.
    pub fn compile(
        item: &ValueItem,
        action: PolicyValueAction,
        delete_type: PolicyValueDeleteType,
    ) -> Self {
        let (name, value) = match &item.value {
            ValueBase::Delete => {
                let name = match delete_type {
                    PolicyValueDeleteType::Value => delete_marker(&item.value_name),
                    PolicyValueDeleteType::AllValues => DELETE_ALL_VALUES.to_string(),
                };
                (name, marker_payload())
            }
            ValueBase::Decimal(v) => (item.value_name.clone(), RegistryData::DWord(*v)),
            ValueBase::LongDecimal(v) => (item.value_name.clone(), RegistryData::QWord(*v)),
            ValueBase::String(s) => (item.value_name.clone(), RegistryData::String(s.clone())),
        };
        // A marker counts whatever its payload.
        let value = (!(action.is_probe() && item.value.is_delete())).then_some(value);
        Self::new(action, item.registry_key.clone(), Some(name), value)
    }

    pub fn identity(&self) -> ActionIdentity {
        ActionIdentity {
            action: self.action,
            key: self.key.to_ascii_lowercase(),
            value_name: self.value_name.as_ref().map(|n| n.to_ascii_lowercase()),
            kind: self.kind,
            value: self.value.clone(),
        }
    }

    fn name(&self) -> &str {
        self.value_name.as_deref().unwrap_or("")
    }

    /// Run the action. Probes report their verdict and are memoized until
    /// the next write; mutations report `true`.
    pub fn execute(&self, ctx: &mut GpoContext<'_>) -> EngineResult<bool> {
        if self.action.is_probe() {
            let identity = self.identity();
            if let Some(hit) = ctx.cached_probe(&identity) {
                return Ok(hit);
            }
            let result = self.probe(ctx)?;
            debug!("{:?} {}\\{} -> {}", self.action, self.key, self.name(), result);
            ctx.remember_probe(identity, result);
            return Ok(result);
        }

        match self.action {
            PolicyValueAction::SetValue => {
                let value = self.value.clone().ok_or_else(|| EngineError::MissingValue {
                    key: self.key.clone(),
                    name: self.name().to_string(),
                })?;
                let mut scope = ctx.switch_to_key(&self.key, true)?;
                scope.set_value(self.name(), value)?;
            }
            PolicyValueAction::RemoveValue => {
                if ctx.key_exists_at(&self.key)? {
                    let mut scope = ctx.switch_to_key(&self.key, true)?;
                    scope.delete_value(self.name())?;
                }
            }
            PolicyValueAction::RemoveValues => {
                if ctx.key_exists_at(&self.key)? {
                    let mut scope = ctx.switch_to_key(&self.key, true)?;
                    for name in scope.value_names()? {
                        scope.delete_value(&name)?;
                    }
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn probe(&self, ctx: &mut GpoContext<'_>) -> EngineResult<bool> {
        let scope = ctx.switch_to_key(&self.key, false)?;
        let exists = scope.key_exists()?;
        Ok(match self.action {
            PolicyValueAction::ValueShouldExist | PolicyValueAction::SingleValueShouldExist => {
                if !exists {
                    return Ok(false);
                }
                let matches = match scope.get_value(self.name())? {
                    None => false,
                    Some(data) => {
                        self.value.as_ref().map_or(true, |v| *v == data)
                            && self.kind.map_or(true, |k| data.kind() == k)
                    }
                };
                matches
                    && (self.action == PolicyValueAction::ValueShouldExist
                        || scope.value_names()?.len() == 1)
            }
            PolicyValueAction::ValueShouldNotExist => {
                !exists || scope.get_value(self.name())?.is_none()
            }
            PolicyValueAction::NoValueShouldExist => !exists || scope.value_names()?.is_empty(),
            PolicyValueAction::AnyValueShouldExist => exists && !scope.value_names()?.is_empty(),
            _ => false,
        })
    }
}

/// How a collection of probe verdicts is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
    Single,
    None,
}

/// Evaluate probes under `quantifier` after de-duplicating by identity.
///
/// `All` over an empty set is vacuously true; callers decide whether an
/// empty set is meaningful.
pub fn evaluate(
    actions: &[PolicyValueItemAction],
    quantifier: Quantifier,
    ctx: &mut GpoContext<'_>,
) -> EngineResult<bool> {
    let mut seen = Vec::with_capacity(actions.len());
    let mut hits = 0usize;
    let mut total = 0usize;
    for action in actions {
        let identity = action.identity();
        if seen.contains(&identity) {
            continue;
        }
        seen.push(identity);
        total += 1;
        if action.execute(ctx)? {
            hits += 1;
        }
    }
    Ok(match quantifier {
        Quantifier::All => hits == total,
        Quantifier::Any => hits > 0,
        Quantifier::Single => hits == 1,
        Quantifier::None => hits == 0,
    })
}

/// Execute mutations in order.
pub fn apply(actions: &[PolicyValueItemAction], ctx: &mut GpoContext<'_>) -> EngineResult<()> {
    for action in actions {
        action.execute(ctx)?;
    }
    Ok(())
}

/// Compile every template with the same action.
pub fn compile_all(
    items: &[ValueItem],
    action: PolicyValueAction,
    delete_type: PolicyValueDeleteType,
) -> Vec<PolicyValueItemAction> {
    items
        .iter()
        .map(|i| PolicyValueItemAction::compile(i, action, delete_type))
        .collect()
}

/// Probe that neither the plain value nor its marker is present, for each
/// distinct slot in `items`.
pub fn not_configured_probes(items: &[ValueItem]) -> Vec<PolicyValueItemAction> {
    items
        .iter()
        .flat_map(|i| {
            [
                PolicyValueItemAction::new(
                    PolicyValueAction::ValueShouldNotExist,
                    i.registry_key.clone(),
                    Some(i.value_name.clone()),
                    None,
                ),
                PolicyValueItemAction::new(
                    PolicyValueAction::ValueShouldNotExist,
                    i.registry_key.clone(),
                    Some(delete_marker(&i.value_name)),
                    None,
                ),
            ]
        })
        .collect()
}

/// Remove the plain value and its marker for each slot in `items`.
pub fn clear_slots(items: &[ValueItem]) -> Vec<PolicyValueItemAction> {
    items
        .iter()
        .flat_map(|i| {
            [
                PolicyValueItemAction::new(
                    PolicyValueAction::RemoveValue,
                    i.registry_key.clone(),
                    Some(i.value_name.clone()),
                    None,
                ),
                PolicyValueItemAction::new(
                    PolicyValueAction::RemoveValue,
                    i.registry_key.clone(),
                    Some(delete_marker(&i.value_name)),
                    None,
                ),
            ]
        })
        .collect()
}
