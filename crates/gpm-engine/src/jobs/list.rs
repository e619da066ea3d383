use gpm_admx::{ElementKind, ListElement, ValueItem};

use super::{data_to_string, ElementJob, ElementSlot};
use crate::action::{
    apply, evaluate, is_marker, PolicyValueAction, PolicyValueDeleteType, PolicyValueItemAction,
    Quantifier, DELETE_VALUE_PREFIX,
};
use crate::context::GpoContext;
use crate::error::EngineResult;
use crate::state::{enabled_or_disabled, only, PolicyState, PossibleStates};
use crate::store::RegistryData;
use crate::values::ElementValue;

/// List element. Owns every value of its key except the names the rest of
/// the policy writes there.
pub(crate) struct ListJob<'p> {
    slot: ElementSlot<'p>,
    element: &'p ListElement,
}

impl<'p> ListJob<'p> {
    pub fn new(slot: ElementSlot<'p>, element: &'p ListElement) -> Self {
        Self { slot, element }
    }

    /// Value names at this key that belong to the policy or its other
    /// elements.
    fn reserved(&self) -> Vec<&'p str> {
        let policy = self.slot.policy;
        let key = self.slot.key;
        let mut items: Vec<&'p ValueItem> =
            policy.enabled_list.iter().chain(&policy.disabled_list).collect();
        let mut names: Vec<&'p str> = Vec::new();

        if let Some(name) = policy.value_name.as_deref() {
            if policy.registry_key.eq_ignore_ascii_case(key) {
                names.push(name);
            }
        }
        for element in &policy.elements {
            if std::ptr::eq(element, self.slot.element) {
                continue;
            }
            if element.resolved_key(policy).eq_ignore_ascii_case(key) {
                names.push(element.resolved_value_name(policy));
            }
            match &element.kind {
                ElementKind::Boolean(b) => {
                    items.extend(b.true_values.iter().chain(&b.false_values))
                }
                ElementKind::Enum(e) => items.extend(e.items.iter().flat_map(|i| &i.values)),
                _ => {}
            }
        }
        names.extend(
            items
                .into_iter()
                .filter(|i| i.registry_key.eq_ignore_ascii_case(key))
                .map(|i| i.value_name.as_str()),
        );
        names
    }

    fn is_reserved(reserved: &[&str], name: &str) -> bool {
        let plain = name
            .get(..DELETE_VALUE_PREFIX.len())
            .filter(|p| p.eq_ignore_ascii_case(DELETE_VALUE_PREFIX))
            .map_or(name, |_| &name[DELETE_VALUE_PREFIX.len()..]);
        reserved.iter().any(|r| r.eq_ignore_ascii_case(plain))
    }

    /// Parse `<prefix><n>` into `n`.
    fn ordinal(&self, name: &str) -> Option<u32> {
        let prefix = self.element.value_prefix.as_deref()?;
        let rest = name
            .get(..prefix.len())
            .filter(|p| p.eq_ignore_ascii_case(prefix))
            .map(|_| &name[prefix.len()..])?;
        rest.parse().ok()
    }

    /// Names of the entries currently stored, in store order.
    fn entry_names(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Vec<String>> {
        if self.key_action(PolicyValueAction::NoValueShouldExist).execute(ctx)? {
            return Ok(Vec::new());
        }
        let reserved = self.reserved();
        let scope = ctx.switch_to_key(self.slot.key, false)?;
        Ok(scope
            .value_names()?
            .into_iter()
            .filter(|name| !is_marker(name) && !Self::is_reserved(&reserved, name))
            .filter(|name| self.owns(name))
            .collect())
    }

    fn entries(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Vec<(String, RegistryData)>> {
        let names = self.entry_names(ctx)?;
        let scope = ctx.switch_to_key(self.slot.key, false)?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(data) = scope.get_value(&name)? {
                out.push((name, data));
            }
        }
        Ok(out)
    }

    /// The `**delvals.` marker of the list key under `action`.
    fn clear_marker(&self, action: PolicyValueAction) -> PolicyValueItemAction {
        let marker = self.slot.delete_item();
        PolicyValueItemAction::compile(&marker, action, PolicyValueDeleteType::AllValues)
    }

    fn write_clear_marker(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        self.clear_marker(PolicyValueAction::SetValue).execute(ctx)?;
        Ok(())
    }

    /// A key-wide action on the list key.
    fn key_action(&self, action: PolicyValueAction) -> PolicyValueItemAction {
        PolicyValueItemAction::new(action, self.slot.key, None, None)
    }

    fn action(
        &self,
        action: PolicyValueAction,
        name: &str,
        data: Option<RegistryData>,
    ) -> PolicyValueItemAction {
        PolicyValueItemAction::new(action, self.slot.key, Some(name.to_string()), data)
    }

    /// Prefixed lists only own names of the form `<prefix><n>`.
    fn owns(&self, name: &str) -> bool {
        self.element.value_prefix.is_none() || self.ordinal(name).is_some()
    }

    fn data(&self, value: &str) -> RegistryData {
        if self.element.expandable {
            RegistryData::ExpandString(value.to_string())
        } else {
            RegistryData::String(value.to_string())
        }
    }
}

impl<'p> ElementJob<'p> for ListJob<'p> {
    fn slot(&self) -> &ElementSlot<'p> {
        &self.slot
    }

    fn enable(&self, ctx: &mut GpoContext<'_>, value: Option<&ElementValue>) -> EngineResult<()> {
        let pairs: Vec<(String, String)> = match value {
            Some(ElementValue::KeyValueList(pairs)) if self.element.explicit_value => pairs.clone(),
            Some(ElementValue::List(entries)) if !self.element.explicit_value => {
                match &self.element.value_prefix {
                    Some(prefix) => entries
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (format!("{prefix}{}", i + 1), v.clone()))
                        .collect(),
                    None => entries.iter().map(|v| (v.clone(), v.clone())).collect(),
                }
            }
            Some(_) if self.element.explicit_value => {
                return Err(self.slot.wrong_type("name=value list"))
            }
            Some(_) => return Err(self.slot.wrong_type("list")),
            None => return Err(self.slot.missing()),
        };

        if !self.element.additive {
            self.write_clear_marker(ctx)?;
        }
        let writes: Vec<_> = pairs
            .iter()
            .map(|(name, value)| {
                self.action(PolicyValueAction::SetValue, name, Some(self.data(value)))
            })
            .collect();
        apply(&writes, ctx)
    }

    fn disable(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        self.write_clear_marker(ctx)
    }

    fn not_configured(&self, ctx: &mut GpoContext<'_>) -> EngineResult<()> {
        if !self.key_action(PolicyValueAction::AnyValueShouldExist).execute(ctx)? {
            return Ok(());
        }
        let reserved = self.reserved();
        if reserved.is_empty() && self.element.value_prefix.is_none() {
            // The list owns the whole key.
            self.key_action(PolicyValueAction::RemoveValues).execute(ctx)?;
            return Ok(());
        }
        let names = ctx.switch_to_key(self.slot.key, false)?.value_names()?;
        let removals: Vec<_> = names
            .iter()
            .filter(|name| !Self::is_reserved(&reserved, name))
            .filter(|name| is_marker(name) || self.owns(name))
            .map(|name| self.action(PolicyValueAction::RemoveValue, name, None))
            .collect();
        apply(&removals, ctx)
    }

    fn state(&self, ctx: &mut GpoContext<'_>) -> EngineResult<PossibleStates> {
        let cleared = self.clear_marker(PolicyValueAction::ValueShouldExist).execute(ctx)?;
        let probes: Vec<_> = self
            .entry_names(ctx)?
            .iter()
            .map(|name| self.action(PolicyValueAction::ValueShouldExist, name, None))
            .collect();
        let has_entries = !evaluate(&probes, Quantifier::None, ctx)?;
        Ok(match (cleared, has_entries) {
            // An additive write never clears, so both together cannot come
            // from one action.
            (true, true) if self.element.additive => only(PolicyState::Suspect),
            (_, true) => only(PolicyState::Enabled),
            (true, false) if self.element.additive => only(PolicyState::Disabled),
            (true, false) => enabled_or_disabled(),
            (false, false) => only(PolicyState::NotConfigured),
        })
    }

    /// Only an unambiguously enabled list has a value.
    fn value(&self, ctx: &mut GpoContext<'_>) -> EngineResult<Option<ElementValue>> {
        if self.state(ctx)? != only(PolicyState::Enabled) {
            return Ok(None);
        }
        let mut entries = self.entries(ctx)?;
        if self.element.explicit_value {
            return Ok(Some(ElementValue::KeyValueList(
                entries
                    .into_iter()
                    .map(|(name, data)| (name, data_to_string(&data)))
                    .collect(),
            )));
        }
        if self.element.value_prefix.is_some() {
            entries.sort_by_key(|(name, _)| self.ordinal(name).unwrap_or(u32::MAX));
        }
        Ok(Some(ElementValue::List(
            entries.into_iter().map(|(_, data)| data_to_string(&data)).collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_cover_markers() {
        let reserved = ["Flag"];
        assert!(ListJob::is_reserved(&reserved, "flag"));
        assert!(ListJob::is_reserved(&reserved, "**del.Flag"));
        assert!(!ListJob::is_reserved(&reserved, "**delvals."));
        assert!(!ListJob::is_reserved(&reserved, "Other"));
    }
}
