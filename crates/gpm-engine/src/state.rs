//! Four-state policy verdicts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyState {
    /// Nothing to evaluate.
    Unknown,
    Enabled,
    Disabled,
    NotConfigured,
    /// The store holds a footprint no single state explains.
    Suspect,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::NotConfigured => "Not Configured",
            Self::Suspect => "Suspect",
        };
        f.write_str(s)
    }
}

/// States an element's footprint is compatible with.
pub type PossibleStates = BTreeSet<PolicyState>;

pub fn only(state: PolicyState) -> PossibleStates {
    BTreeSet::from([state])
}

pub fn enabled_or_disabled() -> PossibleStates {
    BTreeSet::from([PolicyState::Enabled, PolicyState::Disabled])
}

/// The three-probe classifier. Exactly one true probe decides; anything
/// else is `Suspect`.
pub fn classify(enabled: bool, disabled: bool, not_configured: bool) -> PolicyState {
    match (enabled, disabled, not_configured) {
        (true, false, false) => PolicyState::Enabled,
        (false, true, false) => PolicyState::Disabled,
        (false, false, true) => PolicyState::NotConfigured,
        _ => PolicyState::Suspect,
    }
}

/// Combine the simple-items verdict with the element footprints.
///
/// A state is valid when every element can be in it. The `{Enabled,
/// Disabled}` pair is broken by the items verdict when that verdict is in
/// the pair, otherwise it falls back to `Disabled`.
pub fn combine(items: Option<PolicyState>, elements: &[PossibleStates]) -> PolicyState {
    if elements.is_empty() {
        return items.unwrap_or(PolicyState::Unknown);
    }

    let mut valid = elements[0].clone();
    for set in &elements[1..] {
        valid = valid.intersection(set).copied().collect();
    }
    valid.remove(&PolicyState::Unknown);

    let pair = enabled_or_disabled();
    match items {
        None => {
            if valid.len() == 1 {
                valid.iter().next().copied().unwrap_or(PolicyState::Suspect)
            } else if valid == pair {
                PolicyState::Disabled
            } else {
                PolicyState::Suspect
            }
        }
        Some(item_state) => {
            if valid.len() == 1 && valid.contains(&item_state) {
                item_state
            } else if valid == pair {
                if pair.contains(&item_state) {
                    item_state
                } else {
                    PolicyState::Disabled
                }
            } else {
                PolicyState::Suspect
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PolicyState::*;

    #[test]
    fn classifier_truth_table() {
        assert_eq!(classify(true, false, false), Enabled);
        assert_eq!(classify(false, true, false), Disabled);
        assert_eq!(classify(false, false, true), NotConfigured);
        assert_eq!(classify(true, true, false), Suspect);
        assert_eq!(classify(false, false, false), Suspect);
        assert_eq!(classify(true, true, true), Suspect);
    }

    #[test]
    fn combine_without_elements() {
        assert_eq!(combine(None, &[]), Unknown);
        assert_eq!(combine(Some(Disabled), &[]), Disabled);
    }

    #[test]
    fn combine_elements_only() {
        assert_eq!(combine(None, &[only(Enabled), enabled_or_disabled()]), Enabled);
        assert_eq!(combine(None, &[enabled_or_disabled(), enabled_or_disabled()]), Disabled);
        assert_eq!(combine(None, &[only(Enabled), only(Disabled)]), Suspect);
        assert_eq!(combine(None, &[only(Suspect)]), Suspect);
    }

    #[test]
    fn combine_with_items() {
        assert_eq!(combine(Some(Enabled), &[enabled_or_disabled()]), Enabled);
        assert_eq!(combine(Some(Disabled), &[enabled_or_disabled()]), Disabled);
        assert_eq!(combine(Some(NotConfigured), &[enabled_or_disabled()]), Disabled);
        assert_eq!(combine(Some(Enabled), &[only(Enabled)]), Enabled);
        assert_eq!(combine(Some(Enabled), &[only(Disabled)]), Suspect);
        assert_eq!(combine(Some(NotConfigured), &[only(NotConfigured)]), NotConfigured);
    }
}
