//! Settable primitive values and their registry bindings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value a policy definition can ask to be written.
///
/// `Delete` is not a registry type: it means "this value must be absent"
/// and is written as a delete marker by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueBase {
    Delete,
    Decimal(u32),
    LongDecimal(u64),
    String(String),
}

impl ValueBase {
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for ValueBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "<delete>"),
            Self::Decimal(v) => write!(f, "{}", v),
            Self::LongDecimal(v) => write!(f, "{}", v),
            Self::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// One atomic `(registry key, value name, value)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueItem {
    pub registry_key: String,
    pub value_name: String,
    pub value: ValueBase,
}

impl ValueItem {
    pub fn new(
        registry_key: impl Into<String>,
        value_name: impl Into<String>,
        value: ValueBase,
    ) -> Self {
        Self {
            registry_key: registry_key.into(),
            value_name: value_name.into(),
            value,
        }
    }

    /// True when both items address the same registry slot. Registry
    /// names compare case-insensitively.
    pub fn same_slot(&self, other: &ValueItem) -> bool {
        self.registry_key.eq_ignore_ascii_case(&other.registry_key)
            && self.value_name.eq_ignore_ascii_case(&other.value_name)
    }
}

impl fmt::Display for ValueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{} = {}", self.registry_key, self.value_name, self.value)
    }
}
