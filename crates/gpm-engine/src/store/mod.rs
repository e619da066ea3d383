//! Policy stores: the key/value surface the engine reads and writes.
//!
//! Key paths are backslash separated and relative to the class hive
//! (`Software\Policies\...`). Key and value names compare
//! case-insensitively and keep the case they were created with.

mod memory;
mod pol_file;

pub use memory::MemoryPolicySource;
pub use pol_file::PolFile;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreResult;

/// Registry value types, with their native type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistryValueKind {
    None,
    String,
    ExpandString,
    Binary,
    DWord,
    MultiString,
    QWord,
    Other(u32),
}

impl RegistryValueKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::String => 1,
            Self::ExpandString => 2,
            Self::Binary => 3,
            Self::DWord => 4,
            Self::MultiString => 7,
            Self::QWord => 11,
            Self::Other(code) => *code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::String,
            2 => Self::ExpandString,
            3 => Self::Binary,
            4 => Self::DWord,
            7 => Self::MultiString,
            11 => Self::QWord,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for RegistryValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "REG_NONE"),
            Self::String => write!(f, "REG_SZ"),
            Self::ExpandString => write!(f, "REG_EXPAND_SZ"),
            Self::Binary => write!(f, "REG_BINARY"),
            Self::DWord => write!(f, "REG_DWORD"),
            Self::MultiString => write!(f, "REG_MULTI_SZ"),
            Self::QWord => write!(f, "REG_QWORD"),
            Self::Other(code) => write!(f, "type {code}"),
        }
    }
}

/// Typed registry value data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum RegistryData {
    None,
    String(String),
    ExpandString(String),
    Binary(Vec<u8>),
    DWord(u32),
    MultiString(Vec<String>),
    QWord(u64),
    /// Any type the engine never writes, kept byte-exact.
    Raw { code: u32, bytes: Vec<u8> },
}

impl RegistryData {
    pub fn kind(&self) -> RegistryValueKind {
        match self {
            Self::None => RegistryValueKind::None,
            Self::String(_) => RegistryValueKind::String,
            Self::ExpandString(_) => RegistryValueKind::ExpandString,
            Self::Binary(_) => RegistryValueKind::Binary,
            Self::DWord(_) => RegistryValueKind::DWord,
            Self::MultiString(_) => RegistryValueKind::MultiString,
            Self::QWord(_) => RegistryValueKind::QWord,
            Self::Raw { code, .. } => RegistryValueKind::from_code(*code),
        }
    }

    /// String payload of `REG_SZ` / `REG_EXPAND_SZ` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::ExpandString(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for RegistryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "(none)"),
            Self::String(s) | Self::ExpandString(s) => write!(f, "\"{s}\""),
            Self::Binary(b) | Self::Raw { bytes: b, .. } => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::DWord(v) => write!(f, "{v}"),
            Self::MultiString(v) => write!(f, "{v:?}"),
            Self::QWord(v) => write!(f, "{v}"),
        }
    }
}

/// One registry hive's worth of policy data.
///
/// Implementations need not be `Send`: sources are created on and confined
/// to the session thread.
pub trait PolicySource {
    fn key_exists(&self, key: &str) -> StoreResult<bool>;
    /// Create `key` (and implicitly its ancestors). Creating an existing key
    /// is a no-op.
    fn create_key(&mut self, key: &str) -> StoreResult<()>;
    /// Remove `key` and its values. Callers check for subkeys first.
    fn delete_key(&mut self, key: &str) -> StoreResult<()>;
    fn subkey_names(&self, key: &str) -> StoreResult<Vec<String>>;
    /// Value names in creation order.
    fn value_names(&self, key: &str) -> StoreResult<Vec<String>>;
    fn get_value(&self, key: &str, name: &str) -> StoreResult<Option<RegistryData>>;
    /// Fails with `KeyNotFound` when `key` does not exist.
    fn set_value(&mut self, key: &str, name: &str, data: RegistryData) -> StoreResult<()>;
    /// Deleting an absent value is a no-op.
    fn delete_value(&mut self, key: &str, name: &str) -> StoreResult<()>;
    /// Commit pending changes.
    fn save(&mut self) -> StoreResult<()>;
    /// Drop changes made since the last load or save.
    fn discard(&mut self) -> StoreResult<()>;
}

/// Canonical form of a key path: no leading/trailing or doubled separators.
pub fn normalize_key(key: &str) -> String {
    key.split('\\')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}
