use std::collections::BTreeMap;

use super::{normalize_key, PolicySource, RegistryData};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
struct KeyEntry {
    /// Path with its original casing.
    path: String,
    values: Vec<(String, RegistryData)>,
}

/// In-memory policy store.
///
/// Only explicitly created keys are stored; ancestors of a stored key exist
/// implicitly, the way a `Registry.pol` file describes them.
#[derive(Debug, Clone, Default)]
pub struct MemoryPolicySource {
    keys: BTreeMap<String, KeyEntry>,
}

impl MemoryPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(key: &str) -> String {
        normalize_key(key).to_ascii_lowercase()
    }

    /// Explicit keys with their values, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[(String, RegistryData)])> {
        self.keys
            .values()
            .map(|e| (e.path.as_str(), e.values.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl PolicySource for MemoryPolicySource {
    fn key_exists(&self, key: &str) -> StoreResult<bool> {
        let lookup = Self::lookup(key);
        if lookup.is_empty() || self.keys.contains_key(&lookup) {
            return Ok(true);
        }
        let prefix = format!("{lookup}\\");
        Ok(self.keys.range(prefix.clone()..).next().is_some_and(|(k, _)| k.starts_with(&prefix)))
    }

    fn create_key(&mut self, key: &str) -> StoreResult<()> {
        let path = normalize_key(key);
        if path.is_empty() {
            return Ok(());
        }
        self.keys
            .entry(path.to_ascii_lowercase())
            .or_insert_with(|| KeyEntry {
                path,
                values: Vec::new(),
            });
        Ok(())
    }

    fn delete_key(&mut self, key: &str) -> StoreResult<()> {
        self.keys.remove(&Self::lookup(key));
        Ok(())
    }

    fn subkey_names(&self, key: &str) -> StoreResult<Vec<String>> {
        let lookup = Self::lookup(key);
        let prefix = if lookup.is_empty() { String::new() } else { format!("{lookup}\\") };
        let mut names: Vec<String> = Vec::new();
        for (k, entry) in self.keys.range(prefix.clone()..) {
            if !k.starts_with(&prefix) {
                break;
            }
            let Some(first) = entry.path[prefix.len()..].split('\\').next() else {
                continue;
            };
            if !names.iter().any(|n| n.eq_ignore_ascii_case(first)) {
                names.push(first.to_string());
            }
        }
        Ok(names)
    }

    fn value_names(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .keys
            .get(&Self::lookup(key))
            .map(|e| e.values.iter().map(|(n, _)| n.clone()).collect())
            .unwrap_or_default())
    }

    fn get_value(&self, key: &str, name: &str) -> StoreResult<Option<RegistryData>> {
        Ok(self.keys.get(&Self::lookup(key)).and_then(|e| {
            e.values
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, d)| d.clone())
        }))
    }

    fn set_value(&mut self, key: &str, name: &str, data: RegistryData) -> StoreResult<()> {
        let lookup = Self::lookup(key);
        if lookup.is_empty() {
            return Err(StoreError::KeyNotFound("(hive root)".into()));
        }
        let entry = self
            .keys
            .get_mut(&lookup)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        match entry.values.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = data,
            None => entry.values.push((name.to_string(), data)),
        }
        Ok(())
    }

    fn delete_value(&mut self, key: &str, name: &str) -> StoreResult<()> {
        if let Some(entry) = self.keys.get_mut(&Self::lookup(key)) {
            entry.values.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        }
        Ok(())
    }

    fn save(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// Nothing backs a memory source, so there is nothing to go back to.
    fn discard(&mut self) -> StoreResult<()> {
        Ok(())
    }
}
