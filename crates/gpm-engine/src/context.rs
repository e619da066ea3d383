//! Registry cursor bound to one policy class.
//!
//! Jobs read and write relative to the *current key*. Redirecting to an
//! element's own key goes through [`GpoContext::switch_to_key`], whose
//! guard puts the previous key back when it is dropped.

use gpm_admx::PolicyClass;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};

use crate::action::ActionIdentity;
use crate::error::{EngineError, EngineResult};
use crate::store::{normalize_key, PolicySource, RegistryData};

pub struct GpoContext<'s> {
    source: &'s mut dyn PolicySource,
    class: PolicyClass,
    current_key: String,
    writable: bool,
    dry_run: bool,
    /// Keys a dry run would have created.
    preview_keys: HashSet<String>,
    probe_cache: HashMap<ActionIdentity, bool>,
}

impl<'s> GpoContext<'s> {
    /// Bind a cursor to `source`. `class` must be narrowed already.
    pub fn new(
        source: &'s mut dyn PolicySource,
        class: PolicyClass,
        dry_run: bool,
    ) -> EngineResult<Self> {
        if class == PolicyClass::Both {
            return Err(EngineError::InvalidClass);
        }
        Ok(Self {
            source,
            class,
            current_key: String::new(),
            writable: true,
            dry_run,
            preview_keys: HashSet::new(),
            probe_cache: HashMap::new(),
        })
    }

    pub fn class(&self) -> PolicyClass {
        self.class
    }

    pub fn current_key(&self) -> &str {
        &self.current_key
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Make `path` the current key until the returned guard is dropped.
    ///
    /// A writable switch creates the key when missing.
    pub fn switch_to_key(&mut self, path: &str, writable: bool) -> EngineResult<KeyScope<'_, 's>> {
        let path = normalize_key(path);
        if path.eq_ignore_ascii_case(&self.current_key) && writable == self.writable {
            return Ok(KeyScope {
                ctx: self,
                previous: None,
            });
        }
        if writable && !self.key_exists_at(&path)? {
            self.create_key(&path)?;
        }
        let previous = Some((
            std::mem::replace(&mut self.current_key, path),
            std::mem::replace(&mut self.writable, writable),
        ));
        Ok(KeyScope { ctx: self, previous })
    }

    // ─── Reads ──────────────────────────────────────────────────────────

    pub fn key_exists(&self) -> EngineResult<bool> {
        self.key_exists_at(&self.current_key)
    }

    pub fn key_exists_at(&self, path: &str) -> EngineResult<bool> {
        let path = normalize_key(path);
        if self.dry_run && self.preview_keys.contains(&path.to_ascii_lowercase()) {
            return Ok(true);
        }
        Ok(self.source.key_exists(&path)?)
    }

    pub fn get_value(&self, name: &str) -> EngineResult<Option<RegistryData>> {
        Ok(self.source.get_value(&self.current_key, name)?)
    }

    pub fn value_names(&self) -> EngineResult<Vec<String>> {
        Ok(self.source.value_names(&self.current_key)?)
    }

    pub fn subkey_names(&self) -> EngineResult<Vec<String>> {
        Ok(self.source.subkey_names(&self.current_key)?)
    }

    // ─── Writes ─────────────────────────────────────────────────────────

    fn ensure_writable(&self) -> EngineResult<()> {
        if !self.writable {
            return Err(EngineError::KeyNotWritable(self.current_key.clone()));
        }
        Ok(())
    }

    fn create_key(&mut self, path: &str) -> EngineResult<()> {
        self.probe_cache.clear();
        if self.dry_run {
            debug!("[dry run] create key {path}");
            self.preview_keys.insert(path.to_ascii_lowercase());
            return Ok(());
        }
        Ok(self.source.create_key(path)?)
    }

    pub fn set_value(&mut self, name: &str, data: RegistryData) -> EngineResult<()> {
        self.ensure_writable()?;
        if !self.key_exists()? {
            return Err(EngineError::KeyNotFound(self.current_key.clone()));
        }
        self.probe_cache.clear();
        if self.dry_run {
            debug!("[dry run] set {}\\{} = {}", self.current_key, name, data);
            return Ok(());
        }
        debug!("Set {}\\{} = {}", self.current_key, name, data);
        Ok(self.source.set_value(&self.current_key, name, data)?)
    }

    pub fn delete_value(&mut self, name: &str) -> EngineResult<()> {
        self.ensure_writable()?;
        self.probe_cache.clear();
        if self.dry_run {
            debug!("[dry run] delete {}\\{}", self.current_key, name);
            return Ok(());
        }
        debug!("Delete {}\\{}", self.current_key, name);
        Ok(self.source.delete_value(&self.current_key, name)?)
    }

    /// Delete `path`. Refuses keys that still have subkeys.
    pub fn delete_key(&mut self, path: &str) -> EngineResult<()> {
        let path = normalize_key(path);
        if !self.source.subkey_names(&path)?.is_empty() {
            return Err(EngineError::KeyHasSubkeys(path));
        }
        self.probe_cache.clear();
        if self.dry_run {
            debug!("[dry run] delete key {path}");
            self.preview_keys.remove(&path.to_ascii_lowercase());
            return Ok(());
        }
        Ok(self.source.delete_key(&path)?)
    }

    // ─── Probe cache ────────────────────────────────────────────────────

    pub(crate) fn cached_probe(&self, identity: &ActionIdentity) -> Option<bool> {
        self.probe_cache.get(identity).copied()
    }

    pub(crate) fn remember_probe(&mut self, identity: ActionIdentity, result: bool) {
        self.probe_cache.insert(identity, result);
    }
}

/// Guard returned by [`GpoContext::switch_to_key`].
pub struct KeyScope<'c, 's> {
    ctx: &'c mut GpoContext<'s>,
    previous: Option<(String, bool)>,
}

impl<'s> Deref for KeyScope<'_, 's> {
    type Target = GpoContext<'s>;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl<'s> DerefMut for KeyScope<'_, 's> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for KeyScope<'_, '_> {
    fn drop(&mut self) {
        if let Some((key, writable)) = self.previous.take() {
            self.ctx.current_key = key;
            self.ctx.writable = writable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPolicySource;

    #[test]
    fn both_class_is_rejected() {
        let mut src = MemoryPolicySource::new();
        assert!(matches!(
            GpoContext::new(&mut src, PolicyClass::Both, false),
            Err(EngineError::InvalidClass)
        ));
    }

    #[test]
    fn guard_restores_previous_key() {
        let mut src = MemoryPolicySource::new();
        let mut ctx = GpoContext::new(&mut src, PolicyClass::Machine, false).unwrap();
        {
            let mut outer = ctx.switch_to_key(r"Software\A", true).unwrap();
            assert_eq!(outer.current_key(), r"Software\A");
            {
                let inner = outer.switch_to_key(r"Software\B", false).unwrap();
                assert_eq!(inner.current_key(), r"Software\B");
                assert!(!inner.is_writable());
            }
            assert_eq!(outer.current_key(), r"Software\A");
            assert!(outer.is_writable());
            outer.set_value("V", RegistryData::DWord(1)).unwrap();
        }
        assert_eq!(ctx.current_key(), "");
        assert!(ctx.key_exists_at(r"software\a").unwrap());
        assert!(!ctx.key_exists_at(r"Software\B").unwrap());
    }

    #[test]
    fn same_key_switch_is_noop() {
        let mut src = MemoryPolicySource::new();
        let mut ctx = GpoContext::new(&mut src, PolicyClass::User, false).unwrap();
        let mut scope = ctx.switch_to_key("K", true).unwrap();
        {
            let same = scope.switch_to_key(r"\k\", true).unwrap();
            assert_eq!(same.current_key(), "K");
        }
        assert_eq!(scope.current_key(), "K");
    }

    #[test]
    fn read_only_scope_rejects_writes() {
        let mut src = MemoryPolicySource::new();
        let mut ctx = GpoContext::new(&mut src, PolicyClass::Machine, false).unwrap();
        let mut scope = ctx.switch_to_key("Missing", false).unwrap();
        assert!(matches!(
            scope.set_value("V", RegistryData::DWord(1)),
            Err(EngineError::KeyNotWritable(_))
        ));
        drop(scope);

        // Writable switch creates the key, so set succeeds.
        let mut scope = ctx.switch_to_key("Missing", true).unwrap();
        scope.set_value("V", RegistryData::DWord(1)).unwrap();
    }

    #[test]
    fn set_value_fails_when_key_was_removed() {
        let mut src = MemoryPolicySource::new();
        let mut ctx = GpoContext::new(&mut src, PolicyClass::Machine, false).unwrap();
        let mut scope = ctx.switch_to_key("Gone", true).unwrap();
        scope.delete_key("Gone").unwrap();
        assert!(matches!(
            scope.set_value("V", RegistryData::DWord(1)),
            Err(EngineError::KeyNotFound(_))
        ));
    }

    #[test]
    fn delete_key_refuses_subkeys() {
        let mut src = MemoryPolicySource::new();
        src.create_key(r"Parent\Child").unwrap();
        let mut ctx = GpoContext::new(&mut src, PolicyClass::Machine, false).unwrap();
        assert!(matches!(ctx.delete_key("Parent"), Err(EngineError::KeyHasSubkeys(_))));
        ctx.delete_key(r"Parent\Child").unwrap();
        assert!(!ctx.key_exists_at("Parent").unwrap());
    }

    #[test]
    fn dry_run_leaves_store_untouched() {
        let mut src = MemoryPolicySource::new();
        {
            let mut ctx = GpoContext::new(&mut src, PolicyClass::Machine, true).unwrap();
            let mut scope = ctx.switch_to_key(r"Software\Preview", true).unwrap();
            assert!(scope.key_exists().unwrap());
            scope.set_value("V", RegistryData::DWord(7)).unwrap();
            scope.delete_value("V").unwrap();
        }
        assert!(src.is_empty());
    }
}
