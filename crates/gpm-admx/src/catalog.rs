//! Cross-file category graph.
//!
//! Categories live in an arena and are wired in two passes: every category
//! is registered under its `(namespace, name)` identity first, then parent
//! references are resolved through the referencing file's import table.
//! References that cannot be resolved land under the synthetic `INVALID`
//! category instead of failing the load.

use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::types::*;

pub type CategoryId = usize;
pub type PolicyId = usize;

const SYNTHETIC_NAMESPACE: &str = "";
const ROOT_NAME: &str = "ROOT";
const INVALID_NAME: &str = "INVALID";

/// A category placed in the final tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LgpCategory {
    pub ident: CategoryIdent,
    pub display_name: String,
    pub explain_text: Option<String>,
    /// Index of the defining file; `None` for synthetic categories.
    pub source: Option<usize>,
    pub parent: Option<CategoryId>,
    pub children: Vec<CategoryId>,
    pub policies: Vec<PolicyId>,
}

/// A policy placed in the final tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LgpPolicy {
    pub unique_id: String,
    pub category: CategoryId,
    pub source: usize,
    pub policy: Policy,
}

#[derive(Debug, Default)]
pub struct PolicyCatalog {
    files: Vec<AdmxFile>,
    categories: Vec<LgpCategory>,
    policies: Vec<LgpPolicy>,
    category_index: HashMap<CategoryIdent, CategoryId>,
    policy_index: HashMap<String, PolicyId>,
}

impl PolicyCatalog {
    pub fn build(mut files: Vec<AdmxFile>) -> Self {
        let mut catalog = PolicyCatalog::default();
        let root = catalog.push_category(LgpCategory::synthetic(ROOT_NAME, None));
        let invalid = catalog.push_category(LgpCategory::synthetic(INVALID_NAME, Some(root)));
        catalog.categories[root].children.push(invalid);

        // Pass 1: register every category before any wiring.
        let mut pending = Vec::new();
        for (file_idx, file) in files.iter().enumerate() {
            for raw in &file.categories {
                let ident = CategoryIdent::new(&file.target.namespace, &raw.name);
                if catalog.category_index.contains_key(&ident) {
                    warn!(
                        "Duplicate category {}:{} in {}; keeping the first definition",
                        file.target.prefix,
                        raw.name,
                        file.path.display()
                    );
                    continue;
                }
                let id = catalog.push_category(LgpCategory {
                    ident: ident.clone(),
                    display_name: raw.display_name.clone(),
                    explain_text: raw.explain_text.clone(),
                    source: Some(file_idx),
                    parent: None,
                    children: Vec::new(),
                    policies: Vec::new(),
                });
                catalog.category_index.insert(ident, id);
                pending.push((id, file_idx, raw.parent_category.clone()));
            }
        }

        // Pass 2: wire categories.
        for (id, file_idx, parent_ref) in pending {
            let parent = match parent_ref {
                None => root,
                Some(reference) => match catalog.resolve(&files[file_idx], &reference) {
                    Some(p) if !catalog.is_ancestor_or_self(id, p) => p,
                    Some(_) => {
                        warn!(
                            "Category {} has a cyclic parent {}; moved to INVALID",
                            catalog.categories[id].ident.name, reference
                        );
                        invalid
                    }
                    None => {
                        warn!(
                            "Category {} references unknown parent {} in {}; moved to INVALID",
                            catalog.categories[id].ident.name,
                            reference,
                            files[file_idx].path.display()
                        );
                        invalid
                    }
                },
            };
            catalog.categories[id].parent = Some(parent);
            catalog.categories[parent].children.push(id);
        }

        // Policies move out of their files into the arena.
        for file_idx in 0..files.len() {
            let policies = std::mem::take(&mut files[file_idx].policies);
            for policy in policies {
                let unique_id = policy.unique_id();
                if catalog.policy_index.contains_key(&unique_id) {
                    warn!(
                        "Duplicate policy {unique_id} in {}; keeping the first definition",
                        files[file_idx].path.display()
                    );
                    continue;
                }
                let category = match &policy.parent_category {
                    None => root,
                    Some(reference) => {
                        catalog.resolve(&files[file_idx], reference).unwrap_or_else(|| {
                            warn!(
                                "Policy {unique_id} references unknown category {reference}; \
                                 moved to INVALID"
                            );
                            invalid
                        })
                    }
                };
                let id = catalog.policies.len();
                catalog.categories[category].policies.push(id);
                catalog.policy_index.insert(unique_id.clone(), id);
                catalog.policies.push(LgpPolicy {
                    unique_id,
                    category,
                    source: file_idx,
                    policy,
                });
            }
        }

        debug!(
            "Catalog built from {} files: {} categories, {} policies",
            files.len(),
            catalog.categories.len() - 2,
            catalog.policies.len()
        );
        catalog.files = files;
        catalog
    }

    fn push_category(&mut self, category: LgpCategory) -> CategoryId {
        self.categories.push(category);
        self.categories.len() - 1
    }

    /// Resolve `prefix:name` (or bare `name`) as seen from `file`.
    fn resolve(&self, file: &AdmxFile, reference: &str) -> Option<CategoryId> {
        let (prefix, name) = reference
            .split_once(':')
            .unwrap_or((file.target.prefix.as_str(), reference));
        let namespace = file.namespace_for_prefix(prefix)?;
        self.category_index
            .get(&CategoryIdent::new(namespace, name))
            .copied()
    }

    fn is_ancestor_or_self(&self, id: CategoryId, candidate: CategoryId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(c) = cursor {
            if c == id {
                return true;
            }
            cursor = self.categories[c].parent;
        }
        false
    }

    // ─── Lookups ────────────────────────────────────────────────────────

    pub fn root(&self) -> CategoryId {
        0
    }

    pub fn invalid(&self) -> CategoryId {
        1
    }

    pub fn category(&self, id: CategoryId) -> Option<&LgpCategory> {
        self.categories.get(id)
    }

    pub fn find_category(&self, namespace: &str, name: &str) -> Option<CategoryId> {
        self.category_index
            .get(&CategoryIdent::new(namespace, name))
            .copied()
    }

    pub fn policy(&self, id: PolicyId) -> Option<&LgpPolicy> {
        self.policies.get(id)
    }

    /// Look a policy up by `prefix:name`. Case-insensitive fallback.
    pub fn find_policy(&self, unique_id: &str) -> Option<&LgpPolicy> {
        if let Some(&id) = self.policy_index.get(unique_id) {
            return self.policies.get(id);
        }
        self.policies
            .iter()
            .find(|p| p.unique_id.eq_ignore_ascii_case(unique_id))
    }

    pub fn policies(&self) -> impl Iterator<Item = &LgpPolicy> {
        self.policies.iter()
    }

    pub fn files(&self) -> &[AdmxFile] {
        &self.files
    }

    /// Whether `category` or any descendant holds a policy applicable to
    /// `class`. `Both` policies match either class.
    pub fn has_policy_with_class(&self, category: CategoryId, class: PolicyClass) -> bool {
        let Some(cat) = self.categories.get(category) else {
            return false;
        };
        cat.policies
            .iter()
            .any(|&p| self.policies[p].policy.class.applies_to(class))
            || cat
                .children
                .iter()
                .any(|&c| self.has_policy_with_class(c, class))
    }

    // ─── Localized lookups ──────────────────────────────────────────────

    fn resources_of(&self, source: usize) -> Option<&AdmlResources> {
        self.files.get(source).and_then(|f| f.resources.as_ref())
    }

    fn localize(&self, source: Option<usize>, reference: &str) -> String {
        match source.and_then(|s| self.resources_of(s)) {
            Some(res) => res.resolve_string(reference).to_string(),
            None => reference.to_string(),
        }
    }

    pub fn display_name(&self, policy: &LgpPolicy) -> String {
        self.localize(Some(policy.source), &policy.policy.display_name)
    }

    pub fn explain_text(&self, policy: &LgpPolicy) -> Option<String> {
        policy
            .policy
            .explain_text
            .as_deref()
            .map(|r| self.localize(Some(policy.source), r))
    }

    pub fn presentation(&self, policy: &LgpPolicy) -> Option<&Presentation> {
        let reference = policy.policy.presentation.as_deref()?;
        self.resources_of(policy.source)?.presentation(reference)
    }

    pub fn category_display_name(&self, id: CategoryId) -> String {
        match self.categories.get(id) {
            Some(cat) => self.localize(cat.source, &cat.display_name),
            None => String::new(),
        }
    }

    /// Resolve the policy's `supportedOn` reference to its definition.
    pub fn supported_on(&self, policy: &LgpPolicy) -> Option<&SupportedOnDefinition> {
        let reference = policy.policy.supported_on.as_deref()?;
        let file = self.files.get(policy.source)?;
        let (prefix, name) = reference
            .split_once(':')
            .unwrap_or((file.target.prefix.as_str(), reference));
        let namespace = file.namespace_for_prefix(prefix)?;
        self.files
            .iter()
            .filter(|f| f.target.namespace == namespace)
            .filter_map(|f| f.supported_on.as_ref())
            .flat_map(|t| t.definitions.iter())
            .find(|d| d.name == name)
    }

    pub fn supported_on_display(&self, policy: &LgpPolicy) -> Option<String> {
        let definition = self.supported_on(policy)?;
        let file = self.files.get(policy.source)?;
        let (prefix, _) = policy
            .policy
            .supported_on
            .as_deref()?
            .split_once(':')
            .unwrap_or(("", ""));
        let owner = if prefix.is_empty() {
            Some(policy.source)
        } else {
            let ns = file.namespace_for_prefix(prefix)?;
            self.files.iter().position(|f| f.target.namespace == ns)
        };
        Some(self.localize(owner, &definition.display_name))
    }

    /// Swap in freshly parsed resources, one slot per loaded file in
    /// `files()` order. Structural data is untouched.
    pub fn apply_resources(&mut self, resources: Vec<Option<AdmlResources>>) {
        for (file, res) in self.files.iter_mut().zip(resources) {
            file.resources = res;
        }
    }
}

impl LgpCategory {
    fn synthetic(name: &str, parent: Option<CategoryId>) -> Self {
        Self {
            ident: CategoryIdent::new(SYNTHETIC_NAMESPACE, name),
            display_name: name.to_string(),
            explain_text: None,
            source: None,
            parent,
            children: Vec::new(),
            policies: Vec::new(),
        }
    }
}
