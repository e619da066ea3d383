//! Data model for parsed policy definitions.
//!
//! Everything here is produced by the ADMX/ADML parsers and is immutable
//! once a catalog has been built. Cross-file references are kept as the raw
//! `prefix:name` strings found in the XML; the catalog resolves them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::values::{ValueBase, ValueItem};

// ─── Namespaces & identities ────────────────────────────────────────────

/// Which registry section a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyClass {
    Machine,
    User,
    Both,
}

impl PolicyClass {
    pub fn from_str_loose(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "machine" | "computer" | "m" => Some(Self::Machine),
            "user" | "u" => Some(Self::User),
            "both" => Some(Self::Both),
            _ => None,
        }
    }

    /// Whether a policy of class `self` applies to the (narrowed) `class`.
    pub fn applies_to(&self, class: PolicyClass) -> bool {
        match self {
            Self::Both => true,
            other => *other == class || class == Self::Both,
        }
    }
}

impl fmt::Display for PolicyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machine => write!(f, "Machine"),
            Self::User => write!(f, "User"),
            Self::Both => write!(f, "Both"),
        }
    }
}

/// A definition file's namespace URI and the prefix it is known by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyNamespace {
    pub namespace: String,
    pub prefix: String,
}

/// Globally unique key of a category across all loaded files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryIdent {
    pub namespace: String,
    pub name: String,
}

impl CategoryIdent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

// ─── Categories & policies ──────────────────────────────────────────────

/// A category exactly as declared in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub display_name: String,
    pub explain_text: Option<String>,
    /// Raw `parentCategory ref`, possibly prefixed.
    pub parent_category: Option<String>,
}

/// One configurable setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub name: String,
    /// Prefix of the defining file's target namespace.
    pub prefix: String,
    pub namespace: String,
    pub class: PolicyClass,
    pub display_name: String,
    pub explain_text: Option<String>,
    pub presentation: Option<String>,
    pub registry_key: String,
    pub value_name: Option<String>,
    pub parent_category: Option<String>,
    pub supported_on: Option<String>,
    pub enabled_value: Option<ValueBase>,
    pub disabled_value: Option<ValueBase>,
    /// Normalized: includes the implicit enabled value as first item.
    pub enabled_list: Vec<ValueItem>,
    /// Normalized: includes the implicit disabled value as first item.
    pub disabled_list: Vec<ValueItem>,
    pub elements: Vec<PolicyElement>,
}

impl Policy {
    /// `prefix:name`, the identity used by the catalog and the command line.
    pub fn unique_id(&self) -> String {
        format!("{}:{}", self.prefix, self.name)
    }

    pub fn element(&self, id: &str) -> Option<&PolicyElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// True when one of the policy's own elements writes to the policy's
    /// key under `value_name`.
    pub fn element_claims(&self, value_name: &str) -> bool {
        self.elements.iter().any(|e| {
            e.registry_key
                .as_deref()
                .map_or(true, |k| k.eq_ignore_ascii_case(&self.registry_key))
                && e.value_name
                    .as_deref()
                    .is_some_and(|v| v.eq_ignore_ascii_case(value_name))
        })
    }

    pub fn has_simple_items(&self) -> bool {
        !self.enabled_list.is_empty() || !self.disabled_list.is_empty()
    }
}

// ─── Elements ───────────────────────────────────────────────────────────

/// One typed input slot within a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyElement {
    pub id: String,
    pub client_extension: Option<String>,
    /// Override of the policy's key; `None` falls back to the policy's.
    pub registry_key: Option<String>,
    /// Override of the policy's value name; `None` falls back to the policy's.
    pub value_name: Option<String>,
    pub kind: ElementKind,
}

impl PolicyElement {
    pub fn resolved_key<'a>(&'a self, policy: &'a Policy) -> &'a str {
        self.registry_key.as_deref().unwrap_or(&policy.registry_key)
    }

    pub fn resolved_value_name<'a>(&'a self, policy: &'a Policy) -> &'a str {
        self.value_name
            .as_deref()
            .or(policy.value_name.as_deref())
            .unwrap_or("")
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Optional elements may be left without a value when enabling.
    /// Booleans and lists always carry one.
    pub fn is_optional(&self) -> bool {
        match &self.kind {
            ElementKind::Decimal(d) => !d.required,
            ElementKind::LongDecimal(d) => !d.required,
            ElementKind::Text(t) => !t.required,
            ElementKind::MultiText(m) => !m.required,
            ElementKind::Enum(e) => !e.required,
            ElementKind::Boolean(_) | ElementKind::List(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Boolean(BooleanElement),
    Decimal(DecimalElement),
    LongDecimal(LongDecimalElement),
    Text(TextElement),
    MultiText(MultiTextElement),
    Enum(EnumElement),
    List(ListElement),
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Decimal(_) => "decimal",
            Self::LongDecimal(_) => "longDecimal",
            Self::Text(_) => "text",
            Self::MultiText(_) => "multiText",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
        }
    }
}

/// Checkbox-like element. Both lists are non-empty after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanElement {
    pub true_values: Vec<ValueItem>,
    pub false_values: Vec<ValueItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimalElement {
    pub min_value: u32,
    pub max_value: u32,
    pub store_as_text: bool,
    pub required: bool,
    pub soft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongDecimalElement {
    pub min_value: u64,
    pub max_value: u64,
    pub store_as_text: bool,
    pub required: bool,
    pub soft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub max_length: u32,
    pub required: bool,
    pub expandable: bool,
    pub soft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTextElement {
    pub max_length: u32,
    /// Zero means unlimited.
    pub max_strings: u32,
    pub required: bool,
    pub soft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumElement {
    pub items: Vec<EnumItem>,
    pub required: bool,
}

/// One choice of an enum element: a bundle of values written together.
/// The first value targets the element's own slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumItem {
    pub display_name: String,
    pub values: Vec<ValueItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListElement {
    pub additive: bool,
    pub explicit_value: bool,
    pub value_prefix: Option<String>,
    pub expandable: bool,
}

// ─── Supported-on table ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedOnTable {
    pub products: Vec<SupportedProduct>,
    pub definitions: Vec<SupportedOnDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedProduct {
    pub name: String,
    pub display_name: String,
    pub major_versions: Vec<SupportedMajorVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedMajorVersion {
    pub name: String,
    pub display_name: String,
    pub version_index: u32,
    pub minor_versions: Vec<SupportedMinorVersion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedMinorVersion {
    pub name: String,
    pub display_name: String,
    pub version_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedOnDefinition {
    pub name: String,
    pub display_name: String,
    pub rule: SupportedOnRule,
}

/// `<or>` / `<and>` tree of version ranges and references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupportedOnRule {
    None,
    AnyOf(Vec<SupportedOnEntry>),
    AllOf(Vec<SupportedOnEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupportedOnEntry {
    Range {
        reference: String,
        min_version_index: Option<u32>,
        max_version_index: Option<u32>,
    },
    Reference {
        reference: String,
    },
}

// ─── Presentation (ADML) ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub id: String,
    pub controls: Vec<PresentationControl>,
}

impl Presentation {
    pub fn control_for(&self, ref_id: &str) -> Option<&PresentationControl> {
        self.controls.iter().find(|c| c.ref_id() == Some(ref_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "control", rename_all = "camelCase")]
pub enum PresentationControl {
    Text {
        text: String,
    },
    DecimalTextBox {
        ref_id: String,
        label: String,
        default_value: u32,
        spin: bool,
        spin_step: u32,
    },
    LongDecimalTextBox {
        ref_id: String,
        label: String,
        default_value: u64,
        spin: bool,
        spin_step: u64,
    },
    TextBox {
        ref_id: String,
        label: String,
        default_value: Option<String>,
    },
    MultiTextBox {
        ref_id: String,
        label: String,
        show_as_dialog: bool,
        default_height: u32,
    },
    CheckBox {
        ref_id: String,
        label: String,
        default_checked: bool,
    },
    ComboBox {
        ref_id: String,
        label: String,
        default_value: Option<String>,
        suggestions: Vec<String>,
        no_sort: bool,
    },
    DropdownList {
        ref_id: String,
        label: String,
        default_item: Option<usize>,
        no_sort: bool,
    },
    ListBox {
        ref_id: String,
        label: String,
    },
}

impl PresentationControl {
    pub fn ref_id(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::DecimalTextBox { ref_id, .. }
            | Self::LongDecimalTextBox { ref_id, .. }
            | Self::TextBox { ref_id, .. }
            | Self::MultiTextBox { ref_id, .. }
            | Self::CheckBox { ref_id, .. }
            | Self::ComboBox { ref_id, .. }
            | Self::DropdownList { ref_id, .. }
            | Self::ListBox { ref_id, .. } => Some(ref_id),
        }
    }
}

/// Localized strings and presentations from one ADML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmlResources {
    pub language: String,
    pub display_name: String,
    pub description: String,
    pub strings: HashMap<String, String>,
    pub presentations: HashMap<String, Presentation>,
}

impl AdmlResources {
    /// Resolve a `$(string.Id)` reference. Literal text passes through.
    pub fn resolve_string<'a>(&'a self, reference: &'a str) -> &'a str {
        match strip_reference(reference, "string") {
            Some(id) => self.strings.get(id).map(String::as_str).unwrap_or(reference),
            None => reference,
        }
    }

    /// Resolve a `$(presentation.Id)` reference.
    pub fn presentation(&self, reference: &str) -> Option<&Presentation> {
        let id = strip_reference(reference, "presentation").unwrap_or(reference);
        self.presentations.get(id)
    }
}

/// Extract `Id` from `$(kind.Id)`.
pub fn strip_reference<'a>(reference: &'a str, kind: &str) -> Option<&'a str> {
    let inner = reference.strip_prefix("$(")?.strip_suffix(')')?;
    let (k, id) = inner.split_once('.')?;
    (k == kind).then_some(id)
}

// ─── Content unit ───────────────────────────────────────────────────────

/// One parsed `.admx` file plus its localized resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmxFile {
    pub path: PathBuf,
    pub target: PolicyNamespace,
    /// Imported namespaces keyed by the local prefix.
    pub imports: BTreeMap<String, String>,
    pub revision: Option<String>,
    pub categories: Vec<Category>,
    pub policies: Vec<Policy>,
    pub supported_on: Option<SupportedOnTable>,
    pub resources: Option<AdmlResources>,
}

impl AdmxFile {
    /// Map a local prefix to a namespace URI. The file's own prefix maps to
    /// its target namespace.
    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix == self.target.prefix {
            return Some(&self.target.namespace);
        }
        self.imports.get(prefix).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_reference_extracts_id() {
        assert_eq!(strip_reference("$(string.Foo)", "string"), Some("Foo"));
        assert_eq!(strip_reference("$(presentation.Bar)", "string"), None);
        assert_eq!(strip_reference("plain text", "string"), None);
    }

    #[test]
    fn class_applies_to() {
        assert!(PolicyClass::Both.applies_to(PolicyClass::User));
        assert!(PolicyClass::Machine.applies_to(PolicyClass::Machine));
        assert!(!PolicyClass::Machine.applies_to(PolicyClass::User));
        assert!(PolicyClass::User.applies_to(PolicyClass::Both));
    }

    #[test]
    fn class_from_str_loose() {
        assert_eq!(PolicyClass::from_str_loose("Machine"), Some(PolicyClass::Machine));
        assert_eq!(PolicyClass::from_str_loose("user"), Some(PolicyClass::User));
        assert_eq!(PolicyClass::from_str_loose("BOTH"), Some(PolicyClass::Both));
        assert_eq!(PolicyClass::from_str_loose("nobody"), None);
    }

    #[test]
    fn optional_follows_required_flag() {
        let element = |kind| PolicyElement {
            id: "E".into(),
            client_extension: None,
            registry_key: None,
            value_name: Some("E".into()),
            kind,
        };
        let decimal = |required| {
            ElementKind::Decimal(DecimalElement {
                min_value: 0,
                max_value: 9,
                store_as_text: false,
                required,
                soft: false,
            })
        };
        assert!(element(decimal(false)).is_optional());
        assert!(!element(decimal(true)).is_optional());

        let choice = |required| {
            ElementKind::Enum(EnumElement {
                items: Vec::new(),
                required,
            })
        };
        assert!(element(choice(false)).is_optional());
        assert!(!element(choice(true)).is_optional());

        let flag = ElementKind::Boolean(BooleanElement {
            true_values: Vec::new(),
            false_values: Vec::new(),
        });
        assert!(!element(flag).is_optional());
    }

    #[test]
    fn resources_resolve_strings() {
        let mut res = AdmlResources::default();
        res.strings.insert("Hello".into(), "Hello, world".into());
        assert_eq!(res.resolve_string("$(string.Hello)"), "Hello, world");
        assert_eq!(res.resolve_string("$(string.Missing)"), "$(string.Missing)");
        assert_eq!(res.resolve_string("Literal"), "Literal");
    }
}
