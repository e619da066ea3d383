//! ADMX (structural definition) parser.
//!
//! Turns one `policyDefinitions` document into an [`AdmxFile`]. Value lists
//! are normalized on the way in so the engine only ever sees complete
//! `ValueItem` lists:
//! - list items without a key inherit the list's `defaultKey`, then the
//!   owner's key
//! - single enabled/disabled values become the first list item unless an
//!   element writes the same value name
//! - boolean sides without any value get the canonical default

use log::{debug, warn};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AdmxError, AdmxResult};
use crate::types::*;
use crate::values::{ValueBase, ValueItem};
use crate::xml::{parse_document, XmlElement};

const DEFAULT_DECIMAL_MAX: u32 = 9999;
const DEFAULT_TEXT_MAX_LENGTH: u32 = 1023;

/// Parse an ADMX document. `path` is recorded for diagnostics only.
pub fn parse_admx(xml: &str, path: &Path) -> AdmxResult<AdmxFile> {
    let root = parse_document(xml)?;
    if root.name != "policyDefinitions" {
        return Err(AdmxError::UnexpectedRoot {
            expected: "policyDefinitions".into(),
            found: root.name,
        });
    }

    let namespaces = root.required_child("policyNamespaces")?;
    let target_el = namespaces.required_child("target")?;
    let target = PolicyNamespace {
        namespace: target_el.required_attr("namespace")?.to_string(),
        prefix: target_el.required_attr("prefix")?.to_string(),
    };

    let mut imports = BTreeMap::new();
    for using in namespaces.children_named("using") {
        imports.insert(
            using.required_attr("prefix")?.to_string(),
            using.required_attr("namespace")?.to_string(),
        );
    }

    let mut categories = Vec::new();
    if let Some(cats) = root.child("categories") {
        for cat in cats.children_named("category") {
            categories.push(parse_category(cat)?);
        }
    }

    let mut policies = Vec::new();
    if let Some(pols) = root.child("policies") {
        for pol in pols.children_named("policy") {
            policies.push(parse_policy(pol, &target)?);
        }
    }

    let supported_on = root.child("supportedOn").map(parse_supported_on).transpose()?;

    debug!(
        "Parsed {}: {} categories, {} policies",
        path.display(),
        categories.len(),
        policies.len()
    );

    Ok(AdmxFile {
        path: path.to_path_buf(),
        target,
        imports,
        revision: root.attr("revision").map(str::to_string),
        categories,
        policies,
        supported_on,
        resources: None,
    })
}

fn parse_category(el: &XmlElement) -> AdmxResult<Category> {
    Ok(Category {
        name: el.required_attr("name")?.to_string(),
        display_name: el.required_attr("displayName")?.to_string(),
        explain_text: el.attr("explainText").map(str::to_string),
        parent_category: parent_ref(el)?,
    })
}

fn parent_ref(el: &XmlElement) -> AdmxResult<Option<String>> {
    el.child("parentCategory")
        .map(|p| p.required_attr("ref").map(str::to_string))
        .transpose()
}

// ─── Policies ───────────────────────────────────────────────────────────

fn parse_policy(el: &XmlElement, target: &PolicyNamespace) -> AdmxResult<Policy> {
    let name = el.required_attr("name")?.to_string();
    let class_attr = el.required_attr("class")?;
    let class = match class_attr {
        "Machine" => PolicyClass::Machine,
        "User" => PolicyClass::User,
        "Both" => PolicyClass::Both,
        other => {
            return Err(AdmxError::invalid("policy", format!("unknown class '{other}' on {name}")))
        }
    };
    let registry_key = el.required_attr("key")?.to_string();
    let value_name = el.attr("valueName").map(str::to_string);

    let mut policy = Policy {
        name,
        prefix: target.prefix.clone(),
        namespace: target.namespace.clone(),
        class,
        display_name: el.required_attr("displayName")?.to_string(),
        explain_text: el.attr("explainText").map(str::to_string),
        presentation: el.attr("presentation").map(str::to_string),
        registry_key,
        value_name,
        parent_category: parent_ref(el)?,
        supported_on: el
            .child("supportedOn")
            .map(|s| s.required_attr("ref").map(str::to_string))
            .transpose()?,
        enabled_value: el.child("enabledValue").map(parse_value_union).transpose()?,
        disabled_value: el.child("disabledValue").map(parse_value_union).transpose()?,
        enabled_list: Vec::new(),
        disabled_list: Vec::new(),
        elements: Vec::new(),
    };

    if let Some(elements) = el.child("elements") {
        for child in elements.elements() {
            let element = parse_element(child, &policy)?;
            policy.elements.push(element);
        }
    }

    let explicit_enabled = el
        .child("enabledList")
        .map(|l| parse_item_list(l, &policy.registry_key))
        .transpose()?;
    let explicit_disabled = el
        .child("disabledList")
        .map(|l| parse_item_list(l, &policy.registry_key))
        .transpose()?;

    let (enabled_list, disabled_list) =
        normalize_policy_lists(&policy, explicit_enabled, explicit_disabled);
    policy.enabled_list = enabled_list;
    policy.disabled_list = disabled_list;
    Ok(policy)
}

/// Build the policy's final enabled/disabled item lists.
fn normalize_policy_lists(
    policy: &Policy,
    explicit_enabled: Option<Vec<ValueItem>>,
    explicit_disabled: Option<Vec<ValueItem>>,
) -> (Vec<ValueItem>, Vec<ValueItem>) {
    let own_slot = policy
        .value_name
        .as_deref()
        .filter(|v| !v.is_empty() && !policy.element_claims(v));

    let mut enabled = Vec::new();
    let mut disabled = Vec::new();

    match own_slot {
        Some(value_name) => {
            let on = policy.enabled_value.clone().or_else(|| {
                explicit_enabled.is_none().then_some(ValueBase::Decimal(1))
            });
            let off = policy
                .disabled_value
                .clone()
                .or_else(|| explicit_disabled.is_none().then_some(ValueBase::Delete));
            if let Some(on) = on {
                enabled.push(ValueItem::new(&policy.registry_key, value_name, on));
            }
            if let Some(off) = off {
                disabled.push(ValueItem::new(&policy.registry_key, value_name, off));
            }
        }
        None => {
            if policy.enabled_value.is_some() || policy.disabled_value.is_some() {
                warn!(
                    "Policy {} declares enabled/disabled values without a usable value name; \
                     ignoring them",
                    policy.unique_id()
                );
            }
        }
    }

    enabled.extend(explicit_enabled.unwrap_or_default());
    disabled.extend(explicit_disabled.unwrap_or_default());

    if disabled.is_empty() && !enabled.is_empty() {
        disabled = as_deletes(&enabled);
    } else if enabled.is_empty() && !disabled.is_empty() {
        enabled = as_deletes(&disabled);
    }

    (dedup_slots(enabled), dedup_slots(disabled))
}

fn as_deletes(items: &[ValueItem]) -> Vec<ValueItem> {
    items
        .iter()
        .map(|i| ValueItem::new(&i.registry_key, &i.value_name, ValueBase::Delete))
        .collect()
}

/// Keep the first item per registry slot.
fn dedup_slots(items: Vec<ValueItem>) -> Vec<ValueItem> {
    let mut out: Vec<ValueItem> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|o| o.same_slot(&item)) {
            out.push(item);
        }
    }
    out
}

/// `<value>` / `<enabledValue>` etc: exactly one of delete, decimal,
/// longDecimal or string.
fn parse_value_union(el: &XmlElement) -> AdmxResult<ValueBase> {
    let inner = el
        .elements()
        .next()
        .ok_or_else(|| AdmxError::invalid(&el.name, "empty value"))?;
    match inner.name.as_str() {
        "delete" => Ok(ValueBase::Delete),
        "decimal" => {
            let v = inner
                .u32_attr("value")?
                .ok_or_else(|| AdmxError::missing_attr("decimal", "value"))?;
            Ok(ValueBase::Decimal(v))
        }
        "longDecimal" => {
            let v = inner
                .u64_attr("value")?
                .ok_or_else(|| AdmxError::missing_attr("longDecimal", "value"))?;
            Ok(ValueBase::LongDecimal(v))
        }
        "string" => Ok(ValueBase::String(inner.text())),
        other => Err(AdmxError::invalid(&el.name, format!("unknown value type <{other}>"))),
    }
}

/// `<enabledList>`, `<trueList>`, `<valueList>`…: `defaultKey` falls back
/// to `owner_key`.
fn parse_item_list(el: &XmlElement, owner_key: &str) -> AdmxResult<Vec<ValueItem>> {
    let default_key = el.attr("defaultKey").unwrap_or(owner_key);
    el.children_named("item")
        .map(|item| {
            let value = parse_value_union(item.required_child("value")?)?;
            Ok(ValueItem::new(
                item.attr("key").unwrap_or(default_key),
                item.required_attr("valueName")?,
                value,
            ))
        })
        .collect()
}

// ─── Elements ───────────────────────────────────────────────────────────

fn parse_element(el: &XmlElement, policy: &Policy) -> AdmxResult<PolicyElement> {
    let registry_key = el.attr("key").map(str::to_string);
    let value_name = el.attr("valueName").map(str::to_string);
    let key = registry_key.clone().unwrap_or_else(|| policy.registry_key.clone());
    let name = value_name
        .clone()
        .or_else(|| policy.value_name.clone())
        .unwrap_or_default();

    let kind = match el.name.as_str() {
        "boolean" => ElementKind::Boolean(parse_boolean(el, &key, &name)?),
        "decimal" => {
            let min_value = el.u32_attr("minValue")?.unwrap_or(0);
            let max_value = el.u32_attr("maxValue")?.unwrap_or(DEFAULT_DECIMAL_MAX);
            if min_value > max_value {
                return Err(AdmxError::invalid(
                    "decimal",
                    format!("minValue {min_value} > maxValue {max_value}"),
                ));
            }
            ElementKind::Decimal(DecimalElement {
                min_value,
                max_value,
                store_as_text: el.bool_attr("storeAsText", false)?,
                required: el.bool_attr("required", false)?,
                soft: el.bool_attr("soft", false)?,
            })
        }
        "longDecimal" => {
            let min_value = el.u64_attr("minValue")?.unwrap_or(0);
            let max_value = el.u64_attr("maxValue")?.unwrap_or(u64::from(DEFAULT_DECIMAL_MAX));
            if min_value > max_value {
                return Err(AdmxError::invalid(
                    "longDecimal",
                    format!("minValue {min_value} > maxValue {max_value}"),
                ));
            }
            ElementKind::LongDecimal(LongDecimalElement {
                min_value,
                max_value,
                store_as_text: el.bool_attr("storeAsText", false)?,
                required: el.bool_attr("required", false)?,
                soft: el.bool_attr("soft", false)?,
            })
        }
        "text" => ElementKind::Text(TextElement {
            max_length: el.u32_attr("maxLength")?.unwrap_or(DEFAULT_TEXT_MAX_LENGTH),
            required: el.bool_attr("required", false)?,
            expandable: el.bool_attr("expandable", false)?,
            soft: el.bool_attr("soft", false)?,
        }),
        "multiText" => ElementKind::MultiText(MultiTextElement {
            max_length: el.u32_attr("maxLength")?.unwrap_or(DEFAULT_TEXT_MAX_LENGTH),
            max_strings: el.u32_attr("maxStrings")?.unwrap_or(0),
            required: el.bool_attr("required", false)?,
            soft: el.bool_attr("soft", false)?,
        }),
        "enum" => {
            let mut items = Vec::new();
            for item in el.children_named("item") {
                let first = parse_value_union(item.required_child("value")?)?;
                let mut values = vec![ValueItem::new(&key, &name, first)];
                if let Some(list) = item.child("valueList") {
                    values.extend(parse_item_list(list, &key)?);
                }
                items.push(EnumItem {
                    display_name: item.required_attr("displayName")?.to_string(),
                    values,
                });
            }
            if items.is_empty() {
                let id = el.attr("id").unwrap_or("?");
                return Err(AdmxError::invalid("enum", format!("{id} has no items")));
            }
            ElementKind::Enum(EnumElement {
                items,
                required: el.bool_attr("required", false)?,
            })
        }
        "list" => ElementKind::List(ListElement {
            additive: el.bool_attr("additive", false)?,
            explicit_value: el.bool_attr("explicitValue", false)?,
            value_prefix: el.attr("valuePrefix").map(str::to_string),
            expandable: el.bool_attr("expandable", false)?,
        }),
        other => {
            return Err(AdmxError::invalid("elements", format!("unknown element type <{other}>")))
        }
    };

    Ok(PolicyElement {
        id: el.required_attr("id")?.to_string(),
        client_extension: el.attr("clientExtension").map(str::to_string),
        registry_key,
        value_name,
        kind,
    })
}

fn parse_boolean(el: &XmlElement, key: &str, name: &str) -> AdmxResult<BooleanElement> {
    let side = |value_tag: &str, list_tag: &str, default: ValueBase| -> AdmxResult<Vec<ValueItem>> {
        let mut items = Vec::new();
        if let Some(v) = el.child(value_tag) {
            items.push(ValueItem::new(key, name, parse_value_union(v)?));
        }
        if let Some(list) = el.child(list_tag) {
            items.extend(parse_item_list(list, key)?);
        }
        if items.is_empty() {
            items.push(ValueItem::new(key, name, default));
        }
        Ok(dedup_slots(items))
    };

    Ok(BooleanElement {
        true_values: side("trueValue", "trueList", ValueBase::Decimal(1))?,
        false_values: side("falseValue", "falseList", ValueBase::Delete)?,
    })
}

// ─── Supported-on ───────────────────────────────────────────────────────

fn parse_supported_on(el: &XmlElement) -> AdmxResult<SupportedOnTable> {
    let mut table = SupportedOnTable::default();

    if let Some(products) = el.child("products") {
        for product in products.children_named("product") {
            let mut major_versions = Vec::new();
            for major in product.children_named("majorVersion") {
                let mut minor_versions = Vec::new();
                for minor in major.children_named("minorVersion") {
                    minor_versions.push(SupportedMinorVersion {
                        name: minor.required_attr("name")?.to_string(),
                        display_name: minor.required_attr("displayName")?.to_string(),
                        version_index: minor
                            .u32_attr("versionIndex")?
                            .ok_or_else(|| {
                                AdmxError::missing_attr("minorVersion", "versionIndex")
                            })?,
                    });
                }
                major_versions.push(SupportedMajorVersion {
                    name: major.required_attr("name")?.to_string(),
                    display_name: major.required_attr("displayName")?.to_string(),
                    version_index: major
                        .u32_attr("versionIndex")?
                        .ok_or_else(|| AdmxError::missing_attr("majorVersion", "versionIndex"))?,
                    minor_versions,
                });
            }
            table.products.push(SupportedProduct {
                name: product.required_attr("name")?.to_string(),
                display_name: product.required_attr("displayName")?.to_string(),
                major_versions,
            });
        }
    }

    if let Some(defs) = el.child("definitions") {
        for def in defs.children_named("definition") {
            let rule = if let Some(or) = def.child("or") {
                SupportedOnRule::AnyOf(parse_supported_entries(or)?)
            } else if let Some(and) = def.child("and") {
                SupportedOnRule::AllOf(parse_supported_entries(and)?)
            } else {
                SupportedOnRule::None
            };
            table.definitions.push(SupportedOnDefinition {
                name: def.required_attr("name")?.to_string(),
                display_name: def.required_attr("displayName")?.to_string(),
                rule,
            });
        }
    }

    Ok(table)
}

fn parse_supported_entries(el: &XmlElement) -> AdmxResult<Vec<SupportedOnEntry>> {
    let mut entries = Vec::new();
    for child in el.elements() {
        let reference = child.required_attr("ref")?.to_string();
        match child.name.as_str() {
            "range" => entries.push(SupportedOnEntry::Range {
                reference,
                min_version_index: child.u32_attr("minVersionIndex")?,
                max_version_index: child.u32_attr("maxVersionIndex")?,
            }),
            "reference" => entries.push(SupportedOnEntry::Reference { reference }),
            other => {
                return Err(AdmxError::invalid(
                    &el.name,
                    format!("unknown supportedOn entry <{other}>"),
                ));
            }
        }
    }
    Ok(entries)
}
