//! Typed element values for one policy and class.

use gpm_admx::{ElementKind, Policy, PolicyClass, PolicyElement, Presentation, PresentationControl};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// The value of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ElementValue {
    Boolean(bool),
    Decimal(u32),
    LongDecimal(u64),
    Text(String),
    MultiText(Vec<String>),
    /// Index into the enum's items.
    Enum(usize),
    List(Vec<String>),
    /// Explicit-value lists: `(value name, data)` pairs.
    KeyValueList(Vec<(String, String)>),
}

/// Where a set of values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    Defaults,
    Edited,
    CommandLine,
    CurrentOnSystem,
}

/// Working set of element values, one (possibly empty) slot per element in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementValues {
    pub policy_id: String,
    pub class: PolicyClass,
    pub source: ValueSource,
    values: Vec<(String, Option<ElementValue>)>,
}

impl ElementValues {
    pub fn new(policy: &Policy, class: PolicyClass, source: ValueSource) -> Self {
        Self {
            policy_id: policy.unique_id(),
            class,
            source,
            values: policy.elements.iter().map(|e| (e.id.clone(), None)).collect(),
        }
    }

    /// Values seeded from the presentation's defaults.
    pub fn defaults(
        policy: &Policy,
        class: PolicyClass,
        presentation: Option<&Presentation>,
    ) -> Self {
        let mut values = Self::new(policy, class, ValueSource::Defaults);
        for element in &policy.elements {
            let control = presentation.and_then(|p| p.control_for(&element.id));
            if let Some(value) = default_for(element, control) {
                if validate(element, &value).is_ok() {
                    values.put(&element.id, Some(value));
                }
            }
        }
        values
    }

    pub(crate) fn put(&mut self, id: &str, value: Option<ElementValue>) {
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| k == id) {
            slot.1 = value;
        }
    }

    /// Validate and store a value for element `id`.
    pub fn set(&mut self, policy: &Policy, id: &str, value: ElementValue) -> EngineResult<()> {
        let element = policy
            .element(id)
            .ok_or_else(|| EngineError::UnknownElement(id.to_string()))?;
        validate(element, &value)?;
        self.put(&element.id, Some(value));
        Ok(())
    }

    pub fn clear(&mut self, id: &str) {
        self.put(id, None);
    }

    pub fn get(&self, id: &str) -> Option<&ElementValue> {
        self.values
            .iter()
            .find(|(k, _)| k == id)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ElementValue>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// First non-optional element without a value.
    pub fn first_missing<'p>(&self, policy: &'p Policy) -> Option<&'p PolicyElement> {
        policy
            .elements
            .iter()
            .find(|e| !e.is_optional() && self.get(&e.id).is_none())
    }

    pub fn is_complete(&self, policy: &Policy) -> bool {
        self.first_missing(policy).is_none()
    }
}

fn default_for(
    element: &PolicyElement,
    control: Option<&PresentationControl>,
) -> Option<ElementValue> {
    use PresentationControl as Control;

    match (&element.kind, control) {
        (ElementKind::Boolean(_), Some(Control::CheckBox { default_checked, .. })) => {
            Some(ElementValue::Boolean(*default_checked))
        }
        (ElementKind::Boolean(_), _) => Some(ElementValue::Boolean(false)),
        (ElementKind::Decimal(d), Some(Control::DecimalTextBox { default_value, .. })) => {
            Some(ElementValue::Decimal((*default_value).clamp(d.min_value, d.max_value)))
        }
        (ElementKind::Decimal(d), _) => Some(ElementValue::Decimal(d.min_value)),
        (ElementKind::LongDecimal(d), Some(Control::LongDecimalTextBox { default_value, .. })) => {
            Some(ElementValue::LongDecimal((*default_value).clamp(d.min_value, d.max_value)))
        }
        (ElementKind::LongDecimal(d), _) => Some(ElementValue::LongDecimal(d.min_value)),
        (ElementKind::Text(_), Some(Control::TextBox { default_value: Some(v), .. }))
        | (ElementKind::Text(_), Some(Control::ComboBox { default_value: Some(v), .. })) => {
            Some(ElementValue::Text(v.clone()))
        }
        (ElementKind::Enum(_), Some(Control::DropdownList { default_item: Some(i), .. })) => {
            Some(ElementValue::Enum(*i))
        }
        (ElementKind::Enum(_), _) => Some(ElementValue::Enum(0)),
        _ => None,
    }
}

fn check_len(element: &PolicyElement, s: &str, max: u32) -> EngineResult<()> {
    let len = s.chars().count();
    if len > max as usize {
        return Err(EngineError::out_of_range(&element.id, format!("length {len} exceeds {max}")));
    }
    Ok(())
}

/// Check `value` against the element's type and limits.
pub fn validate(element: &PolicyElement, value: &ElementValue) -> EngineResult<()> {
    let id = element.id.as_str();
    match (&element.kind, value) {
        (ElementKind::Boolean(_), ElementValue::Boolean(_)) => Ok(()),
        (ElementKind::Boolean(_), _) => Err(EngineError::wrong_type(id, "boolean")),

        (ElementKind::Decimal(d), ElementValue::Decimal(v)) => {
            if (d.min_value..=d.max_value).contains(v) {
                Ok(())
            } else {
                let range = format!("{v} not in {}..={}", d.min_value, d.max_value);
                Err(EngineError::out_of_range(id, range))
            }
        }
        (ElementKind::Decimal(_), _) => Err(EngineError::wrong_type(id, "decimal")),

        (ElementKind::LongDecimal(d), ElementValue::LongDecimal(v)) => {
            if (d.min_value..=d.max_value).contains(v) {
                Ok(())
            } else {
                let range = format!("{v} not in {}..={}", d.min_value, d.max_value);
                Err(EngineError::out_of_range(id, range))
            }
        }
        (ElementKind::LongDecimal(_), _) => Err(EngineError::wrong_type(id, "long decimal")),

        (ElementKind::Text(t), ElementValue::Text(s)) => check_len(element, s, t.max_length),
        (ElementKind::Text(_), _) => Err(EngineError::wrong_type(id, "text")),

        (ElementKind::MultiText(m), ElementValue::MultiText(lines)) => {
            if m.max_strings > 0 && lines.len() > m.max_strings as usize {
                return Err(EngineError::out_of_range(
                    id,
                    format!("{} strings exceed {}", lines.len(), m.max_strings),
                ));
            }
            for line in lines {
                if line.is_empty() {
                    return Err(EngineError::out_of_range(id, "empty string in multi-text value"));
                }
                check_len(element, line, m.max_length)?;
            }
            Ok(())
        }
        (ElementKind::MultiText(_), _) => Err(EngineError::wrong_type(id, "multi-text")),

        (ElementKind::Enum(e), ElementValue::Enum(i)) => {
            if *i < e.items.len() {
                Ok(())
            } else {
                Err(EngineError::out_of_range(id, format!("item {i} of {}", e.items.len())))
            }
        }
        (ElementKind::Enum(_), _) => Err(EngineError::wrong_type(id, "enum")),

        (ElementKind::List(l), ElementValue::KeyValueList(pairs)) if l.explicit_value => {
            for (i, (name, _)) in pairs.iter().enumerate() {
                if name.is_empty() {
                    return Err(EngineError::out_of_range(id, "empty value name in list"));
                }
                if pairs[..i].iter().any(|(n, _)| n.eq_ignore_ascii_case(name)) {
                    return Err(EngineError::out_of_range(
                        id,
                        format!("duplicate value name '{name}'"),
                    ));
                }
            }
            Ok(())
        }
        (ElementKind::List(l), _) if l.explicit_value => {
            Err(EngineError::wrong_type(id, "name=value list"))
        }
        (ElementKind::List(l), ElementValue::List(entries)) => {
            if l.value_prefix.is_none() {
                for (i, entry) in entries.iter().enumerate() {
                    if entry.is_empty() {
                        return Err(EngineError::out_of_range(id, "empty list entry"));
                    }
                    if entries[..i].iter().any(|e| e.eq_ignore_ascii_case(entry)) {
                        return Err(EngineError::out_of_range(
                            id,
                            format!("duplicate list entry '{entry}'"),
                        ));
                    }
                }
            }
            Ok(())
        }
        (ElementKind::List(_), _) => Err(EngineError::wrong_type(id, "list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpm_admx::admx::parse_admx;
    use std::path::PathBuf;

    fn policy() -> Policy {
        let file = parse_admx(
            r#"<policyDefinitions>
  <policyNamespaces><target prefix="t" namespace="T" /></policyNamespaces>
  <policies>
    <policy name="P" class="Machine" displayName="x" key="K">
      <elements>
        <boolean id="B" valueName="B" />
        <decimal id="D" valueName="D" minValue="5" maxValue="10" required="true" />
        <text id="T" valueName="T" maxLength="3" />
        <multiText id="M" valueName="M" maxStrings="2" />
        <enum id="E" valueName="E">
          <item displayName="a"><value><decimal value="1" /></value></item>
        </enum>
        <list id="L" key="K\L" explicitValue="true" />
      </elements>
    </policy>
  </policies>
</policyDefinitions>"#,
            &PathBuf::from("t.admx"),
        )
        .unwrap();
        file.policies.into_iter().next().unwrap()
    }

    #[test]
    fn set_validates_type_and_range() {
        let p = policy();
        let mut v = ElementValues::new(&p, PolicyClass::Machine, ValueSource::Edited);
        assert!(v.set(&p, "D", ElementValue::Decimal(7)).is_ok());
        assert!(matches!(
            v.set(&p, "D", ElementValue::Decimal(11)),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "D", ElementValue::Text("7".into())),
            Err(EngineError::WrongValueType { .. })
        ));
        assert!(matches!(
            v.set(&p, "T", ElementValue::Text("long".into())),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "M", ElementValue::MultiText(vec!["a".into(), "".into()])),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "M", ElementValue::MultiText(vec!["a".into(), "b".into(), "c".into()])),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "E", ElementValue::Enum(1)),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "L", ElementValue::List(vec!["x".into()])),
            Err(EngineError::WrongValueType { .. })
        ));
        let clash = vec![("a".into(), "1".into()), ("A".into(), "2".into())];
        assert!(matches!(
            v.set(&p, "L", ElementValue::KeyValueList(clash)),
            Err(EngineError::OutOfRange { .. })
        ));
        assert!(matches!(
            v.set(&p, "Nope", ElementValue::Boolean(true)),
            Err(EngineError::UnknownElement(_))
        ));
        assert_eq!(v.get("D"), Some(&ElementValue::Decimal(7)));
    }

    #[test]
    fn completeness_skips_optional_elements() {
        let p = policy();
        let mut v = ElementValues::new(&p, PolicyClass::Machine, ValueSource::Edited);
        assert_eq!(v.first_missing(&p).map(|e| e.id.as_str()), Some("B"));
        v.set(&p, "B", ElementValue::Boolean(true)).unwrap();
        assert_eq!(v.first_missing(&p).map(|e| e.id.as_str()), Some("D"));
        v.set(&p, "D", ElementValue::Decimal(5)).unwrap();
        // E has no required flag.
        assert_eq!(v.first_missing(&p).map(|e| e.id.as_str()), Some("L"));
        v.set(&p, "L", ElementValue::KeyValueList(vec![])).unwrap();
        assert!(v.is_complete(&p));
    }

    #[test]
    fn defaults_follow_presentation() {
        let p = policy();
        let presentation = Presentation {
            id: "P".into(),
            controls: vec![
                PresentationControl::CheckBox {
                    ref_id: "B".into(),
                    label: "b".into(),
                    default_checked: true,
                },
                PresentationControl::DecimalTextBox {
                    ref_id: "D".into(),
                    label: "d".into(),
                    default_value: 1,
                    spin: true,
                    spin_step: 1,
                },
                PresentationControl::TextBox {
                    ref_id: "T".into(),
                    label: "t".into(),
                    default_value: Some("abc".into()),
                },
            ],
        };
        let v = ElementValues::defaults(&p, PolicyClass::Machine, Some(&presentation));
        assert_eq!(v.source, ValueSource::Defaults);
        assert_eq!(v.get("B"), Some(&ElementValue::Boolean(true)));
        // Clamped into the element's range.
        assert_eq!(v.get("D"), Some(&ElementValue::Decimal(5)));
        assert_eq!(v.get("T"), Some(&ElementValue::Text("abc".into())));
        assert_eq!(v.get("E"), Some(&ElementValue::Enum(0)));
        assert_eq!(v.get("M"), None);
    }
}
