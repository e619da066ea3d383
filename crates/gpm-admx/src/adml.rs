//! ADML (localized resources) parser.

use log::debug;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AdmxError, AdmxResult};
use crate::types::{AdmlResources, Presentation, PresentationControl};
use crate::xml::{parse_document, XmlElement};

/// Parse an ADML document for `language`.
pub fn parse_adml(xml: &str, path: &Path, language: &str) -> AdmxResult<AdmlResources> {
    let root = parse_document(xml)?;
    if root.name != "policyDefinitionResources" {
        return Err(AdmxError::UnexpectedRoot {
            expected: "policyDefinitionResources".into(),
            found: root.name,
        });
    }

    let resources = root.required_child("resources")?;

    let mut strings = HashMap::new();
    if let Some(table) = resources.child("stringTable") {
        for s in table.children_named("string") {
            strings.insert(s.required_attr("id")?.to_string(), s.trimmed_text());
        }
    }

    let mut presentations = HashMap::new();
    if let Some(table) = resources.child("presentationTable") {
        for p in table.children_named("presentation") {
            let presentation = parse_presentation(p)?;
            presentations.insert(presentation.id.clone(), presentation);
        }
    }

    debug!(
        "Parsed {} ({}): {} strings, {} presentations",
        path.display(),
        language,
        strings.len(),
        presentations.len()
    );

    Ok(AdmlResources {
        language: language.to_string(),
        display_name: root.child("displayName").map(XmlElement::trimmed_text).unwrap_or_default(),
        description: root.child("description").map(XmlElement::trimmed_text).unwrap_or_default(),
        strings,
        presentations,
    })
}

fn parse_presentation(el: &XmlElement) -> AdmxResult<Presentation> {
    let id = el.required_attr("id")?.to_string();
    let mut controls = Vec::new();
    for control in el.elements() {
        controls.push(parse_control(control)?);
    }
    Ok(Presentation { id, controls })
}

/// Label is either the element's text or a `<label>` child.
fn label_of(el: &XmlElement) -> String {
    el.child("label").map(XmlElement::trimmed_text).unwrap_or_else(|| el.trimmed_text())
}

fn parse_control(el: &XmlElement) -> AdmxResult<PresentationControl> {
    if el.name == "text" {
        return Ok(PresentationControl::Text { text: el.trimmed_text() });
    }

    let ref_id = el.required_attr("refId")?.to_string();
    let label = label_of(el);

    let control = match el.name.as_str() {
        "decimalTextBox" => PresentationControl::DecimalTextBox {
            ref_id,
            label,
            default_value: el.u32_attr("defaultValue")?.unwrap_or(1),
            spin: el.bool_attr("spin", true)?,
            spin_step: el.u32_attr("spinStep")?.unwrap_or(1),
        },
        "longDecimalTextBox" => PresentationControl::LongDecimalTextBox {
            ref_id,
            label,
            default_value: el.u64_attr("defaultValue")?.unwrap_or(1),
            spin: el.bool_attr("spin", true)?,
            spin_step: el.u64_attr("spinStep")?.unwrap_or(1),
        },
        "textBox" => PresentationControl::TextBox {
            ref_id,
            label,
            default_value: el.child("defaultValue").map(XmlElement::text),
        },
        "multiTextBox" => PresentationControl::MultiTextBox {
            ref_id,
            label,
            show_as_dialog: el.bool_attr("showAsDialog", false)?,
            default_height: el.u32_attr("defaultHeight")?.unwrap_or(3),
        },
        "checkBox" => PresentationControl::CheckBox {
            ref_id,
            label,
            default_checked: el.bool_attr("defaultChecked", false)?,
        },
        "comboBox" => PresentationControl::ComboBox {
            ref_id,
            label,
            default_value: el.child("default").map(XmlElement::text),
            suggestions: el.children_named("suggestion").map(XmlElement::trimmed_text).collect(),
            no_sort: el.bool_attr("noSort", false)?,
        },
        "dropdownList" => PresentationControl::DropdownList {
            ref_id,
            label,
            default_item: el.u32_attr("defaultItem")?.map(|i| i as usize),
            no_sort: el.bool_attr("noSort", false)?,
        },
        "listBox" => PresentationControl::ListBox { ref_id, label },
        other => {
            return Err(AdmxError::invalid("presentation", format!("unknown control <{other}>")));
        }
    };
    Ok(control)
}
