//! Minimal element tree built from quick-xml events.
//!
//! ADMX documents are small and deeply nested with order-sensitive
//! children, so the parsers walk a tree instead of reacting to a flat event
//! stream. Element names are stored without their namespace prefix.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::str;

use crate::error::{AdmxError, AdmxResult};

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn required_attr(&self, name: &str) -> AdmxResult<&str> {
        self.attr(name)
            .ok_or_else(|| AdmxError::missing_attr(&self.name, name))
    }

    pub fn bool_attr(&self, name: &str, default: bool) -> AdmxResult<bool> {
        match self.attr(name) {
            None => Ok(default),
            Some(v) => parse_bool(v).ok_or_else(|| {
                AdmxError::invalid(&self.name, format!("{name}=\"{v}\" is not a boolean"))
            }),
        }
    }

    pub fn u32_attr(&self, name: &str) -> AdmxResult<Option<u32>> {
        self.attr(name)
            .map(|v| {
                v.trim().parse::<u32>().map_err(|_| {
                    AdmxError::invalid(&self.name, format!("{name}=\"{v}\" is not a 32-bit number"))
                })
            })
            .transpose()
    }

    pub fn u64_attr(&self, name: &str) -> AdmxResult<Option<u64>> {
        self.attr(name)
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    AdmxError::invalid(&self.name, format!("{name}=\"{v}\" is not a 64-bit number"))
                })
            })
            .transpose()
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.name == name)
    }

    pub fn required_child(&self, name: &str) -> AdmxResult<&XmlElement> {
        self.child(name).ok_or_else(|| AdmxError::MissingElement {
            element: self.name.clone(),
            child: name.to_string(),
        })
    }

    pub fn children_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// Concatenated direct text content, exactly as written.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Text content without surrounding whitespace, for display strings.
    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }
}

pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a whole document and return its root element.
pub fn parse_document(xml: &str) -> AdmxResult<XmlElement> {
    // Text is kept verbatim: registry string payloads must survive as written.
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(open_element(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = open_element(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| AdmxError::Xml("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| AdmxError::Xml(e.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdmxError::Xml(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(AdmxError::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| AdmxError::Xml("document has no root element".into()))
}

fn open_element(e: &BytesStart) -> AdmxResult<XmlElement> {
    let local = e.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|_| AdmxError::Xml("Invalid UTF-8 in tag name".into()))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())
            .map_err(|_| AdmxError::Xml("Invalid UTF-8 in attribute name".into()))?
            .to_string();
        let val = attr
            .unescape_value()
            .map_err(|e| AdmxError::Xml(e.to_string()))?;
        attributes.push((key, val.into_owned()));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> AdmxResult<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(AdmxError::Xml("multiple root elements".into())),
    }
}
