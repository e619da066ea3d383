//! Command-line form of element values.
//!
//! A policy's values become one `id=payload` token per element, joined by
//! spaces. Payload grammar:
//! - boolean: `true` | `false`
//! - decimal, long decimal, enum index: canonical decimal digits
//! - text: one field
//! - multi-text, list: fields separated by `,` (empty payload = empty list)
//! - explicit list: `name=value` pairs separated by `,`
//!
//! A field is quoted with `"` exactly when it is empty or contains `,`,
//! `=`, `"` or whitespace; embedded quotes are doubled. Decoding rejects
//! anything the encoder would not produce, so both directions are lossless.

use gpm_admx::{ElementKind, Policy, PolicyClass, PolicyElement};

use crate::error::{EngineError, EngineResult};
use crate::values::{ElementValue, ElementValues, ValueSource};

const QUOTE: char = '"';
const FIELD_SEPARATOR: char = ',';
const PAIR_SEPARATOR: char = '=';

fn needs_quotes(field: &str) -> bool {
    field.is_empty()
        || field
            .chars()
            .any(|c| c == FIELD_SEPARATOR || c == PAIR_SEPARATOR || c == QUOTE || c.is_whitespace())
}

fn quote_field(field: &str) -> String {
    if !needs_quotes(field) {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len() + 2);
    out.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            out.push(QUOTE);
        }
        out.push(c);
    }
    out.push(QUOTE);
    out
}

/// Encode one element value as its payload.
pub fn encode_value(value: &ElementValue) -> String {
    match value {
        ElementValue::Boolean(b) => b.to_string(),
        ElementValue::Decimal(n) => n.to_string(),
        ElementValue::LongDecimal(n) => n.to_string(),
        ElementValue::Enum(i) => i.to_string(),
        ElementValue::Text(s) => quote_field(s),
        ElementValue::MultiText(items) | ElementValue::List(items) => items
            .iter()
            .map(|s| quote_field(s))
            .collect::<Vec<_>>()
            .join(","),
        ElementValue::KeyValueList(pairs) => pairs
            .iter()
            .map(|(n, v)| format!("{}={}", quote_field(n), quote_field(v)))
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Cursor over one payload.
struct FieldReader<'a> {
    token: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(token: &'a str, payload: &str) -> Self {
        Self {
            token,
            chars: payload.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, detail: impl Into<String>) -> EngineError {
        EngineError::invalid_token(self.token, detail)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn expect(&mut self, c: char) -> EngineResult<()> {
        match self.peek() {
            Some(found) if found == c => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(self.error(format!("expected '{c}', found '{found}'"))),
            None => Err(self.error(format!("expected '{c}'"))),
        }
    }

    /// Read one field, stopping before any char in `stops`.
    fn field(&mut self, stops: &[char]) -> EngineResult<String> {
        let mut out = String::new();
        if self.peek() == Some(QUOTE) {
            self.pos += 1;
            loop {
                match self.peek() {
                    None => return Err(self.error("unterminated quote")),
                    Some(QUOTE) if self.chars.get(self.pos + 1) == Some(&QUOTE) => {
                        out.push(QUOTE);
                        self.pos += 2;
                    }
                    Some(QUOTE) => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => {
                        out.push(c);
                        self.pos += 1;
                    }
                }
            }
            if !needs_quotes(&out) {
                return Err(self.error(format!("needless quotes around '{out}'")));
            }
            return Ok(out);
        }

        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        if out.is_empty() {
            return Err(self.error("empty field must be quoted"));
        }
        if needs_quotes(&out) {
            return Err(self.error(format!("field '{out}' must be quoted")));
        }
        Ok(out)
    }

    fn end(&self) -> EngineResult<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    fn fields(&mut self) -> EngineResult<Vec<String>> {
        let mut out = Vec::new();
        if self.at_end() {
            return Ok(out);
        }
        loop {
            out.push(self.field(&[FIELD_SEPARATOR])?);
            if self.at_end() {
                return Ok(out);
            }
            self.expect(FIELD_SEPARATOR)?;
        }
    }

    fn pairs(&mut self) -> EngineResult<Vec<(String, String)>> {
        let mut out = Vec::new();
        if self.at_end() {
            return Ok(out);
        }
        loop {
            let name = self.field(&[FIELD_SEPARATOR, PAIR_SEPARATOR])?;
            self.expect(PAIR_SEPARATOR)?;
            let value = self.field(&[FIELD_SEPARATOR, PAIR_SEPARATOR])?;
            out.push((name, value));
            if self.at_end() {
                return Ok(out);
            }
            self.expect(FIELD_SEPARATOR)?;
        }
    }
}

fn parse_canonical<T: std::str::FromStr>(token: &str, payload: &str) -> EngineResult<T> {
    let canonical = !payload.is_empty()
        && payload.bytes().all(|b| b.is_ascii_digit())
        && (payload == "0" || !payload.starts_with('0'));
    if !canonical {
        return Err(EngineError::invalid_token(token, "expected a canonical unsigned number"));
    }
    payload
        .parse()
        .map_err(|_| EngineError::invalid_token(token, "number out of range"))
}

/// Decode one payload into the value type of `element`.
pub fn decode_value(
    element: &PolicyElement,
    token: &str,
    payload: &str,
) -> EngineResult<ElementValue> {
    let mut reader = FieldReader::new(token, payload);
    let value = match &element.kind {
        ElementKind::Boolean(_) => match payload {
            "true" => ElementValue::Boolean(true),
            "false" => ElementValue::Boolean(false),
            _ => return Err(EngineError::invalid_token(token, "expected true or false")),
        },
        ElementKind::Decimal(_) => ElementValue::Decimal(parse_canonical(token, payload)?),
        ElementKind::LongDecimal(_) => ElementValue::LongDecimal(parse_canonical(token, payload)?),
        ElementKind::Enum(_) => ElementValue::Enum(parse_canonical(token, payload)?),
        ElementKind::Text(_) => {
            let text = reader.field(&[])?;
            reader.end()?;
            ElementValue::Text(text)
        }
        ElementKind::MultiText(_) => ElementValue::MultiText(reader.fields()?),
        ElementKind::List(l) if l.explicit_value => ElementValue::KeyValueList(reader.pairs()?),
        ElementKind::List(_) => ElementValue::List(reader.fields()?),
    };
    Ok(value)
}

/// Split a command line on whitespace outside quotes.
pub fn split_command_line(line: &str) -> EngineResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        if c == QUOTE {
            quoted = !quoted;
            current.push(c);
        } else if c.is_whitespace() && !quoted {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if quoted {
        return Err(EngineError::invalid_token(&current, "unterminated quote"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

pub fn join_command_line<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens.iter().map(|t| t.as_ref()).collect::<Vec<_>>().join(" ")
}

/// Parse `id=payload` tokens into validated element values.
pub fn parse_command_line(
    policy: &Policy,
    class: PolicyClass,
    line: &str,
) -> EngineResult<ElementValues> {
    let mut values = ElementValues::new(policy, class, ValueSource::CommandLine);
    let mut seen: Vec<&str> = Vec::new();
    for token in split_command_line(line)? {
        let (id, payload) = token
            .split_once(PAIR_SEPARATOR)
            .ok_or_else(|| EngineError::invalid_token(&token, "expected id=value"))?;
        let element = policy
            .element(id)
            .or_else(|| policy.elements.iter().find(|e| e.id.eq_ignore_ascii_case(id)))
            .ok_or_else(|| EngineError::UnknownElement(id.to_string()))?;
        if seen.contains(&element.id.as_str()) {
            return Err(EngineError::invalid_token(&token, "element given twice"));
        }
        seen.push(&element.id);
        let value = decode_value(element, &token, payload)?;
        values.set(policy, &element.id, value)?;
    }
    Ok(values)
}

/// Encode every present value, in element order.
pub fn to_command_line(policy: &Policy, values: &ElementValues) -> String {
    let tokens: Vec<String> = policy
        .elements
        .iter()
        .filter_map(|e| values.get(&e.id).map(|v| format!("{}={}", e.id, encode_value(v))))
        .collect();
    join_command_line(&tokens)
}
