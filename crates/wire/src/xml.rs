//! XML-RPC codec: `<methodCall>` encoding and `<methodResponse>` decoding.
//!
//! The grammar is the small fixed XML-RPC subset — no attributes carry
//! meaning, no namespaces, no mixed content outside untyped `<value>` text.
//! The parser below covers exactly that subset and rejects everything else
//! with a typed error.

use base64::Engine;

use crate::error::{Fault, WireError};
use crate::value::{Value, format_iso8601, parse_iso8601};

/// Encode a `<methodCall>` document.
#[must_use]
pub fn encode_method_call(method: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(128);
    out.push_str(r#"<?xml version="1.0"?>"#);
    out.push_str("<methodCall><methodName>");
    escape_into(method, &mut out);
    out.push_str("</methodName>");
    if !params.is_empty() {
        out.push_str("<params>");
        for param in params {
            out.push_str("<param>");
            encode_value(param, &mut out);
            out.push_str("</param>");
        }
        out.push_str("</params>");
    }
    out.push_str("</methodCall>");
    out
}

/// Decode a `<methodResponse>` document into a result or a [`Fault`].
///
/// # Errors
/// Any document that is not a well-formed XML-RPC method response maps to a
/// [`WireError`].
pub fn decode_method_response(body: &str) -> Result<Result<Value, Fault>, WireError> {
    let root = Parser::new(body).parse_document()?;
    if root.name != "methodResponse" {
        return Err(WireError::malformed(format!(
            "expected <methodResponse>, found <{}>",
            root.name
        )));
    }

    if let Some(params) = root.child("params") {
        let value = params
            .child("param")
            .and_then(|param| param.child("value"))
            .ok_or_else(|| WireError::malformed("params without <param><value>"))?;
        return Ok(Ok(parse_value(value)?));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| WireError::malformed("fault without <value>"))?;
        return Ok(Err(parse_fault(parse_value(value)?)?));
    }

    Err(WireError::malformed(
        "methodResponse carries neither params nor fault",
    ))
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str("<boolean>");
            out.push(if *b { '1' } else { '0' });
            out.push_str("</boolean>");
        }
        Value::Int(n) => {
            out.push_str("<int>");
            out.push_str(&n.to_string());
            out.push_str("</int>");
        }
        Value::Double(d) if d.is_finite() => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        Value::Double(_) => out.push_str("<nil/>"),
        Value::Str(s) => {
            out.push_str("<string>");
            escape_into(s, out);
            out.push_str("</string>");
        }
        Value::DateTime(dt) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&format_iso8601(*dt));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                encode_value(item, out);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                escape_into(name, out);
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

fn parse_value(element: &Element) -> Result<Value, WireError> {
    let Some(typed) = element.children.first() else {
        // A <value> with no type element is an untyped string.
        return Ok(Value::Str(element.text.clone()));
    };

    match typed.name.to_ascii_lowercase().as_str() {
        "i4" | "int" => typed
            .text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| WireError::scalar("integer", typed.text.trim())),
        "double" => typed
            .text
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| WireError::scalar("double", typed.text.trim())),
        "boolean" => match typed.text.trim() {
            "0" => Ok(Value::Bool(false)),
            "1" => Ok(Value::Bool(true)),
            other => Err(WireError::scalar("boolean", other)),
        },
        "string" => Ok(Value::Str(typed.text.clone())),
        "datetime.iso8601" => {
            let text = typed.text.trim();
            parse_iso8601(text)
                .map(Value::DateTime)
                .ok_or_else(|| WireError::scalar("dateTime.iso8601", text))
        }
        "base64" => {
            let compact: String = typed.text.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|_| WireError::scalar("base64", typed.text.trim()))
        }
        "nil" => Ok(Value::Nil),
        "struct" => {
            let mut members = std::collections::BTreeMap::new();
            for member in typed.children.iter().filter(|c| c.name == "member") {
                let name = member.child("name").map(|n| n.text.clone());
                let value = member.child("value");
                // Members missing a name or value are skipped, not fatal.
                if let (Some(name), Some(value)) = (name, value) {
                    members.insert(name, parse_value(value)?);
                }
            }
            Ok(Value::Struct(members))
        }
        "array" => {
            let data = typed
                .child("data")
                .ok_or_else(|| WireError::malformed("array without <data>"))?;
            let mut items = Vec::with_capacity(data.children.len());
            for child in &data.children {
                if child.name != "value" {
                    return Err(WireError::IllegalElement(child.name.clone()));
                }
                items.push(parse_value(child)?);
            }
            Ok(Value::Array(items))
        }
        _ => Err(WireError::IllegalElement(typed.name.clone())),
    }
}

fn parse_fault(value: Value) -> Result<Fault, WireError> {
    let Value::Struct(members) = value else {
        return Err(WireError::malformed("fault value is not a struct"));
    };
    let code = match members.get("faultCode") {
        Some(Value::Int(code)) => *code,
        Some(Value::Str(s)) => s
            .trim()
            .parse()
            .map_err(|_| WireError::scalar("faultCode", s.as_str()))?,
        _ => return Err(WireError::malformed("fault without faultCode")),
    };
    let message = match members.get("faultString") {
        Some(Value::Str(s)) => s.clone(),
        _ => String::new(),
    };
    Ok(Fault::new(code, message))
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}

/// A parsed XML element: child elements plus the concatenated text directly
/// inside it. Attributes are skipped — none carry meaning in XML-RPC.
#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn parse_document(&mut self) -> Result<Element, WireError> {
        self.skip_misc()?;
        let root = self.parse_element()?;
        self.skip_misc()?;
        if self.pos != self.bytes.len() {
            return Err(WireError::malformed("trailing content after document root"));
        }
        Ok(root)
    }

    /// Skip whitespace, XML prologs, comments, and doctype declarations.
    fn skip_misc(&mut self) -> Result<(), WireError> {
        loop {
            while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                self.pos += 1;
            }
            match (self.peek(), self.peek_at(1)) {
                (Some(b'<'), Some(b'?')) => self.skip_until(b"?>")?,
                (Some(b'<'), Some(b'!')) => {
                    if self.rest().starts_with(b"<!--") {
                        self.skip_until(b"-->")?;
                    } else {
                        self.skip_until(b">")?;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_element(&mut self) -> Result<Element, WireError> {
        self.expect(b'<')?;
        let name = self.read_name()?;

        // Skip attributes up to the closing bracket.
        let mut quote: Option<u8> = None;
        let self_closing = loop {
            let byte = self.next().ok_or_else(|| {
                WireError::malformed(format!("unterminated <{name}> start tag"))
            })?;
            match (quote, byte) {
                (Some(q), b) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(byte),
                (None, b'>') => break false,
                (None, b'/') if self.peek() == Some(b'>') => {
                    self.pos += 1;
                    break true;
                }
                (None, _) => {}
            }
        };

        let mut element = Element {
            name,
            children: Vec::new(),
            text: String::new(),
        };
        if self_closing {
            return Ok(element);
        }

        loop {
            let start = self.pos;
            while self.peek().is_some_and(|b| b != b'<') {
                self.pos += 1;
            }
            if self.pos > start {
                let raw = std::str::from_utf8(&self.bytes[start..self.pos])
                    .map_err(|_| WireError::malformed("invalid UTF-8 in text content"))?;
                element.text.push_str(&decode_entities(raw)?);
            }
            match (self.peek(), self.peek_at(1)) {
                (Some(b'<'), Some(b'/')) => {
                    self.pos += 2;
                    let closing = self.read_name()?;
                    if closing != element.name {
                        return Err(WireError::malformed(format!(
                            "mismatched </{closing}> closing <{}>",
                            element.name
                        )));
                    }
                    while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                        self.pos += 1;
                    }
                    self.expect(b'>')?;
                    return Ok(element);
                }
                (Some(b'<'), Some(b'!')) => {
                    if self.rest().starts_with(b"<!--") {
                        self.skip_until(b"-->")?;
                    } else {
                        return Err(WireError::malformed("unexpected markup declaration"));
                    }
                }
                (Some(b'<'), Some(_)) => element.children.push(self.parse_element()?),
                _ => {
                    return Err(WireError::malformed(format!(
                        "unterminated <{}> element",
                        element.name
                    )));
                }
            }
        }
    }

    fn read_name(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'/')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(WireError::malformed("empty element name"));
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .map(str::to_string)
            .map_err(|_| WireError::malformed("invalid UTF-8 in element name"))
    }

    fn skip_until(&mut self, marker: &[u8]) -> Result<(), WireError> {
        while self.pos < self.bytes.len() {
            if self.rest().starts_with(marker) {
                self.pos += marker.len();
                return Ok(());
            }
            self.pos += 1;
        }
        Err(WireError::malformed("unterminated markup"))
    }

    fn expect(&mut self, byte: u8) -> Result<(), WireError> {
        if self.next() == Some(byte) {
            Ok(())
        } else {
            Err(WireError::malformed(format!(
                "expected {:?}",
                char::from(byte)
            )))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn rest(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }
}

fn decode_entities(raw: &str) -> Result<String, WireError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];
        let end = rest
            .find(';')
            .ok_or_else(|| WireError::malformed("unterminated entity reference"))?;
        let entity = &rest[1..end];
        match entity {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse))
                    .transpose()
                    .ok()
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        WireError::malformed(format!("unknown entity &{entity};"))
                    })?;
                out.push(code);
            }
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
