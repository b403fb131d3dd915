//! Minimal XML text helpers for SOAP envelopes.
//!
//! Only what the dispatcher needs: escaping, rendering a JSON payload as
//! child elements, and pulling the text of a named element out of a response.
//! Full XML/WSDL processing is out of scope.

use std::fmt::Write as _;

use serde_json::Value;

/// Escapes `&`, `<`, `>`, `"` and `'` for use in text or attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
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
    out
}

/// Reverses [`escape`] plus numeric character references.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let Some(end) = rest.find(';') else { break };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// A payload key or operation name that cannot be used as an element name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid element name '{name}'")]
pub struct InvalidName {
    pub name: String,
}

/// Whether `name` is safe to emit verbatim as an unprefixed element name.
///
/// Accepts an ASCII letter or `_` followed by ASCII alphanumerics, `_`, `-`
/// or `.`. Anything else, including namespace prefixes, is rejected.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Renders `payload` as the children of an operation element.
///
/// Objects become one element per key, arrays repeat the parent element,
/// scalars become escaped text and `null` yields an empty element. A top-level
/// scalar is rendered as bare text and a top-level array as its items in order.
///
/// # Errors
///
/// Returns [`InvalidName`] for the first object key that fails
/// [`is_valid_name`]; nothing is rendered in that case.
pub fn render_payload(payload: &Value) -> Result<String, InvalidName> {
    let mut out = String::new();
    match payload {
        Value::Object(map) => {
            for (key, value) in map {
                render_element(&mut out, key, value)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                out.push_str(&render_payload(item)?);
            }
        }
        scalar => render_scalar(&mut out, scalar),
    }
    Ok(out)
}

fn render_element(out: &mut String, name: &str, value: &Value) -> Result<(), InvalidName> {
    if !is_valid_name(name) {
        return Err(InvalidName {
            name: name.to_string(),
        });
    }
    match value {
        Value::Array(items) => {
            for item in items {
                render_element(out, name, item)?;
            }
        }
        Value::Null => {
            let _ = write!(out, "<{name}/>");
        }
        Value::Object(map) => {
            let _ = write!(out, "<{name}>");
            for (key, child) in map {
                render_element(out, key, child)?;
            }
            let _ = write!(out, "</{name}>");
        }
        scalar => {
            let _ = write!(out, "<{name}>");
            render_scalar(out, scalar);
            let _ = write!(out, "</{name}>");
        }
    }
    Ok(())
}

fn render_scalar(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => out.push_str(&escape(s)),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => {}
    }
}

/// Returns the unescaped text of the first element whose local name is `local`.
#[must_use]
pub fn element_text(document: &str, local: &str) -> Option<String> {
    element_inner(document, local).map(unescape)
}

/// Returns the raw content of the first element whose local name is `local`.
///
/// Matches `<local>`, `<prefix:local>` and elements with attributes. Nested
/// markup is returned untouched, so the result can be searched again.
#[must_use]
pub fn element_inner<'a>(document: &'a str, local: &str) -> Option<&'a str> {
    let mut search = document;
    while let Some(open) = search.find('<') {
        let after = &search[open + 1..];
        let tag_end = after.find('>')?;
        let tag = &after[..tag_end];
        let qname = tag.split_whitespace().next().unwrap_or_default();
        let name = qname.rsplit_once(':').map_or(qname, |(_, l)| l);
        if name == local && !tag.ends_with('/') {
            let body = &after[tag_end + 1..];
            let close = format!("</{qname}>");
            let end = body.find(&close)?;
            return Some(&body[..end]);
        }
        search = &after[tag_end + 1..];
    }
    None
}
