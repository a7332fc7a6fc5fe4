//! XML-RPC wire format.
//!
//! Documents are small, so decoding builds a tiny element tree with
//! `quick-xml`'s pull reader and then walks it. Text is never trimmed: string
//! values keep their whitespace byte for byte.

use super::{Fault, Value};
use crate::error::{MoinError, Result};
use chrono::NaiveDateTime;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt::Write;

const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";
const DATETIME_INPUT_FORMATS: [&str; 4] = [
    "%Y%m%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Encode a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>\n<methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName>\n<params>\n");
    for param in params {
        out.push_str("<param>");
        encode_value(param, &mut out);
        out.push_str("</param>\n");
    }
    out.push_str("</params>\n</methodCall>\n");
    out
}

/// Encode a `methodResponse` document carrying either a value or a fault.
#[cfg(any(test, feature = "test_utils"))]
pub fn encode_response(result: &std::result::Result<Value, Fault>) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodResponse>\n");
    match result {
        Ok(value) => {
            out.push_str("<params>\n<param>");
            encode_value(value, &mut out);
            out.push_str("</param>\n</params>\n");
        }
        Err(fault) => {
            out.push_str("<fault>");
            encode_value(&fault.to_value(), &mut out);
            out.push_str("</fault>\n");
        }
    }
    out.push_str("</methodResponse>\n");
    out
}

fn encode_value(value: &Value, out: &mut String) {
    out.push_str("<value>");
    match value {
        Value::Int(i) if i32::try_from(*i).is_ok() => {
            let _ = write!(out, "<int>{}</int>", i);
        }
        Value::Int(i) => {
            let _ = write!(out, "<i8>{}</i8>", i);
        }
        Value::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) => {
            let _ = write!(out, "<double>{}</double>", d);
        }
        Value::DateTime(dt) => {
            let _ = write!(
                out,
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                dt.format(DATETIME_FORMAT)
            );
        }
        Value::Base64(data) => {
            out.push_str("<base64>");
            out.push_str(&escape(data.as_str()));
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
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                encode_value(member, out);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Decode a `methodResponse`. The outer `Result` reports malformed documents;
/// the inner one separates a successful value from a remote fault.
pub fn decode_response(xml: &str) -> Result<std::result::Result<Value, Fault>> {
    let root = parse_document(xml)?;
    if root.name != "methodResponse" {
        return Err(MoinError::Xml(format!(
            "expected <methodResponse>, found <{}>",
            root.name
        )));
    }

    if let Some(params) = root.child("params") {
        let value = params
            .child("param")
            .and_then(|param| param.child("value"))
            .ok_or_else(|| MoinError::Xml("response has no <param><value>".to_string()))?;
        return Ok(Ok(decode_value(value)?));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| MoinError::Xml("<fault> has no <value>".to_string()))?;
        let value = decode_value(value)?;
        return Fault::from_value(&value)
            .map(Err)
            .ok_or_else(|| MoinError::Xml("fault is missing faultCode/faultString".to_string()));
    }

    Err(MoinError::Xml(
        "<methodResponse> has neither <params> nor <fault>".to_string(),
    ))
}

/// Decode a `methodCall` into its method name and parameters.
#[cfg(any(test, feature = "test_utils"))]
pub fn decode_call(xml: &str) -> Result<(String, Vec<Value>)> {
    let root = parse_document(xml)?;
    if root.name != "methodCall" {
        return Err(MoinError::Xml(format!(
            "expected <methodCall>, found <{}>",
            root.name
        )));
    }
    let method = root
        .child("methodName")
        .map(|name| name.text.trim().to_string())
        .ok_or_else(|| MoinError::Xml("<methodCall> has no <methodName>".to_string()))?;

    let params = match root.child("params") {
        Some(params) => params
            .children_named("param")
            .map(|param| {
                param
                    .child("value")
                    .ok_or_else(|| MoinError::Xml("<param> has no <value>".to_string()))
                    .and_then(decode_value)
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok((method, params))
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.local_name().as_ref())
        .map(str::to_string)
        .map_err(|e| MoinError::Xml(format!("element name is not UTF-8: {}", e)))
}

fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element {
                name: element_name(&start)?,
                ..Element::default()
            }),
            Event::Empty(start) => {
                let element = Element {
                    name: element_name(&start)?,
                    ..Element::default()
                };
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| MoinError::Xml("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| MoinError::Xml(e.to_string()))?;
                    current.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    let raw = data.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|e| MoinError::Xml(format!("CDATA is not UTF-8: {}", e)))?;
                    current.text.push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MoinError::Xml("document ended inside an element".to_string()));
    }
    root.ok_or_else(|| MoinError::Xml("empty document".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn decode_value(value: &Element) -> Result<Value> {
    // `<value>text</value>` with no type element is a string
    let Some(typed) = value.children.first() else {
        return Ok(Value::String(value.text.clone()));
    };

    let text = typed.text.as_str();
    match typed.name.as_str() {
        "string" => Ok(Value::String(text.to_string())),
        "int" | "i4" | "i8" => text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| bad_scalar("int", text)),
        "boolean" => match text.trim() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            _ => Err(bad_scalar("boolean", text)),
        },
        "double" => text
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| bad_scalar("double", text)),
        "dateTime.iso8601" => parse_datetime(text.trim())
            .map(Value::DateTime)
            .ok_or_else(|| bad_scalar("dateTime.iso8601", text)),
        "base64" => Ok(Value::Base64(text.split_whitespace().collect())),
        "nil" => Ok(Value::Nil),
        "array" => {
            let Some(data) = typed.child("data") else {
                return Ok(Value::Array(Vec::new()));
            };
            data.children_named("value")
                .map(decode_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .ok_or_else(|| MoinError::Xml("<member> has no <name>".to_string()))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| MoinError::Xml("<member> has no <value>".to_string()))?;
                members.insert(name.text.clone(), decode_value(value)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(MoinError::Xml(format!("unknown value type <{}>", other))),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

fn bad_scalar(kind: &str, text: &str) -> MoinError {
    MoinError::Xml(format!("invalid {} value '{}'", kind, text))
}
