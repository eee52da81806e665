//! Canonical field storage keys (§3: "a canonicalized, variable-substituted,
//! sorted-by-key argument encoding of a field selection").
//!
//! A storage key must be stable across two selections that read the *same* data
//! under *equivalent* arguments, regardless of source argument order or which
//! variable names were used to supply them. `field_storage_key` substitutes
//! variables, sorts object keys, and writes out a JSON-flavored string by hand
//! rather than deferring to any particular `Value` type's `Display` impl, since
//! the latter gives no guarantee about key order.

use crate::ast::{Field, Name, Value, VariableValues};
use std::fmt::Write as _;

/// Builds the storage key for `field` given the variables in force for the
/// current operation run: `name` if there are no arguments, otherwise
/// `name({k1:v1,k2:v2,...})` with argument names sorted and variables resolved
/// to their concrete values.
pub fn field_storage_key(field: &Field, variables: &VariableValues) -> String {
    if field.arguments.is_empty() {
        return field.name.to_string();
    }

    let mut sorted: Vec<&(Name, crate::node::Node<Value>)> = field.arguments.iter().collect();
    sorted.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut key = String::new();
    key.push_str(&field.name);
    key.push('(');
    for (i, (name, value)) in sorted.into_iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(name);
        key.push(':');
        write_canonical_value(value, variables, &mut key);
    }
    key.push(')');
    key
}

fn write_canonical_value(value: &Value, variables: &VariableValues, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Enum(name) => out.push_str(name),
        Value::Variable(name) => match variables.get(name) {
            Some(json) => write_canonical_json(json, out),
            // An unbound variable (no default, not supplied) canonicalizes to
            // `null`, matching how an absent argument is treated on read.
            None => out.push_str("null"),
        },
        Value::String(s) => write_json_string(s, out),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{}", f.0);
        }
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_value(item, variables, out);
            }
            out.push(']');
        }
        Value::Object(fields) => {
            let mut sorted: Vec<&(Name, crate::node::Node<Value>)> = fields.iter().collect();
            sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (name, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(name, out);
                out.push(':');
                write_canonical_value(val, variables, out);
            }
            out.push('}');
        }
    }
}

fn write_canonical_json(value: &serde_json_bytes::Value, out: &mut String) {
    use serde_json_bytes::Value as J;
    match value {
        J::Null => out.push_str("null"),
        J::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        J::Number(n) => {
            let _ = write!(out, "{n}");
        }
        J::String(s) => write_json_string(s.as_str(), out),
        J::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical_json(item, out);
            }
            out.push(']');
        }
        J::Object(map) => {
            let mut sorted: Vec<(&str, &serde_json_bytes::Value)> =
                map.iter().map(|(k, v)| (k.as_str(), v)).collect();
            sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical_json(val, out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}
