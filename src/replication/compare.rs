// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structural comparison of ledger records against replica documents.
//!
//! [`first_divergence`] is deliberately asymmetric: only keys present in the
//! left (authoritative) operand are inspected, so the replica may carry extra
//! fields of its own. Arrays are compared positionally and must have equal
//! length. Numbers compare by value, so `10` and `10.0` are equal.
//!
//! Replica documents omit default-valued fields, so an authoritative `null`,
//! `""`, `false`, `0`, `[]` or `{}` also matches an absent replica field.

use serde_json::{Number, Value};

/// Dotted path of the first field where `replica` disagrees with
/// `authoritative`, or `None` if they agree on every authoritative key.
///
/// A divergence at the root (different JSON types) is reported as `""`.
pub fn first_divergence(authoritative: &Value, replica: &Value) -> Option<String> {
    divergence_at(authoritative, replica, String::new())
}

fn divergence_at(left: &Value, right: &Value, path: String) -> Option<String> {
    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, l_value) in l {
                let child = join(&path, key);
                match r.get(key) {
                    Some(r_value) => {
                        if let Some(found) = divergence_at(l_value, r_value, child) {
                            return Some(found);
                        }
                    }
                    None if is_empty_default(l_value) => {}
                    None => return Some(child),
                }
            }
            None
        }
        (Value::Array(l), Value::Array(r)) => {
            if l.len() != r.len() {
                return Some(path);
            }
            l.iter()
                .zip(r)
                .enumerate()
                .find_map(|(i, (l_item, r_item))| {
                    divergence_at(l_item, r_item, join(&path, &i.to_string()))
                })
        }
        (Value::Number(l), Value::Number(r)) => (!numbers_equal(l, r)).then_some(path),
        (l, r) => (l != r).then_some(path),
    }
}

fn is_empty_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Symmetric deep equality with numeric normalization.
pub fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_match(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| values_match(l, r)))
        }
        _ => a == b,
    }
}
