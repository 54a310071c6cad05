//! Typed-value accessors for gNMI updates. Absent or differently-typed
//! values resolve to the zero value, matching proto3 getter semantics.

use gnmipulse_client::gnmi::{typed_value::Value, TypedValue};

pub(crate) fn uint_val(val: Option<&TypedValue>) -> u64 {
    match val.and_then(|v| v.value.as_ref()) {
        Some(Value::UintVal(u)) => *u,
        _ => 0,
    }
}

pub(crate) fn int_val(val: Option<&TypedValue>) -> i64 {
    match val.and_then(|v| v.value.as_ref()) {
        Some(Value::IntVal(i)) => *i,
        _ => 0,
    }
}

pub(crate) fn bool_val(val: Option<&TypedValue>) -> bool {
    match val.and_then(|v| v.value.as_ref()) {
        Some(Value::BoolVal(b)) => *b,
        _ => false,
    }
}

pub(crate) fn string_val(val: Option<&TypedValue>) -> &str {
    match val.and_then(|v| v.value.as_ref()) {
        Some(Value::StringVal(s)) => s.as_str(),
        _ => "",
    }
}

/// String elements of a leaf-list value.
pub(crate) fn string_list(val: Option<&TypedValue>) -> Vec<String> {
    match val.and_then(|v| v.value.as_ref()) {
        Some(Value::LeaflistVal(list)) => list
            .element
            .iter()
            .filter_map(|e| match e.value.as_ref() {
                Some(Value::StringVal(s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
