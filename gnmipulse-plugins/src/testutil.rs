//! Shared fixtures for plugin tests: structural gNMI path and
//! notification builders.

use gnmipulse_client::gnmi::{typed_value::Value, Notification, Path, PathElem, TypedValue, Update};

/// Builds one path element from `name` or `name[key=value]` form. The
/// key value may contain any character but `]`.
pub(crate) fn elem(spec: &str) -> PathElem {
    match spec.find('[') {
        Some(bracket) if spec.ends_with(']') => {
            let name = spec[..bracket].to_string();
            let inner = &spec[bracket + 1..spec.len() - 1];
            let key = match inner.split_once('=') {
                Some((k, v)) => [(k.to_string(), v.to_string())].into_iter().collect(),
                None => Default::default(),
            };
            PathElem { name, key }
        }
        _ => PathElem {
            name: spec.to_string(),
            key: Default::default(),
        },
    }
}

pub(crate) fn path(specs: &[&str]) -> Path {
    Path {
        elem: specs.iter().map(|s| elem(s)).collect(),
        ..Default::default()
    }
}

/// Prefix `/interfaces/interface[name=<name>]/<rest>` where `rest` is a
/// keyless container path such as `state` or `state/counters`.
pub(crate) fn if_prefix(name: &str, rest: &str) -> Path {
    let mut specs = vec!["interfaces".to_string(), format!("interface[name={name}]")];
    specs.extend(rest.split('/').map(|s| s.to_string()));
    Path {
        elem: specs.iter().map(|s| elem(s)).collect(),
        ..Default::default()
    }
}

pub(crate) fn update(specs: &[&str], value: Value) -> Update {
    Update {
        path: Some(path(specs)),
        val: Some(TypedValue { value: Some(value) }),
        ..Default::default()
    }
}

pub(crate) fn notification(
    prefix: Option<Path>,
    updates: Vec<Update>,
    deletes: Vec<Vec<String>>,
) -> Notification {
    Notification {
        prefix,
        update: updates,
        delete: deletes
            .into_iter()
            .map(|specs| Path {
                elem: specs.iter().map(|s| elem(s)).collect(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}
