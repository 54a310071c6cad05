//! gNMI path helpers: schema-path rendering, string path parsing and
//! vendor-specific sanitization.

use std::collections::HashMap;

use crate::gnmi::{Notification, Path, PathElem};

/// Renders a path as its schema path: `/elem/elem/...` with all keys
/// stripped. An empty path renders as the empty string.
pub fn schema_path(path: &Path) -> String {
    if path.elem.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);
    }
    out
}

/// Renders the full schema path of an update: prefix (when it carries
/// any element) followed by the update path.
pub fn full_schema_path(prefix: Option<&Path>, path: Option<&Path>) -> String {
    let mut out = String::new();
    if let Some(prefix) = prefix {
        out.push_str(&schema_path(prefix));
    }
    if let Some(path) = path {
        out.push_str(&schema_path(path));
    }
    out
}

/// Renders prefix and path as a flat list of elements, keys included in
/// `name[key=value]` form. Keys are emitted in sorted order.
pub fn path_strings(prefix: Option<&Path>, path: Option<&Path>) -> Vec<String> {
    let mut out = Vec::new();
    for p in [prefix, path].into_iter().flatten() {
        for elem in &p.elem {
            if elem.key.is_empty() {
                out.push(elem.name.clone());
            } else {
                let mut keys: Vec<(&String, &String)> = elem.key.iter().collect();
                keys.sort_by(|a, b| a.0.cmp(b.0));
                let rendered: Vec<String> =
                    keys.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                out.push(format!("{}[{}]", elem.name, rendered.join(",")));
            }
        }
    }
    out
}

/// Parses an XPath-like string (`/interfaces/interface[name=eth0]/state`)
/// into a gNMI path.
pub fn string_to_path(path_str: &str) -> Path {
    let mut elems = Vec::new();
    for segment in path_str.split('/').filter(|s| !s.is_empty()) {
        let (name, keys) = parse_path_segment(segment);
        elems.push(PathElem { name, key: keys });
    }
    Path {
        elem: elems,
        ..Default::default()
    }
}

/// Parses `interface[name=eth0]` into `("interface", {"name": "eth0"})`.
fn parse_path_segment(segment: &str) -> (String, HashMap<String, String>) {
    match segment.find('[') {
        Some(bracket_pos) if segment.ends_with(']') => {
            let name = segment[..bracket_pos].to_string();
            let keys_str = &segment[bracket_pos + 1..segment.len() - 1];
            let mut keys = HashMap::new();
            for key_val in keys_str.split(',') {
                if let Some((k, v)) = key_val.split_once('=') {
                    keys.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
            (name, keys)
        }
        _ => (segment.to_string(), HashMap::new()),
    }
}

/// Strips a `module:` prefix from the first element of the prefix,
/// update and delete paths of a notification. Some network operating
/// systems qualify the first path element with the YANG module name,
/// which would defeat routing and container lookup.
pub fn strip_module_prefix(nf: &mut Notification) {
    fn sanitize(path: &mut Path) {
        if let Some(first) = path.elem.first_mut() {
            if let Some((_, after)) = first.name.split_once(':') {
                first.name = after.to_string();
            }
        }
    }

    if let Some(prefix) = nf.prefix.as_mut() {
        sanitize(prefix);
    }
    for update in &mut nf.update {
        if let Some(path) = update.path.as_mut() {
            sanitize(path);
        }
    }
    for delete in &mut nf.delete {
        sanitize(delete);
    }
}
