//! Unused-key guard: every leaf of the merged document should sit under a
//! JSON-pointer prefix that [`crate::LexConfig`] actually reads.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consumed_pointers;

/// How many offending pointers a `Fail` error message lists.
const PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Normalised consumed prefixes (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Leaves outside every consumed prefix (sorted, unique).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report every leaf of `config_json` not covered by a consumed prefix.
/// `Fail` turns a non-clean report into a `CONFIG_UNUSED_KEYS` error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed_prefixes: Vec<String> = consumed_pointers()
        .iter()
        .map(|p| normalize_pointer(p))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let unused_leaf_pointers: Vec<String> = leaf_pointers(config_json)
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|p| covers(p, leaf)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if policy == UnusedKeyPolicy::Fail && !unused_leaf_pointers.is_empty() {
        let preview: Vec<&str> = unused_leaf_pointers
            .iter()
            .take(PREVIEW)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) nobody reads: {}",
            unused_leaf_pointers.len(),
            preview.join(", ")
        );
    }

    Ok(UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers,
    })
}

/// Leading `/`, no trailing `/` except for the root itself.
pub(crate) fn normalize_pointer(p: &str) -> String {
    let t = p.trim().trim_end_matches('/');
    if t.is_empty() {
        "/".to_string()
    } else if t.starts_with('/') {
        t.to_string()
    } else {
        format!("/{t}")
    }
}

/// `/a/b` covers `/a/b` and `/a/b/c` but not `/a/bc`.
pub(crate) fn covers(prefix: &str, leaf: &str) -> bool {
    prefix == "/"
        || leaf
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Pointers of every scalar (and null) in `doc`, sorted. A scalar document is
/// the single leaf `/`; empty objects and arrays contribute nothing.
pub(crate) fn leaf_pointers(doc: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![(String::new(), doc)];
    while let Some((path, v)) = stack.pop() {
        match v {
            Value::Object(map) => stack.extend(
                map.iter()
                    .map(|(k, child)| (format!("{path}/{}", escape_token(k)), child)),
            ),
            Value::Array(items) => stack.extend(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, child)| (format!("{path}/{i}"), child)),
            ),
            _ if path.is_empty() => out.push("/".to_string()),
            _ => out.push(path),
        }
    }
    out.sort();
    out
}

// RFC 6901 escaping.
fn escape_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefix_respects_token_boundary() {
        assert!(covers("/archive", "/archive/base_url"));
        assert!(covers("/archive", "/archive"));
        assert!(!covers("/archive", "/archives/x"));
        assert!(covers("/", "/anything"));
    }

    #[test]
    fn normalize_adds_slash_and_trims() {
        assert_eq!(normalize_pointer("paging/"), "/paging");
        assert_eq!(normalize_pointer(""), "/");
        assert_eq!(normalize_pointer("/"), "/");
    }

    #[test]
    fn leaves_cover_nested_arrays_and_escaped_keys() {
        let doc = json!({"a": {"b/c": 1, "d": [true, null]}, "e": {}});
        assert_eq!(leaf_pointers(&doc), vec!["/a/b~1c", "/a/d/0", "/a/d/1"]);
        assert_eq!(leaf_pointers(&json!(3)), vec!["/"]);
    }
}
