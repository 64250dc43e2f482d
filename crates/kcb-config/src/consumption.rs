use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// JSON-pointer prefixes the bootstrap actually reads.
///
/// A leaf is consumed when it sits under one of these prefixes. Blueprint
/// sections are consumed whole; their shape is enforced when they are parsed.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/keycloak/base_url",
    "/keycloak/admin_realm",
    "/keycloak/client_id",
    "/keycloak/credentials_env/username",
    "/keycloak/credentials_env/password",
    "/keycloak/credentials_env/client_secret",
    "/bootstrap/enabled",
    "/bootstrap/force",
    "/bootstrap/timeout_secs",
    "/realm",
    "/clients",
    "/realm_roles",
    "/client_roles",
    "/composites",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Leaves of `config_json` not covered by [`CONSUMED_POINTERS`].
///
/// `Warn` logs each unused leaf and returns the report; `Fail` errors with
/// `CONFIG_UNUSED_KEYS` when any exist.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let unused: BTreeSet<String> = leaves
        .into_iter()
        .filter(|leaf| !CONSUMED_POINTERS.iter().any(|p| is_prefix_pointer(p, leaf)))
        .collect();
    let report = UnusedKeyReport {
        unused_leaf_pointers: unused.into_iter().collect(),
    };

    if report.is_clean() {
        return Ok(report);
    }

    match policy {
        UnusedKeyPolicy::Fail => bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s): {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
        ),
        UnusedKeyPolicy::Warn => {
            for p in &report.unused_leaf_pointers {
                warn!(pointer = %p, "unused config key");
            }
            Ok(report)
        }
    }
}

/// `/a/b` consumes `/a/b` and `/a/b/c`, never `/a/bc`.
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub(crate) fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let token = k.replace('~', "~0").replace('/', "~1");
                collect_leaf_pointers(vv, &format!("{prefix}/{token}"), out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ if prefix.is_empty() => {}
        _ => out.push(prefix.to_string()),
    }
}
