//! Command handlers for the `kcb` binary.

pub mod bootstrap;

use anyhow::Result;
use kcb_config::{LoadedConfig, UnusedKeyPolicy};

pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    kcb_config::load_layered_yaml(&path_refs)
}

pub fn unused_key_policy(strict: bool) -> UnusedKeyPolicy {
    if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    }
}
