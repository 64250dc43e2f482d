//! kcb-blueprint
//!
//! Desired-state model for one realm bootstrap run.
//!
//! Architectural decisions:
//! - Blueprints are plain values built once from configuration
//! - The convergence engine only ever borrows them (`&KeycloakBlueprint`)
//! - Attribute maps and URI sets use `BTreeMap` / `BTreeSet` so comparison is
//!   order-insensitive and iteration is deterministic
//!
//! Pure data. No IO. No admin API calls.

mod types;
mod validate;

pub use types::*;
pub use validate::UndeclaredClientReference;

/// Realm attribute that fences a completed bootstrap run.
///
/// Never part of the blueprint's own attribute set; written only by the final
/// convergence pass and read by the initialization evaluator.
pub const INITIALIZED_MARKER_ATTRIBUTE: &str = "kcb.initialized";

/// Protocol used when a client blueprint does not name one.
pub const DEFAULT_CLIENT_PROTOCOL: &str = "openid-connect";

/// `true` when a marker attribute value reads as set (case-insensitive `"true"`).
pub fn marker_is_set(value: Option<&str>) -> bool {
    value
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_case_insensitive() {
        assert!(marker_is_set(Some("true")));
        assert!(marker_is_set(Some("TRUE")));
        assert!(marker_is_set(Some(" True ")));
        assert!(!marker_is_set(Some("false")));
        assert!(!marker_is_set(Some("yes")));
        assert!(!marker_is_set(None));
    }
}
