//! Admin and client secret resolution.
//!
//! YAML stores env var NAMES only:
//! - `/keycloak/credentials_env/username` + `/password` for a password grant,
//!   or `/keycloak/credentials_env/client_secret` for a client-credentials grant
//! - `/clients/N/secret_env` for a confidential client's desired secret
//!
//! Resolution happens once at startup. Errors name the variable, never the
//! value, and `Debug` redacts everything resolved.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_USERNAME_VAR: &str = "KCB_ADMIN_USERNAME";
pub const DEFAULT_PASSWORD_VAR: &str = "KCB_ADMIN_PASSWORD";

#[derive(Clone)]
pub enum AdminSecret {
    Password { username: String, password: String },
    ClientSecret(String),
}

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub admin: AdminSecret,
    /// Desired client secrets keyed by `clientId`.
    pub client_secrets: BTreeMap<String, String>,
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminSecret::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
            AdminSecret::ClientSecret(_) => f.write_str("ClientSecret(<REDACTED>)"),
        }
    }
}

impl fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("admin", &self.admin)
            .field(
                "client_secrets",
                &self
                    .client_secrets
                    .keys()
                    .map(|k| (k.as_str(), "<REDACTED>"))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_admin_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    resolve_admin_secrets_with(config_json, resolve_env)
}

/// Resolve secrets through `lookup` (env var name -> value).
pub fn resolve_admin_secrets_with<F>(config_json: &Value, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let require = |var: &str, what: &str| -> Result<String> {
        match lookup(var).filter(|v| !v.trim().is_empty()) {
            Some(v) => Ok(v),
            None => bail!("SECRETS_MISSING: required env var '{var}' ({what}) is not set or empty"),
        }
    };

    let admin = match read_str_at(config_json, "/keycloak/credentials_env/client_secret") {
        Some(var) => AdminSecret::ClientSecret(require(&var, "admin client secret")?),
        None => {
            let user_var = read_str_at(config_json, "/keycloak/credentials_env/username")
                .unwrap_or_else(|| DEFAULT_USERNAME_VAR.to_string());
            let pass_var = read_str_at(config_json, "/keycloak/credentials_env/password")
                .unwrap_or_else(|| DEFAULT_PASSWORD_VAR.to_string());
            AdminSecret::Password {
                username: require(&user_var, "admin username")?,
                password: require(&pass_var, "admin password")?,
            }
        }
    };

    let mut client_secrets = BTreeMap::new();
    let clients = config_json
        .pointer("/clients")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for (i, c) in clients.iter().enumerate() {
        let Some(var) = read_str_at(c, "/secret_env") else {
            continue;
        };
        let client_id = read_str_at(c, "/client_id").unwrap_or_else(|| format!("#{i}"));
        let secret = require(&var, &format!("secret of client '{client_id}'"))?;
        client_secrets.insert(client_id, secret);
    }

    Ok(ResolvedSecrets {
        admin,
        client_secrets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn password_grant_uses_default_names() {
        let s = resolve_admin_secrets_with(
            &json!({}),
            env(&[("KCB_ADMIN_USERNAME", "admin"), ("KCB_ADMIN_PASSWORD", "pw")]),
        )
        .unwrap();
        match s.admin {
            AdminSecret::Password { username, password } => {
                assert_eq!(username, "admin");
                assert_eq!(password, "pw");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn client_secret_grant_wins_when_named() {
        let cfg = json!({ "keycloak": { "credentials_env": { "client_secret": "BOOT_SECRET" } } });
        let s = resolve_admin_secrets_with(&cfg, env(&[("BOOT_SECRET", "s3cr3t")])).unwrap();
        assert!(matches!(s.admin, AdminSecret::ClientSecret(ref v) if v == "s3cr3t"));
    }

    #[test]
    fn missing_client_secret_names_variable_and_client() {
        let cfg = json!({
            "clients": [ { "client_id": "reporting", "secret_env": "REPORTING_SECRET" } ]
        });
        let err = resolve_admin_secrets_with(
            &cfg,
            env(&[("KCB_ADMIN_USERNAME", "admin"), ("KCB_ADMIN_PASSWORD", "pw")]),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("SECRETS_MISSING"), "{err}");
        assert!(err.contains("'REPORTING_SECRET'"), "{err}");
        assert!(err.contains("'reporting'"), "{err}");
    }

    #[test]
    fn debug_is_redacted() {
        let mut client_secrets = BTreeMap::new();
        client_secrets.insert("reporting".to_string(), "client-value".to_string());
        let s = ResolvedSecrets {
            admin: AdminSecret::Password {
                username: "admin".to_string(),
                password: "admin-value".to_string(),
            },
            client_secrets,
        };
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("admin-value"));
        assert!(!dbg.contains("client-value"));
        assert!(dbg.contains("reporting"));
    }
}
