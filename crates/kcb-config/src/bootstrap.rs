//! Typed view of the merged configuration document.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context, Result};
use kcb_admin::{AdminConnection, AdminCredentials};
use kcb_blueprint::{
    ClientBlueprint, ClientRoleBlueprint, KeycloakBlueprint, RealmBlueprint, RoleBlueprint,
    RoleCompositeMapping, DEFAULT_CLIENT_PROTOCOL,
};
use serde::Deserialize;

use crate::secrets::{AdminSecret, ResolvedSecrets};
use crate::LoadedConfig;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

fn default_true() -> bool {
    true
}

fn default_admin_realm() -> String {
    "master".to_string()
}

fn default_admin_client_id() -> String {
    "admin-cli".to_string()
}

fn default_protocol() -> String {
    DEFAULT_CLIENT_PROTOCOL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsEnv {
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeycloakSection {
    pub base_url: String,
    #[serde(default = "default_admin_realm")]
    pub admin_realm: String,
    #[serde(default = "default_admin_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub credentials_env: Option<CredentialsEnv>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            force: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmSection {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    pub client_id: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub public_client: bool,
    #[serde(default)]
    pub service_accounts_enabled: bool,
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,
    #[serde(default)]
    pub web_origins: BTreeSet<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Env var NAME holding the desired secret.
    #[serde(default)]
    pub secret_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSection {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientRoleSection {
    pub client_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositeSection {
    pub realm_role: String,
    pub client_id: String,
    pub client_roles: BTreeSet<String>,
}

/// The merged document. Unknown top-level keys are left to the unused-key guard.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapDocument {
    pub keycloak: Option<KeycloakSection>,
    #[serde(default)]
    pub bootstrap: BootstrapSettings,
    pub realm: RealmSection,
    #[serde(default)]
    pub clients: Vec<ClientSection>,
    #[serde(default)]
    pub realm_roles: Vec<RoleSection>,
    #[serde(default)]
    pub client_roles: Vec<ClientRoleSection>,
    #[serde(default)]
    pub composites: Vec<CompositeSection>,
}

impl BootstrapDocument {
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        serde_json::from_value(loaded.config_json.clone())
            .context("CONFIG_INVALID: bootstrap document does not match the expected shape")
    }

    /// Blueprint for this document. Client secrets come from `client_secrets`
    /// (keyed by `clientId`); clients without an entry carry no secret.
    pub fn blueprint(&self, client_secrets: &BTreeMap<String, String>) -> KeycloakBlueprint {
        let mut realm = RealmBlueprint::new(self.realm.name.clone()).enabled(self.realm.enabled);
        realm.attributes = self.realm.attributes.clone();

        let mut bp = KeycloakBlueprint::new(realm);

        for c in &self.clients {
            let mut client = ClientBlueprint::new(c.client_id.clone())
                .protocol(c.protocol.clone())
                .public_client(c.public_client)
                .service_accounts_enabled(c.service_accounts_enabled);
            client.redirect_uris = c.redirect_uris.clone();
            client.web_origins = c.web_origins.clone();
            client.attributes = c.attributes.clone();
            if let Some(secret) = client_secrets.get(&c.client_id) {
                client = client.secret(secret.clone());
            }
            bp = bp.client(client);
        }

        for r in &self.realm_roles {
            let mut role = RoleBlueprint::new(r.name.clone());
            role.description = r.description.clone();
            bp = bp.realm_role(role);
        }

        for r in &self.client_roles {
            let mut role = ClientRoleBlueprint::new(r.client_id.clone(), r.name.clone());
            role.description = r.description.clone();
            bp = bp.client_role(role);
        }

        for m in &self.composites {
            bp = bp.composite(RoleCompositeMapping::new(
                m.realm_role.clone(),
                m.client_id.clone(),
                m.client_roles.iter().cloned(),
            ));
        }

        bp
    }
}

/// Everything a bootstrap run needs, secrets resolved.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub config_hash: String,
    pub connection: AdminConnection,
    pub settings: BootstrapSettings,
    pub blueprint: KeycloakBlueprint,
}

impl BootstrapConfig {
    pub fn from_loaded(loaded: &LoadedConfig, secrets: &ResolvedSecrets) -> Result<Self> {
        let doc = BootstrapDocument::from_loaded(loaded)?;

        let Some(kc) = doc.keycloak.as_ref() else {
            bail!("CONFIG_INVALID: missing 'keycloak' section");
        };
        if kc.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID: keycloak.base_url must not be empty");
        }

        let credentials = match &secrets.admin {
            AdminSecret::Password { username, password } => AdminCredentials::Password {
                username: username.clone(),
                password: password.clone(),
            },
            AdminSecret::ClientSecret(secret) => AdminCredentials::ClientCredentials {
                client_secret: secret.clone(),
            },
        };

        let blueprint = doc.blueprint(&secrets.client_secrets);
        blueprint.validate()?;

        Ok(Self {
            config_hash: loaded.config_hash.clone(),
            connection: AdminConnection {
                base_url: kc.base_url.trim().to_string(),
                admin_realm: kc.admin_realm.clone(),
                client_id: kc.client_id.clone(),
                credentials,
            },
            settings: doc.bootstrap.clone(),
            blueprint,
        })
    }
}
