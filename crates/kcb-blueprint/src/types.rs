use std::collections::{BTreeMap, BTreeSet};

use crate::{DEFAULT_CLIENT_PROTOCOL, INITIALIZED_MARKER_ATTRIBUTE};

/// Desired realm-level settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealmBlueprint {
    pub name: String,
    pub enabled: bool,
    /// Desired realm attributes. Merged into the remote set, never replacing it.
    pub attributes: BTreeMap<String, String>,
}

impl RealmBlueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            attributes: BTreeMap::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Blueprint attributes with the initialization marker removed.
    ///
    /// This is the only attribute set the realm pass ever compares or writes.
    pub fn managed_attributes(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter(|(k, _)| k.as_str() != INITIALIZED_MARKER_ATTRIBUTE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Desired client registration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientBlueprint {
    pub client_id: String,
    pub protocol: String,
    pub public_client: bool,
    pub service_accounts_enabled: bool,
    pub redirect_uris: BTreeSet<String>,
    pub web_origins: BTreeSet<String>,
    pub attributes: BTreeMap<String, String>,
    /// Client secret resolved from the environment. Never logged.
    pub secret: Option<String>,
}

impl ClientBlueprint {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            protocol: DEFAULT_CLIENT_PROTOCOL.to_string(),
            public_client: false,
            service_accounts_enabled: false,
            redirect_uris: BTreeSet::new(),
            web_origins: BTreeSet::new(),
            attributes: BTreeMap::new(),
            secret: None,
        }
    }

    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn public_client(mut self, public_client: bool) -> Self {
        self.public_client = public_client;
        self
    }

    pub fn service_accounts_enabled(mut self, enabled: bool) -> Self {
        self.service_accounts_enabled = enabled;
        self
    }

    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.insert(uri.into());
        self
    }

    pub fn web_origin(mut self, origin: impl Into<String>) -> Self {
        self.web_origins.insert(origin.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

impl std::fmt::Debug for ClientBlueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBlueprint")
            .field("client_id", &self.client_id)
            .field("protocol", &self.protocol)
            .field("public_client", &self.public_client)
            .field("service_accounts_enabled", &self.service_accounts_enabled)
            .field("redirect_uris", &self.redirect_uris)
            .field("web_origins", &self.web_origins)
            .field("attributes", &self.attributes)
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Desired realm-scoped role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleBlueprint {
    pub name: String,
    pub description: Option<String>,
}

impl RoleBlueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Desired role scoped to one client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRoleBlueprint {
    /// `clientId` of the owning client (not its internal id).
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl ClientRoleBlueprint {
    pub fn new(client_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// "Holding realm role `realm_role` implies these roles of client `client_id`."
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleCompositeMapping {
    pub realm_role: String,
    pub client_id: String,
    pub client_roles: BTreeSet<String>,
}

impl RoleCompositeMapping {
    pub fn new<I, S>(realm_role: impl Into<String>, client_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            realm_role: realm_role.into(),
            client_id: client_id.into(),
            client_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// The full desired state handed to one reconciliation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeycloakBlueprint {
    pub realm: RealmBlueprint,
    pub clients: Vec<ClientBlueprint>,
    pub realm_roles: Vec<RoleBlueprint>,
    pub client_roles: Vec<ClientRoleBlueprint>,
    pub composites: Vec<RoleCompositeMapping>,
}

impl KeycloakBlueprint {
    pub fn new(realm: RealmBlueprint) -> Self {
        Self {
            realm,
            clients: Vec::new(),
            realm_roles: Vec::new(),
            client_roles: Vec::new(),
            composites: Vec::new(),
        }
    }

    pub fn client(mut self, client: ClientBlueprint) -> Self {
        self.clients.push(client);
        self
    }

    pub fn realm_role(mut self, role: RoleBlueprint) -> Self {
        self.realm_roles.push(role);
        self
    }

    pub fn client_role(mut self, role: ClientRoleBlueprint) -> Self {
        self.client_roles.push(role);
        self
    }

    pub fn composite(mut self, mapping: RoleCompositeMapping) -> Self {
        self.composites.push(mapping);
        self
    }

    pub fn realm_name(&self) -> &str {
        &self.realm.name
    }

    /// Client roles grouped by owning `clientId`, in `clientId` order.
    pub fn client_roles_by_client(&self) -> BTreeMap<&str, Vec<&ClientRoleBlueprint>> {
        let mut groups: BTreeMap<&str, Vec<&ClientRoleBlueprint>> = BTreeMap::new();
        for role in &self.client_roles {
            groups.entry(role.client_id.as_str()).or_default().push(role);
        }
        groups
    }
}
