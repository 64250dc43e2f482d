use std::collections::BTreeSet;

use anyhow::{bail, Result};

use crate::KeycloakBlueprint;

/// A client role or composite mapping that names a `clientId` the blueprint
/// does not declare.
///
/// Not an error: the client may already exist remotely. The engine resolves
/// it at apply time and skips the dependent work if it is still missing.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum UndeclaredClientReference {
    ClientRole { client_id: String, role: String },
    Composite { client_id: String, realm_role: String },
}

impl std::fmt::Display for UndeclaredClientReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndeclaredClientReference::ClientRole { client_id, role } => {
                write!(f, "client role '{role}' references undeclared client '{client_id}'")
            }
            UndeclaredClientReference::Composite {
                client_id,
                realm_role,
            } => write!(
                f,
                "composite of realm role '{realm_role}' references undeclared client '{client_id}'"
            ),
        }
    }
}

impl KeycloakBlueprint {
    /// Structural checks that must hold before any remote call is made.
    ///
    /// Errors name the offending entry; the first violation wins.
    pub fn validate(&self) -> Result<()> {
        if self.realm.name.trim().is_empty() {
            bail!("BLUEPRINT_INVALID: realm name must not be empty");
        }

        let mut client_ids: BTreeSet<&str> = BTreeSet::new();
        for c in &self.clients {
            if c.client_id.trim().is_empty() {
                bail!("BLUEPRINT_INVALID: client with empty clientId");
            }
            if !client_ids.insert(c.client_id.as_str()) {
                bail!("BLUEPRINT_INVALID: duplicate clientId '{}'", c.client_id);
            }
            if c.public_client && c.secret.is_some() {
                bail!(
                    "BLUEPRINT_INVALID: public client '{}' must not carry a secret",
                    c.client_id
                );
            }
        }

        let mut realm_roles: BTreeSet<&str> = BTreeSet::new();
        for r in &self.realm_roles {
            if r.name.trim().is_empty() {
                bail!("BLUEPRINT_INVALID: realm role with empty name");
            }
            if !realm_roles.insert(r.name.as_str()) {
                bail!("BLUEPRINT_INVALID: duplicate realm role '{}'", r.name);
            }
        }

        let mut client_roles: BTreeSet<(&str, &str)> = BTreeSet::new();
        for r in &self.client_roles {
            if r.client_id.trim().is_empty() || r.name.trim().is_empty() {
                bail!(
                    "BLUEPRINT_INVALID: client role needs both clientId and name (got '{}':'{}')",
                    r.client_id,
                    r.name
                );
            }
            if !client_roles.insert((r.client_id.as_str(), r.name.as_str())) {
                bail!(
                    "BLUEPRINT_INVALID: duplicate client role '{}' on client '{}'",
                    r.name,
                    r.client_id
                );
            }
        }

        for m in &self.composites {
            if m.realm_role.trim().is_empty() || m.client_id.trim().is_empty() {
                bail!("BLUEPRINT_INVALID: composite mapping needs realm role and clientId");
            }
            if m.client_roles.is_empty() {
                bail!(
                    "BLUEPRINT_INVALID: composite mapping '{}' -> '{}' lists no client roles",
                    m.realm_role,
                    m.client_id
                );
            }
        }

        Ok(())
    }

    /// References to clients that are not declared in `clients`, sorted.
    pub fn undeclared_client_references(&self) -> Vec<UndeclaredClientReference> {
        let declared: BTreeSet<&str> = self.clients.iter().map(|c| c.client_id.as_str()).collect();

        let mut out: Vec<UndeclaredClientReference> = Vec::new();
        for r in &self.client_roles {
            if !declared.contains(r.client_id.as_str()) {
                out.push(UndeclaredClientReference::ClientRole {
                    client_id: r.client_id.clone(),
                    role: r.name.clone(),
                });
            }
        }
        for m in &self.composites {
            if !declared.contains(m.client_id.as_str()) {
                out.push(UndeclaredClientReference::Composite {
                    client_id: m.client_id.clone(),
                    realm_role: m.realm_role.clone(),
                });
            }
        }

        out.sort();
        out
    }
}
