//! Deterministic in-memory identity service.
//!
//! Behaves like the admin REST API for the calls the convergence engine
//! makes: partial updates, additive attribute writes, 409 on duplicate
//! creates, and a `realm-management` client provisioned with every new realm.
//! Ids are sequential (`client-000001`, `role-000002`, ...). No network I/O.
//!
//! Every [`AdminApi`] call is recorded so scenarios can assert on what was
//! (or was not) sent. Seed and inspection helpers bypass the log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use kcb_admin::{
    AdminApi, AdminError, AdminResult, ClientRepresentation, RealmRepresentation,
    RoleRepresentation, UserRepresentation, REALM_MANAGEMENT_CLIENT_ID,
};

use crate::calls::{AdminCall, AdminOp};

/// Roles the identity service puts on every `realm-management` client.
pub const MANAGEMENT_ROLES: &[&str] = &[
    "manage-users",
    "view-users",
    "query-users",
    "manage-clients",
    "view-realm",
];

#[derive(Clone, Debug, Default)]
struct FakeClient {
    rep: ClientRepresentation,
    roles: BTreeMap<String, RoleRepresentation>,
    service_account_user: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct FakeRealm {
    enabled: bool,
    attributes: BTreeMap<String, String>,
    /// Keyed by internal id.
    clients: BTreeMap<String, FakeClient>,
    roles: BTreeMap<String, RoleRepresentation>,
    /// realm role name -> set of client-role ids
    composites: BTreeMap<String, BTreeSet<String>>,
    users: BTreeMap<String, UserRepresentation>,
    /// user id -> set of client-role ids
    user_client_roles: BTreeMap<String, BTreeSet<String>>,
}

impl FakeRealm {
    fn client_by_client_id(&self, client_id: &str) -> Option<(&String, &FakeClient)> {
        self.clients
            .iter()
            .find(|(_, c)| c.rep.client_id.as_deref() == Some(client_id))
    }

    /// (client uuid, role) for a client-role id.
    fn client_role_by_id(&self, role_id: &str) -> Option<(&str, &RoleRepresentation)> {
        self.clients.iter().find_map(|(uuid, c)| {
            c.roles
                .values()
                .find(|r| r.id.as_deref() == Some(role_id))
                .map(|r| (uuid.as_str(), r))
        })
    }
}

#[derive(Debug, Default)]
struct FakeState {
    realms: BTreeMap<String, FakeRealm>,
    calls: Vec<AdminCall>,
    failures: BTreeMap<AdminOp, AdminError>,
    provision_management_client: bool,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:06}", self.next_id)
    }

    fn record(&mut self, op: AdminOp, target: String) -> AdminResult<()> {
        self.calls.push(AdminCall { op, target });
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn realm_mut(&mut self, realm: &str) -> AdminResult<&mut FakeRealm> {
        self.realms
            .get_mut(realm)
            .ok_or_else(|| AdminError::NotFound(format!("realm '{realm}'")))
    }

    fn add_management_client(&mut self, realm: &str) {
        let uuid = self.next_id("client");
        let mut roles = BTreeMap::new();
        for name in MANAGEMENT_ROLES {
            let id = self.next_id("role");
            roles.insert(
                name.to_string(),
                RoleRepresentation {
                    id: Some(id),
                    name: Some(name.to_string()),
                    client_role: Some(true),
                    container_id: Some(uuid.clone()),
                    ..Default::default()
                },
            );
        }
        let client = FakeClient {
            rep: ClientRepresentation {
                id: Some(uuid.clone()),
                client_id: Some(REALM_MANAGEMENT_CLIENT_ID.to_string()),
                enabled: Some(true),
                protocol: Some("openid-connect".to_string()),
                public_client: Some(false),
                service_accounts_enabled: Some(false),
                ..Default::default()
            },
            roles,
            service_account_user: None,
        };
        if let Some(r) = self.realms.get_mut(realm) {
            r.clients.insert(uuid, client);
        }
    }

    fn insert_client(&mut self, realm: &str, rep: &ClientRepresentation) -> AdminResult<String> {
        let client_id = rep
            .client_id
            .clone()
            .ok_or_else(|| AdminError::Api {
                status: 400,
                message: "clientId is required".to_string(),
            })?;

        let uuid = self.next_id("client");
        let generated_secret = self.next_id("generated-secret");
        let user_id = self.next_id("user");

        let r = self.realm_mut(realm)?;
        if r.client_by_client_id(&client_id).is_some() {
            return Err(AdminError::Conflict(format!(
                "Client {client_id} already exists"
            )));
        }

        let mut stored = rep.clone();
        stored.id = Some(uuid.clone());
        stored.enabled = stored.enabled.or(Some(true));
        stored.protocol = stored.protocol.or(Some("openid-connect".to_string()));
        stored.public_client = stored.public_client.or(Some(false));
        stored.service_accounts_enabled = stored.service_accounts_enabled.or(Some(false));
        if stored.public_client == Some(false) && stored.secret.is_none() {
            stored.secret = Some(generated_secret);
        }

        let mut client = FakeClient {
            rep: stored,
            ..Default::default()
        };
        if client.rep.service_accounts_enabled == Some(true) {
            r.users.insert(
                user_id.clone(),
                UserRepresentation {
                    id: Some(user_id.clone()),
                    username: Some(format!("service-account-{client_id}")),
                },
            );
            client.service_account_user = Some(user_id);
        }
        r.clients.insert(uuid.clone(), client);
        Ok(uuid)
    }

    fn insert_role(
        &mut self,
        realm: &str,
        client_uuid: Option<&str>,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let name = rep.name.clone().ok_or_else(|| AdminError::Api {
            status: 400,
            message: "role name is required".to_string(),
        })?;
        let id = self.next_id("role");
        let r = self.realm_mut(realm)?;

        let (roles, container) = match client_uuid {
            Some(uuid) => {
                let c = r
                    .clients
                    .get_mut(uuid)
                    .ok_or_else(|| AdminError::NotFound(format!("client '{uuid}'")))?;
                (&mut c.roles, uuid.to_string())
            }
            None => (&mut r.roles, realm.to_string()),
        };

        if roles.contains_key(&name) {
            return Err(AdminError::Conflict(format!(
                "Role with name {name} already exists"
            )));
        }

        roles.insert(
            name.clone(),
            RoleRepresentation {
                id: Some(id),
                name: Some(name),
                description: rep.description.clone(),
                composite: Some(false),
                client_role: Some(client_uuid.is_some()),
                container_id: Some(container),
            },
        );
        Ok(())
    }
}

/// In-memory [`AdminApi`] for scenario tests.
#[derive(Debug)]
pub struct FakeIdentityService {
    state: Mutex<FakeState>,
}

impl Default for FakeIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeIdentityService {
    /// Empty service; new realms get a `realm-management` client.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                provision_management_client: true,
                ..Default::default()
            }),
        }
    }

    /// New realms come without a `realm-management` client, so service-account
    /// grants cannot resolve their roles.
    pub fn without_management_roles(self) -> Self {
        self.state().provision_management_client = false;
        self
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- fault injection ---------------------------------------------------

    /// Every subsequent call of `op` fails with `err` (after being recorded).
    pub fn fail_on(&self, op: AdminOp, err: AdminError) {
        self.state().failures.insert(op, err);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    // --- call log ----------------------------------------------------------

    pub fn calls(&self) -> Vec<AdminCall> {
        self.state().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<AdminCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op.is_mutating())
            .cloned()
            .collect()
    }

    pub fn calls_of(&self, op: AdminOp) -> Vec<AdminCall> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    // --- seeding (not recorded) --------------------------------------------

    pub fn seed_realm(&self, realm: &str, enabled: bool, attributes: &[(&str, &str)]) {
        let mut s = self.state();
        s.realms.insert(
            realm.to_string(),
            FakeRealm {
                enabled,
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
        );
        if s.provision_management_client {
            s.add_management_client(realm);
        }
    }

    /// Seeds a client and returns its internal id. Panics if the realm is missing.
    pub fn seed_client(&self, realm: &str, rep: ClientRepresentation) -> String {
        match self.state().insert_client(realm, &rep) {
            Ok(id) => id,
            Err(e) => panic!("seed_client({realm}): {e}"),
        }
    }

    pub fn seed_realm_role(&self, realm: &str, name: &str, description: Option<&str>) {
        let rep = RoleRepresentation::named(name, description.map(str::to_string));
        if let Err(e) = self.state().insert_role(realm, None, &rep) {
            panic!("seed_realm_role({realm}, {name}): {e}");
        }
    }

    pub fn seed_client_role(
        &self,
        realm: &str,
        client_id: &str,
        name: &str,
        description: Option<&str>,
    ) {
        let Some(uuid) = self.client_uuid(realm, client_id) else {
            panic!("seed_client_role: client '{client_id}' missing in realm '{realm}'");
        };
        let rep = RoleRepresentation::named(name, description.map(str::to_string));
        if let Err(e) = self.state().insert_role(realm, Some(&uuid), &rep) {
            panic!("seed_client_role({realm}, {client_id}, {name}): {e}");
        }
    }

    /// Attaches client role `client_id:role` as a composite of realm role `realm_role`.
    pub fn seed_composite(&self, realm: &str, realm_role: &str, client_id: &str, role: &str) {
        let mut s = self.state();
        let Some(r) = s.realms.get_mut(realm) else {
            panic!("seed_composite: realm '{realm}' missing");
        };
        let role_id = r
            .client_by_client_id(client_id)
            .and_then(|(_, c)| c.roles.get(role))
            .and_then(|rep| rep.id.clone());
        let Some(role_id) = role_id else {
            panic!("seed_composite: client role '{client_id}:{role}' missing");
        };
        r.composites
            .entry(realm_role.to_string())
            .or_default()
            .insert(role_id);
    }

    // --- inspection (not recorded) -----------------------------------------

    pub fn realm(&self, realm: &str) -> Option<RealmRepresentation> {
        let s = self.state();
        let r = s.realms.get(realm)?;
        Some(RealmRepresentation {
            id: Some(realm.to_string()),
            realm: Some(realm.to_string()),
            enabled: Some(r.enabled),
            attributes: Some(r.attributes.clone()),
        })
    }

    pub fn client(&self, realm: &str, client_id: &str) -> Option<ClientRepresentation> {
        let s = self.state();
        let r = s.realms.get(realm)?;
        r.client_by_client_id(client_id).map(|(_, c)| c.rep.clone())
    }

    pub fn client_uuid(&self, realm: &str, client_id: &str) -> Option<String> {
        self.client(realm, client_id).and_then(|c| c.id)
    }

    pub fn realm_role(&self, realm: &str, name: &str) -> Option<RoleRepresentation> {
        self.state().realms.get(realm)?.roles.get(name).cloned()
    }

    pub fn client_role(&self, realm: &str, client_id: &str, name: &str) -> Option<RoleRepresentation> {
        let s = self.state();
        let r = s.realms.get(realm)?;
        r.client_by_client_id(client_id)?.1.roles.get(name).cloned()
    }

    /// Names of `client_id`'s roles attached as composites of `realm_role`.
    pub fn composite_names(&self, realm: &str, realm_role: &str, client_id: &str) -> BTreeSet<String> {
        let s = self.state();
        let Some(r) = s.realms.get(realm) else {
            return BTreeSet::new();
        };
        let Some((uuid, _)) = r.client_by_client_id(client_id) else {
            return BTreeSet::new();
        };
        r.composites
            .get(realm_role)
            .into_iter()
            .flatten()
            .filter_map(|id| r.client_role_by_id(id))
            .filter(|(container, _)| *container == uuid.as_str())
            .map(|(_, rep)| rep.name_str().to_string())
            .collect()
    }

    /// Names of `role_client_id`'s roles granted to `client_id`'s service account.
    pub fn service_account_role_names(
        &self,
        realm: &str,
        client_id: &str,
        role_client_id: &str,
    ) -> BTreeSet<String> {
        let s = self.state();
        let Some(r) = s.realms.get(realm) else {
            return BTreeSet::new();
        };
        let user = r
            .client_by_client_id(client_id)
            .and_then(|(_, c)| c.service_account_user.clone());
        let role_client = r.client_by_client_id(role_client_id).map(|(u, _)| u.clone());
        let (Some(user), Some(role_client)) = (user, role_client) else {
            return BTreeSet::new();
        };
        r.user_client_roles
            .get(&user)
            .into_iter()
            .flatten()
            .filter_map(|id| r.client_role_by_id(id))
            .filter(|(container, _)| *container == role_client.as_str())
            .map(|(_, rep)| rep.name_str().to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl AdminApi for FakeIdentityService {
    async fn get_realm(&self, realm: &str) -> AdminResult<Option<RealmRepresentation>> {
        self.state().record(AdminOp::GetRealm, realm.to_string())?;
        Ok(self.realm(realm))
    }

    async fn create_realm(&self, rep: &RealmRepresentation) -> AdminResult<()> {
        let name = rep.realm.clone().unwrap_or_default();
        let mut s = self.state();
        s.record(AdminOp::CreateRealm, name.clone())?;
        if name.is_empty() {
            return Err(AdminError::Api {
                status: 400,
                message: "realm name is required".to_string(),
            });
        }
        if s.realms.contains_key(&name) {
            return Err(AdminError::Conflict(format!("Realm {name} already exists")));
        }
        s.realms.insert(
            name.clone(),
            FakeRealm {
                enabled: rep.enabled.unwrap_or(false),
                attributes: rep.attributes.clone().unwrap_or_default(),
                ..Default::default()
            },
        );
        if s.provision_management_client {
            s.add_management_client(&name);
        }
        Ok(())
    }

    async fn update_realm(&self, realm: &str, rep: &RealmRepresentation) -> AdminResult<()> {
        let mut s = self.state();
        s.record(AdminOp::UpdateRealm, realm.to_string())?;
        let r = s.realm_mut(realm)?;
        if let Some(enabled) = rep.enabled {
            r.enabled = enabled;
        }
        if let Some(attrs) = &rep.attributes {
            for (k, v) in attrs {
                r.attributes.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn find_client(
        &self,
        realm: &str,
        client_id: &str,
    ) -> AdminResult<Option<ClientRepresentation>> {
        self.state()
            .record(AdminOp::FindClient, format!("{realm}/{client_id}"))?;
        Ok(self.client(realm, client_id).map(|mut c| {
            c.secret = None;
            c
        }))
    }

    async fn create_client(&self, realm: &str, rep: &ClientRepresentation) -> AdminResult<String> {
        let mut s = self.state();
        s.record(
            AdminOp::CreateClient,
            format!("{realm}/{}", rep.client_id.as_deref().unwrap_or_default()),
        )?;
        s.insert_client(realm, rep)
    }

    async fn update_client(
        &self,
        realm: &str,
        id: &str,
        rep: &ClientRepresentation,
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(AdminOp::UpdateClient, format!("{realm}/{id}"))?;
        let user_id = s.next_id("user");
        let r = s.realm_mut(realm)?;
        let c = r
            .clients
            .get_mut(id)
            .ok_or_else(|| AdminError::NotFound(format!("client '{id}'")))?;

        let stored = &mut c.rep;
        if rep.protocol.is_some() {
            stored.protocol = rep.protocol.clone();
        }
        if rep.public_client.is_some() {
            stored.public_client = rep.public_client;
        }
        if rep.service_accounts_enabled.is_some() {
            stored.service_accounts_enabled = rep.service_accounts_enabled;
        }
        if rep.redirect_uris.is_some() {
            stored.redirect_uris = rep.redirect_uris.clone();
        }
        if rep.web_origins.is_some() {
            stored.web_origins = rep.web_origins.clone();
        }
        if rep.enabled.is_some() {
            stored.enabled = rep.enabled;
        }
        if rep.secret.is_some() {
            stored.secret = rep.secret.clone();
        }
        if let Some(attrs) = &rep.attributes {
            let merged = stored.attributes.get_or_insert_with(BTreeMap::new);
            for (k, v) in attrs {
                merged.insert(k.clone(), v.clone());
            }
        }

        let needs_user =
            c.rep.service_accounts_enabled == Some(true) && c.service_account_user.is_none();
        if needs_user {
            let username = format!(
                "service-account-{}",
                c.rep.client_id.as_deref().unwrap_or_default()
            );
            c.service_account_user = Some(user_id.clone());
            r.users.insert(
                user_id.clone(),
                UserRepresentation {
                    id: Some(user_id),
                    username: Some(username),
                },
            );
        }
        Ok(())
    }

    async fn get_client_secret(&self, realm: &str, id: &str) -> AdminResult<Option<String>> {
        let mut s = self.state();
        s.record(AdminOp::GetClientSecret, format!("{realm}/{id}"))?;
        Ok(s.realms
            .get(realm)
            .and_then(|r| r.clients.get(id))
            .and_then(|c| c.rep.secret.clone()))
    }

    async fn update_client_secret(&self, realm: &str, id: &str, secret: &str) -> AdminResult<()> {
        let mut s = self.state();
        s.record(AdminOp::UpdateClientSecret, format!("{realm}/{id}"))?;
        let r = s.realm_mut(realm)?;
        let c = r
            .clients
            .get_mut(id)
            .ok_or_else(|| AdminError::NotFound(format!("client '{id}'")))?;
        c.rep.secret = Some(secret.to_string());
        Ok(())
    }

    async fn get_service_account_user(
        &self,
        realm: &str,
        id: &str,
    ) -> AdminResult<UserRepresentation> {
        let mut s = self.state();
        s.record(AdminOp::GetServiceAccountUser, format!("{realm}/{id}"))?;
        let r = s.realm_mut(realm)?;
        r.clients
            .get(id)
            .and_then(|c| c.service_account_user.as_ref())
            .and_then(|u| r.users.get(u))
            .cloned()
            .ok_or_else(|| AdminError::NotFound(format!("service account of client '{id}'")))
    }

    async fn get_realm_role(
        &self,
        realm: &str,
        name: &str,
    ) -> AdminResult<Option<RoleRepresentation>> {
        self.state()
            .record(AdminOp::GetRealmRole, format!("{realm}/{name}"))?;
        Ok(self.realm_role(realm, name))
    }

    async fn create_realm_role(&self, realm: &str, rep: &RoleRepresentation) -> AdminResult<()> {
        let mut s = self.state();
        s.record(AdminOp::CreateRealmRole, format!("{realm}/{}", rep.name_str()))?;
        s.insert_role(realm, None, rep)
    }

    async fn update_realm_role(
        &self,
        realm: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(AdminOp::UpdateRealmRole, format!("{realm}/{name}"))?;
        let r = s.realm_mut(realm)?;
        let role = r
            .roles
            .get_mut(name)
            .ok_or_else(|| AdminError::NotFound(format!("role '{name}'")))?;
        if rep.description.is_some() {
            role.description = rep.description.clone();
        }
        Ok(())
    }

    async fn get_realm_role_client_composites(
        &self,
        realm: &str,
        role_name: &str,
        client_uuid: &str,
    ) -> AdminResult<Vec<RoleRepresentation>> {
        let mut s = self.state();
        s.record(
            AdminOp::GetRealmRoleClientComposites,
            format!("{realm}/{role_name}/{client_uuid}"),
        )?;
        let r = s.realm_mut(realm)?;
        if !r.roles.contains_key(role_name) {
            return Err(AdminError::NotFound(format!("role '{role_name}'")));
        }
        Ok(r
            .composites
            .get(role_name)
            .into_iter()
            .flatten()
            .filter_map(|id| r.client_role_by_id(id))
            .filter(|(container, _)| *container == client_uuid)
            .map(|(_, rep)| rep.clone())
            .collect())
    }

    async fn add_realm_role_composites(
        &self,
        realm: &str,
        role_name: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(
            AdminOp::AddRealmRoleComposites,
            format!("{realm}/{role_name}"),
        )?;
        let r = s.realm_mut(realm)?;
        if !r.roles.contains_key(role_name) {
            return Err(AdminError::NotFound(format!("role '{role_name}'")));
        }

        let mut ids: Vec<String> = Vec::new();
        for rep in roles {
            let Some(id) = rep.id.clone() else {
                return Err(AdminError::Api {
                    status: 400,
                    message: "composite role without id".to_string(),
                });
            };
            if r.client_role_by_id(&id).is_none() {
                return Err(AdminError::NotFound(format!("role id '{id}'")));
            }
            ids.push(id);
        }

        r.composites
            .entry(role_name.to_string())
            .or_default()
            .extend(ids);
        if let Some(role) = r.roles.get_mut(role_name) {
            role.composite = Some(true);
        }
        Ok(())
    }

    async fn get_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
    ) -> AdminResult<Option<RoleRepresentation>> {
        let mut s = self.state();
        s.record(
            AdminOp::GetClientRole,
            format!("{realm}/{client_uuid}/{name}"),
        )?;
        Ok(s.realms
            .get(realm)
            .and_then(|r| r.clients.get(client_uuid))
            .and_then(|c| c.roles.get(name))
            .cloned())
    }

    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(
            AdminOp::CreateClientRole,
            format!("{realm}/{client_uuid}/{}", rep.name_str()),
        )?;
        s.insert_role(realm, Some(client_uuid), rep)
    }

    async fn update_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(
            AdminOp::UpdateClientRole,
            format!("{realm}/{client_uuid}/{name}"),
        )?;
        let r = s.realm_mut(realm)?;
        let role = r
            .clients
            .get_mut(client_uuid)
            .and_then(|c| c.roles.get_mut(name))
            .ok_or_else(|| AdminError::NotFound(format!("client role '{name}'")))?;
        if rep.description.is_some() {
            role.description = rep.description.clone();
        }
        Ok(())
    }

    async fn assign_client_roles_to_user(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()> {
        let mut s = self.state();
        s.record(
            AdminOp::AssignClientRolesToUser,
            format!("{realm}/{user_id}/{client_uuid}"),
        )?;
        let r = s.realm_mut(realm)?;
        if !r.users.contains_key(user_id) {
            return Err(AdminError::NotFound(format!("user '{user_id}'")));
        }

        let mut ids: Vec<String> = Vec::new();
        for rep in roles {
            let id = rep.id.clone().unwrap_or_default();
            match r.client_role_by_id(&id) {
                Some((container, _)) if container == client_uuid => ids.push(id),
                _ => {
                    return Err(AdminError::NotFound(format!(
                        "role '{}' on client '{client_uuid}'",
                        rep.name_str()
                    )))
                }
            }
        }

        r.user_client_roles
            .entry(user_id.to_string())
            .or_default()
            .extend(ids);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_realm_carries_management_client() {
        let fake = FakeIdentityService::new();
        fake.create_realm(&RealmRepresentation {
            realm: Some("school".to_string()),
            enabled: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();

        let mgmt = fake.client("school", REALM_MANAGEMENT_CLIENT_ID).unwrap();
        let uuid = mgmt.id.unwrap();
        let role = fake
            .get_client_role("school", &uuid, "manage-users")
            .await
            .unwrap();
        assert!(role.is_some());
    }

    #[tokio::test]
    async fn duplicate_client_is_conflict() {
        let fake = FakeIdentityService::new();
        fake.seed_realm("school", true, &[]);
        let rep = ClientRepresentation {
            client_id: Some("reporting".to_string()),
            ..Default::default()
        };
        fake.create_client("school", &rep).await.unwrap();
        let err = fake.create_client("school", &rep).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }

    #[tokio::test]
    async fn realm_attribute_updates_are_additive() {
        let fake = FakeIdentityService::new();
        fake.seed_realm("school", true, &[("keep", "1")]);
        let mut attrs = BTreeMap::new();
        attrs.insert("new".to_string(), "2".to_string());
        fake.update_realm(
            "school",
            &RealmRepresentation {
                attributes: Some(attrs),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let realm = fake.realm("school").unwrap();
        assert_eq!(realm.attribute("keep"), Some("1"));
        assert_eq!(realm.attribute("new"), Some("2"));
    }

    #[tokio::test]
    async fn injected_failure_is_recorded_then_returned() {
        let fake = FakeIdentityService::new();
        fake.fail_on(
            AdminOp::GetRealm,
            AdminError::Transport("connection reset".to_string()),
        );
        let err = fake.get_realm("school").await.unwrap_err();
        assert_eq!(err, AdminError::Transport("connection reset".to_string()));
        assert_eq!(fake.calls_of(AdminOp::GetRealm).len(), 1);
    }

    #[tokio::test]
    async fn composites_are_scoped_to_client() {
        let fake = FakeIdentityService::new();
        fake.seed_realm("school", true, &[]);
        fake.seed_client(
            "school",
            ClientRepresentation {
                client_id: Some("reporting".to_string()),
                ..Default::default()
            },
        );
        fake.seed_client(
            "school",
            ClientRepresentation {
                client_id: Some("gradebook".to_string()),
                ..Default::default()
            },
        );
        fake.seed_realm_role("school", "TEACHER", None);
        fake.seed_client_role("school", "reporting", "VIEW", None);
        fake.seed_client_role("school", "gradebook", "EDIT", None);
        fake.seed_composite("school", "TEACHER", "reporting", "VIEW");
        fake.seed_composite("school", "TEACHER", "gradebook", "EDIT");

        let names = fake.composite_names("school", "TEACHER", "reporting");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), ["VIEW"]);
    }
}
