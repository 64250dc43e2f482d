use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use kcb_admin::{
    AdminApi, ClientRepresentation, RealmRepresentation, RoleRepresentation,
    REALM_MANAGEMENT_CLIENT_ID,
};
use kcb_blueprint::{
    marker_is_set, ClientBlueprint, ClientRoleBlueprint, KeycloakBlueprint, RoleBlueprint,
    RoleCompositeMapping, DEFAULT_CLIENT_PROTOCOL, INITIALIZED_MARKER_ATTRIBUTE,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{ApplyAction, ApplyReport, InitializationOutcome, ResourceKind};

/// `realm-management` roles granted to every new service-account client.
pub const SERVICE_ACCOUNT_ROLES: &[&str] = &["manage-users", "view-users"];

// ---------------------------------------------------------------------------
// Attribute / set helpers
// ---------------------------------------------------------------------------

/// Keys of `desired` whose value is absent or different in `remote`.
fn changed_attribute_keys(
    remote: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> Vec<String> {
    desired
        .iter()
        .filter(|(k, v)| remote.get(*k) != Some(*v))
        .map(|(k, _)| k.clone())
        .collect()
}

/// `remote ∪ desired`, desired winning. Remote-only keys survive.
fn merge_attributes(
    remote: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = remote.clone();
    for (k, v) in desired {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

fn sorted_vec(set: &BTreeSet<String>) -> Vec<String> {
    set.iter().cloned().collect()
}

fn join(names: &[String]) -> String {
    names.join(",")
}

fn client_representation(c: &ClientBlueprint) -> ClientRepresentation {
    ClientRepresentation {
        client_id: Some(c.client_id.clone()),
        enabled: Some(true),
        protocol: Some(c.protocol.clone()),
        public_client: Some(c.public_client),
        service_accounts_enabled: Some(c.service_accounts_enabled),
        redirect_uris: Some(sorted_vec(&c.redirect_uris)),
        web_origins: Some(sorted_vec(&c.web_origins)),
        attributes: Some(c.attributes.clone()),
        secret: c.secret.clone(),
        ..Default::default()
    }
}

/// Field-level patch for an existing client. Empty `changed` means converged.
struct ClientPatch {
    rep: ClientRepresentation,
    changed: Vec<&'static str>,
    enables_service_account: bool,
}

fn diff_client(current: &ClientRepresentation, desired: &ClientBlueprint) -> ClientPatch {
    let mut rep = ClientRepresentation::default();
    let mut changed = Vec::new();

    let protocol = current
        .protocol
        .as_deref()
        .unwrap_or(DEFAULT_CLIENT_PROTOCOL);
    if protocol != desired.protocol {
        rep.protocol = Some(desired.protocol.clone());
        changed.push("protocol");
    }

    if current.public_client.unwrap_or(false) != desired.public_client {
        rep.public_client = Some(desired.public_client);
        changed.push("publicClient");
    }

    let had_service_account = current.service_accounts_enabled.unwrap_or(false);
    if had_service_account != desired.service_accounts_enabled {
        rep.service_accounts_enabled = Some(desired.service_accounts_enabled);
        changed.push("serviceAccountsEnabled");
    }

    if current.redirect_uri_set() != desired.redirect_uris {
        rep.redirect_uris = Some(sorted_vec(&desired.redirect_uris));
        changed.push("redirectUris");
    }

    if current.web_origin_set() != desired.web_origins {
        rep.web_origins = Some(sorted_vec(&desired.web_origins));
        changed.push("webOrigins");
    }

    let remote_attrs = current.attributes.clone().unwrap_or_default();
    if !changed_attribute_keys(&remote_attrs, &desired.attributes).is_empty() {
        rep.attributes = Some(merge_attributes(&remote_attrs, &desired.attributes));
        changed.push("attributes");
    }

    ClientPatch {
        rep,
        changed,
        enables_service_account: !had_service_account && desired.service_accounts_enabled,
    }
}

fn role_key(client_id: &str, role: &str) -> String {
    format!("{client_id}:{role}")
}

fn composite_key(m: &RoleCompositeMapping) -> String {
    format!("{} -> {}", m.realm_role, m.client_id)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives the remote realm toward a blueprint in six ordered passes.
///
/// Each pass is idempotent and reads before it writes. Any admin error aborts
/// the run; the initialization flag (last pass) is then left unset so the
/// next run retries every pass. The service-account role grant in the client
/// pass is the only step whose failure is tolerated.
pub struct ConvergenceEngine {
    admin: Arc<dyn AdminApi>,
}

impl ConvergenceEngine {
    pub fn new(admin: Arc<dyn AdminApi>) -> Self {
        Self { admin }
    }

    pub async fn apply_blueprint(
        &self,
        blueprint: &KeycloakBlueprint,
    ) -> Result<InitializationOutcome> {
        let report = self.apply_with_report(blueprint).await?;
        Ok(InitializationOutcome::applied(report.summary()))
    }

    pub async fn apply_with_report(&self, blueprint: &KeycloakBlueprint) -> Result<ApplyReport> {
        blueprint.validate()?;

        let mut report = ApplyReport::start(blueprint.realm_name());
        let span = info_span!(
            "apply",
            run_id = %report.run_id,
            realm = %blueprint.realm_name()
        );

        async {
            for r in blueprint.undeclared_client_references() {
                warn!(reference = %r, "blueprint references a client it does not declare");
            }
            if blueprint
                .realm
                .attributes
                .contains_key(INITIALIZED_MARKER_ATTRIBUTE)
            {
                warn!(
                    attribute = INITIALIZED_MARKER_ATTRIBUTE,
                    "blueprint sets the initialization marker; ignored until the final pass"
                );
            }

            self.ensure_realm(blueprint, &mut report).await?;
            self.ensure_clients(blueprint, &mut report).await?;
            self.ensure_realm_roles(blueprint, &mut report).await?;
            self.ensure_client_roles(blueprint, &mut report).await?;
            self.ensure_composites(blueprint, &mut report).await?;
            self.ensure_initialization_flag(blueprint, &mut report).await?;

            report.finish();
            info!(summary = %report.summary(), "blueprint applied");
            Ok::<(), anyhow::Error>(())
        }
        .instrument(span)
        .await?;

        Ok(report)
    }

    // --- pass 1 ------------------------------------------------------------

    async fn ensure_realm(&self, bp: &KeycloakBlueprint, report: &mut ApplyReport) -> Result<()> {
        let name = bp.realm_name();
        let desired_attrs = bp.realm.managed_attributes();

        let current = self
            .admin
            .get_realm(name)
            .await
            .with_context(|| format!("pass 1: read realm '{name}'"))?;

        let Some(current) = current else {
            let rep = RealmRepresentation {
                realm: Some(name.to_string()),
                enabled: Some(bp.realm.enabled),
                attributes: Some(desired_attrs),
                ..Default::default()
            };
            self.admin
                .create_realm(&rep)
                .await
                .with_context(|| format!("pass 1: create realm '{name}'"))?;
            info!(realm = name, pass = 1, "realm created");
            report.record(ResourceKind::Realm, name, ApplyAction::Created, None);
            return Ok(());
        };

        let mut patch = RealmRepresentation::default();
        let mut changed: Vec<String> = Vec::new();

        if current.enabled != Some(bp.realm.enabled) {
            patch.enabled = Some(bp.realm.enabled);
            changed.push("enabled".to_string());
        }

        let remote_attrs = current.attributes.clone().unwrap_or_default();
        let changed_keys = changed_attribute_keys(&remote_attrs, &desired_attrs);
        if !changed_keys.is_empty() {
            patch.attributes = Some(merge_attributes(&remote_attrs, &desired_attrs));
            changed.push(format!("attributes[{}]", join(&changed_keys)));
        }

        if changed.is_empty() {
            debug!(realm = name, pass = 1, "realm converged");
            report.record(ResourceKind::Realm, name, ApplyAction::Unchanged, None);
            return Ok(());
        }

        self.admin
            .update_realm(name, &patch)
            .await
            .with_context(|| format!("pass 1: update realm '{name}'"))?;
        let detail = changed.join(", ");
        info!(realm = name, pass = 1, changed = %detail, "realm updated");
        report.record(ResourceKind::Realm, name, ApplyAction::Updated, Some(detail));
        Ok(())
    }

    // --- pass 2 ------------------------------------------------------------

    async fn ensure_clients(&self, bp: &KeycloakBlueprint, report: &mut ApplyReport) -> Result<()> {
        for client in &bp.clients {
            self.ensure_client(bp.realm_name(), client, report).await?;
        }
        Ok(())
    }

    async fn ensure_client(
        &self,
        realm: &str,
        c: &ClientBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let client_id = c.client_id.as_str();
        let current = self
            .admin
            .find_client(realm, client_id)
            .await
            .with_context(|| format!("pass 2: find client '{client_id}'"))?;

        let Some(current) = current else {
            let id = self
                .admin
                .create_client(realm, &client_representation(c))
                .await
                .with_context(|| format!("pass 2: create client '{client_id}'"))?;
            info!(realm, client_id, pass = 2, "client created");
            report.record(ResourceKind::Client, client_id, ApplyAction::Created, None);

            if c.service_accounts_enabled {
                self.grant_service_account_roles(realm, &id, client_id, report)
                    .await;
            }
            return Ok(());
        };

        let id = current
            .id
            .clone()
            .ok_or_else(|| anyhow!("pass 2: client '{client_id}' has no internal id"))?;

        let mut patch = diff_client(&current, c);

        let rotate_secret = match c.secret.as_deref() {
            Some(desired) => {
                let stored = self
                    .admin
                    .get_client_secret(realm, &id)
                    .await
                    .with_context(|| format!("pass 2: read secret of client '{client_id}'"))?;
                stored.as_deref() != Some(desired)
            }
            None => false,
        };

        if !patch.changed.is_empty() {
            // The rotated secret rides in the same update as the field patch.
            if rotate_secret {
                patch.rep.secret = c.secret.clone();
            }
            self.admin
                .update_client(realm, &id, &patch.rep)
                .await
                .with_context(|| format!("pass 2: update client '{client_id}'"))?;

            let detail = patch.changed.join(", ");
            info!(realm, client_id, pass = 2, changed = %detail, "client updated");
            report.record(
                ResourceKind::Client,
                client_id,
                ApplyAction::Updated,
                Some(detail),
            );
            if rotate_secret {
                info!(realm, client_id, pass = 2, "client secret rotated");
                report.record(
                    ResourceKind::ClientSecret,
                    client_id,
                    ApplyAction::Updated,
                    Some("rotated with field update".to_string()),
                );
            }
            if patch.enables_service_account {
                self.grant_service_account_roles(realm, &id, client_id, report)
                    .await;
            }
            return Ok(());
        }

        report.record(ResourceKind::Client, client_id, ApplyAction::Unchanged, None);

        if rotate_secret {
            if let Some(secret) = c.secret.as_deref() {
                self.admin
                    .update_client_secret(realm, &id, secret)
                    .await
                    .with_context(|| format!("pass 2: rotate secret of client '{client_id}'"))?;
                info!(realm, client_id, pass = 2, "client secret rotated");
                report.record(
                    ResourceKind::ClientSecret,
                    client_id,
                    ApplyAction::Updated,
                    Some("rotated".to_string()),
                );
            }
        }
        Ok(())
    }

    /// Best-effort grant of the `realm-management` roles to a client's
    /// service account. Failure is logged and recorded, never propagated.
    async fn grant_service_account_roles(
        &self,
        realm: &str,
        client_uuid: &str,
        client_id: &str,
        report: &mut ApplyReport,
    ) {
        match self.try_grant_service_account_roles(realm, client_uuid).await {
            Ok(granted) => {
                info!(realm, client_id, roles = %granted, "service account roles granted");
                report.record(
                    ResourceKind::ServiceAccountGrant,
                    client_id,
                    ApplyAction::Updated,
                    Some(granted),
                );
            }
            Err(err) => {
                let cause = format!("{err:#}");
                warn!(realm, client_id, error = %cause, "service account role grant failed");
                report.warn(format!(
                    "service account role grant for client '{client_id}' failed: {cause}"
                ));
                report.record(
                    ResourceKind::ServiceAccountGrant,
                    client_id,
                    ApplyAction::Skipped,
                    Some(cause),
                );
            }
        }
    }

    async fn try_grant_service_account_roles(
        &self,
        realm: &str,
        client_uuid: &str,
    ) -> Result<String> {
        let user = self
            .admin
            .get_service_account_user(realm, client_uuid)
            .await
            .context("read service account user")?;
        let user_id = user
            .id
            .ok_or_else(|| anyhow!("service account user has no id"))?;

        let mgmt = self
            .admin
            .find_client(realm, REALM_MANAGEMENT_CLIENT_ID)
            .await
            .with_context(|| format!("find client '{REALM_MANAGEMENT_CLIENT_ID}'"))?
            .ok_or_else(|| anyhow!("client '{REALM_MANAGEMENT_CLIENT_ID}' not found"))?;
        let mgmt_uuid = mgmt
            .id
            .ok_or_else(|| anyhow!("client '{REALM_MANAGEMENT_CLIENT_ID}' has no internal id"))?;

        let mut roles = Vec::with_capacity(SERVICE_ACCOUNT_ROLES.len());
        for name in SERVICE_ACCOUNT_ROLES {
            let role = self
                .admin
                .get_client_role(realm, &mgmt_uuid, name)
                .await
                .with_context(|| format!("read role '{name}'"))?
                .ok_or_else(|| {
                    anyhow!("role '{name}' not found on client '{REALM_MANAGEMENT_CLIENT_ID}'")
                })?;
            roles.push(role);
        }

        self.admin
            .assign_client_roles_to_user(realm, &user_id, &mgmt_uuid, &roles)
            .await
            .context("assign roles to service account")?;

        Ok(SERVICE_ACCOUNT_ROLES.join(","))
    }

    // --- pass 3 ------------------------------------------------------------

    async fn ensure_realm_roles(
        &self,
        bp: &KeycloakBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let realm = bp.realm_name();
        for role in &bp.realm_roles {
            self.ensure_realm_role(realm, role, report).await?;
        }
        Ok(())
    }

    async fn ensure_realm_role(
        &self,
        realm: &str,
        role: &RoleBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let name = role.name.as_str();
        let current = self
            .admin
            .get_realm_role(realm, name)
            .await
            .with_context(|| format!("pass 3: read realm role '{name}'"))?;

        let Some(current) = current else {
            self.admin
                .create_realm_role(
                    realm,
                    &RoleRepresentation::named(name, role.description.clone()),
                )
                .await
                .with_context(|| format!("pass 3: create realm role '{name}'"))?;
            info!(realm, role = name, pass = 3, "realm role created");
            report.record(ResourceKind::RealmRole, name, ApplyAction::Created, None);
            return Ok(());
        };

        match role.description.as_deref() {
            Some(desired) if current.description.as_deref() != Some(desired) => {
                self.admin
                    .update_realm_role(
                        realm,
                        name,
                        &RoleRepresentation::named(name, Some(desired.to_string())),
                    )
                    .await
                    .with_context(|| format!("pass 3: update realm role '{name}'"))?;
                info!(realm, role = name, pass = 3, "realm role description updated");
                report.record(
                    ResourceKind::RealmRole,
                    name,
                    ApplyAction::Updated,
                    Some("description".to_string()),
                );
            }
            _ => report.record(ResourceKind::RealmRole, name, ApplyAction::Unchanged, None),
        }
        Ok(())
    }

    // --- pass 4 ------------------------------------------------------------

    async fn ensure_client_roles(
        &self,
        bp: &KeycloakBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let realm = bp.realm_name();
        for (client_id, roles) in bp.client_roles_by_client() {
            let client = self
                .admin
                .find_client(realm, client_id)
                .await
                .with_context(|| format!("pass 4: find client '{client_id}'"))?;

            let client_uuid = match client.and_then(|c| c.id) {
                Some(id) => id,
                None => {
                    warn!(realm, client_id, pass = 4, "client not found; skipping its roles");
                    report.warn(format!(
                        "client '{client_id}' not found; {} client role(s) skipped",
                        roles.len()
                    ));
                    for role in roles {
                        report.record(
                            ResourceKind::ClientRole,
                            role_key(client_id, &role.name),
                            ApplyAction::Skipped,
                            Some("client not found".to_string()),
                        );
                    }
                    continue;
                }
            };

            for role in roles {
                self.ensure_client_role(realm, &client_uuid, role, report)
                    .await?;
            }
        }
        Ok(())
    }

    async fn ensure_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        role: &ClientRoleBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let key = role_key(&role.client_id, &role.name);
        let name = role.name.as_str();
        let current = self
            .admin
            .get_client_role(realm, client_uuid, name)
            .await
            .with_context(|| format!("pass 4: read client role '{key}'"))?;

        let Some(current) = current else {
            self.admin
                .create_client_role(
                    realm,
                    client_uuid,
                    &RoleRepresentation::named(name, role.description.clone()),
                )
                .await
                .with_context(|| format!("pass 4: create client role '{key}'"))?;
            info!(realm, role = %key, pass = 4, "client role created");
            report.record(ResourceKind::ClientRole, key, ApplyAction::Created, None);
            return Ok(());
        };

        match role.description.as_deref() {
            Some(desired) if current.description.as_deref() != Some(desired) => {
                self.admin
                    .update_client_role(
                        realm,
                        client_uuid,
                        name,
                        &RoleRepresentation::named(name, Some(desired.to_string())),
                    )
                    .await
                    .with_context(|| format!("pass 4: update client role '{key}'"))?;
                info!(realm, role = %key, pass = 4, "client role description updated");
                report.record(
                    ResourceKind::ClientRole,
                    key,
                    ApplyAction::Updated,
                    Some("description".to_string()),
                );
            }
            _ => report.record(ResourceKind::ClientRole, key, ApplyAction::Unchanged, None),
        }
        Ok(())
    }

    // --- pass 5 ------------------------------------------------------------

    async fn ensure_composites(
        &self,
        bp: &KeycloakBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let realm = bp.realm_name();
        for mapping in &bp.composites {
            self.ensure_composite(realm, mapping, report).await?;
        }
        Ok(())
    }

    async fn ensure_composite(
        &self,
        realm: &str,
        m: &RoleCompositeMapping,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let key = composite_key(m);

        let realm_role = self
            .admin
            .get_realm_role(realm, &m.realm_role)
            .await
            .with_context(|| format!("pass 5: read realm role '{}'", m.realm_role))?;
        if realm_role.is_none() {
            warn!(realm, role = %m.realm_role, pass = 5, "realm role not found; skipping composite mapping");
            report.warn(format!(
                "realm role '{}' not found; composite mapping '{key}' skipped",
                m.realm_role
            ));
            report.record(
                ResourceKind::Composite,
                key,
                ApplyAction::Skipped,
                Some("realm role not found".to_string()),
            );
            return Ok(());
        }

        let client_uuid = self
            .admin
            .find_client(realm, &m.client_id)
            .await
            .with_context(|| format!("pass 5: find client '{}'", m.client_id))?
            .and_then(|c| c.id);
        let Some(client_uuid) = client_uuid else {
            warn!(realm, client_id = %m.client_id, pass = 5, "client not found; skipping composite mapping");
            report.warn(format!(
                "client '{}' not found; composite mapping '{key}' skipped",
                m.client_id
            ));
            report.record(
                ResourceKind::Composite,
                key,
                ApplyAction::Skipped,
                Some("client not found".to_string()),
            );
            return Ok(());
        };

        let current: BTreeSet<String> = self
            .admin
            .get_realm_role_client_composites(realm, &m.realm_role, &client_uuid)
            .await
            .with_context(|| format!("pass 5: read composites of '{key}'"))?
            .into_iter()
            .filter_map(|r| r.name)
            .collect();

        let missing: Vec<&String> = m.client_roles.difference(&current).collect();
        if missing.is_empty() {
            debug!(realm, composite = %key, pass = 5, "composite mapping converged");
            report.record(ResourceKind::Composite, key, ApplyAction::Unchanged, None);
            return Ok(());
        }

        let mut resolved: Vec<RoleRepresentation> = Vec::with_capacity(missing.len());
        for name in missing {
            let role = self
                .admin
                .get_client_role(realm, &client_uuid, name)
                .await
                .with_context(|| format!("pass 5: read client role '{}'", role_key(&m.client_id, name)))?;
            match role {
                Some(role) => resolved.push(role),
                None => {
                    warn!(realm, role = %role_key(&m.client_id, name), pass = 5, "client role not found; left out of composite");
                    report.warn(format!(
                        "client role '{}' not found; left out of composite mapping '{key}'",
                        role_key(&m.client_id, name)
                    ));
                }
            }
        }

        if resolved.is_empty() {
            report.record(
                ResourceKind::Composite,
                key,
                ApplyAction::Skipped,
                Some("no desired client role resolved".to_string()),
            );
            return Ok(());
        }

        self.admin
            .add_realm_role_composites(realm, &m.realm_role, &resolved)
            .await
            .with_context(|| format!("pass 5: attach composites to '{key}'"))?;

        let added: Vec<String> = resolved.iter().map(|r| r.name_str().to_string()).collect();
        let detail = format!("added {}", join(&added));
        info!(realm, composite = %key, pass = 5, added = %join(&added), "composites attached");
        report.record(ResourceKind::Composite, key, ApplyAction::Updated, Some(detail));
        Ok(())
    }

    // --- pass 6 ------------------------------------------------------------

    async fn ensure_initialization_flag(
        &self,
        bp: &KeycloakBlueprint,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let name = bp.realm_name();
        let current = self
            .admin
            .get_realm(name)
            .await
            .with_context(|| format!("pass 6: read realm '{name}'"))?;
        let Some(current) = current else {
            bail!("pass 6: realm '{name}' disappeared before the initialization flag was set");
        };

        if marker_is_set(current.attribute(INITIALIZED_MARKER_ATTRIBUTE)) {
            report.record(
                ResourceKind::InitializationFlag,
                name,
                ApplyAction::Unchanged,
                None,
            );
            return Ok(());
        }

        let mut attrs = current.attributes.clone().unwrap_or_default();
        attrs.insert(INITIALIZED_MARKER_ATTRIBUTE.to_string(), "true".to_string());
        let patch = RealmRepresentation {
            attributes: Some(attrs),
            ..Default::default()
        };
        self.admin
            .update_realm(name, &patch)
            .await
            .with_context(|| format!("pass 6: set initialization flag on realm '{name}'"))?;
        info!(realm = name, pass = 6, "initialization flag set");
        report.record(
            ResourceKind::InitializationFlag,
            name,
            ApplyAction::Updated,
            None,
        );
        Ok(())
    }
}
