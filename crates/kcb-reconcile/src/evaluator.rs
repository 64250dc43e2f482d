use std::sync::Arc;

use anyhow::{Context, Result};
use kcb_admin::AdminApi;
use kcb_blueprint::{marker_is_set, KeycloakBlueprint, INITIALIZED_MARKER_ATTRIBUTE};
use tracing::debug;

/// Whether a bootstrap run should converge the realm, and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisioningDecision {
    pub perform_provisioning: bool,
    pub reason: Option<String>,
}

impl ProvisioningDecision {
    pub fn provision(reason: impl Into<String>) -> Self {
        Self {
            perform_provisioning: true,
            reason: Some(reason.into()),
        }
    }

    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            perform_provisioning: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether provisioning is needed. The engine never second-guesses it.
#[async_trait::async_trait]
pub trait InitializationEvaluator: Send + Sync {
    async fn evaluate(&self, blueprint: &KeycloakBlueprint) -> Result<ProvisioningDecision>;
}

/// Reads the initialization marker attribute on the target realm.
pub struct RealmMarkerEvaluator {
    admin: Arc<dyn AdminApi>,
    force: bool,
}

impl RealmMarkerEvaluator {
    pub fn new(admin: Arc<dyn AdminApi>) -> Self {
        Self {
            admin,
            force: false,
        }
    }

    /// Provision even when the marker is set.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[async_trait::async_trait]
impl InitializationEvaluator for RealmMarkerEvaluator {
    async fn evaluate(&self, blueprint: &KeycloakBlueprint) -> Result<ProvisioningDecision> {
        let name = blueprint.realm_name();
        if self.force {
            return Ok(ProvisioningDecision::provision("forced by configuration"));
        }

        let realm = self
            .admin
            .get_realm(name)
            .await
            .with_context(|| format!("read initialization marker of realm '{name}'"))?;

        let Some(realm) = realm else {
            return Ok(ProvisioningDecision::provision(format!(
                "realm '{name}' does not exist"
            )));
        };

        let marker = realm.attribute(INITIALIZED_MARKER_ATTRIBUTE);
        debug!(realm = name, marker = ?marker, "initialization marker read");
        if marker_is_set(marker) {
            Ok(ProvisioningDecision::skip(format!(
                "realm '{name}' already initialized"
            )))
        } else {
            Ok(ProvisioningDecision::provision(format!(
                "realm '{name}' exists but is not initialized"
            )))
        }
    }
}
