use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use kcb_admin::{AdminApi, KeycloakAdminClient};
use kcb_config::{
    report_unused_keys, resolve_admin_secrets, BootstrapConfig, BootstrapDocument,
};
use kcb_reconcile::{InitializationEvaluator, RealmInitializer, RealmMarkerEvaluator};
use tracing::info;

use super::{load_config, unused_key_policy};

/// Placeholder carried for clients that name a `secret_env`, so offline
/// validation still sees which clients are confidential.
const UNRESOLVED_SECRET: &str = "<unresolved>";

fn load_bootstrap(paths: &[String], strict: bool) -> Result<BootstrapConfig> {
    let loaded = load_config(paths)?;
    report_unused_keys(&loaded.config_json, unused_key_policy(strict))?;
    let secrets = resolve_admin_secrets(&loaded.config_json)?;
    let cfg = BootstrapConfig::from_loaded(&loaded, &secrets)?;
    info!(
        config_hash = %cfg.config_hash,
        realm = cfg.blueprint.realm_name(),
        base_url = %cfg.connection.base_url,
        "bootstrap config loaded"
    );
    Ok(cfg)
}

fn admin_for(cfg: &BootstrapConfig) -> Arc<dyn AdminApi> {
    Arc::new(KeycloakAdminClient::new(cfg.connection.clone()))
}

pub async fn apply(
    paths: &[String],
    timeout_override: Option<u64>,
    json: bool,
    strict: bool,
) -> Result<()> {
    let cfg = load_bootstrap(paths, strict)?;
    let init = RealmInitializer::for_admin(admin_for(&cfg), cfg.settings.force)
        .enabled(cfg.settings.enabled);

    let secs = timeout_override.unwrap_or(cfg.settings.timeout_secs);
    let (outcome, report) = tokio::time::timeout(
        Duration::from_secs(secs),
        init.initialize_with_report(&cfg.blueprint),
    )
    .await
    .map_err(|_| anyhow!("BOOTSTRAP_TIMEOUT: realm '{}' not converged within {secs}s", cfg.blueprint.realm_name()))?
    .with_context(|| format!("bootstrap of realm '{}' failed", cfg.blueprint.realm_name()))?;

    println!("{outcome}");
    if let Some(report) = report {
        for w in &report.warnings {
            println!("warning: {w}");
        }
        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

pub async fn status(paths: &[String]) -> Result<()> {
    let cfg = load_bootstrap(paths, false)?;
    println!("config_hash={}", cfg.config_hash);
    println!("enabled={}", cfg.settings.enabled);

    let evaluator = RealmMarkerEvaluator::new(admin_for(&cfg)).force(cfg.settings.force);
    let decision = evaluator.evaluate(&cfg.blueprint).await?;
    println!("provision={}", decision.perform_provisioning);
    if let Some(reason) = decision.reason {
        println!("reason={reason}");
    }
    Ok(())
}

pub fn validate(paths: &[String], strict: bool) -> Result<()> {
    let loaded = load_config(paths)?;
    let unused = report_unused_keys(&loaded.config_json, unused_key_policy(strict))?;
    let doc = BootstrapDocument::from_loaded(&loaded)?;

    let placeholders: BTreeMap<String, String> = doc
        .clients
        .iter()
        .filter(|c| c.secret_env.is_some())
        .map(|c| (c.client_id.clone(), UNRESOLVED_SECRET.to_string()))
        .collect();
    let bp = doc.blueprint(&placeholders);
    bp.validate()?;

    println!("config_hash={}", loaded.config_hash);
    println!(
        "realm={} clients={} realm_roles={} client_roles={} composites={}",
        bp.realm_name(),
        bp.clients.len(),
        bp.realm_roles.len(),
        bp.client_roles.len(),
        bp.composites.len()
    );
    for r in bp.undeclared_client_references() {
        println!("warning: {r}");
    }
    for p in &unused.unused_leaf_pointers {
        println!("warning: unused config key {p}");
    }
    Ok(())
}
