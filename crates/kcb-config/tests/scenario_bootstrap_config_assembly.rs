//! GREEN when:
//! - A layered document plus resolved secrets yields a validated blueprint
//!   and an admin connection.
//! - Client secrets attach to the client that names them.
//! - An invalid blueprint is rejected at assembly time.

use kcb_admin::AdminCredentials;
use kcb_config::secrets::resolve_admin_secrets_with;
use kcb_config::{load_layered_yaml_from_strings, BootstrapConfig};

const BASE: &str = r#"
keycloak:
  base_url: "https://sso.school.example "
  credentials_env:
    client_secret: SCHOOL_BOOTSTRAP_SECRET
realm:
  name: school
clients:
  - client_id: reporting
    service_accounts_enabled: true
    secret_env: SCHOOL_REPORTING_SECRET
  - client_id: portal
    public_client: true
    redirect_uris: ["https://portal.school.example/*"]
"#;

const PROD: &str = r#"
bootstrap:
  force: true
  timeout_secs: 30
"#;

fn lookup(name: &str) -> Option<String> {
    match name {
        "SCHOOL_BOOTSTRAP_SECRET" => Some("boot-value".to_string()),
        "SCHOOL_REPORTING_SECRET" => Some("reporting-value".to_string()),
        _ => None,
    }
}

#[test]
fn layered_document_assembles() {
    let loaded = load_layered_yaml_from_strings(&[BASE, PROD]).unwrap();
    let secrets = resolve_admin_secrets_with(&loaded.config_json, lookup).unwrap();
    let cfg = BootstrapConfig::from_loaded(&loaded, &secrets).unwrap();

    assert_eq!(cfg.config_hash, loaded.config_hash);
    assert_eq!(cfg.connection.base_url, "https://sso.school.example");
    assert_eq!(cfg.connection.admin_realm, "master");
    assert_eq!(
        cfg.connection.credentials,
        AdminCredentials::ClientCredentials {
            client_secret: "boot-value".to_string()
        }
    );
    assert!(cfg.settings.enabled);
    assert!(cfg.settings.force);
    assert_eq!(cfg.settings.timeout_secs, 30);

    let reporting = &cfg.blueprint.clients[0];
    assert_eq!(reporting.secret.as_deref(), Some("reporting-value"));
    let portal = &cfg.blueprint.clients[1];
    assert!(portal.public_client);
    assert!(portal.secret.is_none());
}

#[test]
fn duplicate_client_is_rejected() {
    let dup = r#"
keycloak:
  base_url: "http://localhost:8080"
realm:
  name: school
clients:
  - client_id: reporting
  - client_id: reporting
"#;
    let loaded = load_layered_yaml_from_strings(&[dup]).unwrap();
    let secrets = resolve_admin_secrets_with(&loaded.config_json, |_| Some("x".to_string())).unwrap();
    let err = BootstrapConfig::from_loaded(&loaded, &secrets).unwrap_err();
    assert!(err.to_string().contains("BLUEPRINT_INVALID"), "{err}");
}

#[test]
fn missing_keycloak_section_is_rejected() {
    let loaded = load_layered_yaml_from_strings(&["realm: { name: school }"]).unwrap();
    let secrets = resolve_admin_secrets_with(&loaded.config_json, |_| Some("x".to_string())).unwrap();
    let err = BootstrapConfig::from_loaded(&loaded, &secrets).unwrap_err();
    assert!(err.to_string().contains("missing 'keycloak' section"), "{err}");
}
