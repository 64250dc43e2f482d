//! `kcb` commands that never reach the identity service.
//!
//! GREEN when:
//! - `config-hash` prints a stable hash and the canonical JSON.
//! - `validate` prints blueprint counts and undeclared client references,
//!   and fails on invalid blueprints or (with --strict) unused keys.
//! - `apply` fails closed on missing admin secrets before any network call.
//! - `apply` with bootstrap disabled prints the skip line.

use std::io::Write;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::NamedTempFile;

const SCHOOL: &str = r#"
keycloak:
  base_url: "http://127.0.0.1:9"
  credentials_env:
    username: KCB_CLI_SENTINEL_USER_9C1E
    password: KCB_CLI_SENTINEL_PASS_9C1E
realm:
  name: school
clients:
  - client_id: reporting
    service_accounts_enabled: true
realm_roles:
  - name: TEACHER
client_roles:
  - client_id: reporting
    name: VIEW_REPORTS
  - client_id: gradebook
    name: EDIT_GRADES
composites:
  - realm_role: TEACHER
    client_id: reporting
    client_roles: [VIEW_REPORTS]
"#;

fn yaml_file(body: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(body.as_bytes()).unwrap();
    f
}

fn kcb() -> Command {
    let mut cmd = Command::cargo_bin("kcb").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn config_hash_prints_hash_and_json() {
    let f = yaml_file(SCHOOL);
    kcb()
        .arg("config-hash")
        .arg(f.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match("config_hash=[0-9a-f]{64}\n").unwrap())
        .stdout(predicate::str::contains(r#""name":"school""#));
}

#[test]
fn validate_prints_counts_and_undeclared_clients() {
    let f = yaml_file(SCHOOL);
    kcb()
        .args(["validate", "--config"])
        .arg(f.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "realm=school clients=1 realm_roles=1 client_roles=2 composites=1",
        ))
        .stdout(predicate::str::contains(
            "warning: client role 'EDIT_GRADES' references undeclared client 'gradebook'",
        ));
}

#[test]
fn validate_rejects_public_client_with_secret() {
    let f = yaml_file(
        r#"
realm:
  name: school
clients:
  - client_id: portal
    public_client: true
    secret_env: PORTAL_SECRET
"#,
    );
    kcb()
        .args(["validate", "--config"])
        .arg(f.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("BLUEPRINT_INVALID"));
}

#[test]
fn strict_validate_rejects_unused_keys() {
    let base = yaml_file(SCHOOL);
    let extra = yaml_file("bootstrap:\n  retries: 3\n");
    kcb()
        .args(["validate", "--strict", "--config"])
        .arg(base.path())
        .arg("--config")
        .arg(extra.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn apply_fails_closed_without_admin_secrets() {
    let f = yaml_file(SCHOOL);
    kcb()
        .args(["apply", "--config"])
        .arg(f.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("SECRETS_MISSING"))
        .stderr(predicate::str::contains("KCB_CLI_SENTINEL_USER_9C1E"));
}

#[test]
fn apply_with_bootstrap_disabled_is_skipped() {
    let base = yaml_file(SCHOOL);
    let off = yaml_file("bootstrap:\n  enabled: false\n");
    kcb()
        .args(["apply", "--config"])
        .arg(base.path())
        .arg("--config")
        .arg(off.path())
        .env("KCB_CLI_SENTINEL_USER_9C1E", "admin")
        .env("KCB_CLI_SENTINEL_PASS_9C1E", "admin-pw")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "skipped: provisioning disabled by configuration",
        ));
}
