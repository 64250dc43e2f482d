//! Initializer gating and marker evaluation.
//!
//! GREEN when:
//! - Disabled bootstrap is skipped without any remote call.
//! - Marker evaluation covers absent, unmarked, marked, and forced realms.
//! - Evaluator read failures propagate.

use std::sync::Arc;

use kcb_admin::AdminError;
use kcb_reconcile::*;
use kcb_testkit::{school_blueprint, AdminOp, FakeIdentityService};

#[tokio::test]
async fn scenario_disabled_bootstrap_makes_no_calls() {
    let fake = Arc::new(FakeIdentityService::new());
    let init = RealmInitializer::for_admin(fake.clone(), false).enabled(false);

    let outcome = init.initialize(&school_blueprint()).await.unwrap();

    assert!(outcome.is_skipped());
    assert_eq!(outcome.message, DISABLED_REASON);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn scenario_marker_evaluator_reasons() {
    let fake = Arc::new(FakeIdentityService::new());
    let evaluator = RealmMarkerEvaluator::new(fake.clone());
    let bp = school_blueprint();

    let absent = evaluator.evaluate(&bp).await.unwrap();
    assert_eq!(
        absent,
        ProvisioningDecision::provision("realm 'school' does not exist")
    );

    fake.seed_realm("school", true, &[("kcb.initialized", "false")]);
    let unmarked = evaluator.evaluate(&bp).await.unwrap();
    assert!(unmarked.perform_provisioning);
    assert_eq!(
        unmarked.reason.as_deref(),
        Some("realm 'school' exists but is not initialized")
    );

    fake.seed_realm("school", true, &[("kcb.initialized", " TRUE ")]);
    let marked = evaluator.evaluate(&bp).await.unwrap();
    assert_eq!(
        marked,
        ProvisioningDecision::skip("realm 'school' already initialized")
    );
}

#[tokio::test]
async fn scenario_force_provisions_marked_realm() {
    let fake = Arc::new(FakeIdentityService::new());
    fake.seed_realm("school", true, &[("kcb.initialized", "true")]);
    let init = RealmInitializer::for_admin(fake.clone(), true);

    let outcome = init.initialize(&school_blueprint()).await.unwrap();

    assert!(outcome.is_applied());
    assert!(fake.client("school", "reporting").is_some());
}

#[tokio::test]
async fn scenario_evaluator_error_propagates() {
    let fake = Arc::new(FakeIdentityService::new());
    fake.fail_on(
        AdminOp::GetRealm,
        AdminError::Transport("connection refused".to_string()),
    );
    let init = RealmInitializer::for_admin(fake.clone(), false);

    let err = init.initialize(&school_blueprint()).await.unwrap_err();

    assert!(format!("{err:#}").contains("connection refused"));
    assert!(fake.mutating_calls().is_empty());
}
