use std::sync::Arc;

use anyhow::Result;
use kcb_admin::AdminApi;
use kcb_blueprint::KeycloakBlueprint;
use tracing::info;

use crate::{
    ApplyReport, ConvergenceEngine, InitializationEvaluator, InitializationOutcome,
    RealmMarkerEvaluator,
};

/// Reason given when bootstrap is switched off in configuration.
pub const DISABLED_REASON: &str = "provisioning disabled by configuration";

/// Top-level entry point: gate, evaluate, then converge.
pub struct RealmInitializer {
    evaluator: Arc<dyn InitializationEvaluator>,
    engine: ConvergenceEngine,
    enabled: bool,
}

impl RealmInitializer {
    pub fn new(evaluator: Arc<dyn InitializationEvaluator>, engine: ConvergenceEngine) -> Self {
        Self {
            evaluator,
            engine,
            enabled: true,
        }
    }

    /// Marker evaluator and engine sharing one admin handle.
    pub fn for_admin(admin: Arc<dyn AdminApi>, force: bool) -> Self {
        let evaluator = RealmMarkerEvaluator::new(Arc::clone(&admin)).force(force);
        Self::new(Arc::new(evaluator), ConvergenceEngine::new(admin))
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub async fn initialize(&self, blueprint: &KeycloakBlueprint) -> Result<InitializationOutcome> {
        let (outcome, _) = self.initialize_with_report(blueprint).await?;
        Ok(outcome)
    }

    /// As [`initialize`](Self::initialize); the report is `None` when skipped.
    pub async fn initialize_with_report(
        &self,
        blueprint: &KeycloakBlueprint,
    ) -> Result<(InitializationOutcome, Option<ApplyReport>)> {
        let realm = blueprint.realm_name();

        if !self.enabled {
            let outcome = InitializationOutcome::skipped(DISABLED_REASON);
            info!(realm, "{outcome}");
            return Ok((outcome, None));
        }

        let decision = self.evaluator.evaluate(blueprint).await?;
        if !decision.perform_provisioning {
            let reason = decision
                .reason
                .unwrap_or_else(|| "initialization not required".to_string());
            let outcome = InitializationOutcome::skipped(reason);
            info!(realm, "{outcome}");
            return Ok((outcome, None));
        }

        if let Some(reason) = &decision.reason {
            info!(realm, reason = %reason, "provisioning");
        }

        let report = self.engine.apply_with_report(blueprint).await?;
        let outcome = InitializationOutcome::applied(report.summary());
        info!(realm, run_id = %report.run_id, "{outcome}");
        Ok((outcome, Some(report)))
    }
}
