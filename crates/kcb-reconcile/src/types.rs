use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    Applied,
    Skipped,
}

/// What one `initialize` call did. Returned to the caller, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InitializationOutcome {
    pub kind: OutcomeKind,
    pub message: String,
}

impl InitializationOutcome {
    pub fn applied(message: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Applied,
            message: message.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            message: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.kind == OutcomeKind::Applied
    }

    pub fn is_skipped(&self) -> bool {
        self.kind == OutcomeKind::Skipped
    }
}

impl fmt::Display for InitializationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OutcomeKind::Applied => write!(f, "applied: {}", self.message),
            OutcomeKind::Skipped => write!(f, "skipped: {}", self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Apply report
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Realm,
    Client,
    ClientSecret,
    ServiceAccountGrant,
    RealmRole,
    ClientRole,
    Composite,
    InitializationFlag,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ApplyAction {
    Created,
    Updated,
    Unchanged,
    /// Not converged this run: dependency missing or best-effort step failed.
    Skipped,
}

/// One per-resource decision, in the order the engine made it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplyStep {
    pub kind: ResourceKind,
    /// Resource key, e.g. `reporting` or `reporting:VIEW_REPORTS`.
    pub key: String,
    pub action: ApplyAction,
    pub detail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    pub realm: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<ApplyStep>,
    pub warnings: Vec<String>,
}

impl ApplyReport {
    pub fn start(realm: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            realm: realm.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record(
        &mut self,
        kind: ResourceKind,
        key: impl Into<String>,
        action: ApplyAction,
        detail: Option<String>,
    ) {
        self.steps.push(ApplyStep {
            kind,
            key: key.into(),
            action,
            detail,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn count(&self, action: ApplyAction) -> usize {
        self.steps.iter().filter(|s| s.action == action).count()
    }

    /// Steps that changed remote state.
    pub fn mutation_count(&self) -> usize {
        self.count(ApplyAction::Created) + self.count(ApplyAction::Updated)
    }

    pub fn steps_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ApplyStep> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    pub fn summary(&self) -> String {
        format!(
            "realm={} created={} updated={} unchanged={} skipped={} warnings={}",
            self.realm,
            self.count(ApplyAction::Created),
            self.count(ApplyAction::Updated),
            self.count(ApplyAction::Unchanged),
            self.count(ApplyAction::Skipped),
            self.warnings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_action() {
        let mut r = ApplyReport::start("school");
        r.record(ResourceKind::Realm, "school", ApplyAction::Created, None);
        r.record(ResourceKind::Client, "reporting", ApplyAction::Unchanged, None);
        r.record(
            ResourceKind::ClientSecret,
            "reporting",
            ApplyAction::Updated,
            Some("rotated".to_string()),
        );
        r.record(ResourceKind::Composite, "TEACHER -> x", ApplyAction::Skipped, None);
        r.warn("client 'x' not found");

        assert_eq!(r.mutation_count(), 2);
        assert_eq!(
            r.summary(),
            "realm=school created=1 updated=1 unchanged=1 skipped=1 warnings=1"
        );
    }

    #[test]
    fn outcome_display_matches_log_lines() {
        assert_eq!(
            InitializationOutcome::skipped("realm 'school' already initialized").to_string(),
            "skipped: realm 'school' already initialized"
        );
        let applied = InitializationOutcome::applied("realm=school created=0");
        assert!(applied.is_applied());
        assert!(!applied.is_skipped());
        assert_eq!(applied.to_string(), "applied: realm=school created=0");
    }

    #[test]
    fn finish_stamps_end_time() {
        let mut r = ApplyReport::start("school");
        assert!(r.finished_at.is_none());
        r.finish();
        assert!(r.finished_at.unwrap() >= r.started_at);
    }
}
