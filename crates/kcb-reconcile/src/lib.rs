//! kcb-reconcile
//!
//! Realm convergence for one bootstrap run.
//!
//! Architectural decisions:
//! - An evaluator decides whether to provision; the engine never second-guesses it
//! - Passes run in fixed dependency order: realm, clients, realm roles,
//!   client roles, composites, initialization flag
//! - Create, patch or skip per resource; nothing is ever deleted
//! - Attribute writes merge into the remote set, composites are additive only
//! - Any admin error aborts before the flag is written, so the next run retries
//! - Missing clients/roles referenced by roles or composites are warnings, not errors
//!
//! Sequential calls through an injected `Arc<dyn AdminApi>`. No internal parallelism.

mod engine;
mod evaluator;
mod initializer;
mod types;

pub use engine::{ConvergenceEngine, SERVICE_ACCOUNT_ROLES};
pub use evaluator::{InitializationEvaluator, ProvisioningDecision, RealmMarkerEvaluator};
pub use initializer::{RealmInitializer, DISABLED_REASON};
pub use types::*;
