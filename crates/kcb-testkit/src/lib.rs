//! kcb-testkit
//!
//! Test support for the bootstrap crates: an in-memory identity service that
//! implements [`kcb_admin::AdminApi`], plus blueprint fixtures shared by the
//! scenario suites.

mod calls;
mod fake_identity;

pub use calls::{AdminCall, AdminOp};
pub use fake_identity::{FakeIdentityService, MANAGEMENT_ROLES};

use kcb_blueprint::{
    ClientBlueprint, ClientRoleBlueprint, KeycloakBlueprint, RealmBlueprint, RoleBlueprint,
    RoleCompositeMapping,
};

/// The canonical "school" blueprint: one service-account client, one realm
/// role, one client role, and a composite tying them together.
pub fn school_blueprint() -> KeycloakBlueprint {
    KeycloakBlueprint::new(RealmBlueprint::new("school"))
        .client(ClientBlueprint::new("reporting").service_accounts_enabled(true))
        .realm_role(RoleBlueprint::new("TEACHER"))
        .client_role(ClientRoleBlueprint::new("reporting", "VIEW_REPORTS"))
        .composite(RoleCompositeMapping::new(
            "TEACHER",
            "reporting",
            ["VIEW_REPORTS"],
        ))
}

/// Blueprint with a composite `R -> X:[C]` but no client `X` declared; `X`
/// must already exist remotely (or be missing, for tolerance scenarios).
pub fn composite_only_blueprint(realm: &str, client_id: &str) -> KeycloakBlueprint {
    KeycloakBlueprint::new(RealmBlueprint::new(realm))
        .realm_role(RoleBlueprint::new("R"))
        .client_role(ClientRoleBlueprint::new(client_id, "C"))
        .composite(RoleCompositeMapping::new("R", client_id, ["C"]))
}
