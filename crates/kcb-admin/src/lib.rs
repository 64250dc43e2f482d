//! kcb-admin
//!
//! Boundary to the identity service's admin REST API.
//!
//! This crate owns the [`AdminApi`] port, the remote resource representations,
//! and the reqwest-backed [`KeycloakAdminClient`]. It makes no convergence
//! decisions; callers (kcb-reconcile) sequence the calls.

mod client;
mod error;
pub mod types;

pub use client::{AdminConnection, AdminCredentials, KeycloakAdminClient};
pub use error::{AdminError, AdminResult};
pub use types::*;

/// Client every realm carries for delegated realm administration.
pub const REALM_MANAGEMENT_CLIENT_ID: &str = "realm-management";

/// Admin API contract required by the convergence engine.
///
/// Object safe so callers hold an `Arc<dyn AdminApi>` without knowing the
/// concrete transport. `Send + Sync` so the handle can cross task boundaries.
///
/// Lookups return `Ok(None)` when the resource does not exist. Client-scoped
/// calls take the client's *internal* id, never its `clientId`.
#[async_trait::async_trait]
pub trait AdminApi: Send + Sync {
    // --- realm -------------------------------------------------------------

    async fn get_realm(&self, realm: &str) -> AdminResult<Option<RealmRepresentation>>;

    async fn create_realm(&self, rep: &RealmRepresentation) -> AdminResult<()>;

    /// Partial update: only the `Some` fields of `rep` are applied.
    async fn update_realm(&self, realm: &str, rep: &RealmRepresentation) -> AdminResult<()>;

    // --- clients -----------------------------------------------------------

    /// Zero-or-one client with the given `clientId`.
    async fn find_client(
        &self,
        realm: &str,
        client_id: &str,
    ) -> AdminResult<Option<ClientRepresentation>>;

    /// Creates the client and returns its internal id.
    async fn create_client(&self, realm: &str, rep: &ClientRepresentation) -> AdminResult<String>;

    async fn update_client(
        &self,
        realm: &str,
        id: &str,
        rep: &ClientRepresentation,
    ) -> AdminResult<()>;

    /// Stored secret of a confidential client, `None` if it has none.
    async fn get_client_secret(&self, realm: &str, id: &str) -> AdminResult<Option<String>>;

    async fn update_client_secret(&self, realm: &str, id: &str, secret: &str) -> AdminResult<()>;

    /// Service-account principal of a client. [`AdminError::NotFound`] when
    /// service accounts are disabled for it.
    async fn get_service_account_user(
        &self,
        realm: &str,
        id: &str,
    ) -> AdminResult<UserRepresentation>;

    // --- realm roles -------------------------------------------------------

    async fn get_realm_role(&self, realm: &str, name: &str)
        -> AdminResult<Option<RoleRepresentation>>;

    async fn create_realm_role(&self, realm: &str, rep: &RoleRepresentation) -> AdminResult<()>;

    async fn update_realm_role(
        &self,
        realm: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()>;

    /// Composites of realm role `role_name` that belong to client `client_uuid` only.
    async fn get_realm_role_client_composites(
        &self,
        realm: &str,
        role_name: &str,
        client_uuid: &str,
    ) -> AdminResult<Vec<RoleRepresentation>>;

    /// Attaches `roles` as composites of realm role `role_name` in one call.
    async fn add_realm_role_composites(
        &self,
        realm: &str,
        role_name: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()>;

    // --- client roles ------------------------------------------------------

    async fn get_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
    ) -> AdminResult<Option<RoleRepresentation>>;

    async fn create_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()>;

    async fn update_client_role(
        &self,
        realm: &str,
        client_uuid: &str,
        name: &str,
        rep: &RoleRepresentation,
    ) -> AdminResult<()>;

    // --- grants ------------------------------------------------------------

    /// Grants roles of client `client_uuid` to principal `user_id`.
    async fn assign_client_roles_to_user(
        &self,
        realm: &str,
        user_id: &str,
        client_uuid: &str,
        roles: &[RoleRepresentation],
    ) -> AdminResult<()>;
}
