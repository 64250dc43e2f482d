use std::fmt;

/// One admin API operation, as recorded by the fake identity service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdminOp {
    GetRealm,
    CreateRealm,
    UpdateRealm,
    FindClient,
    CreateClient,
    UpdateClient,
    GetClientSecret,
    UpdateClientSecret,
    GetServiceAccountUser,
    GetRealmRole,
    CreateRealmRole,
    UpdateRealmRole,
    GetRealmRoleClientComposites,
    AddRealmRoleComposites,
    GetClientRole,
    CreateClientRole,
    UpdateClientRole,
    AssignClientRolesToUser,
}

impl AdminOp {
    /// True for calls that change remote state.
    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            AdminOp::CreateRealm
                | AdminOp::UpdateRealm
                | AdminOp::CreateClient
                | AdminOp::UpdateClient
                | AdminOp::UpdateClientSecret
                | AdminOp::CreateRealmRole
                | AdminOp::UpdateRealmRole
                | AdminOp::AddRealmRoleComposites
                | AdminOp::CreateClientRole
                | AdminOp::UpdateClientRole
                | AdminOp::AssignClientRolesToUser
        )
    }
}

/// A recorded call: the operation plus a `/`-joined target path
/// (e.g. `school/client-000003/VIEW_REPORTS`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminCall {
    pub op: AdminOp,
    pub target: String,
}

impl fmt::Display for AdminCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.op, self.target)
    }
}
