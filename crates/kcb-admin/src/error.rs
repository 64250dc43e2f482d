use std::fmt;

/// Result alias for every [`crate::AdminApi`] call.
pub type AdminResult<T> = Result<T, AdminError>;

/// Errors an admin API implementation may return.
///
/// "Not found" on a lookup is not an error: lookups return `Ok(None)`.
/// [`AdminError::NotFound`] is reserved for calls where the resource is
/// required to exist (e.g. a client's service-account user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// Network or transport failure.
    Transport(String),
    /// Token acquisition failed or the admin principal lacks permission (401/403).
    Auth { status: u16, message: String },
    /// The identity service refused a create because the resource already exists (409).
    Conflict(String),
    /// A required resource was absent.
    NotFound(String),
    /// Any other non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The connection settings are unusable (e.g. malformed base URL).
    Config(String),
}

impl AdminError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AdminError::NotFound(_))
    }
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::Transport(msg) => write!(f, "admin transport error: {msg}"),
            AdminError::Auth { status, message } => {
                write!(f, "admin auth error status={status}: {message}")
            }
            AdminError::Conflict(msg) => write!(f, "admin conflict: {msg}"),
            AdminError::NotFound(msg) => write!(f, "admin resource not found: {msg}"),
            AdminError::Api { status, message } => {
                write!(f, "admin api error status={status}: {message}")
            }
            AdminError::Decode(msg) => write!(f, "admin decode error: {msg}"),
            AdminError::Config(msg) => write!(f, "admin config error: {msg}"),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdminError::Decode(e.to_string())
        } else {
            AdminError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_api_error() {
        let err = AdminError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "admin api error status=500: boom");
    }

    #[test]
    fn display_auth_error() {
        let err = AdminError::Auth {
            status: 401,
            message: "invalid_grant".to_string(),
        };
        assert_eq!(err.to_string(), "admin auth error status=401: invalid_grant");
    }

    #[test]
    fn not_found_predicate() {
        assert!(AdminError::NotFound("user".to_string()).is_not_found());
        assert!(!AdminError::Conflict("client".to_string()).is_not_found());
    }
}
